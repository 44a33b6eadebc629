//! Runtime value type for bracket scripts.
//!
//! Script text is a string at heart, but callables may return native numbers,
//! booleans or lists, and the evaluator keeps those types intact until two
//! values have to be concatenated.

use std::cmp::Ordering;
use std::fmt;

/// A script runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Result of an empty argument or a callable with nothing to return.
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.is_nan() {
                    f.write_str("NaN")
                } else if x.is_infinite() {
                    f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
                } else if x.fract() == 0.0 && x.abs() < 1e15 {
                    // Whole floats print like integers: 5.0 → "5".
                    write!(f, "{}", *x as i64)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl Value {
    /// Interpret raw script text the way a script author means it:
    /// `"42"` is a number, `"true"` a boolean, `"null"` nothing at all.
    pub fn parse_literal(s: &str) -> Value {
        if let Ok(n) = s.parse::<i64>() {
            if n.to_string() == s {
                return Value::Int(n);
            }
        }
        if s.contains('.') {
            if let Ok(x) = s.parse::<f64>() {
                return Value::Float(x);
            }
        }
        match s {
            "NaN" => Value::Float(f64::NAN),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" | "undefined" => Value::Undefined,
            _ => Value::Str(s.to_owned()),
        }
    }

    /// Truthiness.  Text is coerced first, so `"false"`, `"0"` and `""` are
    /// all falsy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0 && !x.is_nan(),
            Value::Str(s) => match Value::parse_literal(s) {
                Value::Str(s) => !s.is_empty(),
                other => other.as_bool(),
            },
            Value::List(_) => true,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => {
                let t = s.trim();
                if !is_decimal(t) {
                    return None;
                }
                t.parse::<f64>().ok().filter(|x| x.is_finite())
            }
            Value::Undefined | Value::List(_) => None,
        }
    }

    /// Integer view, truncating floats.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            other => other.as_number().filter(|x| x.is_finite()).map(|x| x.trunc() as i64),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Name of the type, as reported to scripts.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "array",
        }
    }

    // ── Comparison helpers ────────────────────────────────────────────────────

    /// Loose equality: numeric when both sides are numeric, textual otherwise.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == rhs.to_string(),
        }
    }

    /// Relational comparison with the same coercion rules as [`loose_eq`].
    ///
    /// Returns `None` when a numeric comparison involves NaN.
    ///
    /// [`loose_eq`]: Value::loose_eq
    pub fn loose_cmp(&self, rhs: &Value) -> Option<Ordering> {
        match (self.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(self.to_string().cmp(&rhs.to_string())),
        }
    }
}

/// Plain decimal text: an optional sign, then digits with at most one `.`.
/// Exponents and spellings such as `inf` or `NaN` do not count.
fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

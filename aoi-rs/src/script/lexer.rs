//! Bracket-script tokenizer.
//!
//! Produces a flat token stream from raw script text:
//!
//! | Input            | Token                                              |
//! |------------------|----------------------------------------------------|
//! | `[` `]` `;`      | `Open`, `Close`, `NewArg`                          |
//! | `$name`          | `Call` head named `$name` (arguments filled later) |
//! | `==` `!=` `>=` `<=` `>` `<` | `Operator`                              |
//! | `\c`             | literal `c` if `c` is syntax, else literal `\c`    |
//! | anything else    | `Number` if it is an exact integer, else `Str`     |
//!
//! Nothing in the source is an error except an empty script: stray `$`, `!`
//! or `=` degrade to literal text.  Adjacent text tokens are merged in a
//! post-pass.

use std::fmt;

use tracing::trace;

use super::parser::Call;
use super::value::Value;
use crate::error::{InternalError, Result, ScriptError};

/// Characters with syntactic meaning; escaping one yields it as plain text.
const SYNTAX: &[char] = &['[', ']', '\\', ';', '$'];

/// Characters that may start a comparison operator.
const OPERATOR_CHARS: &[char] = &['!', '=', '<', '>'];

fn is_syntax(c: char) -> bool {
    SYNTAX.contains(&c)
}

fn is_operator_char(c: char) -> bool {
    OPERATOR_CHARS.contains(&c)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_text_char(c: char) -> bool {
    !(is_syntax(c) || is_operator_char(c))
}

// ── Span ──────────────────────────────────────────────────────────────────────

/// 1-based source position of the first character of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ── Operator ──────────────────────────────────────────────────────────────────

/// Comparison operator recognised inside call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq, // ==
    Ne, // !=
    Ge, // >=
    Le, // <=
    Gt,
    Lt,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    /// Apply the operator with loose coercion (see [`Value::loose_cmp`]).
    pub fn compare(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Operator::Eq => lhs.loose_eq(rhs),
            Operator::Ne => !lhs.loose_eq(rhs),
            Operator::Gt => lhs.loose_cmp(rhs) == Some(Greater),
            Operator::Lt => lhs.loose_cmp(rhs) == Some(Less),
            Operator::Ge => matches!(lhs.loose_cmp(rhs), Some(Greater | Equal)),
            Operator::Le => matches!(lhs.loose_cmp(rhs), Some(Less | Equal)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Str(String),
    Number(i64),
    Operator(Operator),
    /// Call head; its arguments are attached by the parser.
    Call(Call),
    Open,
    Close,
    NewArg,
}

impl TokenKind {
    /// Short kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Str(_) => "string",
            TokenKind::Number(_) => "number",
            TokenKind::Operator(_) => "operator",
            TokenKind::Call(_) => "call",
            TokenKind::Open => "open",
            TokenKind::Close => "close",
            TokenKind::NewArg => "newArg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    pub fn text(s: impl Into<String>, span: Span) -> Self {
        Token::new(TokenKind::Str(s.into()), span)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Str(_))
    }

    /// Append another text token to this one.  Only text merges.
    fn merge(&mut self, other: Token) -> Result<(), InternalError> {
        match (&mut self.kind, other.kind) {
            (TokenKind::Str(a), TokenKind::Str(b)) => {
                a.push_str(&b);
                Ok(())
            }
            (a, b) => Err(InternalError::TokenMerge {
                left: a.name(),
                right: b.name(),
            }),
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(ScriptError::InvalidInput(
                "script source must be non-empty".into(),
            ));
        }
        Ok(Lexer {
            src: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        })
    }

    /// Tokenize the whole input and merge adjacent text tokens.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        let tokens = merge_text(tokens)?;
        trace!(count = tokens.len(), "tokenized");
        Ok(tokens)
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn read_while(&mut self, accept: fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|&c| accept(c)) {
            self.advance();
            s.push(c);
        }
        s
    }

    fn next_token(&mut self) -> Option<Token> {
        let span = self.span();
        let ch = self.advance()?;
        let kind = match ch {
            '[' => TokenKind::Open,
            ']' => TokenKind::Close,
            ';' => TokenKind::NewArg,
            '\\' => match self.advance() {
                Some(c) if is_syntax(c) || is_operator_char(c) => TokenKind::Str(c.to_string()),
                Some(c) => TokenKind::Str(format!("\\{c}")),
                // Trailing backslash: nothing left to escape.
                None => TokenKind::Str("\\".into()),
            },
            '$' => {
                let name = self.read_while(is_name_char);
                if name.is_empty() {
                    TokenKind::Str("$".into())
                } else {
                    TokenKind::Call(Call::new(format!("${name}"), span))
                }
            }
            c if is_operator_char(c) => self.read_operator(c),
            c => {
                let mut run = String::from(c);
                run.push_str(&self.read_while(is_text_char));
                match exact_integer(&run) {
                    Some(n) => TokenKind::Number(n),
                    None => TokenKind::Str(run),
                }
            }
        };
        Some(Token::new(kind, span))
    }

    /// Two-character operators win over one-character ones.
    fn read_operator(&mut self, first: char) -> TokenKind {
        if let Some(second) = self.peek() {
            let pair: String = [first, second].iter().collect();
            if let Some(op) = Operator::parse(&pair) {
                self.advance();
                return TokenKind::Operator(op);
            }
        }
        let single = first.to_string();
        match Operator::parse(&single) {
            Some(op) => TokenKind::Operator(op),
            None => TokenKind::Str(single),
        }
    }
}

/// Tokenize `input`.  Fails only on empty input.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input)?.tokenize()
}

/// `Some(n)` only when `s` is the canonical spelling of `n`, so that turning
/// the token back into text never changes it (`"007"`, `"+5"` and `" 5"` stay
/// text).
fn exact_integer(s: &str) -> Option<i64> {
    let n: i64 = s.parse().ok()?;
    (n.to_string() == s).then_some(n)
}

fn merge_text(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match out.last_mut() {
            Some(prev) if prev.is_text() && token.is_text() => prev.merge(token)?,
            _ => out.push(token),
        }
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Str(s.into())
    }

    fn call(name: &str) -> TokenKind {
        match &kinds(name)[0] {
            TokenKind::Call(c) => TokenKind::Call(c.clone()),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(tokenize(""), Err(ScriptError::InvalidInput(_))));
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(kinds("hello world"), vec![text("hello world")]);
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            kinds("[;]"),
            vec![TokenKind::Open, TokenKind::NewArg, TokenKind::Close]
        );
    }

    #[test]
    fn call_head() {
        let toks = kinds("$sendMessage[hi]");
        match &toks[0] {
            TokenKind::Call(c) => {
                assert_eq!(c.name, "$sendMessage");
                assert!(c.args.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert_eq!(&toks[1..], &[TokenKind::Open, text("hi"), TokenKind::Close]);
    }

    #[test]
    fn call_name_stops_at_non_letter() {
        let toks = kinds("$foo1");
        assert_eq!(toks, vec![call("$foo"), TokenKind::Number(1)]);
    }

    #[test]
    fn bare_dollar_is_text() {
        assert_eq!(kinds("a $ b"), vec![text("a $ b")]);
        assert_eq!(kinds("$"), vec![text("$")]);
        assert_eq!(kinds("$5"), vec![text("$"), TokenKind::Number(5)]);
    }

    #[test]
    fn exact_integers_become_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42)]);
        assert_eq!(kinds("-7"), vec![TokenKind::Number(-7)]);
        assert_eq!(kinds("42abc"), vec![text("42abc")]);
        assert_eq!(kinds("007"), vec![text("007")]);
        assert_eq!(kinds(" 42"), vec![text(" 42")]);
        assert_eq!(kinds("1.5"), vec![text("1.5")]);
    }

    #[test]
    fn two_char_operator_wins() {
        assert_eq!(kinds(">="), vec![TokenKind::Operator(Operator::Ge)]);
        assert_eq!(kinds("=="), vec![TokenKind::Operator(Operator::Eq)]);
        assert_eq!(kinds("!="), vec![TokenKind::Operator(Operator::Ne)]);
        assert_eq!(kinds("<"), vec![TokenKind::Operator(Operator::Lt)]);
    }

    #[test]
    fn lone_bang_and_equals_are_text() {
        assert_eq!(kinds("hi!"), vec![text("hi!")]);
        assert_eq!(kinds("a=b"), vec![text("a=b")]);
    }

    #[test]
    fn unknown_pair_splits_into_single_operators() {
        assert_eq!(
            kinds("<>"),
            vec![
                TokenKind::Operator(Operator::Lt),
                TokenKind::Operator(Operator::Gt)
            ]
        );
    }

    #[test]
    fn operator_inside_text() {
        assert_eq!(
            kinds("5 > 3"),
            vec![
                text("5 "),
                TokenKind::Operator(Operator::Gt),
                text(" 3")
            ]
        );
    }

    #[test]
    fn escaped_punctuation_is_text() {
        assert_eq!(kinds("\\;"), vec![text(";")]);
        assert_eq!(kinds("\\["), vec![text("[")]);
        assert_eq!(kinds("\\]"), vec![text("]")]);
        assert_eq!(kinds("a\\;b"), vec![text("a;b")]);
    }

    #[test]
    fn escaped_call_head_is_text() {
        assert_eq!(kinds("\\$foo"), vec![text("$foo")]);
    }

    #[test]
    fn escaped_operator_is_text() {
        assert_eq!(kinds("1 \\> 0"), vec![text("1 > 0")]);
    }

    #[test]
    fn escape_keeps_backslash_before_plain_text() {
        assert_eq!(kinds("\\n"), vec![text("\\n")]);
        assert_eq!(kinds("\\\\"), vec![text("\\")]);
    }

    #[test]
    fn trailing_backslash_is_text() {
        assert_eq!(kinds("end\\"), vec![text("end\\")]);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let toks = tokenize("ab\n$x[").unwrap();
        assert_eq!(toks[0].span, Span::new(1, 1));
        assert_eq!(toks[1].span, Span::new(2, 1));
        assert_eq!(toks[2].span, Span::new(2, 3));
    }

    #[test]
    fn positions_are_monotonic() {
        let toks = tokenize("a $b[c;d == e]\n$f[\\;]  g").unwrap();
        for pair in toks.windows(2) {
            assert!(pair[0].span <= pair[1].span, "{:?} > {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn merge_rejects_non_text() {
        let mut a = Token::new(TokenKind::Open, Span::default());
        let err = a.merge(Token::text("x", Span::default())).unwrap_err();
        assert_eq!(
            err,
            InternalError::TokenMerge {
                left: "open",
                right: "string"
            }
        );
    }

    #[test]
    fn operator_compare() {
        assert!(Operator::Eq.compare(&Value::Int(5), &Value::Str("5".into())));
        assert!(Operator::Ge.compare(&Value::Int(5), &Value::Int(5)));
        assert!(!Operator::Gt.compare(&Value::Int(5), &Value::Int(5)));
        assert!(Operator::Lt.compare(&"a".into(), &"b".into()));
        assert!(Operator::Ne.compare(&"a".into(), &"b".into()));
    }
}

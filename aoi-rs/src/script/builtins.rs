//! Standard library of bracket-script functions.
//!
//! Every function receives its call site with arguments unevaluated and
//! evaluates only what it needs, so `$if` never touches the branch it does
//! not take.  [`standard_library`] returns them all as one registry; hosts
//! extend or override it before building a [`Runtime`].
//!
//! [`Runtime`]: super::runtime::Runtime

use regex::Regex;

use crate::error::{Result, ScriptError};

use super::context::{Context, ScriptAction};
use super::env::{BoxFuture, FunctionRegistry};
use super::parser::Call;
use super::value::Value;

/// The message that triggered a run, as seen by `$eventText` and
/// `$username`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEvent {
    pub text: String,
    pub username: Option<String>,
}

impl MessageEvent {
    pub fn new(text: impl Into<String>) -> Self {
        MessageEvent {
            text: text.into(),
            username: None,
        }
    }

    pub fn from_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

pub fn standard_library() -> FunctionRegistry {
    let mut lib = FunctionRegistry::new();
    lib
        // control flow
        .register("$if", if_)
        .register("$onlyIf", only_if)
        .register("$stop", stop)
        .register("$eval", eval)
        // run variables
        .register("$let", let_)
        .register("$get", get)
        // text
        .register("$toLowerCase", to_lower_case)
        .register("$toUpperCase", to_upper_case)
        .register("$startsWith", starts_with)
        .register("$textIndexOf", text_index_of)
        .register("$textLastIndexOf", text_last_index_of)
        .register("$charAt", char_at)
        .register("$split", split)
        .register("$checkContains", check_contains)
        .register("$replaceText", replace_text)
        .register("$replaceRegex", replace_regex)
        .register("$isString", is_string)
        // arrays and numbers
        .register("$arrayFindIndex", array_find_index)
        .register("$trunc", trunc)
        // host actions and event data
        .register("$sendMessage", send_message)
        .register("$replyMessage", reply_message)
        .register("$eventText", event_text)
        .register("$username", username);
    lib
}

// ── Control flow ──────────────────────────────────────────────────────────────

/// `$if[cond;then;else]`: evaluate exactly one branch.
fn if_<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let branch = if ctx.evaluate_condition(&call.args[0]).await? { 1 } else { 2 };
        ctx.argument(call, branch).await
    })
}

/// `$onlyIf[cond;message;reply]`: when `cond` fails, queue `message` (as a
/// reply if the third argument is truthy) and stop the run.
fn only_if<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        if ctx.evaluate_condition(&call.args[0]).await? {
            return Ok(Value::Undefined);
        }
        let message = ctx.text_argument(call, 1).await?;
        if !message.is_empty() {
            let reply = ctx.argument(call, 2).await?.as_bool();
            ctx.push_action(if reply {
                ScriptAction::Reply(message)
            } else {
                ScriptAction::Send(message)
            });
        }
        ctx.stop();
        Ok(Value::Undefined)
    })
}

fn stop<'a>(ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.stop();
        Ok(Value::Undefined)
    })
}

/// `$eval[code]`: run script text built at run time, inside the current run.
fn eval<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let code = ctx.text_argument(call, 0).await?;
        if code.is_empty() {
            return Ok(Value::Undefined);
        }
        ctx.evaluate_source(&code).await
    })
}

// ── Run variables ─────────────────────────────────────────────────────────────

/// `$let[name;value]`
fn let_<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let name = ctx.text_argument(call, 0).await?;
        let value = ctx.argument(call, 1).await?;
        ctx.set_var(name, value);
        Ok(Value::Undefined)
    })
}

/// `$get[name]`: `Undefined` when unset.
fn get<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let name = ctx.text_argument(call, 0).await?;
        Ok(ctx.var(&name).cloned().unwrap_or_default())
    })
}

// ── Text ──────────────────────────────────────────────────────────────────────

fn to_lower_case<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        Ok(raw_text(ctx, call, 0).await?.to_lowercase().into())
    })
}

fn to_upper_case<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        Ok(raw_text(ctx, call, 0).await?.to_uppercase().into())
    })
}

fn starts_with<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let text = raw_text(ctx, call, 0).await?;
        let prefix = raw_text(ctx, call, 1).await?;
        Ok(text.starts_with(&prefix).into())
    })
}

/// `$textIndexOf[text;search]`: character index of the first match, or -1.
fn text_index_of<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let text = raw_text(ctx, call, 0).await?;
        let search = raw_text(ctx, call, 1).await?;
        Ok(char_index(&text, text.find(&search)).into())
    })
}

fn text_last_index_of<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let text = raw_text(ctx, call, 0).await?;
        let search = raw_text(ctx, call, 1).await?;
        Ok(char_index(&text, text.rfind(&search)).into())
    })
}

/// `$charAt[text;position]`, 1-based.  Out of range gives empty text.
fn char_at<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let text = raw_text(ctx, call, 0).await?;
        let pos = int_arg(ctx, call, 1).await?;
        let ch = pos
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| text.chars().nth(i))
            .map(String::from)
            .unwrap_or_default();
        Ok(ch.into())
    })
}

/// `$split[text;separator]` into a list.  An empty separator splits into
/// characters.
fn split<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let text = raw_text(ctx, call, 0).await?;
        let sep = raw_text(ctx, call, 1).await?;
        let parts: Vec<Value> = if sep.is_empty() {
            text.chars().map(|c| Value::Str(c.to_string())).collect()
        } else {
            text.split(sep.as_str()).map(Value::from).collect()
        };
        Ok(Value::List(parts))
    })
}

/// `$checkContains[text;a;b;…]`: true if `text` contains any of the rest.
fn check_contains<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 2)?;
        let values = ctx.evaluate_all(call).await?;
        let text = values[0].to_string();
        let found = values[1..].iter().any(|v| text.contains(&v.to_string()));
        Ok(found.into())
    })
}

/// `$replaceText[text;search;replacement;count]`.  A missing or negative
/// count replaces every occurrence.
fn replace_text<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 3)?;
        let text = raw_text(ctx, call, 0).await?;
        let search = raw_text(ctx, call, 1).await?;
        let replacement = raw_text(ctx, call, 2).await?;
        let count = match ctx.argument(call, 3).await? {
            Value::Undefined => -1,
            v => v.as_int().ok_or_else(|| not_a_number(call, 3))?,
        };
        let out = match usize::try_from(count) {
            Ok(n) => text.replacen(&search, &replacement, n),
            Err(_) => text.replace(&search, &replacement),
        };
        Ok(out.into())
    })
}

/// `$replaceRegex[text;pattern;replacement]`.  `$1`-style group references
/// in the replacement are expanded.
fn replace_regex<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 3)?;
        let text = raw_text(ctx, call, 0).await?;
        let pattern = raw_text(ctx, call, 1).await?;
        let replacement = raw_text(ctx, call, 2).await?;
        let re = Regex::new(&pattern)
            .map_err(|e| ScriptError::function(&call.name, format!("invalid pattern: {e}")))?;
        Ok(re.replace_all(&text, replacement.as_str()).into_owned().into())
    })
}

/// `$isString[value]`: true unless the text reads as a number, boolean or
/// null.
fn is_string<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let text = ctx.text_argument(call, 0).await?;
        Ok(matches!(Value::parse_literal(&text), Value::Str(_)).into())
    })
}

// ── Arrays and numbers ────────────────────────────────────────────────────────

/// `$arrayFindIndex[array;variable;condition]`.
///
/// `array` is either a list value or the name of a run variable holding one.
/// Each element is bound to `variable` in turn and `condition` is
/// re-evaluated; the first index that satisfies it is returned, else -1.
fn array_find_index<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 3)?;
        let items = match ctx.argument(call, 0).await? {
            Value::List(items) => items,
            other => {
                let name = other.to_string().trim().to_owned();
                match ctx.var(&name) {
                    Some(Value::List(items)) => items.clone(),
                    _ => {
                        return Err(ScriptError::function(
                            &call.name,
                            format!("the variable \"{name}\" does not hold an array"),
                        ))
                    }
                }
            }
        };
        let variable = ctx.text_argument(call, 1).await?;
        for (i, item) in items.into_iter().enumerate() {
            ctx.set_var(variable.clone(), item);
            if ctx.evaluate_condition(&call.args[2]).await? {
                return Ok(Value::Int(i as i64));
            }
        }
        Ok(Value::Int(-1))
    })
}

/// `$trunc[number]`: drop the fractional part.
fn trunc<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let x = ctx
            .argument(call, 0)
            .await?
            .as_number()
            .ok_or_else(|| not_a_number(call, 0))?;
        Ok(Value::Int(x.trunc() as i64))
    })
}

// ── Host actions and event data ───────────────────────────────────────────────

fn send_message<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let text = ctx.text_argument(call, 0).await?;
        ctx.push_action(ScriptAction::Send(text));
        Ok(Value::Undefined)
    })
}

fn reply_message<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let text = ctx.text_argument(call, 0).await?;
        ctx.push_action(ScriptAction::Reply(text));
        Ok(Value::Undefined)
    })
}

fn event_text<'a>(ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        Ok(ctx
            .event::<MessageEvent>()
            .map(|e| Value::Str(e.text.clone()))
            .unwrap_or_default())
    })
}

fn username<'a>(ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        Ok(ctx
            .event::<MessageEvent>()
            .and_then(|e| e.username.clone())
            .map(Value::Str)
            .unwrap_or_default())
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Argument `idx` stringified without trimming (separators may be spaces).
async fn raw_text(ctx: &mut Context, call: &Call, idx: usize) -> Result<String> {
    Ok(ctx.argument(call, idx).await?.to_string())
}

async fn int_arg(ctx: &mut Context, call: &Call, idx: usize) -> Result<i64> {
    ctx.argument(call, idx)
        .await?
        .as_int()
        .ok_or_else(|| not_a_number(call, idx))
}

fn not_a_number(call: &Call, idx: usize) -> ScriptError {
    ScriptError::function(&call.name, format!("argument {} is not a number", idx + 1))
}

fn char_index(text: &str, byte: Option<usize>) -> i64 {
    byte.map_or(-1, |b| text[..b].chars().count() as i64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Tree-walking evaluator.
//!
//! Literal tokens evaluate to themselves; calls are dispatched through the
//! [`Context`] with their arguments still unevaluated.  Sequences are walked
//! strictly left to right and their results folded:
//!
//! * no values: `Undefined`
//! * one value: that value, native type intact
//! * two or more: each stringified, then concatenated

use crate::error::{InternalError, Result};

use super::context::Context;
use super::env::BoxFuture;
use super::lexer::{Token, TokenKind};
use super::parser::{Argument, Program};
use super::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// Evaluate a whole program.  Text results are trimmed when the
    /// context's options ask for it.
    pub async fn evaluate(&self, program: &Program, ctx: &mut Context) -> Result<Value> {
        let value = self.visit_sequence(program.nodes(), ctx).await?;
        Ok(match value {
            Value::Str(s) if ctx.options().trim_output => Value::Str(s.trim().to_owned()),
            other => other,
        })
    }

    /// Evaluate one node.  Boxed because calls re-enter the evaluator through
    /// the callables they dispatch to.
    pub fn visit<'a>(&'a self, token: &'a Token, ctx: &'a mut Context) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match &token.kind {
                TokenKind::Str(s) => Ok(Value::Str(s.clone())),
                TokenKind::Number(n) => Ok(Value::Int(*n)),
                TokenKind::Operator(op) => Ok(Value::Str(op.as_str().to_owned())),
                TokenKind::Call(call) => ctx.call_identifier(call).await,
                other => Err(InternalError::UnknownNode(other.name()).into()),
            }
        })
    }

    pub async fn visit_argument(&self, arg: &Argument, ctx: &mut Context) -> Result<Value> {
        self.visit_sequence(arg.nodes(), ctx).await
    }

    /// Evaluate `nodes` in order and fold the results.  Stops early once the
    /// context's stop flag is raised.
    pub async fn visit_sequence(&self, nodes: &[Token], ctx: &mut Context) -> Result<Value> {
        let mut values = Vec::with_capacity(nodes.len());
        for node in nodes {
            if ctx.is_stopped() {
                break;
            }
            values.push(self.visit(node, ctx).await?);
        }
        Ok(fold(values))
    }
}

/// Collapse a sequence of results into one value.
pub fn fold(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Undefined,
        1 => values.pop().unwrap_or_default(),
        _ => Value::Str(values.iter().map(|v| v.to_string()).collect()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

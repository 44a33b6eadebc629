//! Per-run state handed to every callable.
//!
//! A [`Context`] lives for exactly one script run.  It owns the run's child
//! scope, its variables, the stop flag and the queue of host actions, and it
//! is the only way a callable can evaluate the arguments it was given.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::config::RuntimeOptions;
use crate::error::{Result, ScriptError};

use super::env::{BoxFuture, Callable, Environment};
use super::eval::Evaluator;
use super::lexer::tokenize;
use super::parser::{Argument, Call, Parser, MAX_NESTING};
use super::value::Value;

/// Side effect requested by a script, performed by the host after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    /// Post a new message in the originating channel.
    Send(String),
    /// Reply to the message that triggered the run.
    Reply(String),
}

pub struct Context {
    file_name: String,
    env: Arc<Environment>,
    options: RuntimeOptions,
    evaluator: Evaluator,
    vars: HashMap<String, Value>,
    actions: Vec<ScriptAction>,
    event: Option<Box<dyn Any + Send + Sync>>,
    stopped: bool,
    depth: usize,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("file_name", &self.file_name)
            .field("options", &self.options)
            .field("vars", &self.vars)
            .field("actions", &self.actions)
            .field("has_event", &self.event.is_some())
            .field("stopped", &self.stopped)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(file_name: impl Into<String>, env: Arc<Environment>, options: RuntimeOptions) -> Self {
        Context {
            file_name: file_name.into(),
            env,
            options,
            evaluator: Evaluator,
            vars: HashMap::new(),
            actions: Vec::new(),
            event: None,
            stopped: false,
            depth: 0,
        }
    }

    /// Attach the payload that triggered this run.
    pub fn with_event<T: Any + Send + Sync>(mut self, event: T) -> Self {
        self.set_event(event);
        self
    }

    pub fn set_event<T: Any + Send + Sync>(&mut self, event: T) {
        self.event = Some(Box::new(event));
    }

    /// The event payload, if one of type `T` was attached.
    pub fn event<T: Any>(&self) -> Option<&T> {
        self.event.as_deref().and_then(|e| e.downcast_ref::<T>())
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// The run's own scope.  Its parent is the runtime's root scope.
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Bind `name` for the rest of this run only.
    pub fn define(&self, name: &str, callable: Arc<dyn Callable>) {
        self.env.set(name, callable);
    }

    pub fn define_fn<F>(&self, name: &str, f: F)
    where
        F: for<'a> Fn(&'a mut Context, &'a Call) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.env.set_fn(name, f);
    }

    /// Resolve `call.name` through the scope chain and invoke it with the
    /// raw call site.  Errors from the callable come back unchanged.
    ///
    /// Fails once more than [`MAX_NESTING`] calls are active at the same
    /// time.
    pub async fn call_identifier(&mut self, call: &Call) -> Result<Value> {
        let callable = self.env.resolve(&call.name)?;
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::function(&call.name, "nesting too deep"));
        }
        trace!(name = %call.name, args = call.args.len(), depth = self.depth, "call");
        self.depth += 1;
        let result = callable.call(self, call).await;
        self.depth -= 1;
        result
    }

    /// Calls currently being evaluated.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Lex, parse and evaluate `source` inside this run, sharing its scope,
    /// variables and stop flag.
    pub async fn evaluate_source(&mut self, source: &str) -> Result<Value> {
        let tokens = tokenize(source)?;
        let program = Parser::new().parse(tokens, &self.options)?;
        let evaluator = self.evaluator;
        evaluator.visit_sequence(program.nodes(), self).await
    }

    // ── Argument evaluation ───────────────────────────────────────────────────

    /// Evaluate one argument now.
    pub async fn evaluate_argument(&mut self, arg: &Argument) -> Result<Value> {
        let evaluator = self.evaluator;
        evaluator.visit_argument(arg, self).await
    }

    /// Evaluate `args` left to right, each one finishing before the next.
    pub async fn evaluate_args(&mut self, args: &[Argument]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate_argument(arg).await?);
        }
        Ok(values)
    }

    /// Evaluate every argument of `call`.
    pub async fn evaluate_all(&mut self, call: &Call) -> Result<Vec<Value>> {
        self.evaluate_args(&call.args).await
    }

    /// Evaluate argument `index` of `call`, or `Undefined` if the slot is
    /// absent.
    pub async fn argument(&mut self, call: &Call, index: usize) -> Result<Value> {
        match call.arg(index) {
            Some(arg) => self.evaluate_argument(arg).await,
            None => Ok(Value::Undefined),
        }
    }

    /// Evaluate argument `index` as text, trimmed.
    pub async fn text_argument(&mut self, call: &Call, index: usize) -> Result<String> {
        Ok(self.argument(call, index).await?.to_string().trim().to_owned())
    }

    /// Evaluate an argument as a condition.
    ///
    /// `lhs OP rhs` is compared with loose coercion after trimming text on
    /// both sides; anything else is tested for truthiness.
    pub async fn evaluate_condition(&mut self, arg: &Argument) -> Result<bool> {
        let evaluator = self.evaluator;
        match arg.comparison() {
            Some(cmp) => {
                let lhs = evaluator.visit_sequence(cmp.lhs, self).await?;
                let rhs = evaluator.visit_sequence(cmp.rhs, self).await?;
                Ok(cmp.op.compare(&trim_text(lhs), &trim_text(rhs)))
            }
            None => {
                let value = evaluator.visit_argument(arg, self).await?;
                Ok(trim_text(value).as_bool())
            }
        }
    }

    /// Fail unless `call` was written with brackets and at least `min`
    /// arguments.
    pub fn check_args(&self, call: &Call, min: usize) -> Result<()> {
        if !call.has_brackets() {
            return Err(ScriptError::function(&call.name, "expected brackets"));
        }
        // `$f[]` carries one empty slot but no arguments.
        let given = match call.args.as_slice() {
            [only] if only.is_empty() => 0,
            args => args.len(),
        };
        if given < min {
            return Err(ScriptError::function(
                &call.name,
                format!("expected at least {min} arguments"),
            ));
        }
        Ok(())
    }

    // ── Run state ─────────────────────────────────────────────────────────────

    /// Stop evaluating the rest of the script.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn push_action(&mut self, action: ScriptAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[ScriptAction] {
        &self.actions
    }

    /// Drain the queued host actions.
    pub fn take_actions(&mut self) -> Vec<ScriptAction> {
        std::mem::take(&mut self.actions)
    }
}

fn trim_text(value: Value) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.trim().to_owned()),
        other => other,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

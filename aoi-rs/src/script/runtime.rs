//! Script runtime: owns the root scope and drives lex → parse → evaluate.
//!
//! One [`Runtime`] is shared by every run in the process.  The root scope is
//! filled once from a [`FunctionRegistry`]; each run then gets its own child
//! scope and [`Context`], so runs never see each other's definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, RuntimeOptions};
use crate::error::Result;

use super::context::Context;
use super::env::{BoxFuture, Callable, Environment, FunctionRegistry};
use super::eval::Evaluator;
use super::lexer::tokenize;
use super::parser::{Call, Parser, Program};
use super::value::Value;

#[derive(Debug)]
pub struct Runtime {
    global: Arc<Environment>,
    options: RuntimeOptions,
    globals: HashMap<String, Value>,
    evaluator: Evaluator,
}

impl Runtime {
    /// Build a runtime whose root scope holds every entry of `registry`.
    pub fn new(registry: FunctionRegistry) -> Self {
        let global = Arc::new(Environment::new());
        let count = registry.len();
        registry.drain_into(&global);
        debug!(functions = count, "runtime ready");
        Runtime {
            global,
            options: RuntimeOptions::default(),
            globals: HashMap::new(),
            evaluator: Evaluator::new(),
        }
    }

    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply a loaded config file: its options and its preset variables.
    pub fn with_config(mut self, config: Config) -> Self {
        self.options = config.runtime;
        self.globals.extend(config.vars);
        self
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RuntimeOptions) {
        self.options = options;
    }

    /// The root scope shared by all runs.
    pub fn global(&self) -> &Arc<Environment> {
        &self.global
    }

    // ── Registry edits ────────────────────────────────────────────────────────

    /// Bind (or rebind) a function in the root scope.  Runs in progress see
    /// the change on their next lookup.
    pub fn add_function<F>(&self, name: &str, f: F)
    where
        F: for<'a> Fn(&'a mut Context, &'a Call) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        debug!(function = name, "function added");
        self.global.set_fn(name, f);
    }

    pub fn add_callable(&self, name: &str, callable: Arc<dyn Callable>) {
        debug!(function = name, "function added");
        self.global.set(name, callable);
    }

    /// Unbind a root function.  Returns `true` if it was bound.
    pub fn remove_function(&self, name: &str) -> bool {
        let removed = self.global.remove(name);
        debug!(function = name, removed, "function removed");
        removed
    }

    /// Preset variable copied into every new run.
    pub fn set_global_var(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn get_global_var(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    // ── Running scripts ───────────────────────────────────────────────────────

    /// Lex and parse `input` without running it.
    pub fn compile(&self, input: &str) -> Result<Program> {
        let tokens = tokenize(input)?;
        Parser::new().parse(tokens, &self.options)
    }

    /// A fresh context for one run: new child scope, preset variables,
    /// current options.
    pub fn prepare_context(&self, file_name: &str) -> Context {
        let env = Arc::new(Environment::child(&self.global));
        let mut ctx = Context::new(file_name, env, self.options);
        for (name, value) in &self.globals {
            ctx.set_var(name.clone(), value.clone());
        }
        ctx
    }

    /// Run `input` in a fresh context and return its result.
    #[tracing::instrument(level = "debug", skip(self, input))]
    pub async fn run_input(&self, input: &str, file_name: &str) -> Result<Value> {
        let mut ctx = self.prepare_context(file_name);
        self.run_with(&mut ctx, input).await
    }

    /// Run `input` in a context the caller prepared (for example with an
    /// event attached), leaving the context available afterwards so queued
    /// actions can be collected.
    pub async fn run_with(&self, ctx: &mut Context, input: &str) -> Result<Value> {
        let program = self.compile(input)?;
        self.run_program(&program, ctx).await
    }

    pub async fn run_program(&self, program: &Program, ctx: &mut Context) -> Result<Value> {
        debug!(file = ctx.file_name(), nodes = program.nodes().len(), "run start");
        let result = self.evaluator.evaluate(program, ctx).await;
        match &result {
            Ok(value) => debug!(
                file = ctx.file_name(),
                kind = value.type_name(),
                stopped = ctx.is_stopped(),
                "run finished"
            ),
            Err(e) => debug!(file = ctx.file_name(), error = %e, "run failed"),
        }
        result
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

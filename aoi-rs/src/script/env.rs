//! Identifier scopes and the callable interface.
//!
//! An [`Environment`] maps function names to [`Callable`]s and optionally
//! points at a parent scope.  Lookups walk outward until a binding is found,
//! so a per-run scope can shadow a root definition without touching it.
//!
//! Names are normalised on the way in and on lookup: a leading `$` is
//! ensured and ASCII letters are lowercased, so `$onlyIf`, `$ONLYIF` and
//! `onlyif` all name the same function.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, ScriptError};

use super::context::Context;
use super::parser::Call;
use super::value::Value;

/// Boxed future returned by callables.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A function that can be bound to a name and invoked from scripts.
///
/// The callable receives the call site with its arguments *unevaluated*;
/// it decides which of them to evaluate (through [`Context`]) and how often.
pub trait Callable: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>>;
}

/// Adapter that lets plain functions and closures act as [`Callable`]s.
pub struct FnCallable<F>(pub F);

impl<F> Callable for FnCallable<F>
where
    F: for<'a> Fn(&'a mut Context, &'a Call) -> BoxFuture<'a, Result<Value>> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
        (self.0)(ctx, call)
    }
}

/// Canonical form of a function name.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    let bare = name.strip_prefix('$').unwrap_or(name);
    format!("${}", bare.to_ascii_lowercase())
}

// ── Environment ───────────────────────────────────────────────────────────────

/// One scope in the chain.
///
/// Bindings sit behind a lock so the root scope can be shared by concurrent
/// runs and still be edited live; lookups always read the current map.
pub struct Environment {
    scope: RwLock<HashMap<String, Arc<dyn Callable>>>,
    parent: Option<Arc<Environment>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("parent", &self.parent)
            .finish()
    }
}

impl Environment {
    /// A root scope with no parent.
    pub fn new() -> Self {
        Environment {
            scope: RwLock::new(HashMap::new()),
            parent: None,
        }
    }

    /// An empty scope whose lookups fall back to `parent`.
    pub fn child(parent: &Arc<Environment>) -> Self {
        Environment {
            scope: RwLock::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        }
    }

    pub fn parent(&self) -> Option<&Arc<Environment>> {
        self.parent.as_ref()
    }

    /// Bind `name` in this scope, returning the previous binding (if any).
    pub fn set(&self, name: &str, callable: Arc<dyn Callable>) -> Option<Arc<dyn Callable>> {
        self.scope.write().insert(normalize_name(name), callable)
    }

    /// Bind a plain function or closure.
    pub fn set_fn<F>(&self, name: &str, f: F) -> Option<Arc<dyn Callable>>
    where
        F: for<'a> Fn(&'a mut Context, &'a Call) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.set(name, Arc::new(FnCallable(f)))
    }

    /// Remove a binding from this scope only.  Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.scope.write().remove(&normalize_name(name)).is_some()
    }

    /// `true` if `name` is bound in this scope (parents are not consulted).
    pub fn has_own(&self, name: &str) -> bool {
        self.scope.read().contains_key(&normalize_name(name))
    }

    /// `true` if `name` resolves anywhere in the chain.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Find the innermost binding for `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Callable>> {
        let key = normalize_name(name);
        let mut env = Some(self);
        while let Some(scope) = env {
            if let Some(f) = scope.scope.read().get(&key) {
                return Ok(Arc::clone(f));
            }
            env = scope.parent.as_deref();
        }
        Err(ScriptError::UnknownIdentifier(name.to_owned()))
    }

    /// Names bound in this scope.
    pub fn names(&self) -> Vec<String> {
        self.scope.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.scope.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.read().is_empty()
    }
}

// ── FunctionRegistry ──────────────────────────────────────────────────────────

/// Collection of named functions handed to a runtime at construction.
///
/// Later entries with the same (normalised) name replace earlier ones, which
/// lets plugin registries override the standard library.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    entries: Vec<(String, Arc<dyn Callable>)>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(n, _)| n)).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, &'a Call) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.register_callable(name, Arc::new(FnCallable(f)))
    }

    pub fn register_callable(&mut self, name: &str, callable: Arc<dyn Callable>) -> &mut Self {
        self.entries.push((normalize_name(name), callable));
        self
    }

    /// Append every entry of `other` (plugins).
    pub fn extend(&mut self, other: FunctionRegistry) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move every entry into `env`.
    pub fn drain_into(self, env: &Environment) {
        for (name, callable) in self.entries {
            if env.set(&name, callable).is_some() {
                debug!(function = %name, "function overridden");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

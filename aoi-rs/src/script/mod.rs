//! Bracket-script engine.
//!
//! Scripts are plain text with embedded calls of the form
//! `$name[arg;arg;…]`.  Text is passed through, calls are dispatched to
//! registered functions which receive their arguments unevaluated:
//!
//! - [`lexer`]: text to tokens, with `\` escaping
//! - [`parser`]: tokens to call/argument trees
//! - [`eval`]: tree walking and value folding
//! - [`env`] and [`context`]: name resolution and per-run state
//! - [`runtime`]: ties the stages together
//! - [`builtins`]: the standard function library
//!
//! # Quick start
//!
//! ```rust
//! use aoi::script::{standard_library, Runtime, Value};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let rt = Runtime::new(standard_library());
//! let out = rt.run_input("$if[2 > 1;$toUpperCase[yes];no]", "doc").await.unwrap();
//! assert_eq!(out, Value::Str("YES".into()));
//! # });
//! ```

pub mod builtins;
pub mod context;
pub mod env;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod value;

// Re-exports for convenience.
pub use builtins::{standard_library, MessageEvent};
pub use context::{Context, ScriptAction};
pub use env::{BoxFuture, Callable, Environment, FnCallable, FunctionRegistry};
pub use eval::Evaluator;
pub use lexer::{tokenize, Operator, Span, Token, TokenKind};
pub use parser::{Argument, Call, Comparison, Parser, Program, MAX_NESTING};
pub use runtime::Runtime;
pub use value::Value;

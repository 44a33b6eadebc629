//! Error types shared by every stage of the engine.
//!
//! User scripting mistakes (`Syntax`, `UnknownIdentifier`, …) and engine
//! defects ([`InternalError`]) are kept apart so the host can decide whether
//! to show "fix your script" or file a bug report.

use thiserror::Error;

pub type Result<T, E = ScriptError> = std::result::Result<T, E>;

/// Anything that can abort a script run.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Empty or otherwise unusable script source.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unterminated bracket group or stray punctuation in strict mode.
    #[error("{line}:{column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    /// A parser instance was asked to parse while already parsing.
    #[error("parser is busy")]
    ParserBusy,

    /// Call name not bound in any scope.
    #[error("unknown function `{0}`")]
    UnknownIdentifier(String),

    /// Engine invariant violation.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),

    /// Raised by a built-in function (bad argument count, bad value, …).
    #[error("{name}: {message}")]
    Function { name: String, message: String },

    /// Opaque error from a host-provided callable.
    #[error(transparent)]
    Callable(Box<dyn std::error::Error + Send + Sync>),
}

/// Defects inside the engine itself; never caused by script text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("evaluator cannot handle `{0}` node")]
    UnknownNode(&'static str),

    #[error("cannot merge `{left}` token with `{right}` token")]
    TokenMerge {
        left: &'static str,
        right: &'static str,
    },
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        ScriptError::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wrap a host error so it can travel through the evaluator untouched.
    pub fn callable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ScriptError::Callable(Box::new(err))
    }

    /// `true` for engine defects, `false` for problems in the script or in
    /// a callable.
    pub fn is_internal(&self) -> bool {
        matches!(self, ScriptError::Internal(_) | ScriptError::ParserBusy)
    }

    /// Source position for errors that carry one.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ScriptError::Syntax { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! `aoi`: an embeddable bracket-script engine for event-driven bot commands.
//!
//! See [`script`] for the language and [`script::Runtime`] for the entry
//! point.

pub mod cli;
pub mod config;
pub mod error;
pub mod script;

pub use error::{InternalError, Result, ScriptError};

//! Application configuration.
//!
//! This module provides:
//! - Configuration constants (defaults, timeouts, file names)
//! - CLI options and the question-type bitmask

mod constants;
mod types;

pub use constants::*;
pub use types::{LogFormat, LogLevel, Options, QuestionTypeSet};

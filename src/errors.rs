//! Error type definitions.
//!
//! Initialization and input errors are fatal: they abort the run before any
//! resolver worker starts. Per-host resolution failures are not represented
//! here because they are swallowed by the workers (coverage matters more
//! than individual lookups).

use thiserror::Error;

/// Errors raised while the pipeline is being brought up.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("logger initialization error: {0}")]
    Logger(#[from] log::SetLoggerError),

    /// Error initializing the DNS resolver pool.
    #[error("resolver initialization error: {0}")]
    Resolver(String),

    /// Invalid flag combination or unparseable flag value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised while expanding input into the work set.
#[derive(Error, Debug)]
pub enum InputError {
    /// Neither a hosts file, an inline list, nor standard input was supplied.
    #[error("hosts file or stdin not provided")]
    NotProvided,

    /// An IO failure occurred while reading an input stream.
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),

    /// An argument that should name a file, stdin, or an inline list was empty.
    #[error("empty argument")]
    EmptyArgument,

    /// An input token could not be expanded into addresses.
    #[error("failed to expand input token {0}")]
    Expand(String),
}

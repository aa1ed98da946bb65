//! dnsweep library: bulk DNS enumeration pipeline.
//!
//! Expands heterogeneous input (hostnames, CIDR blocks, ASN identifiers,
//! wordlist templates) into a deduplicated work set, resolves it with a
//! pool of rate-limited concurrent workers, optionally filters wildcard
//! DNS responses, and emits results to stdout and an output file. A
//! persisted cursor makes interrupted runs resumable.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dnsweep::{Options, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let options = Options {
//!     hosts: Some("hosts.txt".into()),
//!     threads: 50,
//!     ..Default::default()
//! };
//! let runner = Arc::new(Runner::new(options)?);
//! runner.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The pipeline needs a Tokio runtime. Use `#[tokio::main]` in your
//! application or call into the library from an async context.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod initialization;
pub mod input;
pub mod runner;
pub mod stats;
pub mod workset;

// Re-export the public API
pub use client::{AsnSummary, ClientOptions, DnsAnswer, DnsClient, SoaRecord};
pub use config::{LogFormat, LogLevel, Options, QuestionTypeSet};
pub use errors::{InitializationError, InputError};
pub use runner::{ResumeState, Runner};
pub use workset::WorkSet;

//! Configuration constants used as defaults across the pipeline.

use std::time::Duration;

/// Default number of concurrent resolver workers.
pub const DEFAULT_THREADS: usize = 100;

/// Default number of lookup attempts at the DNS-client layer.
pub const DEFAULT_RETRIES: usize = 2;

/// Minimum distinct hosts behind one IP before that IP's hosts are probed
/// for wildcard behavior.
pub const DEFAULT_WILDCARD_THRESHOLD: usize = 5;

/// Per-query timeout at the DNS-client layer.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout applied to every connect/read step of a zone transfer.
pub const AXFR_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on delegation hops followed by a recursive trace.
pub const DEFAULT_TRACE_MAX_RECURSION: usize = 32;

/// File the resume cursor is persisted to.
pub const DEFAULT_RESUME_FILE: &str = "resume.cfg";

/// Interval between progress lines when `--stats` is enabled.
pub const STATS_INTERVAL_SECS: u64 = 5;

/// Length of the random label generated for wildcard probes.
pub const WILDCARD_PROBE_LABEL_LEN: usize = 15;

/// Resolvers used when the user supplies none.
pub const DEFAULT_RESOLVERS: &[&str] = &[
    // Cloudflare
    "1.1.1.1",
    "1.0.0.1",
    // Google
    "8.8.8.8",
    "8.8.4.4",
    // Quad9
    "9.9.9.9",
    "149.112.112.112",
];

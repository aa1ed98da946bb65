//! Progress statistics.
//!
//! Counters are shared across the pipeline as plain atomics; a background
//! task prints a summary line to stderr at a fixed interval until its
//! cancellation token fires.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::STATS_INTERVAL_SECS;

/// Counters for one enumeration run.
pub struct ScanStats {
    hosts: AtomicUsize,
    requests: AtomicUsize,
    total: AtomicUsize,
    started: Instant,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStats {
    /// Creates zeroed counters stamped with the current time.
    pub fn new() -> Self {
        ScanStats {
            hosts: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    /// Records the number of unique hosts in the work set.
    pub fn set_hosts(&self, hosts: usize) {
        self.hosts.store(hosts, Ordering::SeqCst);
    }

    /// Records the expected total of logical queries.
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Adds `n` issued logical queries.
    pub fn add_requests(&self, n: usize) {
        self.requests.fetch_add(n, Ordering::SeqCst);
    }

    /// Logical queries issued so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Prints one progress line to stderr.
    pub fn log_progress(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let hosts = self.hosts.load(Ordering::SeqCst);
        let requests = self.requests.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        let rps = if elapsed > 0.0 {
            requests as f64 / elapsed
        } else {
            0.0
        };
        let percent = if total > 0 {
            requests as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "[{elapsed:.0}s] Hosts: {hosts} | RPS: {rps:.0} | Requests: {requests}/{total} ({percent:.0}%)"
        );
    }
}

/// Spawns the periodic progress logger; it prints a final line when
/// cancelled.
pub fn spawn_progress_logger(
    stats: Arc<ScanStats>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(STATS_INTERVAL_SECS));
        // the first tick fires immediately; skip it
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    stats.log_progress();
                }
                _ = cancel.cancelled() => {
                    stats.log_progress();
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ScanStats::new();
        stats.set_hosts(10);
        stats.set_total(20);
        stats.add_requests(2);
        stats.add_requests(3);
        assert_eq!(stats.requests(), 5);
    }

    #[tokio::test]
    async fn progress_logger_stops_on_cancel() {
        let stats = Arc::new(ScanStats::new());
        let cancel = CancellationToken::new();
        let handle = spawn_progress_logger(Arc::clone(&stats), cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }
}

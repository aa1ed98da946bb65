//! Logger and rate-limiter initialization.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use log::LevelFilter;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::LogFormat;
use crate::errors::InitializationError;

/// Initializes the logger with the specified level and format.
///
/// Progress and diagnostics go to stderr; stdout is reserved for results.
/// Color is disabled when `no_color` is set or `NO_COLOR=true` is in the
/// environment.
pub fn init_logger_with(
    level: LevelFilter,
    format: LogFormat,
    no_color: bool,
) -> Result<(), InitializationError> {
    let env_no_color = std::env::var("NO_COLOR").map(|v| v == "true").unwrap_or(false);
    if no_color || env_no_color {
        colored::control::set_override(false);
    }

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    // suppress upstream warnings about malformed or truncated DNS messages
    builder.filter_module("hickory_proto", LevelFilter::Error);
    builder.filter_module("hickory_resolver", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Info);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let tag = match level {
                    log::Level::Error => "ERR".red(),
                    log::Level::Warn => "WRN".yellow(),
                    log::Level::Info => "INF".green(),
                    log::Level::Debug => "DBG".blue(),
                    log::Level::Trace => "TRC".purple(),
                };
                writeln!(buf, "[{}] {}", tag, record.args())
            });
        }
    }

    builder.try_init()?;
    Ok(())
}

/// Token-bucket rate limiter gating the resolver workers.
///
/// Tokens are replenished by a background task at the configured
/// per-second rate; short bursts up to the bucket capacity are allowed.
/// Workers block in `acquire` when the bucket is empty.
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RateLimiter {
    /// Takes one token, waiting for replenishment when none is available.
    pub async fn acquire(&self) {
        match self.permits.acquire().await {
            // the token is consumed, not returned on drop
            Ok(permit) => permit.forget(),
            // semaphore closed during shutdown; don't block callers
            Err(_) => {}
        }
    }

    /// Tokens currently available, mostly useful in tests.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Builds a rate limiter replenished at `rps` tokens per second with burst
/// capacity `burst`. Returns `None` when `rps` is 0 (unlimited). The
/// cancellation token stops the replenishment task.
pub fn init_rate_limiter(
    rps: u32,
    burst: usize,
) -> Option<(Arc<RateLimiter>, CancellationToken)> {
    if rps == 0 {
        return None;
    }
    let capacity = burst.max(1);
    let shutdown = CancellationToken::new();
    let shutdown_task = shutdown.clone();

    let limiter = Arc::new(RateLimiter {
        permits: Arc::new(Semaphore::new(capacity)),
        capacity,
    });

    let permits = Arc::clone(&limiter.permits);
    // fast ticker; each tick adds rps * elapsed tokens, tracking the
    // fractional remainder so low rates still make progress
    let mut ticker = interval(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut last_tick = Instant::now();
        let mut fractional = 0.0f64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;

                    let earned = f64::from(rps) * elapsed.as_secs_f64() + fractional;
                    let whole = earned as usize;
                    fractional = earned - whole as f64;

                    // never grow past the bucket capacity
                    let room = capacity.saturating_sub(permits.available_permits());
                    let add = whole.min(room);
                    if add > 0 {
                        permits.add_permits(add);
                    }
                }
                _ = shutdown_task.cancelled() => {
                    log::debug!("rate limiter replenishment task shutting down");
                    break;
                }
            }
        }
    });

    Some((limiter, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_rate_means_unlimited() {
        assert!(init_rate_limiter(0, 10).is_none());
    }

    #[tokio::test]
    async fn burst_is_immediately_available() {
        let (limiter, shutdown) = init_rate_limiter(1, 5).unwrap();
        let start = std::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < std::time::Duration::from_millis(500));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn acquisitions_are_bounded_by_rate_plus_burst() {
        let (limiter, shutdown) = init_rate_limiter(100, 2).unwrap();
        let start = std::time::Instant::now();
        let window = std::time::Duration::from_millis(400);
        let mut taken = 0usize;
        while start.elapsed() < window {
            limiter.acquire().await;
            taken += 1;
        }
        // R*T + burst, with generous slack for scheduler jitter
        assert!(taken <= 40 + 2 + 20, "took {taken} tokens");
        assert!(taken >= 2, "burst tokens missing");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn bucket_never_exceeds_capacity() {
        let (limiter, shutdown) = init_rate_limiter(1000, 3).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(limiter.available() <= 3);
        assert_eq!(limiter.capacity, 3);
        shutdown.cancel();
    }
}

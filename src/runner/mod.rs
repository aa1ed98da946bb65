//! The enumeration pipeline.
//!
//! A `Runner` owns the work set, the DNS client, the rate limiter, and the
//! channels tying the stages together. Input is expanded into the work set,
//! a deterministic scan feeds the resolver workers, and a single sink task
//! serializes results. When wildcard filtering is enabled the workers store
//! answers instead of emitting them and a second pass decides what
//! survives.

mod output;
mod resume;
mod wildcard;

pub use resume::ResumeState;

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use ipnet::IpNet;
use log::debug;
use tempfile::NamedTempFile;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;

use crate::client::{AsnSummary, ClientOptions, DnsClient};
use crate::config::{Options, QuestionTypeSet, DEFAULT_RESUME_FILE, DNS_TIMEOUT};
use crate::enrich::{cdn, AsnClient};
use crate::errors::{InitializationError, InputError};
use crate::initialization::{init_rate_limiter, RateLimiter};
use crate::input;
use crate::stats::{spawn_progress_logger, ScanStats};
use crate::workset::WorkSet;

use resume::ResumeCursor;

/// Client for running the enumeration pipeline.
pub struct Runner {
    pub(crate) options: Options,
    pub(crate) client: Arc<DnsClient>,
    pub(crate) asn_client: Arc<AsnClient>,
    pub(crate) work_set: Arc<WorkSet>,
    pub(crate) limiter: Option<Arc<RateLimiter>>,
    pub(crate) limiter_shutdown: Option<CancellationToken>,
    pub(crate) wildcards: StdMutex<HashSet<String>>,
    pub(crate) wildcard_cache: StdMutex<HashMap<String, Vec<String>>>,
    pub(crate) stats: Option<Arc<ScanStats>>,
    pub(crate) question_types: QuestionTypeSet,
    pub(crate) rcodes: Option<HashSet<u16>>,
    pub(crate) rt_filter: QuestionTypeSet,
    pub(crate) cursor: StdMutex<ResumeCursor>,
    stdin_copy: Option<NamedTempFile>,
}

impl Runner {
    /// Builds the pipeline from parsed options. All resources (resolver
    /// pool, rate limiter, work set, scratch files) are created here;
    /// failures are fatal.
    pub fn new(options: Options) -> Result<Self, InitializationError> {
        let question_types = options.question_types();
        let rcodes = options.parse_rcodes()?;
        let rt_filter = options.response_type_filter()?;

        let resolvers = match &options.resolvers {
            Some(arg) => {
                let path = Path::new(arg);
                if path.is_file() {
                    input::read_lines(path)
                        .map_err(|e| InitializationError::Resolver(format!("{arg}: {e}")))?
                } else {
                    arg.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }
            }
            None => Vec::new(),
        };

        let client = DnsClient::new(ClientOptions {
            resolvers,
            question_types,
            timeout: DNS_TIMEOUT,
            retries: options.retries,
            trace_max_recursion: options.trace_max_recursion,
            hosts_file: options.hosts_file.clone(),
            check_internal_ips: true,
        })?;
        let asn_client = AsnClient::new(client.resolver().clone())?;

        let (limiter, limiter_shutdown) =
            match init_rate_limiter(options.rate_limit, options.rate_limit as usize) {
                Some((limiter, shutdown)) => (Some(limiter), Some(shutdown)),
                None => (None, None),
            };

        // stdin is copied to a scratch file so the host list and the
        // wordlist can both be read from it
        let stdin_copy = if !options.stream && input::has_stdin() {
            Some(
                input::copy_stdin_to_tempfile()
                    .map_err(|e| InitializationError::Config(format!("stdin copy: {e}")))?,
            )
        } else {
            None
        };

        let mut cursor = ResumeCursor::default();
        if options.resume {
            if let Some(state) = ResumeState::load(Path::new(DEFAULT_RESUME_FILE)) {
                cursor.saved_index = state.index;
            }
        }

        let stats = options.stats.then(|| Arc::new(ScanStats::new()));

        Ok(Runner {
            options,
            client: Arc::new(client),
            asn_client: Arc::new(asn_client),
            work_set: Arc::new(WorkSet::new()),
            limiter,
            limiter_shutdown,
            wildcards: StdMutex::new(HashSet::new()),
            wildcard_cache: StdMutex::new(HashMap::new()),
            stats,
            question_types,
            rcodes,
            rt_filter,
            cursor: StdMutex::new(cursor),
            stdin_copy,
        })
    }

    /// The work set, exposed for inspection after a run.
    pub fn work_set(&self) -> &WorkSet {
        &self.work_set
    }

    /// Persists the current scan cursor to the resume file.
    pub fn save_resume(&self) -> std::io::Result<()> {
        let cursor = self.cursor.lock().expect("cursor lock poisoned").clone();
        ResumeState {
            index: cursor.current_index,
            resume_from: cursor.current,
        }
        .save(Path::new(DEFAULT_RESUME_FILE))
    }

    /// Runs the pipeline to completion.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let result = if self.options.stream {
            Runner::run_stream(&self).await
        } else {
            Runner::run_full(&self).await
        };
        if let Some(shutdown) = &self.limiter_shutdown {
            shutdown.cancel();
        }
        if result.is_ok() && self.options.resume {
            // a completed resumed run invalidates its cursor
            let _ = std::fs::remove_file(DEFAULT_RESUME_FILE);
        }
        result
    }

    async fn run_full(runner: &Arc<Runner>) -> anyhow::Result<()> {
        runner.prepare_input().await?;

        {
            let cursor = runner.cursor.lock().expect("cursor lock poisoned");
            if runner.options.resume && cursor.saved_index > 0 {
                debug!(
                    "resuming scan from {DEFAULT_RESUME_FILE} at position {}",
                    cursor.saved_index
                );
            }
        }

        let stats_cancel = CancellationToken::new();
        let stats_task = runner
            .stats
            .as_ref()
            .map(|stats| spawn_progress_logger(Arc::clone(stats), stats_cancel.clone()));

        let (work_tx, work_rx) = unbounded_channel::<String>();
        let (out_tx, out_rx) = unbounded_channel::<String>();

        let writer = output::open_output(runner.options.output.as_deref()).await?;
        let sink = output::spawn_sink(out_rx, writer);

        let workers = Runner::spawn_workers(runner, work_rx, out_tx.clone());
        drop(out_tx);

        // scan producer: owns the worker channel and closes it by dropping
        // the sender when the scan finishes
        let producer = {
            let runner = Arc::clone(runner);
            tokio::spawn(async move {
                let skip = runner
                    .cursor
                    .lock()
                    .expect("cursor lock poisoned")
                    .saved_index;
                runner.work_set.scan(|host, _| {
                    if let Some(stats) = &runner.stats {
                        stats.add_requests(runner.question_types.len());
                    }
                    let position = {
                        let mut cursor = runner.cursor.lock().expect("cursor lock poisoned");
                        cursor.current = host.to_string();
                        cursor.current_index += 1;
                        cursor.current_index
                    };
                    if position <= skip {
                        return;
                    }
                    let _ = work_tx.send(host.to_string());
                });
            })
        };

        producer.await?;
        for worker in futures::future::join_all(workers).await {
            worker?;
        }
        sink.await?;

        stats_cancel.cancel();
        if let Some(task) = stats_task {
            task.await?;
        }

        if runner.options.wd.is_some() {
            Runner::wildcard_pass(runner).await?;
        }

        Ok(())
    }

    /// Stream mode: hosts go straight from the input to the workers, with
    /// no work set, no deduplication, and no resume support.
    async fn run_stream(runner: &Arc<Runner>) -> anyhow::Result<()> {
        let (work_tx, work_rx) = unbounded_channel::<String>();
        let (out_tx, out_rx) = unbounded_channel::<String>();

        let writer = output::open_output(runner.options.output.as_deref()).await?;
        let sink = output::spawn_sink(out_rx, writer);
        let workers = Runner::spawn_workers(runner, work_rx, out_tx.clone());
        drop(out_tx);

        let producer = {
            let runner = Arc::clone(runner);
            tokio::spawn(async move { runner.stream_input(work_tx).await })
        };

        producer.await??;
        for worker in futures::future::join_all(workers).await {
            worker?;
        }
        sink.await?;
        Ok(())
    }

    async fn stream_input(&self, tx: UnboundedSender<String>) -> anyhow::Result<()> {
        let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match &self.options.hosts {
            Some(path) if Path::new(path).is_file() => Box::new(
                tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open {path}"))?,
            ),
            _ if input::has_stdin() => Box::new(tokio::io::stdin()),
            _ => return Err(InputError::NotProvided.into()),
        };

        let mut lines = tokio::io::BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let item = input::normalize(&line);
            if item.is_empty() {
                continue;
            }
            if input::is_cidr(&item) {
                if let Ok(net) = item.parse::<IpNet>() {
                    for address in net.hosts() {
                        let _ = tx.send(address.to_string());
                    }
                }
            } else if input::is_asn(&item) {
                match self.asn_client.announced_prefixes(&item).await {
                    Ok(prefixes) => {
                        for net in prefixes {
                            for address in net.hosts() {
                                let _ = tx.send(address.to_string());
                            }
                        }
                    }
                    Err(e) => log::warn!("failed to expand {item}: {e}"),
                }
            } else {
                let _ = tx.send(item.to_ascii_lowercase());
            }
        }
        Ok(())
    }

    /// Expands every input source into the work set.
    async fn prepare_input(&self) -> anyhow::Result<()> {
        let stdin_path = self.stdin_copy.as_ref().map(|f| f.path());

        let wordlist = match &self.options.wordlist {
            Some(arg) => Some(input::preprocess_argument(arg, stdin_path)?),
            None => None,
        };

        let lines: Vec<String> = if let Some(domains) = &self.options.domains {
            input::preprocess_argument(domains, stdin_path)?
        } else if let Some(hosts) = &self.options.hosts {
            let path = Path::new(hosts);
            if path.is_file() {
                input::read_lines(path).map_err(InputError::Read)?
            } else if hosts.as_str() == "-" || stdin_path.is_some() {
                let stdin_path = stdin_path.ok_or(InputError::NotProvided)?;
                input::read_lines(stdin_path).map_err(InputError::Read)?
            } else {
                return Err(InputError::NotProvided.into());
            }
        } else if let Some(stdin_path) = stdin_path {
            input::read_lines(stdin_path).map_err(InputError::Read)?
        } else {
            return Err(InputError::NotProvided.into());
        };

        let unique = input::expand_into_work_set(
            &self.work_set,
            &lines,
            wordlist.as_deref(),
            &self.asn_client,
        )
        .await?;
        debug!("{unique} unique hosts queued");

        if let Some(stats) = &self.stats {
            stats.set_hosts(unique);
            stats.set_total(unique * self.question_types.len());
        }
        Ok(())
    }

    fn spawn_workers(
        runner: &Arc<Runner>,
        work_rx: UnboundedReceiver<String>,
        out_tx: UnboundedSender<String>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let work_rx = Arc::new(TokioMutex::new(work_rx));
        (0..runner.options.threads.max(1))
            .map(|_| {
                let runner = Arc::clone(runner);
                let rx = Arc::clone(&work_rx);
                let out = out_tx.clone();
                tokio::spawn(async move {
                    loop {
                        let host = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(host) = host else { break };
                        runner.process_host(&host, &out).await;
                    }
                })
            })
            .collect()
    }

    /// Resolves one host and routes the answer: store (wildcard run),
    /// suppress (filters), or emit.
    async fn process_host(&self, host: &str, out: &UnboundedSender<String>) {
        let domain = sanitize_host(host);

        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        // partial results are still good; total failures drop silently
        let Some(mut answer) = self.client.query_multiple(&domain).await else {
            return;
        };
        if answer.host.is_empty() {
            return;
        }

        // hosts-file answers bypass the response-code allow-list
        if !answer.from_hosts_file {
            if let Some(rcodes) = &self.rcodes {
                if !rcodes.contains(&answer.status_code_raw) {
                    return;
                }
            }
        }

        if !self.options.raw {
            answer.raw.clear();
        }

        if self.options.trace {
            if let Ok(trace) = self.client.trace(&domain).await {
                let mut hops = trace.hops;
                if self.options.raw {
                    for hop in &hops {
                        answer.raw.push_str(&hop.raw);
                        answer.raw.push('\n');
                    }
                }
                // per-hop raw buffers are dropped once concatenated
                for hop in &mut hops {
                    hop.raw.clear();
                }
                answer.trace = Some(hops);
            }
        }

        if self.options.axfr {
            let has_data = match self.client.axfr(&domain).await {
                Ok(transfer) => {
                    let has_data = transfer.has_data();
                    answer.axfr = Some(transfer.chain);
                    has_data
                }
                Err(_) => false,
            };
            if self.options.axfr_only() && !has_data && !self.options.json {
                return;
            }
        }

        if self.options.cdn {
            if let Some(name) = cdn::classify(&answer.a) {
                answer.is_cdn_ip = true;
                answer.cdn_name = Some(name.to_string());
            }
        }

        if self.options.asn {
            let mut ips = answer.a.clone();
            if ips.is_empty() {
                ips = self.client.lookup(&domain).await;
            }
            let mut results = Vec::new();
            for ip in &ips {
                results.extend(self.asn_client.get_data(ip).await);
            }
            if domain.parse::<IpAddr>().is_ok() {
                results.extend(self.asn_client.get_data(&domain).await);
            }
            if let Some(first) = results.first() {
                answer.asn = Some(AsnSummary {
                    as_number: format!("AS{}", first.asn),
                    as_name: first.org.clone(),
                    as_country: first.country.clone(),
                    as_range: AsnClient::get_cidrs(&results),
                });
            }
        }

        // wildcard runs store the answer for the second pass
        if self.options.wd.is_some() {
            match answer.to_bytes() {
                Ok(bytes) => self.work_set.set(&answer.host, bytes),
                Err(e) => debug!("failed to store answer for {domain}: {e}"),
            }
            return;
        }

        if !self.rt_filter.is_empty() && self.should_skip(&answer) {
            return;
        }

        output::dispatch(
            &self.options,
            &self.question_types,
            &self.rt_filter,
            self.rcodes.is_some(),
            &domain,
            &answer,
            out,
        );
    }

    fn should_skip(&self, answer: &crate::client::DnsAnswer) -> bool {
        self.rt_filter
            .iter()
            .any(|record_type| !answer.records_for(record_type).is_empty())
    }
}

/// Reduces URL-shaped input to its host component, lower-cased.
fn sanitize_host(input: &str) -> String {
    if input.contains("://") {
        if let Ok(url) = url::Url::parse(input) {
            if let Some(host) = url.host_str() {
                return host.to_ascii_lowercase();
            }
        }
    }
    input.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_host_reduces_urls() {
        assert_eq!(sanitize_host("https://WWW.Example.COM/path"), "www.example.com");
        assert_eq!(sanitize_host("plain.example.com"), "plain.example.com");
    }
}

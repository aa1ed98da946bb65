//! Wildcard detection and suppression.
//!
//! Runs after the resolver pass has quiesced. Stored answers are grouped
//! by IP; hosts behind IPs that serve at least the threshold number of
//! names are probed with a label walk: every parent suffix of the host is
//! queried with a random non-existent sibling, probe answers are cached
//! per parent, and a host whose addresses are a subset of the probe
//! answers seen along the walk is marked as a wildcard. The final pass
//! re-scans the groups in stable order and emits everything that is not a
//! wildcard (the configured root itself always survives).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Mutex as TokioMutex;

use crate::client::DnsAnswer;
use crate::config::WILDCARD_PROBE_LABEL_LEN;

use super::{output, Runner};

impl Runner {
    /// Second-pass wildcard filtering over the stored answers.
    pub(crate) async fn wildcard_pass(runner: &Arc<Runner>) -> anyhow::Result<()> {
        info!("Starting to filter wildcard subdomains");

        // group hosts by answer IP, keeping first-seen order for both the
        // IPs and the hosts inside each group
        let mut ip_hosts: HashMap<String, Vec<String>> = HashMap::new();
        let mut list_ips: Vec<String> = Vec::new();
        runner.work_set.scan(|host, payload| {
            let Some(bytes) = payload else { return };
            // entries without a stored record are ignored
            let Ok(answer) = DnsAnswer::from_bytes(bytes) else {
                return;
            };
            for ip in answer.a {
                let group = ip_hosts.entry(ip.clone()).or_insert_with(|| {
                    list_ips.push(ip.clone());
                    Vec::new()
                });
                if !group.iter().any(|h| h == host) {
                    group.push(host.to_string());
                }
            }
        });
        debug!("found {} unique IPs", list_ips.len());

        if !list_ips.is_empty() {
            let (probe_tx, probe_rx) = unbounded_channel::<String>();
            let probe_rx = Arc::new(TokioMutex::new(probe_rx));
            let worker_count = runner.options.threads.min(list_ips.len()).max(1);
            let workers: Vec<_> = (0..worker_count)
                .map(|_| {
                    let runner = Arc::clone(runner);
                    let rx = Arc::clone(&probe_rx);
                    tokio::spawn(async move {
                        loop {
                            let host = {
                                let mut rx = rx.lock().await;
                                rx.recv().await
                            };
                            let Some(host) = host else { break };
                            if runner.is_wildcard(&host).await {
                                runner
                                    .wildcards
                                    .lock()
                                    .expect("wildcard set lock poisoned")
                                    .insert(host);
                            }
                        }
                    })
                })
                .collect();

            let mut seen = HashSet::new();
            for ip in &list_ips {
                let hosts = &ip_hosts[ip];
                if hosts.len() >= runner.options.wt {
                    for host in hosts {
                        if seen.insert(host.clone()) {
                            let _ = probe_tx.send(host.clone());
                        }
                    }
                }
            }
            drop(probe_tx);
            for worker in futures::future::join_all(workers).await {
                worker?;
            }
        }

        // re-emit the survivors in the stable grouped order
        let writer = output::open_output(runner.options.output.as_deref()).await?;
        let (out_tx, out_rx) = unbounded_channel::<String>();
        let sink = output::spawn_sink(out_rx, writer);

        let wildcards = runner
            .wildcards
            .lock()
            .expect("wildcard set lock poisoned")
            .clone();
        let wildcard_root = runner.options.wd.clone().unwrap_or_default();

        let mut seen = HashSet::new();
        let mut removed = HashSet::new();
        for ip in &list_ips {
            for host in &ip_hosts[ip] {
                if host == &wildcard_root || !wildcards.contains(host) {
                    if seen.insert(host.clone()) {
                        runner.lookup_and_output(host, &out_tx);
                    }
                } else {
                    removed.insert(host.clone());
                }
            }
        }
        drop(out_tx);
        sink.await?;

        info!("{} wildcard subdomains removed", removed.len());
        Ok(())
    }

    /// Emits one surviving host: the stored JSON answer in JSON mode, the
    /// bare host name otherwise.
    fn lookup_and_output(&self, host: &str, out: &UnboundedSender<String>) {
        if self.options.json {
            if let Some(Some(bytes)) = self.work_set.get(host) {
                if let Ok(answer) = DnsAnswer::from_bytes(&bytes) {
                    if let Ok(line) = serde_json::to_string(&answer) {
                        let _ = out.send(line);
                        return;
                    }
                }
            }
        }
        let _ = out.send(host.to_string());
    }

    /// Label-walk wildcard test for one host.
    ///
    /// Walks the parent suffixes from longest to shortest, probing a random
    /// sibling at each level, and reports a wildcard as soon as the host's
    /// addresses are covered by the probe answers seen so far.
    pub(crate) async fn is_wildcard(&self, host: &str) -> bool {
        let ips = match self.work_set.get(host) {
            Some(Some(bytes)) => DnsAnswer::from_bytes(&bytes)
                .map(|answer| answer.a)
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        if ips.is_empty() {
            return false;
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        let mut probed: HashSet<String> = HashSet::new();
        for i in 1..labels.len() {
            let parent = labels[i..].join(".");
            for ip in self.probe_parent(&parent).await {
                probed.insert(ip);
            }
            if ips.iter().all(|ip| probed.contains(ip)) {
                return true;
            }
        }
        false
    }

    /// Resolves a random non-existent sibling under `parent`, caching the
    /// sorted answer IPs so candidates sharing a parent probe it once.
    async fn probe_parent(&self, parent: &str) -> Vec<String> {
        if let Some(cached) = self
            .wildcard_cache
            .lock()
            .expect("wildcard cache lock poisoned")
            .get(parent)
        {
            return cached.clone();
        }

        let label: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(WILDCARD_PROBE_LABEL_LEN)
            .map(char::from)
            .collect::<String>()
            .to_ascii_lowercase();
        let probe = format!("{label}.{parent}");
        let mut ips = self.client.lookup(&probe).await;
        ips.sort();

        // a racing worker may have probed the same parent; either result
        // is equally valid
        self.wildcard_cache
            .lock()
            .expect("wildcard cache lock poisoned")
            .insert(parent.to_string(), ips.clone());
        ips
    }
}

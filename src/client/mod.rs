//! DNS client used by the resolver workers.
//!
//! Wraps a `hickory-resolver` pool and exposes the operations the pipeline
//! consumes: multi-type queries, single A lookups, recursive traces, and
//! zone transfers. Hosts-file overrides are consulted before any network
//! query, and internal-IP checking is a client option rather than
//! process-wide state.

mod answer;
mod axfr;
mod trace;

pub use answer::{rcode_label, AsnSummary, DnsAnswer, SoaRecord};
pub use axfr::XfrData;
pub use trace::TraceData;

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, Record, RecordType};
use hickory_resolver::TokioAsyncResolver;

use crate::config::{QuestionTypeSet, DEFAULT_RESOLVERS, DEFAULT_RETRIES, DEFAULT_TRACE_MAX_RECURSION, DNS_TIMEOUT};
use crate::errors::InitializationError;

/// Options for constructing a [`DnsClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Resolvers as `ip` or `ip:port`. Empty means the built-in pool.
    pub resolvers: Vec<String>,
    /// Question types issued by `query_multiple`.
    pub question_types: QuestionTypeSet,
    /// Per-query timeout.
    pub timeout: Duration,
    /// Lookup attempts before a query is considered failed.
    pub retries: usize,
    /// Upper bound on delegation hops followed by a trace.
    pub trace_max_recursion: usize,
    /// Optional hosts file consulted before the network.
    pub hosts_file: Option<String>,
    /// When false, private and loopback addresses are stripped from
    /// answers as likely poisoning.
    pub check_internal_ips: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let mut question_types = QuestionTypeSet::new();
        question_types.insert(RecordType::A);
        ClientOptions {
            resolvers: Vec::new(),
            question_types,
            timeout: DNS_TIMEOUT,
            retries: DEFAULT_RETRIES,
            trace_max_recursion: DEFAULT_TRACE_MAX_RECURSION,
            hosts_file: None,
            check_internal_ips: true,
        }
    }
}

/// DNS client shared by all resolver workers.
pub struct DnsClient {
    resolver: TokioAsyncResolver,
    options: ClientOptions,
    hosts_overrides: HashMap<String, Vec<IpAddr>>,
}

/// Splits `ip` or `ip:port` into its parts, defaulting to port 53.
pub(crate) fn parse_resolver(entry: &str) -> Result<(IpAddr, u16), InitializationError> {
    let entry = entry.trim();
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok((ip, 53));
    }
    if let Some((host, port)) = entry.rsplit_once(':') {
        let ip = host
            .parse::<IpAddr>()
            .map_err(|e| InitializationError::Resolver(format!("bad resolver {entry}: {e}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| InitializationError::Resolver(format!("bad resolver {entry}: {e}")))?;
        return Ok((ip, port));
    }
    Err(InitializationError::Resolver(format!(
        "bad resolver address: {entry}"
    )))
}

impl DnsClient {
    /// Builds the client and its resolver pool.
    pub fn new(options: ClientOptions) -> Result<Self, InitializationError> {
        let entries: Vec<String> = if options.resolvers.is_empty() {
            DEFAULT_RESOLVERS.iter().map(|s| s.to_string()).collect()
        } else {
            options.resolvers.clone()
        };
        let mut group = NameServerConfigGroup::with_capacity(entries.len() * 2);
        for entry in &entries {
            let (ip, port) = parse_resolver(entry)?;
            group.merge(NameServerConfigGroup::from_ips_clear(&[ip], port, true));
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = options.timeout;
        opts.attempts = options.retries.max(1);
        // prevent search-domain appending on relative names
        opts.ndots = 0;

        let resolver = TokioAsyncResolver::tokio(
            ResolverConfig::from_parts(None, vec![], group),
            opts,
        );

        let hosts_overrides = match &options.hosts_file {
            Some(path) => parse_hosts_file(Path::new(path))
                .map_err(|e| InitializationError::Resolver(format!("hosts file: {e}")))?,
            None => HashMap::new(),
        };

        Ok(DnsClient {
            resolver,
            options,
            hosts_overrides,
        })
    }

    /// The client options this instance was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The underlying resolver, shared with the enrichment clients.
    pub fn resolver(&self) -> &TokioAsyncResolver {
        &self.resolver
    }

    /// Queries every configured question type for `host` and folds the
    /// responses into one answer. Partial results are kept; `None` means no
    /// server produced any response at all.
    pub async fn query_multiple(&self, host: &str) -> Option<DnsAnswer> {
        if host.is_empty() {
            return None;
        }

        if let Some(ips) = self.hosts_overrides.get(host) {
            let mut answer = DnsAnswer::new(host);
            for ip in ips {
                match ip {
                    IpAddr::V4(v4) => answer.a.push(v4.to_string()),
                    IpAddr::V6(v6) => answer.aaaa.push(v6.to_string()),
                }
            }
            answer.from_hosts_file = true;
            answer.set_status(ResponseCode::NoError);
            answer.raw = answer.render_raw();
            return Some(answer);
        }

        let mut answer = DnsAnswer::new(host);
        let mut got_response = false;
        for record_type in self.options.question_types.iter() {
            if let Some(code) = self.query_one(host, record_type, &mut answer).await {
                got_response = true;
                answer.set_status(code);
            }
        }
        if !got_response {
            return None;
        }
        if !self.options.check_internal_ips {
            strip_internal(&mut answer);
        }
        answer.raw = answer.render_raw();
        Some(answer)
    }

    /// Issues a single typed query, absorbing any records into `answer`.
    /// Returns the response code, or `None` when no response arrived.
    async fn query_one(
        &self,
        host: &str,
        record_type: RecordType,
        answer: &mut DnsAnswer,
    ) -> Option<ResponseCode> {
        // literal IPs answer PTR through the reverse path
        if record_type == RecordType::PTR {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return match self.resolver.reverse_lookup(ip).await {
                    Ok(found) => {
                        for name in found.iter() {
                            answer.ptr.push(trim_dot(&name.to_utf8()));
                        }
                        Some(ResponseCode::NoError)
                    }
                    Err(e) => rcode_of(&e),
                };
            }
        }

        match self.resolver.lookup(host, record_type).await {
            Ok(lookup) => {
                for record in lookup.record_iter() {
                    absorb(answer, record);
                }
                Some(ResponseCode::NoError)
            }
            Err(e) => rcode_of(&e),
        }
    }

    /// Plain address lookup, used by ASN enrichment when an answer carries
    /// no A records.
    pub async fn lookup(&self, host: &str) -> Vec<String> {
        match self.resolver.lookup_ip(host).await {
            Ok(found) => found.iter().map(|ip| ip.to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Recursive trace from the root servers down to `host`.
    pub async fn trace(&self, host: &str) -> anyhow::Result<TraceData> {
        trace::recursive_trace(
            &self.resolver,
            host,
            self.options.trace_max_recursion,
            self.options.timeout,
        )
        .await
    }

    /// Zone transfer attempt against `host`'s authoritative servers.
    pub async fn axfr(&self, host: &str) -> anyhow::Result<XfrData> {
        axfr::zone_transfer(self, host).await
    }
}

fn rcode_of(e: &ResolveError) -> Option<ResponseCode> {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => Some(*response_code),
        _ => None,
    }
}

fn trim_dot(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

/// Distributes one resource record into the answer's per-type lists.
pub(crate) fn absorb(answer: &mut DnsAnswer, record: &Record) {
    let Some(data) = record.data() else { return };
    if answer.ttl == 0 {
        answer.ttl = record.ttl();
    }
    match data {
        RData::A(ip) => answer.a.push(ip.0.to_string()),
        RData::AAAA(ip) => answer.aaaa.push(ip.0.to_string()),
        RData::CNAME(name) => answer.cname.push(trim_dot(&name.0.to_utf8())),
        RData::NS(name) => answer.ns.push(trim_dot(&name.0.to_utf8())),
        RData::PTR(name) => answer.ptr.push(trim_dot(&name.0.to_utf8())),
        RData::MX(mx) => answer.mx.push(trim_dot(&mx.exchange().to_utf8())),
        RData::TXT(txt) => {
            let joined: String = txt
                .txt_data()
                .iter()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .collect::<Vec<String>>()
                .join("");
            answer.txt.push(joined);
        }
        RData::SRV(srv) => answer.srv.push(trim_dot(&srv.target().to_utf8())),
        RData::CAA(caa) => answer.caa.push(caa.to_string()),
        RData::SOA(soa) => answer.soa.push(SoaRecord {
            name: trim_dot(&record.name().to_utf8()),
            ns: trim_dot(&soa.mname().to_utf8()),
            mbox: trim_dot(&soa.rname().to_utf8()),
            serial: soa.serial(),
        }),
        _ => {}
    }
}

/// Drops A/AAAA records pointing into private, loopback, or link-local
/// space.
fn strip_internal(answer: &mut DnsAnswer) {
    answer.a.retain(|ip| !is_internal(ip));
    answer.aaaa.retain(|ip| !is_internal(ip));
}

fn is_internal(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        Ok(IpAddr::V6(v6)) => v6.is_loopback(),
        Err(_) => false,
    }
}

fn parse_hosts_file(path: &Path) -> std::io::Result<HashMap<String, Vec<IpAddr>>> {
    let mut map: HashMap<String, Vec<IpAddr>> = HashMap::new();
    let content = std::fs::read_to_string(path)?;
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(ip) = fields.next().and_then(|f| f.parse::<IpAddr>().ok()) else {
            continue;
        };
        for name in fields {
            map.entry(name.to_ascii_lowercase()).or_default().push(ip);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolver_forms() {
        assert_eq!(
            parse_resolver("1.1.1.1").unwrap(),
            ("1.1.1.1".parse().unwrap(), 53)
        );
        assert_eq!(
            parse_resolver("127.0.0.1:5353").unwrap(),
            ("127.0.0.1".parse().unwrap(), 5353)
        );
        assert!(parse_resolver("not-an-ip").is_err());
    }

    #[test]
    fn internal_ip_detection() {
        assert!(is_internal("10.1.2.3"));
        assert!(is_internal("127.0.0.1"));
        assert!(!is_internal("8.8.8.8"));
        assert!(!is_internal("garbage"));
    }

    #[test]
    fn hosts_file_overrides_answer() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "10.0.0.5 router.lan other.lan").unwrap();
        let map = parse_hosts_file(file.path()).unwrap();
        assert_eq!(map["router.lan"], vec!["10.0.0.5".parse::<IpAddr>().unwrap()]);
        assert!(map.contains_key("other.lan"));
    }
}

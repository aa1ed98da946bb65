//! Configuration types and CLI options.

use std::collections::HashSet;

use clap::{Parser, ValueEnum};
use hickory_resolver::proto::rr::RecordType;

use crate::config::{DEFAULT_RETRIES, DEFAULT_THREADS, DEFAULT_TRACE_MAX_RECURSION, DEFAULT_WILDCARD_THRESHOLD};
use crate::errors::InitializationError;

/// Logging level for the application.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    #[default]
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Canonical question-type order: flag bit, record type, display label.
///
/// The emitter iterates this table instead of branching per type, so adding
/// a type means adding a row here and an accessor in `DnsAnswer`.
const CANONICAL_TYPES: &[(u16, RecordType, &str)] = &[
    (1 << 0, RecordType::A, "A"),
    (1 << 1, RecordType::AAAA, "AAAA"),
    (1 << 2, RecordType::CNAME, "CNAME"),
    (1 << 3, RecordType::PTR, "PTR"),
    (1 << 4, RecordType::SOA, "SOA"),
    (1 << 5, RecordType::ANY, "ANY"),
    (1 << 6, RecordType::TXT, "TXT"),
    (1 << 7, RecordType::SRV, "SRV"),
    (1 << 8, RecordType::MX, "MX"),
    (1 << 9, RecordType::NS, "NS"),
    (1 << 10, RecordType::CAA, "CAA"),
];

/// An ordered set of DNS question types, stored as a bitmask.
///
/// Iteration always yields types in the canonical order above, regardless of
/// insertion order, which keeps output deterministic across runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuestionTypeSet {
    mask: u16,
}

impl QuestionTypeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn bit_for(record_type: RecordType) -> Option<u16> {
        CANONICAL_TYPES
            .iter()
            .find(|(_, rt, _)| *rt == record_type)
            .map(|(bit, _, _)| *bit)
    }

    /// Adds a question type. Types outside the supported set are ignored.
    pub fn insert(&mut self, record_type: RecordType) {
        if let Some(bit) = Self::bit_for(record_type) {
            self.mask |= bit;
        }
    }

    /// Returns true when the set contains `record_type`.
    pub fn contains(&self, record_type: RecordType) -> bool {
        Self::bit_for(record_type).is_some_and(|bit| self.mask & bit != 0)
    }

    /// Returns true when no type is set.
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Number of types in the set.
    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Iterates the contained types in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = RecordType> + '_ {
        CANONICAL_TYPES
            .iter()
            .filter(|(bit, _, _)| self.mask & bit != 0)
            .map(|(_, rt, _)| *rt)
    }

    /// Display label for a supported type.
    pub fn label(record_type: RecordType) -> &'static str {
        CANONICAL_TYPES
            .iter()
            .find(|(_, rt, _)| *rt == record_type)
            .map_or("?", |&(_, _, label)| label)
    }

    /// Parses a comma-separated list of type names (`a,cname,mx`).
    pub fn parse(list: &str) -> Result<Self, InitializationError> {
        let mut set = Self::new();
        for name in list.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let found = CANONICAL_TYPES
                .iter()
                .find(|(_, _, label)| label.eq_ignore_ascii_case(name));
            match found {
                Some((bit, _, _)) => set.mask |= bit,
                None => {
                    return Err(InitializationError::Config(format!(
                        "unsupported record type: {name}"
                    )))
                }
            }
        }
        Ok(set)
    }
}

/// Command-line options for the enumeration run.
///
/// Doubles as the runtime configuration: the runner reads it directly, the
/// way the rest of the pipeline consumes parsed flags.
#[derive(Debug, Clone, Parser, Default)]
#[command(
    name = "dnsweep",
    version,
    about = "Fast and multi-purpose bulk DNS enumeration toolkit."
)]
pub struct Options {
    /// File with hosts/CIDRs/ASNs to resolve ("-" reads standard input)
    #[arg(short = 'l', long = "list")]
    pub hosts: Option<String>,

    /// Inline domains (comma-separated), a file, or "-" for stdin
    #[arg(short = 'd', long = "domain")]
    pub domains: Option<String>,

    /// Wordlist for bruteforcing: inline comma-separated, a file, or "-"
    #[arg(short = 'w', long = "wordlist")]
    pub wordlist: Option<String>,

    /// Query A records
    #[arg(short = 'a')]
    pub a: bool,

    /// Query AAAA records
    #[arg(long)]
    pub aaaa: bool,

    /// Query CNAME records
    #[arg(long)]
    pub cname: bool,

    /// Query PTR records
    #[arg(long)]
    pub ptr: bool,

    /// Query SOA records
    #[arg(long)]
    pub soa: bool,

    /// Query ANY records
    #[arg(long)]
    pub any: bool,

    /// Query TXT records
    #[arg(long)]
    pub txt: bool,

    /// Query SRV records
    #[arg(long)]
    pub srv: bool,

    /// Query MX records
    #[arg(long)]
    pub mx: bool,

    /// Query NS records
    #[arg(long)]
    pub ns: bool,

    /// Query CAA records
    #[arg(long)]
    pub caa: bool,

    /// Attempt a zone transfer against the host's authoritative servers
    #[arg(long)]
    pub axfr: bool,

    /// Perform a recursive trace from the root servers
    #[arg(long)]
    pub trace: bool,

    /// Maximum delegation hops followed by --trace
    #[arg(long, default_value_t = DEFAULT_TRACE_MAX_RECURSION)]
    pub trace_max_recursion: usize,

    /// Annotate answers with ASN number, org, country, and ranges
    #[arg(long)]
    pub asn: bool,

    /// Annotate answers that resolve to known CDN ranges
    #[arg(long)]
    pub cdn: bool,

    /// Number of concurrent resolver workers
    #[arg(short = 't', long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Queries per second (0 disables rate limiting)
    #[arg(long = "rate-limit", default_value_t = 0)]
    pub rate_limit: u32,

    /// Number of lookup attempts before giving up on a query
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: usize,

    /// Resolvers: a file with one per line, or inline comma-separated
    /// (`ip` or `ip:port`)
    #[arg(short = 'r', long)]
    pub resolvers: Option<String>,

    /// Hosts file consulted before any network query
    #[arg(long = "hostsfile")]
    pub hosts_file: Option<String>,

    /// Emit one JSON object per line
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Strip raw request/response text from JSON output
    #[arg(long = "omit-raw")]
    pub omit_raw: bool,

    /// Emit the raw zone-file-style response text
    #[arg(long)]
    pub raw: bool,

    /// Include the response data next to each host
    #[arg(long)]
    pub resp: bool,

    /// Emit the response data only
    #[arg(long = "resp-only")]
    pub resp_only: bool,

    /// Only emit hosts whose response code is in this list
    /// (names or numeric values, comma-separated)
    #[arg(long)]
    pub rcode: Option<String>,

    /// Suppress hosts carrying any record of these types (comma-separated)
    #[arg(long)]
    pub rtf: Option<String>,

    /// Write results to this file in addition to stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Filter wildcard subdomains under this root domain
    #[arg(long)]
    pub wd: Option<String>,

    /// Hosts-per-IP threshold before wildcard probing kicks in
    #[arg(long, default_value_t = DEFAULT_WILDCARD_THRESHOLD)]
    pub wt: usize,

    /// Resume the previous run from its saved cursor
    #[arg(long)]
    pub resume: bool,

    /// Stream hosts straight to the workers (no work set, no resume)
    #[arg(long)]
    pub stream: bool,

    /// Print periodic progress statistics to stderr
    #[arg(long)]
    pub stats: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Options {
    /// Builds the question-type set from the record-type flags.
    ///
    /// When no type is selected, or when wildcard filtering was requested,
    /// the set defaults to `{A}`.
    pub fn question_types(&self) -> QuestionTypeSet {
        let mut set = QuestionTypeSet::new();
        let flags = [
            (self.a, RecordType::A),
            (self.aaaa, RecordType::AAAA),
            (self.cname, RecordType::CNAME),
            (self.ptr, RecordType::PTR),
            (self.soa, RecordType::SOA),
            (self.any, RecordType::ANY),
            (self.txt, RecordType::TXT),
            (self.srv, RecordType::SRV),
            (self.mx, RecordType::MX),
            (self.ns, RecordType::NS),
            (self.caa, RecordType::CAA),
        ];
        for (enabled, record_type) in flags {
            if enabled {
                set.insert(record_type);
            }
        }
        if set.is_empty() || self.wd.is_some() {
            set.insert(RecordType::A);
        }
        set
    }

    /// Parses the `--rcode` allow-list into numeric response codes.
    pub fn parse_rcodes(&self) -> Result<Option<HashSet<u16>>, InitializationError> {
        let Some(list) = &self.rcode else {
            return Ok(None);
        };
        let mut codes = HashSet::new();
        for item in list.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if let Ok(code) = item.parse::<u16>() {
                codes.insert(code);
                continue;
            }
            let code = match item.to_ascii_uppercase().as_str() {
                "NOERROR" => 0,
                "FORMERR" => 1,
                "SERVFAIL" => 2,
                "NXDOMAIN" => 3,
                "NOTIMP" => 4,
                "REFUSED" => 5,
                other => {
                    return Err(InitializationError::Config(format!(
                        "invalid response code: {other}"
                    )))
                }
            };
            codes.insert(code);
        }
        Ok(Some(codes))
    }

    /// Parses the `--rtf` response-type filter into a type set.
    pub fn response_type_filter(&self) -> Result<QuestionTypeSet, InitializationError> {
        match &self.rtf {
            Some(list) => QuestionTypeSet::parse(list),
            None => Ok(QuestionTypeSet::new()),
        }
    }

    /// True when `--axfr` was the only record-related request: the default
    /// `{A}` set was forced because no record-type flag was given.
    pub fn axfr_only(&self) -> bool {
        self.axfr
            && !(self.a
                || self.aaaa
                || self.cname
                || self.ptr
                || self.soa
                || self.any
                || self.txt
                || self.srv
                || self.mx
                || self.ns
                || self.caa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_types_default_to_a() {
        let options = Options::default();
        let set = options.question_types();
        assert_eq!(set.len(), 1);
        assert!(set.contains(RecordType::A));
    }

    #[test]
    fn question_types_canonical_order() {
        let options = Options {
            ns: true,
            cname: true,
            a: true,
            ..Default::default()
        };
        let order: Vec<RecordType> = options.question_types().iter().collect();
        assert_eq!(order, vec![RecordType::A, RecordType::CNAME, RecordType::NS]);
    }

    #[test]
    fn wildcard_run_forces_a() {
        let options = Options {
            wd: Some("example.com".into()),
            mx: true,
            ..Default::default()
        };
        let set = options.question_types();
        assert!(set.contains(RecordType::A));
        assert!(set.contains(RecordType::MX));
    }

    #[test]
    fn parse_rcodes_accepts_names_and_numbers() {
        let options = Options {
            rcode: Some("nxdomain,0,SERVFAIL".into()),
            ..Default::default()
        };
        let codes = options.parse_rcodes().unwrap().unwrap();
        assert_eq!(codes, HashSet::from([3, 0, 2]));
    }

    #[test]
    fn parse_rcodes_rejects_garbage() {
        let options = Options {
            rcode: Some("bogus".into()),
            ..Default::default()
        };
        assert!(options.parse_rcodes().is_err());
    }

    #[test]
    fn type_set_parse_rejects_unknown() {
        assert!(QuestionTypeSet::parse("a,frob").is_err());
        let set = QuestionTypeSet::parse("a, mx").unwrap();
        assert!(set.contains(RecordType::A));
        assert!(set.contains(RecordType::MX));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn axfr_only_detection() {
        let axfr = Options {
            axfr: true,
            ..Default::default()
        };
        assert!(axfr.axfr_only());
        let mixed = Options {
            axfr: true,
            mx: true,
            ..Default::default()
        };
        assert!(!mixed.axfr_only());
    }
}

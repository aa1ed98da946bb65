//! Parsed DNS answer model.
//!
//! `DnsAnswer` is what the client hands to the pipeline: per-type record
//! lists, response code, timestamp, and the optional enrichment attached by
//! the workers (trace chain, zone transfer, ASN, CDN). It serializes with
//! serde both for work-set storage and for the JSON output mode.

use chrono::{DateTime, Utc};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use serde::{Deserialize, Serialize};

/// One SOA record with the fields the emitter cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaRecord {
    /// Owner name of the record.
    pub name: String,
    /// Primary nameserver (MNAME).
    pub ns: String,
    /// Responsible mailbox (RNAME).
    pub mbox: String,
    /// Zone serial.
    pub serial: u32,
}

/// Folded ASN annotation for one answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnSummary {
    /// AS number, `AS`-prefixed.
    pub as_number: String,
    /// Organization that announces the ranges.
    pub as_name: String,
    /// Registration country code.
    pub as_country: String,
    /// Announced CIDR ranges covering the answer's addresses.
    pub as_range: Vec<String>,
}

impl std::fmt::Display for AsnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.as_number, self.as_name, self.as_country)
    }
}

/// A parsed (and possibly enriched) DNS response for one host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsAnswer {
    /// The queried host.
    pub host: String,
    /// TTL of the first answer record.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: u32,
    /// A records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<String>,
    /// AAAA records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aaaa: Vec<String>,
    /// CNAME records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cname: Vec<String>,
    /// MX exchange hosts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mx: Vec<String>,
    /// PTR records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ptr: Vec<String>,
    /// NS records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ns: Vec<String>,
    /// TXT records, joined per answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub txt: Vec<String>,
    /// SRV targets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub srv: Vec<String>,
    /// CAA records in presentation format.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caa: Vec<String>,
    /// SOA records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soa: Vec<SoaRecord>,
    /// Zone-file-style rendering of the response.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
    /// Textual response code (`NOERROR`, `NXDOMAIN`, ...).
    pub status_code: String,
    /// Numeric response code.
    pub status_code_raw: u16,
    /// When the response was received.
    pub timestamp: DateTime<Utc>,
    /// True when the answer came from the local hosts file.
    #[serde(default, skip_serializing_if = "is_false")]
    pub from_hosts_file: bool,
    /// Hop-by-hop answers of a recursive trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<DnsAnswer>>,
    /// Per-nameserver zone transfer answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axfr: Option<Vec<DnsAnswer>>,
    /// ASN annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<AsnSummary>,
    /// True when at least one address sits in a known CDN range.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_cdn_ip: bool,
    /// CDN provider name when `is_cdn_ip` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_name: Option<String>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl DnsAnswer {
    /// Creates an empty answer for `host` stamped with the current time.
    pub fn new(host: &str) -> Self {
        DnsAnswer {
            host: host.to_string(),
            timestamp: Utc::now(),
            status_code: rcode_label(ResponseCode::NoError).to_string(),
            ..Default::default()
        }
    }

    /// Records the response code of the latest response processed.
    pub fn set_status(&mut self, code: ResponseCode) {
        self.status_code = rcode_label(code).to_string();
        self.status_code_raw = u16::from(code.low());
    }

    /// SOA NS and MBOX names as textual records, deduplicated.
    pub fn soa_records(&self) -> Vec<String> {
        let mut records = Vec::new();
        for soa in &self.soa {
            for value in [&soa.ns, &soa.mbox] {
                if !value.is_empty() && !records.contains(value) {
                    records.push(value.clone());
                }
            }
        }
        records
    }

    /// Every parsed record, in canonical type order. Used for ANY output.
    pub fn all_records(&self) -> Vec<String> {
        let mut merged = Vec::new();
        merged.extend(self.a.iter().cloned());
        merged.extend(self.aaaa.iter().cloned());
        merged.extend(self.cname.iter().cloned());
        merged.extend(self.mx.iter().cloned());
        merged.extend(self.ptr.iter().cloned());
        merged.extend(self.soa_records());
        merged.extend(self.ns.iter().cloned());
        merged.extend(self.txt.iter().cloned());
        merged.extend(self.srv.iter().cloned());
        merged.extend(self.caa.iter().cloned());
        merged
    }

    /// Table-driven record accessor for the emitter.
    pub fn records_for(&self, record_type: RecordType) -> Vec<String> {
        match record_type {
            RecordType::A => self.a.clone(),
            RecordType::AAAA => self.aaaa.clone(),
            RecordType::CNAME => self.cname.clone(),
            RecordType::PTR => self.ptr.clone(),
            RecordType::SOA => self.soa_records(),
            RecordType::ANY => self.all_records(),
            RecordType::TXT => self.txt.clone(),
            RecordType::SRV => self.srv.clone(),
            RecordType::MX => self.mx.clone(),
            RecordType::NS => self.ns.clone(),
            RecordType::CAA => self.caa.clone(),
            _ => Vec::new(),
        }
    }

    /// True when the answer carries at least one record of any type.
    pub fn has_records(&self) -> bool {
        !self.all_records().is_empty()
    }

    /// Renders the parsed records as zone-file-style text, one record per
    /// line. The upstream resolver does not expose the original wire
    /// message, so this rendering stands in for it.
    pub fn render_raw(&self) -> String {
        let mut out = String::new();
        let owner = &self.host;
        let ttl = self.ttl;
        let mut push = |rtype: &str, value: &str| {
            out.push_str(&format!("{owner}.\t{ttl}\tIN\t{rtype}\t{value}\n"));
        };
        for value in &self.a {
            push("A", value);
        }
        for value in &self.aaaa {
            push("AAAA", value);
        }
        for value in &self.cname {
            push("CNAME", value);
        }
        for value in &self.mx {
            push("MX", value);
        }
        for value in &self.ptr {
            push("PTR", value);
        }
        for soa in &self.soa {
            push("SOA", &format!("{} {} {}", soa.ns, soa.mbox, soa.serial));
        }
        for value in &self.ns {
            push("NS", value);
        }
        for value in &self.txt {
            push("TXT", &format!("\"{value}\""));
        }
        for value in &self.srv {
            push("SRV", value);
        }
        for value in &self.caa {
            push("CAA", value);
        }
        out
    }

    /// Serializes the answer for work-set storage.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserializes an answer stored in the work set.
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Short textual name for a response code, the form users pass to `--rcode`.
pub fn rcode_label(code: ResponseCode) -> &'static str {
    match code {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::FormErr => "FORMERR",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::YXDomain => "YXDOMAIN",
        ResponseCode::YXRRSet => "YXRRSET",
        ResponseCode::NXRRSet => "NXRRSET",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::NotZone => "NOTZONE",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_with_soa() -> DnsAnswer {
        let mut answer = DnsAnswer::new("example.com");
        answer.soa = vec![
            SoaRecord {
                name: "example.com".into(),
                ns: "ns1.example.com".into(),
                mbox: "hostmaster.example.com".into(),
                serial: 2024060100,
            },
            SoaRecord {
                name: "example.com".into(),
                ns: "ns1.example.com".into(),
                mbox: "hostmaster.example.com".into(),
                serial: 2024060100,
            },
        ];
        answer
    }

    #[test]
    fn soa_records_contribute_ns_and_mbox_deduplicated() {
        let answer = answer_with_soa();
        assert_eq!(
            answer.soa_records(),
            vec!["ns1.example.com".to_string(), "hostmaster.example.com".to_string()]
        );
    }

    #[test]
    fn storage_round_trip() {
        let mut answer = DnsAnswer::new("a.test");
        answer.a = vec!["192.0.2.1".into()];
        answer.set_status(ResponseCode::NoError);
        let bytes = answer.to_bytes().unwrap();
        let back = DnsAnswer::from_bytes(&bytes).unwrap();
        assert_eq!(back.host, "a.test");
        assert_eq!(back.a, vec!["192.0.2.1"]);
        assert_eq!(back.status_code, "NOERROR");
    }

    #[test]
    fn rcode_labels() {
        assert_eq!(rcode_label(ResponseCode::NXDomain), "NXDOMAIN");
        assert_eq!(rcode_label(ResponseCode::ServFail), "SERVFAIL");
    }

    #[test]
    fn records_for_any_merges_everything() {
        let mut answer = answer_with_soa();
        answer.a = vec!["192.0.2.1".into()];
        answer.ns = vec!["ns1.example.com".into()];
        let merged = answer.records_for(RecordType::ANY);
        assert!(merged.contains(&"192.0.2.1".to_string()));
        assert!(merged.contains(&"hostmaster.example.com".to_string()));
        assert_eq!(merged.iter().filter(|r| *r == "ns1.example.com").count(), 2);
    }
}

//! ASN lookups.
//!
//! IP-to-ASN data comes from Team Cymru's DNS interface (TXT records under
//! `origin.asn.cymru.com` / `origin6.asn.cymru.com`, AS descriptions under
//! `asn.cymru.com`), so per-IP annotation rides the same resolver pool as
//! the enumeration itself. Announced-prefix expansion for `ASxxxx` input
//! tokens uses the RIPEstat HTTP API.

use std::net::IpAddr;

use anyhow::Context;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use ipnet::IpNet;

use crate::errors::InitializationError;

/// One IP-to-ASN mapping as reported by the origin zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    /// AS number.
    pub asn: u32,
    /// Announced prefix covering the queried address.
    pub prefix: String,
    /// Registration country code.
    pub country: String,
    /// AS organization description.
    pub org: String,
}

/// Client for ASN data and announced-prefix expansion.
pub struct AsnClient {
    resolver: TokioAsyncResolver,
    http: reqwest::Client,
}

impl AsnClient {
    /// Builds the client on top of an existing resolver.
    pub fn new(resolver: TokioAsyncResolver) -> Result<Self, InitializationError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("dnsweep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InitializationError::Config(format!("http client: {e}")))?;
        Ok(AsnClient { resolver, http })
    }

    /// Returns the ASN records covering `ip`, with the AS organization
    /// resolved. Failures yield an empty list; annotation is best-effort.
    pub async fn get_data(&self, ip: &str) -> Vec<AsnRecord> {
        let Ok(parsed) = ip.parse::<IpAddr>() else {
            return Vec::new();
        };
        let origin = origin_query_name(&parsed);
        let mut records: Vec<AsnRecord> = self
            .txt_records(&origin)
            .await
            .iter()
            .filter_map(|txt| parse_origin_txt(txt))
            .collect();

        for record in &mut records {
            let description = self.txt_records(&format!("AS{}.asn.cymru.com", record.asn)).await;
            if let Some(org) = description.first().and_then(|txt| parse_as_description(txt)) {
                record.org = org;
            }
        }
        records
    }

    /// Ordered union of the prefixes announced across `records`.
    pub fn get_cidrs(records: &[AsnRecord]) -> Vec<String> {
        let mut cidrs = Vec::new();
        for record in records {
            if !record.prefix.is_empty() && !cidrs.contains(&record.prefix) {
                cidrs.push(record.prefix.clone());
            }
        }
        cidrs
    }

    /// Prefixes currently announced by `asn` (an `ASxxxx` token), used to
    /// expand ASN input into addresses.
    pub async fn announced_prefixes(&self, asn: &str) -> anyhow::Result<Vec<IpNet>> {
        let url = format!(
            "https://stat.ripe.net/data/announced-prefixes/data.json?resource={}",
            asn.trim().to_ascii_uppercase()
        );
        let body: serde_json::Value = self
            .http
            .get(&url)
            .send()
            .await
            .context("announced-prefixes request failed")?
            .error_for_status()
            .context("announced-prefixes request rejected")?
            .json()
            .await
            .context("announced-prefixes response malformed")?;

        let prefixes = body["data"]["prefixes"]
            .as_array()
            .context("announced-prefixes response missing data")?
            .iter()
            .filter_map(|entry| entry["prefix"].as_str())
            .filter_map(|prefix| prefix.parse::<IpNet>().ok())
            .collect();
        Ok(prefixes)
    }

    async fn txt_records(&self, name: &str) -> Vec<String> {
        match self.resolver.lookup(name, RecordType::TXT).await {
            Ok(lookup) => lookup
                .iter()
                .filter_map(|rdata| {
                    if let RData::TXT(txt) = rdata {
                        let joined: String = txt
                            .txt_data()
                            .iter()
                            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                            .collect::<Vec<String>>()
                            .join("");
                        Some(joined)
                    } else {
                        None
                    }
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Query name for the origin zone covering `ip`.
fn origin_query_name(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.origin.asn.cymru.com", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let nibbles: Vec<String> = v6
                .octets()
                .iter()
                .flat_map(|byte| [byte >> 4, byte & 0xf])
                .rev()
                .map(|nibble| format!("{nibble:x}"))
                .collect();
            format!("{}.origin6.asn.cymru.com", nibbles.join("."))
        }
    }
}

/// Parses `"15169 | 8.8.8.0/24 | US | arin | 2023-12-28"`.
fn parse_origin_txt(txt: &str) -> Option<AsnRecord> {
    let fields: Vec<&str> = txt.split('|').map(str::trim).collect();
    if fields.len() < 3 {
        return None;
    }
    // multiple origin ASNs come space-separated; the first one wins
    let asn = fields[0].split_whitespace().next()?.parse::<u32>().ok()?;
    Some(AsnRecord {
        asn,
        prefix: fields[1].to_string(),
        country: fields[2].to_string(),
        org: String::new(),
    })
}

/// Parses `"15169 | US | arin | 2000-03-30 | GOOGLE, US"` into the bare
/// organization name.
fn parse_as_description(txt: &str) -> Option<String> {
    let fields: Vec<&str> = txt.split('|').map(str::trim).collect();
    let description = fields.get(4)?;
    let org = description.split(',').next().unwrap_or(description).trim();
    if org.is_empty() {
        None
    } else {
        Some(org.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_names() {
        let v4: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(origin_query_name(&v4), "8.8.8.8.origin.asn.cymru.com");
        let v4: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(origin_query_name(&v4), "7.2.0.192.origin.asn.cymru.com");
    }

    #[test]
    fn origin_name_v6_is_reversed_nibbles() {
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        let name = origin_query_name(&v6);
        assert!(name.starts_with("1.0.0.0."));
        assert!(name.ends_with(".8.b.d.0.1.0.0.2.origin6.asn.cymru.com"));
    }

    #[test]
    fn parse_origin_record() {
        let record = parse_origin_txt("15169 | 8.8.8.0/24 | US | arin | 2023-12-28").unwrap();
        assert_eq!(record.asn, 15169);
        assert_eq!(record.prefix, "8.8.8.0/24");
        assert_eq!(record.country, "US");
    }

    #[test]
    fn parse_origin_record_multiple_asns() {
        let record = parse_origin_txt("3356 1239 | 4.0.0.0/9 | US | arin | 2000-01-01").unwrap();
        assert_eq!(record.asn, 3356);
    }

    #[test]
    fn parse_description_strips_country() {
        assert_eq!(
            parse_as_description("15169 | US | arin | 2000-03-30 | GOOGLE, US"),
            Some("GOOGLE".to_string())
        );
        assert_eq!(parse_as_description("garbage"), None);
    }

    #[test]
    fn cidr_union_is_ordered_and_deduplicated() {
        let records = vec![
            AsnRecord {
                asn: 1,
                prefix: "8.8.8.0/24".into(),
                ..Default::default()
            },
            AsnRecord {
                asn: 1,
                prefix: "8.8.4.0/24".into(),
                ..Default::default()
            },
            AsnRecord {
                asn: 1,
                prefix: "8.8.8.0/24".into(),
                ..Default::default()
            },
        ];
        assert_eq!(AsnClient::get_cidrs(&records), vec!["8.8.8.0/24", "8.8.4.0/24"]);
    }
}

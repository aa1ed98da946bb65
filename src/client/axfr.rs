//! Zone transfer (AXFR) support.
//!
//! A transfer is attempted against every authoritative nameserver of the
//! zone, over TCP with the standard two-byte length framing. A stream is
//! complete when the opening SOA record repeats.

use std::net::IpAddr;

use anyhow::{bail, Context};
use futures::stream::{self, StreamExt};
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RData, RecordType};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{absorb, DnsAnswer, DnsClient};
use crate::config::AXFR_TIMEOUT;

/// Zone contents obtained by transfer, one answer per responding server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XfrData {
    /// Per-nameserver transfer results.
    pub chain: Vec<DnsAnswer>,
}

impl XfrData {
    /// True when at least one server handed out zone data.
    pub fn has_data(&self) -> bool {
        self.chain.iter().any(|answer| answer.has_records())
    }
}

/// Attempts a zone transfer for `host` against each of its authoritative
/// servers. Individual server failures are skipped; the result carries
/// whatever the cooperating servers returned.
pub(crate) async fn zone_transfer(client: &DnsClient, host: &str) -> anyhow::Result<XfrData> {
    let zone = Name::from_utf8(host).context("invalid zone name")?;

    let nameservers = match client.resolver().lookup(host, RecordType::NS).await {
        Ok(lookup) => lookup
            .record_iter()
            .filter_map(|record| match record.data() {
                Some(RData::NS(ns)) => Some(ns.0.to_utf8()),
                _ => None,
            })
            .collect::<Vec<String>>(),
        Err(_) => Vec::new(),
    };

    let transfers: Vec<Option<DnsAnswer>> = stream::iter(nameservers)
        .map(|nameserver| {
            let zone = zone.clone();
            async move {
                let addresses = match client.resolver().lookup_ip(nameserver.as_str()).await {
                    Ok(found) => found.iter().collect::<Vec<IpAddr>>(),
                    Err(_) => return None,
                };
                for address in addresses {
                    match transfer_from(&zone, host, address).await {
                        Ok(answer) => return Some(answer),
                        Err(e) => {
                            log::debug!("axfr {host} via {address} failed: {e}");
                        }
                    }
                }
                None
            }
        })
        .buffer_unordered(4)
        .collect()
        .await;

    Ok(XfrData {
        chain: transfers.into_iter().flatten().collect(),
    })
}

async fn transfer_from(zone: &Name, host: &str, server: IpAddr) -> anyhow::Result<DnsAnswer> {
    let stream = timeout(AXFR_TIMEOUT, TcpStream::connect((server, 53)))
        .await
        .context("connect timeout")??;
    let (mut reader, mut writer) = stream.into_split();

    let mut request = Message::new();
    request
        .set_id(rand::random::<u16>())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(zone.clone(), RecordType::AXFR));
    let wire = request.to_vec()?;

    let mut framed = Vec::with_capacity(wire.len() + 2);
    framed.extend_from_slice(&(wire.len() as u16).to_be_bytes());
    framed.extend_from_slice(&wire);
    writer.write_all(&framed).await?;
    writer.flush().await?;

    let mut answer = DnsAnswer::new(host);
    let mut soa_count = 0usize;

    'stream: loop {
        let mut len_bytes = [0u8; 2];
        match timeout(AXFR_TIMEOUT, reader.read_exact(&mut len_bytes)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Ok(Err(e)) => bail!("read length: {e}"),
            Err(_) => bail!("read timeout"),
        }
        let message_len = u16::from_be_bytes(len_bytes) as usize;
        let mut buf = vec![0u8; message_len];
        timeout(AXFR_TIMEOUT, reader.read_exact(&mut buf))
            .await
            .context("read timeout")??;

        let response = Message::from_vec(&buf)?;
        match response.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::Refused => bail!("transfer refused"),
            ResponseCode::NotAuth => bail!("server not authoritative"),
            other => bail!("transfer failed: {other:?}"),
        }

        for record in response.answers() {
            if matches!(record.data(), Some(RData::SOA(_))) {
                soa_count += 1;
                if soa_count == 2 {
                    // closing SOA marks the end of the stream
                    break 'stream;
                }
            }
            absorb(&mut answer, record);
        }
    }

    if soa_count < 2 {
        bail!("incomplete transfer stream");
    }
    answer.set_status(ResponseCode::NoError);
    answer.raw = answer.render_raw();
    Ok(answer)
}

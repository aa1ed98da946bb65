//! Recursive trace: step-by-step resolution from the root servers,
//! retaining each intermediate authority's answer.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use rand::prelude::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;

use super::{absorb, DnsAnswer};

/// IANA root servers, the starting points of every trace.
const ROOT_SERVERS: &[&str] = &[
    "198.41.0.4",     // a.root-servers.net
    "199.9.14.201",   // b.root-servers.net
    "192.33.4.12",    // c.root-servers.net
    "199.7.91.13",    // d.root-servers.net
    "192.203.230.10", // e.root-servers.net
    "192.5.5.241",    // f.root-servers.net
    "192.112.36.4",   // g.root-servers.net
    "198.97.190.53",  // h.root-servers.net
    "192.36.148.17",  // i.root-servers.net
    "192.58.128.30",  // j.root-servers.net
    "193.0.14.129",   // k.root-servers.net
    "199.7.83.42",    // l.root-servers.net
    "202.12.27.33",   // m.root-servers.net
];

/// The hop-by-hop answers collected while walking the delegation chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceData {
    /// One answer per authority queried, root first.
    pub hops: Vec<DnsAnswer>,
}

/// Walks the delegation chain for `host` starting at a random root server,
/// following glue (or resolving nameserver names through `resolver` when no
/// glue is present) until an authoritative answer or `max_recursion` hops.
pub(crate) async fn recursive_trace(
    resolver: &TokioAsyncResolver,
    host: &str,
    max_recursion: usize,
    timeout: Duration,
) -> anyhow::Result<TraceData> {
    let name = Name::from_utf8(host).context("invalid host name")?;
    let root = ROOT_SERVERS
        .choose(&mut thread_rng())
        .and_then(|ip| ip.parse::<IpAddr>().ok())
        .context("no root server available")?;

    let mut server = root;
    let mut hops = Vec::new();
    for _ in 0..max_recursion.max(1) {
        let Some(message) = query_authority(&name, server, timeout).await else {
            break;
        };

        let mut hop = DnsAnswer::new(host);
        hop.set_status(message.response_code());
        for record in message.answers().iter().chain(message.name_servers()) {
            absorb(&mut hop, record);
        }
        hop.raw = hop.render_raw();

        let answered = !message.answers().is_empty();
        let next = referral_target(&message, resolver).await;
        hops.push(hop);

        if answered || message.response_code() != ResponseCode::NoError {
            break;
        }
        match next {
            Some(ip) => server = ip,
            None => break,
        }
    }

    Ok(TraceData { hops })
}

/// Sends one non-recursive query to `server` and waits for its reply.
async fn query_authority(name: &Name, server: IpAddr, timeout: Duration) -> Option<Message> {
    let mut request = Message::new();
    request
        .set_id(rand::random::<u16>())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(name.clone(), RecordType::A));
    let wire = request.to_vec().ok()?;

    let bind = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect((server, 53)).await.ok()?;
    socket.send(&wire).await.ok()?;

    let mut buf = vec![0u8; 4096];
    let received = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .ok()?
        .ok()?;
    let response = Message::from_vec(&buf[..received]).ok()?;
    if response.id() != request.id() {
        return None;
    }
    Some(response)
}

/// Picks the next authority from a referral: glue from the additionals
/// section when present, otherwise the first nameserver resolved out of
/// band.
async fn referral_target(message: &Message, resolver: &TokioAsyncResolver) -> Option<IpAddr> {
    let nameservers: Vec<Name> = message
        .name_servers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::NS(ns)) => Some(ns.0.clone()),
            _ => None,
        })
        .collect();
    if nameservers.is_empty() {
        return None;
    }

    for record in message.additionals() {
        if let Some(RData::A(glue)) = record.data() {
            if nameservers.contains(record.name()) {
                return Some(IpAddr::V4(glue.0));
            }
        }
    }

    let target = nameservers.first()?.to_utf8();
    resolver
        .lookup_ip(target.as_str())
        .await
        .ok()
        .and_then(|found| found.iter().next())
}

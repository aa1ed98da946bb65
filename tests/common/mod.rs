// Shared test helpers: an in-process UDP DNS stub the resolver pool is
// pointed at, plus small file utilities.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record, RecordType};
use tokio::net::UdpSocket;

/// Static zone data served by the stub.
#[allow(dead_code)] // used by the pipeline tests
#[derive(Default, Clone)]
pub struct StubZone {
    /// Exact name → A records.
    pub exact: HashMap<String, Vec<Ipv4Addr>>,
    /// Catch-all suffix rules: any name ending in `.suffix` resolves to
    /// the given address, like a parent-zone wildcard record.
    pub wildcard_suffixes: Vec<(String, Ipv4Addr)>,
}

impl StubZone {
    #[allow(dead_code)] // used by the pipeline tests
    fn resolve(&self, name: &str) -> Option<Vec<Ipv4Addr>> {
        if let Some(ips) = self.exact.get(name) {
            return Some(ips.clone());
        }
        for (suffix, ip) in &self.wildcard_suffixes {
            if name.ends_with(&format!(".{suffix}")) {
                return Some(vec![*ip]);
            }
        }
        None
    }
}

/// Handle to a running stub server.
pub struct StubDns {
    pub addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl StubDns {
    /// The `ip:port` string to hand to `--resolvers`.
    #[allow(dead_code)] // used by the pipeline tests
    pub fn resolver_arg(&self) -> String {
        format!("{}:{}", self.addr.ip(), self.addr.port())
    }
}

/// Starts a UDP DNS server answering from `zone`. Unknown names get
/// NXDOMAIN; known names queried for types other than A get an empty
/// NOERROR.
#[allow(dead_code)] // used by the pipeline tests
pub async fn start_stub(zone: StubZone) -> StubDns {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub socket");
    let addr = socket.local_addr().expect("stub socket has no address");

    let task = tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let response = build_response(&request, &zone);
            if let Ok(wire) = response.to_vec() {
                let _ = socket.send_to(&wire, peer).await;
            }
        }
    });

    StubDns { addr, _task: task }
}

#[allow(dead_code)] // used by the pipeline tests
fn build_response(request: &Message, zone: &StubZone) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true);

    let Some(query) = request.queries().first() else {
        response.set_response_code(ResponseCode::FormErr);
        return response;
    };
    response.add_query(query.clone());

    let name = query
        .name()
        .to_utf8()
        .trim_end_matches('.')
        .to_ascii_lowercase();

    match zone.resolve(&name) {
        Some(ips) if query.query_type() == RecordType::A => {
            response.set_response_code(ResponseCode::NoError);
            for ip in ips {
                response.add_answer(Record::from_rdata(
                    query.name().clone(),
                    300,
                    RData::A(A(ip)),
                ));
            }
        }
        Some(_) => {
            // name exists but has no records of the queried type
            response.set_response_code(ResponseCode::NoError);
        }
        None => {
            response.set_response_code(ResponseCode::NXDomain);
        }
    }
    response
}

/// Writes `lines` to a fresh temp file and returns its guard.
pub fn write_lines_file(lines: &[&str]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    for line in lines {
        writeln!(file, "{line}").expect("failed to write temp file");
    }
    file.flush().expect("failed to flush temp file");
    file
}

/// Reads the non-empty lines of a file.
#[allow(dead_code)] // used by the pipeline tests
pub fn read_output_lines(path: &std::path::Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

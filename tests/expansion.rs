// Input expansion into the work set: classification, cross products, and
// scan determinism.

mod common;

use dnsweep::client::{ClientOptions, DnsClient};
use dnsweep::enrich::AsnClient;
use dnsweep::input::{expand_into_work_set, preprocess_argument, read_lines};
use dnsweep::WorkSet;

use common::write_lines_file;

fn asn_client() -> AsnClient {
    let client = DnsClient::new(ClientOptions::default()).expect("client");
    AsnClient::new(client.resolver().clone()).expect("asn client")
}

#[tokio::test]
async fn cidr_input_enumerates_host_addresses() {
    let work_set = WorkSet::new();
    let lines = vec!["192.0.2.0/30".to_string()];
    let unique = expand_into_work_set(&work_set, &lines, None, &asn_client())
        .await
        .unwrap();
    assert_eq!(unique, 2);
    assert_eq!(work_set.hosts(), vec!["192.0.2.1", "192.0.2.2"]);
}

#[tokio::test]
async fn fuzz_template_expands_from_wordlist_file() {
    let wordlist_file = write_lines_file(&["a", "b", "c"]);
    let words = preprocess_argument(wordlist_file.path().to_str().unwrap(), None).unwrap();

    let work_set = WorkSet::new();
    let lines = vec!["FUZZ.example.com".to_string()];
    expand_into_work_set(&work_set, &lines, Some(&words), &asn_client())
        .await
        .unwrap();
    assert_eq!(
        work_set.hosts(),
        vec!["a.example.com", "b.example.com", "c.example.com"]
    );
}

#[tokio::test]
async fn bare_host_crosses_with_wordlist() {
    let words = vec!["www".to_string(), "api".to_string()];
    let work_set = WorkSet::new();
    let lines = vec!["example.com".to_string()];
    expand_into_work_set(&work_set, &lines, Some(&words), &asn_client())
        .await
        .unwrap();
    assert_eq!(work_set.hosts(), vec!["www.example.com", "api.example.com"]);
}

#[tokio::test]
async fn plain_input_is_trimmed_lowercased_and_deduplicated() {
    let hosts_file = write_lines_file(&["  A.Test ", "b.test", "a.test", "", "B.TEST"]);
    let lines = read_lines(hosts_file.path()).unwrap();

    let work_set = WorkSet::new();
    let unique = expand_into_work_set(&work_set, &lines, None, &asn_client())
        .await
        .unwrap();
    assert_eq!(unique, 2);
    assert_eq!(work_set.hosts(), vec!["a.test", "b.test"]);
}

#[tokio::test]
async fn expansion_is_deterministic_across_runs() {
    let lines: Vec<String> = (0..50).map(|i| format!("h{i:02}.det.test")).collect();

    let first = WorkSet::new();
    expand_into_work_set(&first, &lines, None, &asn_client())
        .await
        .unwrap();
    let second = WorkSet::new();
    expand_into_work_set(&second, &lines, None, &asn_client())
        .await
        .unwrap();

    assert_eq!(first.hosts(), second.hosts());
    assert_eq!(first.len(), 50);
}

#[test]
fn inline_comma_argument_splits() {
    let items = preprocess_argument("one.test,two.test", None).unwrap();
    assert_eq!(items, vec!["one.test", "two.test"]);
}

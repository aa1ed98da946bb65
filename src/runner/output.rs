//! Output sink and record formatting.
//!
//! A single task drains the output channel: every item goes to stdout and,
//! when configured, to a buffered append-only file. Formatting is
//! table-driven over the question-type bitmask; the long per-type
//! conditional of classic DNS tools collapses into `records_for`.

use colored::Colorize;
use hickory_resolver::proto::rr::RecordType;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::client::DnsAnswer;
use crate::config::{Options, QuestionTypeSet};

/// Types printed when a response-type filter is active: every supported
/// concrete type, ANY excluded.
const FILTERED_OUTPUT_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::MX,
    RecordType::NS,
    RecordType::SOA,
    RecordType::TXT,
    RecordType::SRV,
    RecordType::CAA,
    RecordType::PTR,
];

/// Opens the configured output file for appending. A failure here is fatal
/// for the run.
pub(crate) async fn open_output(
    path: Option<&str>,
) -> anyhow::Result<Option<BufWriter<tokio::fs::File>>> {
    let Some(path) = path else { return Ok(None) };
    let file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open output file {path}: {e}"))?;
    Ok(Some(BufWriter::new(file)))
}

/// Spawns the sink task: drains `rx` until the channel closes, writing each
/// item to stdout and to the output file when one is configured.
pub(crate) fn spawn_sink(
    mut rx: UnboundedReceiver<String>,
    mut file: Option<BufWriter<tokio::fs::File>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if let Some(writer) = file.as_mut() {
                if let Err(e) = writer.write_all(item.as_bytes()).await {
                    log::warn!("failed to write output file: {e}");
                } else {
                    let _ = writer.write_all(b"\n").await;
                }
            }
            println!("{item}");
        }
        if let Some(mut writer) = file {
            let _ = writer.flush().await;
        }
    })
}

/// Routes one answer to the output channel according to the configured
/// mode.
pub(crate) fn dispatch(
    options: &Options,
    question_types: &QuestionTypeSet,
    response_type_filter: &QuestionTypeSet,
    rcode_mode: bool,
    domain: &str,
    answer: &DnsAnswer,
    out: &UnboundedSender<String>,
) {
    if options.json {
        let payload = if options.omit_raw {
            let mut stripped = answer.clone();
            strip_raw(&mut stripped);
            serde_json::to_string(&stripped)
        } else {
            serde_json::to_string(answer)
        };
        if let Ok(line) = payload {
            let _ = out.send(line);
        }
        return;
    }

    if options.raw {
        let _ = out.send(answer.raw.clone());
        return;
    }

    if !response_type_filter.is_empty() {
        // survivors of the filter print records across all types
        for record_type in FILTERED_OUTPUT_TYPES {
            emit_record_type(options, domain, *record_type, answer, out);
        }
        return;
    }

    if rcode_mode {
        let _ = out.send(format!("{domain} [{}]", answer.status_code));
        return;
    }

    for record_type in question_types.iter() {
        let emitted_bare_host = emit_record_type(options, domain, record_type, answer, out);
        if emitted_bare_host {
            // plain mode emits the host once across all types
            break;
        }
    }
}

/// Emits the records of one type. Returns true when the bare host line was
/// emitted (plain mode), signalling the caller to stop.
fn emit_record_type(
    options: &Options,
    domain: &str,
    record_type: RecordType,
    answer: &DnsAnswer,
    out: &UnboundedSender<String>,
) -> bool {
    let records = answer.records_for(record_type);
    if records.is_empty() {
        return false;
    }

    let mut details = String::new();
    if let Some(cdn_name) = &answer.cdn_name {
        details.push_str(&format!(" [{cdn_name}]"));
    }
    if let Some(asn) = &answer.asn {
        details.push_str(&format!(" {asn}"));
    }

    let label = QuestionTypeSet::label(record_type);
    for record in records {
        let record = record.to_lowercase();
        if options.resp_only {
            let _ = out.send(format!("{record}{details}"));
        } else if options.resp {
            let _ = out.send(format!(
                "{domain} [{}] [{}]{details}",
                label.magenta(),
                record.green()
            ));
        } else {
            let _ = out.send(format!("{domain}{details}"));
            return true;
        }
    }
    false
}

fn strip_raw(answer: &mut DnsAnswer) {
    answer.raw.clear();
    if let Some(hops) = answer.trace.as_mut() {
        for hop in hops {
            hop.raw.clear();
        }
    }
    if let Some(chain) = answer.axfr.as_mut() {
        for zone in chain {
            zone.raw.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AsnSummary;
    use tokio::sync::mpsc::unbounded_channel;

    fn collect(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    fn sample_answer() -> DnsAnswer {
        let mut answer = DnsAnswer::new("a.test");
        answer.a = vec!["192.0.2.1".into(), "192.0.2.2".into()];
        answer.cname = vec!["alias.test".into()];
        answer
    }

    fn plain_options() -> Options {
        Options {
            no_color: true,
            ..Default::default()
        }
    }

    #[test]
    fn plain_mode_emits_host_once_across_types() {
        colored::control::set_override(false);
        let options = plain_options();
        let mut types = QuestionTypeSet::new();
        types.insert(RecordType::A);
        types.insert(RecordType::CNAME);
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &sample_answer(),
            &tx,
        );
        assert_eq!(collect(&mut rx), vec!["a.test"]);
    }

    #[test]
    fn resp_mode_emits_every_record() {
        colored::control::set_override(false);
        let options = Options {
            resp: true,
            ..plain_options()
        };
        let mut types = QuestionTypeSet::new();
        types.insert(RecordType::A);
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &sample_answer(),
            &tx,
        );
        assert_eq!(
            collect(&mut rx),
            vec!["a.test [A] [192.0.2.1]", "a.test [A] [192.0.2.2]"]
        );
    }

    #[test]
    fn resp_only_mode_drops_the_host() {
        colored::control::set_override(false);
        let options = Options {
            resp_only: true,
            ..plain_options()
        };
        let mut types = QuestionTypeSet::new();
        types.insert(RecordType::A);
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &sample_answer(),
            &tx,
        );
        assert_eq!(collect(&mut rx), vec!["192.0.2.1", "192.0.2.2"]);
    }

    #[test]
    fn rcode_mode_prints_the_textual_code() {
        colored::control::set_override(false);
        let options = plain_options();
        let mut types = QuestionTypeSet::new();
        types.insert(RecordType::A);
        let mut answer = DnsAnswer::new("b.test");
        answer.status_code = "NXDOMAIN".into();
        let (tx, mut rx) = unbounded_channel();
        dispatch(&options, &types, &QuestionTypeSet::new(), true, "b.test", &answer, &tx);
        assert_eq!(collect(&mut rx), vec!["b.test [NXDOMAIN]"]);
    }

    #[test]
    fn details_carry_cdn_and_asn() {
        colored::control::set_override(false);
        let options = plain_options();
        let mut types = QuestionTypeSet::new();
        types.insert(RecordType::A);
        let mut answer = sample_answer();
        answer.cdn_name = Some("cloudflare".into());
        answer.asn = Some(AsnSummary {
            as_number: "AS13335".into(),
            as_name: "CLOUDFLARENET".into(),
            as_country: "US".into(),
            as_range: vec!["104.16.0.0/13".into()],
        });
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &answer,
            &tx,
        );
        assert_eq!(
            collect(&mut rx),
            vec!["a.test [cloudflare] [AS13335, CLOUDFLARENET, US]"]
        );
    }

    #[test]
    fn json_mode_serializes_one_object_per_line() {
        let options = Options {
            json: true,
            ..plain_options()
        };
        let types = QuestionTypeSet::new();
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &sample_answer(),
            &tx,
        );
        let lines = collect(&mut rx);
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["host"], "a.test");
        assert_eq!(value["a"][0], "192.0.2.1");
    }

    #[test]
    fn omit_raw_strips_raw_from_json() {
        let options = Options {
            json: true,
            omit_raw: true,
            ..plain_options()
        };
        let types = QuestionTypeSet::new();
        let mut answer = sample_answer();
        answer.raw = "a.test.\t0\tIN\tA\t192.0.2.1\n".into();
        let (tx, mut rx) = unbounded_channel();
        dispatch(
            &options,
            &types,
            &QuestionTypeSet::new(),
            false,
            "a.test",
            &answer,
            &tx,
        );
        let lines = collect(&mut rx);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert!(value.get("raw").is_none());
    }
}

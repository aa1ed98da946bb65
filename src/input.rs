//! Input expansion.
//!
//! Raw input lines come from a file, a stdin scratch copy, or an inline
//! comma-separated argument. Each line is classified and expanded into
//! concrete hostnames: CIDR blocks and ASN identifiers enumerate addresses,
//! `FUZZ` templates and bare-host wordlists cross-product against the
//! wordlist, and everything else passes through as-is. Expanded hosts are
//! lower-cased and deduplicated into the work set.

use std::io::{IsTerminal, Read, Write};
use std::path::Path;

use ipnet::IpNet;
use tempfile::NamedTempFile;

use crate::enrich::AsnClient;
use crate::errors::InputError;
use crate::workset::WorkSet;

/// Placeholder token substituted per wordlist entry.
const FUZZ_TOKEN: &str = "FUZZ";

/// True when standard input is a pipe or file rather than a terminal.
pub fn has_stdin() -> bool {
    !std::io::stdin().is_terminal()
}

/// Copies standard input to a temp file so it can be re-read when both the
/// host list and the wordlist come from stdin.
pub fn copy_stdin_to_tempfile() -> std::io::Result<NamedTempFile> {
    let mut buffer = Vec::new();
    std::io::stdin().read_to_end(&mut buffer)?;
    let mut file = NamedTempFile::new()?;
    file.write_all(&buffer)?;
    file.flush()?;
    Ok(file)
}

/// Reads the non-empty, trimmed lines of a file.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(normalize)
        .filter(|line| !line.is_empty())
        .collect())
}

/// Resolves an argument to its lines: an existing file is read, `-` maps to
/// the stdin copy, anything else is split on commas.
pub fn preprocess_argument(
    arg: &str,
    stdin_copy: Option<&Path>,
) -> Result<Vec<String>, InputError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(InputError::EmptyArgument);
    }
    let path = Path::new(arg);
    if path.is_file() {
        return Ok(read_lines(path)?);
    }
    if arg == "-" {
        let stdin_path = stdin_copy.ok_or(InputError::NotProvided)?;
        return Ok(read_lines(stdin_path)?);
    }
    Ok(arg
        .split(',')
        .map(normalize)
        .filter(|item| !item.is_empty())
        .collect())
}

/// Trims surrounding whitespace. Case is preserved so `FUZZ` templates
/// survive; hosts are lower-cased at emission.
pub fn normalize(line: &str) -> String {
    line.trim().to_string()
}

/// True for CIDR notation, v4 or v6.
pub fn is_cidr(token: &str) -> bool {
    token.parse::<IpNet>().is_ok()
}

/// True for `ASxxxx` tokens, case-insensitive.
pub fn is_asn(token: &str) -> bool {
    token.len() > 2
        && token[..2].eq_ignore_ascii_case("as")
        && token[2..].bytes().all(|b| b.is_ascii_digit())
}

/// Expands one input line, invoking `emit` per concrete host.
pub async fn expand_line<F>(
    line: &str,
    wordlist: Option<&[String]>,
    asn_client: &AsnClient,
    mut emit: F,
) -> Result<(), InputError>
where
    F: FnMut(String),
{
    let item = normalize(line);
    if item.is_empty() {
        return Ok(());
    }

    if item.contains(FUZZ_TOKEN) {
        let words = wordlist.ok_or(InputError::EmptyArgument)?;
        for word in words {
            emit(item.replace(FUZZ_TOKEN, word).to_ascii_lowercase());
        }
        return Ok(());
    }

    if let Some(words) = wordlist {
        // bare host + wordlist means a prefix cross product
        for word in words {
            emit(format!("{}.{}", word.trim(), item).to_ascii_lowercase());
        }
        return Ok(());
    }

    if is_cidr(&item) {
        if let Ok(net) = item.parse::<IpNet>() {
            for address in net.hosts() {
                emit(address.to_string());
            }
        }
        return Ok(());
    }

    if is_asn(&item) {
        let prefixes = asn_client
            .announced_prefixes(&item)
            .await
            .map_err(|e| InputError::Expand(format!("{item}: {e}")))?;
        for net in prefixes {
            for address in net.hosts() {
                emit(address.to_string());
            }
        }
        return Ok(());
    }

    emit(item.to_ascii_lowercase());
    Ok(())
}

/// Expands every line into the work set, returning the number of unique
/// hosts added.
pub async fn expand_into_work_set(
    work_set: &WorkSet,
    lines: &[String],
    wordlist: Option<&[String]>,
    asn_client: &AsnClient,
) -> Result<usize, InputError> {
    let mut unique = 0usize;
    for line in lines {
        expand_line(line, wordlist, asn_client, |host| {
            if work_set.put_if_absent(&host) {
                unique += 1;
            }
        })
        .await?;
    }
    Ok(unique)
}

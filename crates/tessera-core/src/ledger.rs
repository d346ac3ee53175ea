//! Reading the ledger file.
//!
//! The ledger is newline-delimited JSON.  Readers work on raw bytes so that a
//! line with invalid UTF-8 is reported as one malformed record instead of
//! failing the whole read.  Blank lines are skipped but still counted, so
//! line numbers always match what an editor shows.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::AuditEvent,
};

/// One physical line of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub raw: &'a [u8],
}

impl LedgerLine<'_> {
    pub fn is_blank(&self) -> bool {
        self.raw.iter().all(u8::is_ascii_whitespace)
    }

    /// Parse the line as an `AuditEvent`, returning the parser's message on failure.
    pub fn parse(&self) -> Result<AuditEvent, String> {
        let text = std::str::from_utf8(self.raw).map_err(|e| format!("invalid UTF-8: {}", e))?;
        serde_json::from_str(text.trim_end_matches('\r')).map_err(|e| e.to_string())
    }
}

/// A non-blank line together with its parse result.
pub type ParsedLine = (usize, Result<AuditEvent, String>);

/// Read the whole ledger.  A missing file reads as an empty ledger.
pub fn read_ledger(path: &Path) -> LedgerResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(LedgerError::Read {
            reason: format!("failed to read ledger '{}': {}", path.display(), e),
        }),
    }
}

/// Split ledger contents into numbered lines.  A trailing newline does not
/// produce an extra empty line.
pub fn lines(contents: &[u8]) -> impl Iterator<Item = LedgerLine<'_>> {
    let body = contents.strip_suffix(b"\n").unwrap_or(contents);
    let empty = body.is_empty();
    body.split(|b| *b == b'\n')
        .enumerate()
        .filter(move |_| !empty)
        .map(|(idx, raw)| LedgerLine {
            number: idx + 1,
            raw,
        })
}

/// Parse every non-blank line, in file order.
pub fn parse_lines(contents: &[u8]) -> Vec<ParsedLine> {
    lines(contents)
        .filter(|line| !line.is_blank())
        .map(|line| (line.number, line.parse()))
        .collect()
}

/// True if the contents end mid-line, i.e. the last record has no terminator.
pub fn has_unterminated_tail(contents: &[u8]) -> bool {
    !contents.is_empty() && !contents.ends_with(b"\n")
}

/// Walk the ledger and return the stored `current_hash` of the last
/// parseable record.  This is the true tip; the tip cache is only a hint.
pub fn derive_tip(path: &Path) -> LedgerResult<Option<String>> {
    let contents = read_ledger(path)?;
    Ok(parse_lines(&contents)
        .into_iter()
        .filter_map(|(_, parsed)| parsed.ok())
        .last()
        .map(|event| event.current_hash))
}

/// `path` with `suffix` appended to its final component
/// (`ledger.jsonl` + `.tip` = `ledger.jsonl.tip`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

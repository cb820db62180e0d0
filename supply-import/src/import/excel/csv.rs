//! CSV spreadsheets
//!
//! Exports from spreadsheet tools use `,` or `;` (or tabs) depending on the
//! locale, so the delimiter is detected from the first line.

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use super::Record;

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Most frequent candidate delimiter on the first line; `,` when none occur
pub fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, first_line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Every CSV record as trimmed text with its 1-based line number
pub fn csv_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", idx + 1))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        records.push((line, record.iter().map(|f| f.trim().to_string()).collect()));
    }
    Ok(records)
}

//! CSV handling: a text summary for rule extraction, and transaction loading.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Value};

use super::ExtractionError;
use crate::pipeline::types::Transaction;

const SAMPLE_ROWS: usize = 5;
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Guess the delimiter from the first lines: the candidate that occurs the
/// same non-zero number of times on every sampled line wins, the most
/// frequent such candidate first. Falls back to a comma.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(sample);
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_ROWS)
        .collect();
    if lines.is_empty() {
        return b',';
    }

    DELIMITER_CANDIDATES
        .iter()
        .filter_map(|&d| {
            let counts: Vec<usize> = lines
                .iter()
                .map(|l| l.bytes().filter(|&b| b == d).count())
                .collect();
            let first = counts[0];
            (first > 0 && counts.iter().all(|&c| c == first)).then_some((d, first))
        })
        .max_by_key(|&(_, count)| count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes)
}

/// Readable summary of a CSV file: columns plus the first few records.
pub fn summarize_csv(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(ExtractionError::NoTextExtracted);
    }

    let mut text = String::from("CSV Data Summary:\n");
    text.push_str(&format!(
        "Columns: {}\n\n",
        headers.iter().collect::<Vec<_>>().join(", ")
    ));
    text.push_str("Sample Records:\n");
    for record in rdr.records().take(SAMPLE_ROWS) {
        let record = record?;
        text.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
        text.push('\n');
    }
    Ok(text)
}

/// Load every row as a transaction keyed by header.
///
/// Cells stay strings so formatting such as leading zeros survives; empty
/// cells become `null`.
pub fn read_transactions_csv(bytes: &[u8]) -> Result<Vec<Transaction>, ExtractionError> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(to_transaction(&headers, &record));
    }
    tracing::debug!(rows = records.len(), columns = headers.len(), "Parsed transaction CSV");
    Ok(records)
}

fn to_transaction(headers: &StringRecord, record: &StringRecord) -> Transaction {
    let mut map = Map::new();
    for (i, header) in headers.iter().enumerate() {
        let cell = record.get(i).unwrap_or("");
        map.insert(header.to_string(), cell_value(cell));
    }
    map
}

fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

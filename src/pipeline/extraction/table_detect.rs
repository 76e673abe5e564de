use std::sync::LazyLock;

use regex::Regex;

use super::types::ExtractedTable;

/// Consecutive tabular lines needed before a run counts as a table.
const MIN_TABLE_ROWS: usize = 2;

static CELL_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t| {3,}").unwrap());

/// Find tables in the raw (uncleaned) text of one page.
///
/// Each run of at least `MIN_TABLE_ROWS` tabular lines becomes a table.
/// Rows whose cells are all empty and columns that are empty in every row
/// are dropped; a table left with nothing is skipped.
pub fn detect_tables(page_number: usize, text: &str) -> Vec<ExtractedTable> {
    let mut tables = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_tabular_line(line) {
            run.push(line);
            continue;
        }
        flush_run(page_number, &mut run, &mut tables);
    }
    flush_run(page_number, &mut run, &mut tables);
    tables
}

fn flush_run(page_number: usize, run: &mut Vec<&str>, tables: &mut Vec<ExtractedTable>) {
    if run.len() >= MIN_TABLE_ROWS {
        let rows = drop_empty(run.iter().map(|l| split_cells(l)).collect());
        if !rows.is_empty() {
            tables.push(ExtractedTable { page_number, rows });
        }
    }
    run.clear();
}

/// Text block listing every table, or a fixed note when there are none.
pub fn render_tables(tables: &[ExtractedTable]) -> String {
    if tables.is_empty() {
        return "No relevant tables found.".to_string();
    }
    tables
        .iter()
        .map(ExtractedTable::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Heuristic: a line looks tabular if it has multiple columns separated by
/// tabs, pipes, or consistent multi-space gaps.
///
/// Patterns detected:
/// - Tab-separated: "Field\tType\tFormat"
/// - Pipe-separated: "Field | Type | Format"
/// - Multi-space aligned: "Amount    numeric    USD"
fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 5 {
        return false;
    }

    trimmed.matches('\t').count() >= 2
        || trimmed.matches('|').count() >= 2
        || count_multi_space_gaps(trimmed) >= 2
}

/// Count runs of 3+ consecutive spaces that separate non-empty text segments.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut gap_len = 0;

    for ch in text.chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len == 3 {
                count += 1;
            }
        } else {
            gap_len = 0;
        }
    }

    count
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    if trimmed.matches('|').count() >= 2 {
        let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let inner = inner.strip_suffix('|').unwrap_or(inner);
        return inner.split('|').map(|c| c.trim().to_string()).collect();
    }
    CELL_GAP
        .split(trimmed)
        .map(|c| c.trim().to_string())
        .collect()
}

fn drop_empty(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    let keep: Vec<bool> = (0..width)
        .map(|col| rows.iter().any(|row| !row[col].is_empty()))
        .collect();

    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter_map(|(cell, &k)| k.then_some(cell))
                .collect()
        })
        .collect()
}

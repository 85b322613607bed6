use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::model::CsvEntry;

/// Reads `name[,prefix[,postfix]]` records, one per line. Lines are trimmed
/// and blank lines skipped; any commas past the second belong to the postfix.
pub fn read_entries(path: &Path) -> Result<Vec<CsvEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read CSV: {}", path.display()))?;
    Ok(parse_entries(&content))
}

pub fn parse_entries(content: &str) -> Vec<CsvEntry> {
    content
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> CsvEntry {
    let mut columns = line.splitn(3, ',').map(str::trim);
    let name = columns.next().unwrap_or_default().to_string();
    let optional = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);
    CsvEntry {
        name,
        prefix: optional(columns.next()),
        postfix: optional(columns.next()),
    }
}

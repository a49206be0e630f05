use std::path::{Path, PathBuf};

use harvest_logging::harvest_info;
use harvester_core::{Report, ReportEntry};

use crate::persist::{write_atomic, PersistError};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub report_filename: String,
    /// Flat table of records; `None` skips it.
    pub table_filename: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            report_filename: "report.json".to_string(),
            table_filename: Some("records.csv".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    pub failure_count: usize,
    pub report_path: PathBuf,
    pub table_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

const TABLE_HEADER: [&str; 11] = [
    "source",
    "item_id",
    "title",
    "date",
    "time",
    "location",
    "description",
    "url",
    "media_url",
    "published_at",
    "metrics",
];

/// Atomically writes the report as JSON and, unless disabled, the records as
/// CSV into `output_dir`.
pub fn write_report(
    report: &Report,
    output_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let json = serde_json::to_vec_pretty(report)?;
    let report_path = write_atomic(output_dir, &options.report_filename, &json)?;

    let table_path = match &options.table_filename {
        Some(name) => {
            let table = records_table(report);
            Some(write_atomic(output_dir, name, table.as_bytes())?)
        }
        None => None,
    };

    harvest_info!(
        "Exported {} records and {} failures to {}",
        report.entries.len(),
        report.failures.len(),
        output_dir.display()
    );

    Ok(ExportSummary {
        record_count: report.entries.len(),
        failure_count: report.failures.len(),
        report_path,
        table_path,
    })
}

/// One CSV row per report entry, header first.
pub fn records_table(report: &Report) -> String {
    let mut out = String::new();
    push_row(&mut out, TABLE_HEADER.iter().map(|s| s.to_string()));
    for entry in &report.entries {
        push_row(&mut out, entry_row(entry));
    }
    out
}

fn entry_row(entry: &ReportEntry) -> impl Iterator<Item = String> {
    let record = &entry.record;
    let field = |name: &str| record.field(name).unwrap_or_default().to_string();
    let metrics = record
        .metrics
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(";");

    [
        entry.source.to_string(),
        record.item_id.clone(),
        record.title.clone(),
        field("date"),
        field("time"),
        field("location"),
        record.body.clone(),
        record.url.clone().unwrap_or_default(),
        record.media_url.clone().unwrap_or_default(),
        record
            .published_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default(),
        metrics,
    ]
    .into_iter()
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let row = cells.map(|cell| escape_cell(&cell)).collect::<Vec<_>>();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_with_separators_are_quoted() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("a,b"), "\"a,b\"");
        assert_eq!(escape_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_cell("two\nlines"), "\"two\nlines\"");
    }
}

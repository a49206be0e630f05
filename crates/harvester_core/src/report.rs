use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Cursor, FailureKind, HarvestResult, ItemReference, Record, SourceError, SourceId, SourceStatus,
};

/// Bucket label used for records without a publication time.
pub const UNDATED_BUCKET: &str = "undated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: SourceId,
    pub status: SourceStatus,
    pub record_count: usize,
    pub new_records: usize,
    pub discovery_calls: u32,
    pub pages_merged: u32,
    pub failed_items: usize,
    pub budget_exhausted: bool,
    pub cursor: Option<Cursor>,
    pub errors: Vec<SourceError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub source: SourceId,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub source: SourceId,
    pub item: ItemReference,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Outcome of one harvest run across all sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub cancelled: bool,
    pub total_records: usize,
    pub sources: Vec<SourceSummary>,
    pub entries: Vec<ReportEntry>,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketGranularity {
    Day,
    Month,
}

/// Collects per-source results, given in source order, into one report.
///
/// Records of failed sources are left out of `entries`; their summaries and
/// errors are still listed.
pub fn aggregate(results: Vec<HarvestResult>, generated_at: DateTime<Utc>, cancelled: bool) -> Report {
    let mut sources = Vec::with_capacity(results.len());
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        sources.push(SourceSummary {
            source: result.source.clone(),
            status: result.status,
            record_count: result.batch.len(),
            new_records: result.new_records,
            discovery_calls: result.discovery_calls,
            pages_merged: result.pages_merged,
            failed_items: result.item_failures.len(),
            budget_exhausted: result.budget_exhausted,
            cursor: result.batch.cursor.clone(),
            errors: result.errors,
        });

        failures.extend(result.item_failures.into_iter().map(|failure| FailureEntry {
            source: result.source.clone(),
            item: failure.item,
            kind: failure.kind,
            message: failure.message,
            attempts: failure.attempts,
        }));

        if result.status != SourceStatus::Failed {
            entries.extend(result.batch.records.into_iter().map(|record| ReportEntry {
                source: result.source.clone(),
                record,
            }));
        }
    }

    Report {
        generated_at,
        cancelled,
        total_records: entries.len(),
        sources,
        entries,
        failures,
    }
}

impl Report {
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn summary(&self, source: &SourceId) -> Option<&SourceSummary> {
        self.sources.iter().find(|s| &s.source == source)
    }

    pub fn count_by_status(&self, status: SourceStatus) -> usize {
        self.sources.iter().filter(|s| s.status == status).count()
    }

    /// Record counts per publication day or month. Derived view only.
    pub fn time_buckets(&self, granularity: BucketGranularity) -> BTreeMap<String, usize> {
        let mut buckets = BTreeMap::new();
        for record in self.records() {
            let key = match (record.published_at, granularity) {
                (Some(at), BucketGranularity::Day) => at.format("%Y-%m-%d").to_string(),
                (Some(at), BucketGranularity::Month) => at.format("%Y-%m").to_string(),
                (None, _) => UNDATED_BUCKET.to_string(),
            };
            *buckets.entry(key).or_insert(0) += 1;
        }
        buckets
    }

    /// Earliest and latest publication time among the records.
    pub fn period(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut dates = self.records().filter_map(|r| r.published_at);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), at| (lo.min(at), hi.max(at))))
    }
}

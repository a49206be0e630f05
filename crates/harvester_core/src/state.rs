use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Batch, FailureKind, ItemReference, RunSettings, SourceId};

/// Lifecycle of one source within a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePhase {
    #[default]
    Pending,
    Discovering,
    FetchingDetails,
    Merging,
    Done,
    Failed,
}

impl SourcePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SourcePhase::Done | SourcePhase::Failed)
    }
}

/// Final status reported for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    Done,
    DoneWithPartialFailures,
    Failed,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Done => "done",
            SourceStatus::DoneWithPartialFailures => "done-with-partial-failures",
            SourceStatus::Failed => "failed",
        }
    }
}

/// One item whose detail could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: ItemReference,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceErrorKind {
    Discovery,
    Persistence,
    Cancelled,
    Config,
    Internal,
}

/// A problem with the source as a whole rather than a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            failure: None,
            message: message.into(),
        }
    }
}

/// Per-source outcome handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestResult {
    pub source: SourceId,
    pub status: SourceStatus,
    pub batch: Batch,
    pub discovery_calls: u32,
    pub pages_merged: u32,
    pub new_records: usize,
    pub budget_exhausted: bool,
    pub item_failures: Vec<ItemFailure>,
    pub errors: Vec<SourceError>,
}

impl HarvestResult {
    /// A source that never got going (missing driver, crashed task).
    pub fn failed(source: SourceId, error: SourceError, at: DateTime<Utc>) -> Self {
        Self {
            batch: Batch::empty(source.clone(), at),
            source,
            status: SourceStatus::Failed,
            discovery_calls: 0,
            pages_merged: 0,
            new_records: 0,
            budget_exhausted: false,
            item_failures: Vec::new(),
            errors: vec![error],
        }
    }
}

/// Pagination and merge state of one source. Mutated only through
/// [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRun {
    pub(crate) source: SourceId,
    pub(crate) phase: SourcePhase,
    pub(crate) batch: Batch,
    pub(crate) budget: u32,
    pub(crate) max_attempts: u32,
    pub(crate) discovery_calls: u32,
    pub(crate) pages_discovered: u32,
    pub(crate) pages_merged: u32,
    pub(crate) new_records: usize,
    pub(crate) pending_cursor: Option<crate::Cursor>,
    pub(crate) last_page_empty: bool,
    pub(crate) budget_exhausted: bool,
    pub(crate) cancel_requested: bool,
    pub(crate) item_failures: Vec<ItemFailure>,
    pub(crate) errors: Vec<SourceError>,
}

impl SourceRun {
    pub fn new(source: SourceId, settings: &RunSettings, at: DateTime<Utc>) -> Self {
        Self {
            batch: Batch::empty(source.clone(), at),
            source,
            phase: SourcePhase::Pending,
            budget: settings.request_budget,
            max_attempts: settings.retry.max_attempts.max(1),
            discovery_calls: 0,
            pages_discovered: 0,
            pages_merged: 0,
            new_records: 0,
            pending_cursor: None,
            last_page_empty: false,
            budget_exhausted: false,
            cancel_requested: false,
            item_failures: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn phase(&self) -> SourcePhase {
        self.phase
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn discovery_calls(&self) -> u32 {
        self.discovery_calls
    }

    pub fn pages_merged(&self) -> u32 {
        self.pages_merged
    }

    pub fn item_failures(&self) -> &[ItemFailure] {
        &self.item_failures
    }

    pub fn errors(&self) -> &[SourceError] {
        &self.errors
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn status(&self) -> SourceStatus {
        if self.phase == SourcePhase::Failed {
            SourceStatus::Failed
        } else if self.item_failures.is_empty() && self.errors.is_empty() {
            SourceStatus::Done
        } else {
            SourceStatus::DoneWithPartialFailures
        }
    }

    pub fn into_result(self) -> HarvestResult {
        let status = self.status();
        HarvestResult {
            source: self.source,
            status,
            batch: self.batch,
            discovery_calls: self.discovery_calls,
            pages_merged: self.pages_merged,
            new_records: self.new_records,
            budget_exhausted: self.budget_exhausted,
            item_failures: self.item_failures,
            errors: self.errors,
        }
    }
}

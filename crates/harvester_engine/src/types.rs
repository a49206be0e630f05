use harvester_core::{FailureKind, ItemReference, SourceId, SourceStatus};

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    SourceStarted {
        source: SourceId,
        resumed: bool,
    },
    PageMerged {
        source: SourceId,
        page: u32,
        new_records: usize,
        total_records: usize,
    },
    ItemFailed {
        source: SourceId,
        item: ItemReference,
        kind: FailureKind,
        message: String,
    },
    SourceFinished {
        source: SourceId,
        status: SourceStatus,
        records: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}

/// Forwards events to a tokio channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: tokio::sync::mpsc::UnboundedSender<HarvestEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<HarvestEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }
}

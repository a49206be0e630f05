//! Harvester core: domain model, per-source state machine and report aggregation.
mod batch;
mod config;
mod effect;
mod error;
mod model;
mod msg;
mod report;
mod retry;
mod state;
mod update;

pub use batch::{Batch, MergeOutcome};
pub use config::{validate_source, HarvestConfig, RunSettings, MAX_PAGE_SIZE, MIN_API_PAGE_SIZE};
pub use effect::SourceEffect;
pub use error::{Classified, ConfigError, DiscoveryError, FailureKind, FetchError};
pub use model::{Cursor, DiscoveryMode, ItemReference, Record, Source, SourceId, SourceTarget};
pub use msg::{ItemOutcome, SourceMsg};
pub use report::{
    aggregate, BucketGranularity, FailureEntry, Report, ReportEntry, SourceSummary,
    UNDATED_BUCKET,
};
pub use retry::RetryPolicy;
pub use state::{
    HarvestResult, ItemFailure, SourceError, SourceErrorKind, SourcePhase, SourceRun,
    SourceStatus,
};
pub use update::update;

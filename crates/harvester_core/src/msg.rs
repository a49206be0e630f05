use chrono::{DateTime, Utc};

use crate::{Batch, Cursor, DiscoveryError, ItemFailure, ItemReference, Record};

/// Result of fetching one discovered item.
pub type ItemOutcome = Result<Record, ItemFailure>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMsg {
    /// Begin the source, optionally resuming from a cached batch.
    Start { cached: Option<Batch> },
    /// A discovery call returned a page. `attempts` counts retries too.
    PageDiscovered {
        items: Vec<ItemReference>,
        next_cursor: Option<Cursor>,
        attempts: u32,
    },
    /// A discovery call gave up after `attempts` tries.
    DiscoveryFailed { error: DiscoveryError, attempts: u32 },
    /// Every item of the current page resolved, in discovery order.
    DetailsFetched {
        outcomes: Vec<ItemOutcome>,
        fetched_at: DateTime<Utc>,
    },
    /// The batch emitted by the last `Persist` effect reached the cache.
    Persisted,
    /// The batch could not be written; the cached cursor was not advanced.
    PersistFailed { message: String },
    /// External cancellation observed instead of issuing a discovery call.
    /// `attempts` counts discovery calls already made for the current page.
    Cancelled { attempts: u32 },
}

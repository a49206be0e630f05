use async_trait::async_trait;
use harvester_core::{Cursor, DiscoveryError, FetchError, ItemReference, Record, Source};

/// One discovery call: the cursor to resume from and the page size to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub page_size: u32,
}

/// Items of one page, in discovery order, and the cursor of the next page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveredPage {
    pub items: Vec<ItemReference>,
    pub next_cursor: Option<Cursor>,
}

/// Produces item references for a source, one page per call.
///
/// Static pages ignore the cursor and never return one; paginated APIs thread
/// it across calls.
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(
        &self,
        source: &Source,
        request: &PageRequest,
    ) -> Result<DiscoveredPage, DiscoveryError>;
}

/// Resolves one item reference into a record.
///
/// Implementations apply their own network timeout and never retry; the
/// coordinator owns retry policy.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, item: &ItemReference) -> Result<Record, FetchError>;
}

//! Harvester engine: HTTP discovery and detail fetching, the cache store and
//! the coordinator that executes the core state machine's effects.
mod cache;
mod calendar;
mod coordinator;
mod decode;
mod detail;
mod discover;
mod export;
mod http;
mod persist;
mod retry;
mod timeline;
mod types;

pub use cache::{cache_filename, CacheStore, JsonCacheStore};
pub use calendar::{extract_item_links, CalendarDiscoverer, LinkFilter};
pub use coordinator::HarvestCoordinator;
pub use decode::decode_html;
pub use detail::{parse_event_page, EventPageFetcher};
pub use discover::{DetailFetcher, DiscoveredPage, Discoverer, PageRequest};
pub use export::{records_table, write_report, ExportError, ExportOptions, ExportSummary};
pub use http::{classify_status, FetchedBody, HttpClient, HttpSettings};
pub use persist::{ensure_dir, write_atomic, PersistError};
pub use retry::{run_with_retry, run_with_retry_until_cancelled, RetryOutcome};
pub use timeline::{clamp_page_size, ApiSettings, PostFetcher, TimelineDiscoverer};
pub use types::{ChannelProgressSink, HarvestEvent, NullProgressSink, ProgressSink};

use crate::{Batch, Cursor, ItemReference, SourceStatus};

/// Work the coordinator must perform on behalf of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEffect {
    /// Request the page at `cursor`. `pace` asks for the inter-request delay
    /// first; `max_attempts` never exceeds the remaining request budget.
    Discover {
        cursor: Option<Cursor>,
        pace: bool,
        max_attempts: u32,
    },
    FetchDetails { items: Vec<ItemReference> },
    Persist { batch: Batch },
    Finish { status: SourceStatus },
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Cursor, Record, SourceId};

/// Accumulated records of one source plus the cursor to resume from.
///
/// This is the unit persisted by the cache store; a save replaces the
/// previous batch of the same source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub source: SourceId,
    pub records: Vec<Record>,
    pub cursor: Option<Cursor>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub cursor_changed: bool,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.cursor_changed
    }
}

impl Batch {
    pub fn empty(source: SourceId, at: DateTime<Utc>) -> Self {
        Self {
            source,
            records: Vec::new(),
            cursor: None,
            fetched_at: at,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.records.iter().any(|r| r.item_id == item_id)
    }

    /// Appends `records` that are not already present (by item id, first
    /// occurrence wins) and moves the cursor to `next_cursor`.
    ///
    /// `fetched_at` only advances when something changed, so merging a page
    /// that holds nothing new leaves the batch identical.
    pub fn absorb(
        &mut self,
        records: Vec<Record>,
        next_cursor: Option<Cursor>,
        at: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut seen: HashSet<String> = self.records.iter().map(|r| r.item_id.clone()).collect();
        let mut outcome = MergeOutcome::default();

        for record in records {
            if seen.insert(record.item_id.clone()) {
                self.records.push(record);
                outcome.added += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        if self.cursor != next_cursor {
            self.cursor = next_cursor;
            outcome.cursor_changed = true;
        }
        if outcome.changed() {
            self.fetched_at = at;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 20, hour, 0, 0).unwrap()
    }

    fn record(id: &str) -> Record {
        Record::new(id, format!("title {id}"), at(1))
    }

    #[test]
    fn absorb_skips_known_items_and_keeps_order() {
        let mut batch = Batch::empty(SourceId::new("s"), at(0));
        let first = batch.absorb(vec![record("a"), record("b")], Some(Cursor::new("c1")), at(1));
        assert_eq!(first.added, 2);

        let second = batch.absorb(vec![record("b"), record("c"), record("c")], None, at(2));
        assert_eq!(second.added, 1);
        assert_eq!(second.duplicates, 2);
        let ids: Vec<_> = batch.records.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(batch.cursor, None);
        assert_eq!(batch.fetched_at, at(2));
    }

    #[test]
    fn unchanged_merge_keeps_timestamp() {
        let mut batch = Batch::empty(SourceId::new("s"), at(0));
        batch.absorb(vec![record("a")], None, at(1));
        let snapshot = batch.clone();

        let outcome = batch.absorb(vec![record("a")], None, at(5));
        assert!(!outcome.changed());
        assert_eq!(batch, snapshot);
    }
}

use crate::{
    SourceEffect, SourceError, SourceErrorKind, SourceMsg, SourcePhase, SourceRun, SourceStatus,
};

/// Pure update function: applies a message to a source run and returns the
/// effects the coordinator has to execute next.
///
/// Messages that do not fit the current phase are ignored.
pub fn update(mut run: SourceRun, msg: SourceMsg) -> (SourceRun, Vec<SourceEffect>) {
    if run.is_finished() {
        return (run, Vec::new());
    }

    let effects = match msg {
        SourceMsg::Start { cached } => {
            if run.phase != SourcePhase::Pending {
                return (run, Vec::new());
            }
            if let Some(batch) = cached.filter(|b| b.source == run.source) {
                run.batch = batch;
            }
            run.phase = SourcePhase::Discovering;
            request_page(&mut run, false)
        }
        SourceMsg::PageDiscovered {
            items,
            next_cursor,
            attempts,
        } => {
            if run.phase != SourcePhase::Discovering {
                return (run, Vec::new());
            }
            run.discovery_calls += attempts;
            run.pages_discovered += 1;
            run.last_page_empty = items.is_empty();
            run.pending_cursor = next_cursor;
            run.phase = SourcePhase::FetchingDetails;
            vec![SourceEffect::FetchDetails { items }]
        }
        SourceMsg::DiscoveryFailed { error, attempts } => {
            if run.phase != SourcePhase::Discovering {
                return (run, Vec::new());
            }
            run.discovery_calls += attempts;
            run.errors.push(SourceError {
                kind: SourceErrorKind::Discovery,
                failure: Some(error.kind),
                message: error.message,
            });
            if run.pages_discovered == 0 {
                run.phase = SourcePhase::Failed;
                vec![SourceEffect::Finish {
                    status: SourceStatus::Failed,
                }]
            } else {
                finish(&mut run)
            }
        }
        SourceMsg::DetailsFetched {
            outcomes,
            fetched_at,
        } => {
            if run.phase != SourcePhase::FetchingDetails {
                return (run, Vec::new());
            }
            run.phase = SourcePhase::Merging;
            let mut records = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                match outcome {
                    Ok(record) => records.push(record),
                    Err(failure) => run.item_failures.push(failure),
                }
            }
            let next_cursor = run.pending_cursor.take();
            let merged = run.batch.absorb(records, next_cursor, fetched_at);
            run.new_records += merged.added;
            if merged.changed() {
                vec![SourceEffect::Persist {
                    batch: run.batch.clone(),
                }]
            } else {
                // Nothing new to write; the cached batch is already current.
                after_merge(&mut run)
            }
        }
        SourceMsg::Persisted => {
            if run.phase != SourcePhase::Merging {
                return (run, Vec::new());
            }
            after_merge(&mut run)
        }
        SourceMsg::PersistFailed { message } => {
            if run.phase != SourcePhase::Merging {
                return (run, Vec::new());
            }
            run.errors
                .push(SourceError::new(SourceErrorKind::Persistence, message));
            finish(&mut run)
        }
        SourceMsg::Cancelled { attempts } => {
            run.cancel_requested = true;
            if run.phase == SourcePhase::Discovering {
                run.discovery_calls += attempts;
            }
            match run.phase {
                SourcePhase::Pending | SourcePhase::Discovering => {
                    run.errors.push(SourceError::new(
                        SourceErrorKind::Cancelled,
                        "harvest cancelled before pagination finished",
                    ));
                    finish(&mut run)
                }
                _ => Vec::new(),
            }
        }
    };

    (run, effects)
}

fn after_merge(run: &mut SourceRun) -> Vec<SourceEffect> {
    run.pages_merged += 1;
    if run.last_page_empty || run.batch.cursor.is_none() {
        return finish(run);
    }
    run.phase = SourcePhase::Discovering;
    request_page(run, true)
}

fn request_page(run: &mut SourceRun, pace: bool) -> Vec<SourceEffect> {
    if run.cancel_requested {
        run.errors.push(SourceError::new(
            SourceErrorKind::Cancelled,
            "harvest cancelled before pagination finished",
        ));
        return finish(run);
    }
    let remaining = run.budget.saturating_sub(run.discovery_calls);
    if remaining == 0 {
        run.budget_exhausted = true;
        return finish(run);
    }
    vec![SourceEffect::Discover {
        cursor: run.batch.cursor.clone(),
        pace,
        max_attempts: run.max_attempts.min(remaining),
    }]
}

fn finish(run: &mut SourceRun) -> Vec<SourceEffect> {
    run.phase = SourcePhase::Done;
    vec![SourceEffect::Finish {
        status: run.status(),
    }]
}

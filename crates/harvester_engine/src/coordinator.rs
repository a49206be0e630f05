use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use harvest_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn};
use harvester_core::{
    aggregate, update, Cursor, DiscoveryMode, FetchError, HarvestResult, ItemFailure,
    ItemOutcome, ItemReference, Report, RunSettings, Source, SourceEffect, SourceError,
    SourceErrorKind, SourceMsg, SourceRun,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::discover::{DetailFetcher, Discoverer, PageRequest};
use crate::retry::{run_with_retry, run_with_retry_until_cancelled, RetryOutcome};
use crate::types::{HarvestEvent, NullProgressSink, ProgressSink};

/// Discoverer and fetcher pair serving one discovery mode.
#[derive(Clone)]
struct Driver {
    discoverer: Arc<dyn Discoverer>,
    fetcher: Arc<dyn DetailFetcher>,
}

/// Runs every source of a harvest concurrently and aggregates the results.
///
/// Sources are bounded by `max_concurrent_sources`; detail fetches of all
/// sources share one pool of `worker_pool_size` permits.
pub struct HarvestCoordinator {
    settings: RunSettings,
    cache: Arc<dyn CacheStore>,
    drivers: HashMap<DiscoveryMode, Driver>,
    progress: Arc<dyn ProgressSink>,
}

impl HarvestCoordinator {
    pub fn new(settings: RunSettings, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            settings,
            cache,
            drivers: HashMap::new(),
            progress: Arc::new(NullProgressSink),
        }
    }

    pub fn with_driver(
        mut self,
        mode: DiscoveryMode,
        discoverer: Arc<dyn Discoverer>,
        fetcher: Arc<dyn DetailFetcher>,
    ) -> Self {
        self.drivers.insert(
            mode,
            Driver {
                discoverer,
                fetcher,
            },
        );
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Harvests `sources` and returns the report, in source order.
    ///
    /// Cancelling `cancel` stops new discovery calls; work already merged is
    /// persisted and the report is marked as cancelled.
    pub async fn run(&self, sources: Vec<Source>, cancel: CancellationToken) -> Report {
        let source_slots = Arc::new(Semaphore::new(self.settings.max_concurrent_sources.max(1)));
        let fetch_pool = Arc::new(Semaphore::new(self.settings.worker_pool_size.max(1)));
        harvest_info!(
            "Harvesting {} sources ({} at a time, {} fetch workers)",
            sources.len(),
            self.settings.max_concurrent_sources,
            self.settings.worker_pool_size
        );

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let id = source.id.clone();
            let Some(driver) = self.drivers.get(&source.mode()).cloned() else {
                harvest_error!("No driver registered for {:?} (source {})", source.mode(), id);
                handles.push((id.clone(), None));
                continue;
            };
            let task = SourceTask {
                source,
                driver,
                settings: self.settings,
                cache: self.cache.clone(),
                progress: self.progress.clone(),
                fetch_pool: fetch_pool.clone(),
                cancel: cancel.clone(),
            };
            let slots = source_slots.clone();
            let handle = tokio::spawn(async move {
                let Ok(_slot) = slots.acquire_owned().await else {
                    harvest_error!("Source pool closed before {} could start", task.source.id);
                    return HarvestResult::failed(
                        task.source.id,
                        SourceError::new(SourceErrorKind::Internal, "source pool closed"),
                        Utc::now(),
                    );
                };
                task.run().await
            });
            handles.push((id, Some(handle)));
        }

        let mut results: Vec<HarvestResult> = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = match handle {
                None => HarvestResult::failed(
                    id,
                    SourceError::new(
                        SourceErrorKind::Config,
                        "no discoverer registered for this source type",
                    ),
                    Utc::now(),
                ),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(err) => {
                        harvest_error!("Harvest task for {} crashed: {}", id, err);
                        HarvestResult::failed(
                            id,
                            SourceError::new(SourceErrorKind::Internal, err.to_string()),
                            Utc::now(),
                        )
                    }
                },
            };
            results.push(result);
        }

        let cancelled = cancel.is_cancelled();
        let report = aggregate(results, Utc::now(), cancelled);
        harvest_info!(
            "Harvest finished: {} records from {} sources{}",
            report.total_records,
            report.sources.len(),
            if cancelled { " (cancelled)" } else { "" }
        );
        report
    }
}

/// Everything one source needs while running on its own task.
struct SourceTask {
    source: Source,
    driver: Driver,
    settings: RunSettings,
    cache: Arc<dyn CacheStore>,
    progress: Arc<dyn ProgressSink>,
    fetch_pool: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl SourceTask {
    async fn run(self) -> HarvestResult {
        let id = self.source.id.clone();
        let cached = if self.settings.use_cache {
            match self.cache.load(&id) {
                Ok(batch) => batch,
                Err(err) => {
                    harvest_warn!("Ignoring cached batch of {}: {}", id, err);
                    None
                }
            }
        } else {
            None
        };
        if let Some(batch) = &cached {
            harvest_info!(
                "Resuming {} with {} cached records (cursor: {})",
                id,
                batch.len(),
                batch.cursor.as_ref().map(Cursor::as_str).unwrap_or("none")
            );
        }
        self.progress.emit(HarvestEvent::SourceStarted {
            source: id.clone(),
            resumed: cached.is_some(),
        });

        let mut run = SourceRun::new(id.clone(), &self.settings, Utc::now());
        let mut merged_records = cached.as_ref().map_or(0, |batch| batch.len());
        let mut inbox = VecDeque::from([SourceMsg::Start { cached }]);

        while let Some(msg) = inbox.pop_front() {
            let pages_before = run.pages_merged();
            let (next, effects) = update(run, msg);
            run = next;

            if run.pages_merged() > pages_before {
                let total_records = run.batch().len();
                self.progress.emit(HarvestEvent::PageMerged {
                    source: id.clone(),
                    page: run.pages_merged(),
                    new_records: total_records.saturating_sub(merged_records),
                    total_records,
                });
                merged_records = total_records;
            }

            for effect in effects {
                match effect {
                    SourceEffect::Discover {
                        cursor,
                        pace,
                        max_attempts,
                    } => inbox.push_back(self.discover(cursor, pace, max_attempts).await),
                    SourceEffect::FetchDetails { items } => {
                        inbox.push_back(self.fetch_details(items).await)
                    }
                    SourceEffect::Persist { batch } => match self.cache.save(&id, &batch) {
                        Ok(()) => inbox.push_back(SourceMsg::Persisted),
                        Err(err) => {
                            harvest_warn!("Could not persist batch of {}: {}", id, err);
                            inbox.push_back(SourceMsg::PersistFailed {
                                message: err.to_string(),
                            });
                        }
                    },
                    SourceEffect::Finish { status } => {
                        harvest_info!(
                            "Source {} finished: {} ({} records, {} discovery calls)",
                            id,
                            status.as_str(),
                            run.batch().len(),
                            run.discovery_calls()
                        );
                        self.progress.emit(HarvestEvent::SourceFinished {
                            source: id.clone(),
                            status,
                            records: run.batch().len(),
                        });
                    }
                }
            }
        }

        run.into_result()
    }

    async fn discover(&self, cursor: Option<Cursor>, pace: bool, max_attempts: u32) -> SourceMsg {
        let delay = self.settings.inter_request_delay;
        if pace && !delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return SourceMsg::Cancelled { attempts: 0 },
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.cancel.is_cancelled() {
            return SourceMsg::Cancelled { attempts: 0 };
        }

        let request = PageRequest {
            cursor,
            page_size: self.settings.page_size,
        };
        let source = &self.source;
        let request_ref = &request;
        let discoverer = self.driver.discoverer.as_ref();
        let outcome = run_with_retry_until_cancelled(
            &self.settings.retry,
            max_attempts,
            &self.cancel,
            move |attempt| {
                harvest_debug!(
                    "Discovering {} (cursor: {}, attempt {})",
                    source.id,
                    request_ref.cursor.as_ref().map(Cursor::as_str).unwrap_or("none"),
                    attempt
                );
                discoverer.discover(source, request_ref)
            },
        )
        .await;
        let (result, attempts) = match outcome {
            RetryOutcome::Finished { result, attempts } => (result, attempts),
            RetryOutcome::Cancelled { attempts } => {
                harvest_info!(
                    "Discovery of {} cancelled after {} attempts",
                    self.source.id,
                    attempts
                );
                return SourceMsg::Cancelled { attempts };
            }
        };

        match result {
            Ok(page) => SourceMsg::PageDiscovered {
                items: page.items,
                next_cursor: page.next_cursor,
                attempts,
            },
            Err(error) => {
                harvest_warn!(
                    "Discovery of {} failed after {} attempts: {}",
                    self.source.id,
                    attempts,
                    error
                );
                SourceMsg::DiscoveryFailed { error, attempts }
            }
        }
    }

    async fn fetch_details(&self, items: Vec<ItemReference>) -> SourceMsg {
        let outcomes: Vec<ItemOutcome> =
            join_all(items.into_iter().map(|item| self.fetch_item(item))).await;
        SourceMsg::DetailsFetched {
            outcomes,
            fetched_at: Utc::now(),
        }
    }

    async fn fetch_item(&self, item: ItemReference) -> ItemOutcome {
        let fetcher = self.driver.fetcher.as_ref();
        let pool = self.fetch_pool.as_ref();
        let item_ref = &item;
        let (result, attempts) = run_with_retry(
            &self.settings.retry,
            self.settings.retry.max_attempts,
            move |_| async move {
                // One permit per attempt; backoff sleeps do not hold a worker.
                let _permit = pool
                    .acquire()
                    .await
                    .map_err(|_| FetchError::transient("fetch pool closed"))?;
                fetcher.fetch(item_ref).await
            },
        )
        .await;

        match result {
            Ok(record) => Ok(record),
            Err(err) => {
                harvest_warn!(
                    "Item {} of {} failed ({}) after {} attempts: {}",
                    item.locator,
                    self.source.id,
                    err.kind,
                    attempts,
                    err.message
                );
                self.progress.emit(HarvestEvent::ItemFailed {
                    source: self.source.id.clone(),
                    item: item.clone(),
                    kind: err.kind,
                    message: err.message.clone(),
                });
                Err(ItemFailure {
                    item,
                    kind: err.kind,
                    message: err.message,
                    attempts,
                })
            }
        }
    }
}

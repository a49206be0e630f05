use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use harvester_engine::{HarvestEvent, ProgressSink};

/// Reports harvest progress through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::SourceStarted { source, resumed } => {
                if resumed {
                    harvest_info!("[{}] resuming from cache", source);
                } else {
                    harvest_info!("[{}] starting", source);
                }
            }
            HarvestEvent::PageMerged {
                source,
                page,
                new_records,
                total_records,
            } => harvest_debug!(
                "[{}] page {} merged: {} new, {} total",
                source,
                page,
                new_records,
                total_records
            ),
            HarvestEvent::ItemFailed {
                source,
                item,
                kind,
                message,
            } => harvest_warn!("[{}] {} failed ({}): {}", source, item.locator, kind, message),
            HarvestEvent::SourceFinished {
                source,
                status,
                records,
            } => harvest_info!("[{}] {} with {} records", source, status.as_str(), records),
        }
    }
}

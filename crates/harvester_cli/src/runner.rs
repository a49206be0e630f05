use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use harvest_logging::{harvest_info, harvest_warn};
use harvester_core::{
    BucketGranularity, DiscoveryMode, HarvestConfig, Report, SourceStatus, SourceTarget,
};
use harvester_engine::{
    ApiSettings, CacheStore, CalendarDiscoverer, EventPageFetcher, ExportOptions, ExportSummary,
    HarvestCoordinator, HttpClient, HttpSettings, JsonCacheStore, PostFetcher, TimelineDiscoverer,
    write_report,
};
use tokio_util::sync::CancellationToken;

use crate::progress::LogProgressSink;

/// Builds the coordinator with both drivers sharing one HTTP client.
pub fn build_coordinator(
    config: &HarvestConfig,
    api_token: Option<String>,
) -> Result<HarvestCoordinator> {
    let http = HttpClient::new(HttpSettings::from(config)).context("building HTTP client")?;
    let api = ApiSettings::new(config.api_base_url.clone(), api_token);
    let cache = Arc::new(JsonCacheStore::new(config.cache_dir.clone()));

    Ok(HarvestCoordinator::new(config.run_settings(), cache)
        .with_driver(
            DiscoveryMode::StaticPage,
            Arc::new(CalendarDiscoverer::new(http.clone())),
            Arc::new(EventPageFetcher::new(http.clone())),
        )
        .with_driver(
            DiscoveryMode::PaginatedApi,
            Arc::new(TimelineDiscoverer::new(http.clone(), api.clone())),
            Arc::new(PostFetcher::new(http, api)),
        )
        .with_progress(Arc::new(LogProgressSink)))
}

/// Runs a full harvest, exports the report and prints a summary.
///
/// Ctrl-C cancels the run; what was merged so far is still exported.
pub async fn run_harvest(config: &HarvestConfig, api_token: Option<String>) -> Result<Report> {
    let needs_token = config
        .sources
        .iter()
        .any(|source| matches!(source.target, SourceTarget::PaginatedApi { .. }));
    if needs_token && api_token.is_none() {
        harvest_warn!(
            "{} is not set; API sources will likely be rejected",
            crate::config_file::API_TOKEN_VAR
        );
    }

    let coordinator = build_coordinator(config, api_token)?;
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                harvest_warn!("Interrupted, stopping after in-flight work");
                cancel.cancel();
            }
        }
    });

    let report = coordinator.run(config.sources.clone(), cancel).await;
    watcher.abort();

    let summary = write_report(&report, &config.output_dir, &ExportOptions::default())
        .with_context(|| format!("writing report to {:?}", config.output_dir))?;
    print!("{}", render_summary(&report, &summary));
    Ok(report)
}

/// Human-readable run summary: per-source status, monthly volume and outputs.
pub fn render_summary(report: &Report, export: &ExportSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Harvested {} records from {} sources{}",
        report.total_records,
        report.sources.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for summary in &report.sources {
        let _ = writeln!(
            out,
            "  {:<24} {:<26} {:>6} records {:>4} new {:>3} failed items",
            summary.source.as_str(),
            summary.status.as_str(),
            summary.record_count,
            summary.new_records,
            summary.failed_items
        );
        for error in &summary.errors {
            let _ = writeln!(out, "      ! {}", error.message);
        }
    }

    let buckets = report.time_buckets(BucketGranularity::Month);
    if !buckets.is_empty() {
        let _ = writeln!(out, "Records per month:");
        for (month, count) in &buckets {
            let _ = writeln!(out, "  {month}: {count}");
        }
    }

    let _ = writeln!(out, "Report: {}", export.report_path.display());
    if let Some(table) = &export.table_path {
        let _ = writeln!(out, "Table:  {}", table.display());
    }
    out
}

/// Lists configured sources without touching the network.
pub fn render_check(config: &HarvestConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Config OK: {} sources", config.sources.len());
    for source in &config.sources {
        let target = match &source.target {
            SourceTarget::StaticPage { url, .. } => format!("page {url}"),
            SourceTarget::PaginatedApi { handle } => format!("account @{handle}"),
        };
        let _ = writeln!(out, "  {:<24} {}", source.id.as_str(), target);
    }
    out
}

/// Summarises the cached batch of every configured source.
pub fn render_cache(config: &HarvestConfig, cache: &dyn CacheStore) -> String {
    let mut out = String::new();
    for source in &config.sources {
        let line = match cache.load(&source.id) {
            Ok(Some(batch)) => format!(
                "{} records, cursor {}, updated {}",
                batch.len(),
                batch.cursor.as_ref().map_or("none", |c| c.as_str()),
                batch.fetched_at.to_rfc3339()
            ),
            Ok(None) => "no cached batch".to_string(),
            Err(err) => format!("unreadable: {err}"),
        };
        let _ = writeln!(out, "  {:<24} {}", source.id.as_str(), line);
    }
    out
}

pub fn inspect_cache(config: &HarvestConfig) {
    let cache = JsonCacheStore::new(config.cache_dir.clone());
    harvest_info!("Inspecting cache in {:?}", cache.dir());
    print!("{}", render_cache(config, &cache));
}

/// Exit status: any source that could not be harvested at all is an error.
pub fn exit_code(report: &Report) -> u8 {
    if report.count_by_status(SourceStatus::Failed) > 0 {
        2
    } else {
        0
    }
}

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigError, RetryPolicy, Source, SourceTarget};

/// Largest page the paginated discoverer may request.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Smallest page the timeline endpoint accepts.
pub const MIN_API_PAGE_SIZE: u32 = 5;

/// Everything a harvest run can be configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub sources: Vec<Source>,
    /// Detail fetches in flight across all sources.
    pub worker_pool_size: usize,
    /// Sources processed at once.
    pub max_concurrent_sources: usize,
    /// Discovery calls allowed per source per run, retries included.
    pub request_budget: u32,
    pub page_size: u32,
    /// Pause between successive discovery calls of one source.
    pub inter_request_delay_ms: u64,
    /// Resume from the cached batch when present.
    pub use_cache: bool,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_body_bytes: u64,
    pub api_base_url: String,
    pub retry: RetryPolicy,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            worker_pool_size: 5,
            max_concurrent_sources: 4,
            request_budget: 5,
            page_size: MAX_PAGE_SIZE,
            inter_request_delay_ms: 1_000,
            use_cache: true,
            cache_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_body_bytes: 5 * 1024 * 1024,
            api_base_url: "https://api.twitter.com".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// The subset of [`HarvestConfig`] the coordinator needs at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub worker_pool_size: usize,
    pub max_concurrent_sources: usize,
    pub request_budget: u32,
    pub page_size: u32,
    pub inter_request_delay: Duration,
    pub use_cache: bool,
    pub retry: RetryPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        HarvestConfig::default().run_settings()
    }
}

impl HarvestConfig {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            worker_pool_size: self.worker_pool_size,
            max_concurrent_sources: self.max_concurrent_sources,
            request_budget: self.request_budget,
            page_size: self.page_size,
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
            use_cache: self.use_cache,
            retry: self.retry,
        }
    }

    /// Checks sources and options; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            validate_source(source)?;
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::DuplicateSourceId(source.id.to_string()));
            }
        }

        if self.worker_pool_size == 0 {
            return Err(out_of_range("worker_pool_size", "must be at least 1"));
        }
        if self.max_concurrent_sources == 0 {
            return Err(out_of_range("max_concurrent_sources", "must be at least 1"));
        }
        if self.request_budget == 0 {
            return Err(out_of_range("request_budget", "must be at least 1"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(out_of_range(
                "page_size",
                format!("must be within 1..={MAX_PAGE_SIZE}, got {}", self.page_size),
            ));
        }
        let has_api_source = self
            .sources
            .iter()
            .any(|source| matches!(source.target, SourceTarget::PaginatedApi { .. }));
        if has_api_source && self.page_size < MIN_API_PAGE_SIZE {
            return Err(out_of_range(
                "page_size",
                format!(
                    "must be at least {MIN_API_PAGE_SIZE} with api sources, got {}",
                    self.page_size
                ),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(out_of_range("retry.max_attempts", "must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(out_of_range("request_timeout_ms", "must be positive"));
        }
        Url::parse(&self.api_base_url).map_err(|err| ConfigError::InvalidUrl {
            id: "api_base_url".to_string(),
            reason: err.to_string(),
        })?;
        Ok(())
    }
}

/// Validates one source definition in isolation.
pub fn validate_source(source: &Source) -> Result<(), ConfigError> {
    let id = source.id.as_str();
    if id.trim().is_empty() {
        return Err(ConfigError::EmptySourceId);
    }
    match &source.target {
        SourceTarget::StaticPage { url, .. } => {
            let parsed = Url::parse(url).map_err(|err| ConfigError::InvalidUrl {
                id: id.to_string(),
                reason: err.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl {
                    id: id.to_string(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
        }
        SourceTarget::PaginatedApi { handle } => {
            let trimmed = handle.trim();
            let valid = !trimmed.is_empty()
                && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(ConfigError::InvalidHandle {
                    id: id.to_string(),
                    handle: handle.clone(),
                });
            }
        }
    }
    Ok(())
}

fn out_of_range(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        name,
        reason: reason.into(),
    }
}

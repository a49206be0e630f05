use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use harvest_logging::harvest_debug;
use harvester_core::{Batch, SourceId};
use sha2::{Digest, Sha256};

use crate::persist::{write_atomic, PersistError};

/// Key-value persistence of the last batch of every source.
///
/// Saves are atomic per key; there are no cross-key transactions.
pub trait CacheStore: Send + Sync {
    fn load(&self, source: &SourceId) -> Result<Option<Batch>, PersistError>;
    fn save(&self, source: &SourceId, batch: &Batch) -> Result<(), PersistError>;
}

/// One pretty-printed JSON document per source inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    dir: PathBuf,
}

impl JsonCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &SourceId) -> PathBuf {
        self.dir.join(cache_filename(source))
    }
}

impl CacheStore for JsonCacheStore {
    fn load(&self, source: &SourceId) -> Result<Option<Batch>, PersistError> {
        let path = self.path_for(source);
        let content = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let batch: Batch =
            serde_json::from_slice(&content).map_err(|err| PersistError::Corrupt {
                path: path.clone(),
                message: err.to_string(),
            })?;
        harvest_debug!(
            "Loaded cached batch for {} ({} records) from {:?}",
            source,
            batch.len(),
            path
        );
        Ok(Some(batch))
    }

    fn save(&self, source: &SourceId, batch: &Batch) -> Result<(), PersistError> {
        let content = serde_json::to_vec_pretty(batch)?;
        let path = write_atomic(&self.dir, &cache_filename(source), &content)?;
        harvest_debug!(
            "Saved batch for {} ({} records) to {:?}",
            source,
            batch.len(),
            path
        );
        Ok(())
    }
}

/// Deterministic, filesystem-safe file name for a source key:
/// `batch_{sanitized}--{short_hash(key)}.json`. The hash keeps keys that
/// sanitize to the same text apart.
pub fn cache_filename(source: &SourceId) -> String {
    let key = source.as_str();
    let mut sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    sanitized = sanitized.trim_matches(&['_', '.'][..]).to_string();
    if sanitized.is_empty() {
        sanitized = "source".to_string();
    }
    if sanitized.len() > 60 {
        sanitized.truncate(60);
    }
    format!("batch_{sanitized}--{}.json", short_hash(key))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_stable_and_safe() {
        let name = cache_filename(&SourceId::new("eventos/itam: 2024"));
        assert!(name.starts_with("batch_eventos_itam__2024--"));
        assert!(name.ends_with(".json"));
        assert_eq!(name, cache_filename(&SourceId::new("eventos/itam: 2024")));
    }

    #[test]
    fn keys_that_sanitize_alike_do_not_collide() {
        let a = cache_filename(&SourceId::new("a/b"));
        let b = cache_filename(&SourceId::new("a:b"));
        assert_ne!(a, b);
    }
}

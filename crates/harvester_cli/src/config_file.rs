use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use harvest_logging::harvest_info;
use harvester_core::{ConfigError, HarvestConfig};
use thiserror::Error;

/// Environment variable holding the posts API bearer token.
pub const API_TOKEN_VAR: &str = "HARVEST_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("cannot read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub no_cache: bool,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

/// Parses a RON harvest config. Omitted options keep their defaults.
pub fn parse_config(text: &str, path: &Path) -> Result<HarvestConfig, ConfigFileError> {
    ron::from_str(text).map_err(|err| ConfigFileError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Reads, overrides and validates the config at `path`.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<HarvestConfig, ConfigFileError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&text, path)?;
    apply_overrides(&mut config, overrides);
    config.validate()?;
    harvest_info!(
        "Loaded config {:?} with {} sources",
        path,
        config.sources.len()
    );
    Ok(config)
}

pub fn apply_overrides(config: &mut HarvestConfig, overrides: &Overrides) {
    if overrides.no_cache {
        config.use_cache = false;
    }
    if let Some(dir) = &overrides.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &overrides.cache_dir {
        config.cache_dir = dir.clone();
    }
}

/// Bearer token from the environment; blank counts as missing.
pub fn api_token() -> Option<String> {
    std::env::var(API_TOKEN_VAR)
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classification shared by discovery and detail calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Target removed or never existed (404/410, unknown account).
    NotFound,
    /// Timeout, network failure, 5xx or rate limiting.
    Transient,
    /// Response arrived but lacks required fields or cannot be decoded.
    Malformed,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Malformed => write!(f, "malformed"),
        }
    }
}

/// Errors that carry a [`FailureKind`] so retry policy can be applied uniformly.
pub trait Classified {
    fn kind(&self) -> FailureKind;
}

/// Failure fetching the detail of one item.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }
}

impl Classified for FetchError {
    fn kind(&self) -> FailureKind {
        self.kind
    }
}

/// Failure discovering items of a source (unreachable page, unknown account).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("discovery {kind}: {message}")]
pub struct DiscoveryError {
    pub kind: FailureKind,
    pub message: String,
}

impl DiscoveryError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Classified for DiscoveryError {
    fn kind(&self) -> FailureKind {
        self.kind
    }
}

/// Transport failures surface identically for pages and items.
impl From<FetchError> for DiscoveryError {
    fn from(err: FetchError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Invalid source definition or option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no sources configured")]
    NoSources,
    #[error("source id must not be empty")]
    EmptySourceId,
    #[error("duplicate source id '{0}'")]
    DuplicateSourceId(String),
    #[error("source '{id}' has an invalid url: {reason}")]
    InvalidUrl { id: String, reason: String },
    #[error("source '{id}' has an invalid account handle '{handle}'")]
    InvalidHandle { id: String, handle: String },
    #[error("option '{name}' is out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },
}

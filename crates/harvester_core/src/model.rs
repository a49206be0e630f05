use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a harvest target; also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMode {
    StaticPage,
    PaginatedApi,
}

/// What a source points at. The discoverer registered for the matching
/// [`DiscoveryMode`] interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTarget {
    /// HTML page listing item links, e.g. an event calendar.
    StaticPage {
        url: String,
        /// Only links whose absolute URL starts with this prefix are kept.
        #[serde(default)]
        link_prefix: Option<String>,
        /// CSS selector narrowing the part of the page that is scanned.
        #[serde(default)]
        scope_selector: Option<String>,
    },
    /// Account on a paginated posts API.
    PaginatedApi { handle: String },
}

impl SourceTarget {
    pub fn mode(&self) -> DiscoveryMode {
        match self {
            SourceTarget::StaticPage { .. } => DiscoveryMode::StaticPage,
            SourceTarget::PaginatedApi { .. } => DiscoveryMode::PaginatedApi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub target: SourceTarget,
}

impl Source {
    pub fn static_page(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(id),
            target: SourceTarget::StaticPage {
                url: url.into(),
                link_prefix: None,
                scope_selector: None,
            },
        }
    }

    pub fn paginated(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(id),
            target: SourceTarget::PaginatedApi {
                handle: handle.into(),
            },
        }
    }

    pub fn mode(&self) -> DiscoveryMode {
        self.target.mode()
    }
}

/// Opaque pagination token. `None` wherever a cursor is optional means
/// "no further pages".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pointer to one fetchable unit discovered from a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemReference {
    /// Identity used for dedup across pages and runs.
    pub id: String,
    /// What the detail fetcher needs: a URL or a post id.
    pub locator: String,
}

impl ItemReference {
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
        }
    }

    /// Links are their own identity.
    pub fn link(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            locator: url,
        }
    }
}

/// Structured result of fetching one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub item_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    /// Source-specific text fields (event date, time, location).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Source-specific counters (likes, reposts, replies).
    #[serde(default)]
    pub metrics: BTreeMap<String, u64>,
}

impl Record {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            url: None,
            title: title.into(),
            body: String::new(),
            media_url: None,
            published_at: None,
            fetched_at,
            fields: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

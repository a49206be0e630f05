use std::collections::HashSet;

use async_trait::async_trait;
use harvest_logging::harvest_debug;
use harvester_core::{DiscoveryError, FailureKind, ItemReference, Source, SourceTarget};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_html;
use crate::discover::{DiscoveredPage, Discoverer, PageRequest};
use crate::http::HttpClient;

const DEFAULT_MAX_LINKS: usize = 5_000;

/// Filters applied while collecting item links from one page.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter<'a> {
    /// Keep only absolute URLs starting with this prefix.
    pub prefix: Option<&'a str>,
    /// Only scan the first element matching this CSS selector.
    pub scope_selector: Option<&'a str>,
}

/// Discovers item links on a static HTML page such as an event calendar.
///
/// Always a single page: the cursor is ignored and never returned.
pub struct CalendarDiscoverer {
    http: HttpClient,
    max_links: usize,
}

impl CalendarDiscoverer {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            max_links: DEFAULT_MAX_LINKS,
        }
    }

    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }
}

#[async_trait]
impl Discoverer for CalendarDiscoverer {
    async fn discover(
        &self,
        source: &Source,
        _request: &PageRequest,
    ) -> Result<DiscoveredPage, DiscoveryError> {
        let SourceTarget::StaticPage {
            url,
            link_prefix,
            scope_selector,
        } = &source.target
        else {
            return Err(DiscoveryError::new(
                FailureKind::Malformed,
                format!("source {} is not a static page", source.id),
            ));
        };

        let body = self.http.get_page(url).await?;
        let html = decode_html(&body)?;
        let filter = LinkFilter {
            prefix: link_prefix.as_deref(),
            scope_selector: scope_selector.as_deref(),
        };
        let items = extract_item_links(&html, Some(&body.final_url), &filter, self.max_links)?;
        harvest_debug!("Found {} item links on {}", items.len(), url);

        Ok(DiscoveredPage {
            items,
            next_cursor: None,
        })
    }
}

/// Collects anchors of `html` that pass `filter`, resolved against `base_url`,
/// without duplicates and in document order.
///
/// A scope selector that matches nothing yields no links; an invalid selector
/// is a malformed source definition.
pub fn extract_item_links(
    html: &str,
    base_url: Option<&str>,
    filter: &LinkFilter<'_>,
    max_links: usize,
) -> Result<Vec<ItemReference>, DiscoveryError> {
    let document = Html::parse_document(html);
    let base = base_url.and_then(|b| Url::parse(b).ok());
    let anchors = parse_selector("a[href]")?;

    let scope = match filter.scope_selector {
        Some(raw) => {
            let selector = parse_selector(raw)?;
            match document.select(&selector).next() {
                Some(element) => element,
                None => return Ok(Vec::new()),
            }
        }
        None => document.root_element(),
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in scope.select(&anchors) {
        if links.len() >= max_links {
            break;
        }
        let Some(url) = anchor_url(anchor, base.as_ref()) else {
            continue;
        };
        if let Some(prefix) = filter.prefix {
            if !url.starts_with(prefix) {
                continue;
            }
        }
        if seen.insert(url.clone()) {
            links.push(ItemReference::link(url));
        }
    }
    Ok(links)
}

fn parse_selector(raw: &str) -> Result<Selector, DiscoveryError> {
    Selector::parse(raw).map_err(|err| {
        DiscoveryError::new(
            FailureKind::Malformed,
            format!("invalid selector '{raw}': {err:?}"),
        )
    })
}

fn anchor_url(anchor: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let href = anchor.value().attr("href")?;
    let mut url = resolve_url(href, base)?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}

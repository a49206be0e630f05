use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_logging::{harvest_debug, harvest_info};
use harvester_core::{
    Cursor, DiscoveryError, FailureKind, FetchError, ItemReference, Record, Source, SourceTarget,
    MAX_PAGE_SIZE,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::discover::{DetailFetcher, DiscoveredPage, Discoverer, PageRequest};
use crate::http::{FetchedBody, HttpClient};

const TWEET_FIELDS: &str = "created_at,public_metrics";
const TITLE_CHARS: usize = 80;

/// Where the posts API lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub bearer_token: Option<String>,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|err| FetchError::malformed(format!("invalid api url {raw}: {err}")))
    }
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ApiProblem {
    fn describe(problems: &[ApiProblem]) -> String {
        problems
            .iter()
            .filter_map(|p| p.detail.as_deref().or(p.title.as_deref()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    data: Option<UserData>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineMeta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<PostData>,
    #[serde(default)]
    meta: TimelineMeta,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    #[serde(default)]
    data: Option<PostData>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &FetchedBody) -> Result<T, FetchError> {
    serde_json::from_slice(&body.bytes)
        .map_err(|err| FetchError::malformed(format!("invalid json from {}: {err}", body.final_url)))
}

/// Walks an account's timeline one page per call, threading `next_token`.
pub struct TimelineDiscoverer {
    http: HttpClient,
    api: ApiSettings,
    user_ids: Mutex<HashMap<String, String>>,
}

impl TimelineDiscoverer {
    pub fn new(http: HttpClient, api: ApiSettings) -> Self {
        Self {
            http,
            api,
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn user_id(&self, handle: &str) -> Result<String, DiscoveryError> {
        if let Some(id) = self.user_ids.lock().await.get(handle) {
            return Ok(id.clone());
        }

        let url = self.api.endpoint(&format!("2/users/by/username/{handle}"))?;
        let body = self
            .http
            .get_json(url.as_str(), self.api.bearer_token.as_deref())
            .await?;
        let response: UserResponse = parse_json(&body)?;
        let Some(user) = response.data else {
            let mut message = format!("account @{handle} not found");
            if !response.errors.is_empty() {
                message = format!("{message}: {}", ApiProblem::describe(&response.errors));
            }
            return Err(DiscoveryError::new(FailureKind::NotFound, message));
        };

        harvest_debug!("Resolved @{} to user id {}", handle, user.id);
        self.user_ids
            .lock()
            .await
            .insert(handle.to_string(), user.id.clone());
        Ok(user.id)
    }
}

/// Caps a requested page size at the endpoint maximum. Never raises it;
/// the lower bound is enforced when the config is validated.
pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.min(MAX_PAGE_SIZE)
}

#[async_trait]
impl Discoverer for TimelineDiscoverer {
    async fn discover(
        &self,
        source: &Source,
        request: &PageRequest,
    ) -> Result<DiscoveredPage, DiscoveryError> {
        let SourceTarget::PaginatedApi { handle } = &source.target else {
            return Err(DiscoveryError::new(
                FailureKind::Malformed,
                format!("source {} is not an api account", source.id),
            ));
        };

        let user_id = self.user_id(handle).await?;
        let mut url = self.api.endpoint(&format!("2/users/{user_id}/tweets"))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("max_results", &clamp_page_size(request.page_size).to_string())
                .append_pair("exclude", "retweets,replies")
                .append_pair("tweet.fields", TWEET_FIELDS);
            if let Some(cursor) = &request.cursor {
                query.append_pair("pagination_token", cursor.as_str());
            }
        }

        let body = self
            .http
            .get_json(url.as_str(), self.api.bearer_token.as_deref())
            .await?;
        let response: TimelineResponse = parse_json(&body)?;

        let items: Vec<ItemReference> = response
            .data
            .into_iter()
            .map(|post| ItemReference::new(post.id.clone(), post.id))
            .collect();
        let next_cursor = response.meta.next_token.map(Cursor::new);
        harvest_info!(
            "Discovered {} posts of @{}{}",
            items.len(),
            handle,
            if next_cursor.is_some() { ", more available" } else { "" }
        );

        Ok(DiscoveredPage { items, next_cursor })
    }
}

/// Looks up one post by id.
pub struct PostFetcher {
    http: HttpClient,
    api: ApiSettings,
}

impl PostFetcher {
    pub fn new(http: HttpClient, api: ApiSettings) -> Self {
        Self { http, api }
    }
}

#[async_trait]
impl DetailFetcher for PostFetcher {
    async fn fetch(&self, item: &ItemReference) -> Result<Record, FetchError> {
        let mut url = self.api.endpoint(&format!("2/tweets/{}", item.locator))?;
        url.query_pairs_mut().append_pair("tweet.fields", TWEET_FIELDS);

        let body = self
            .http
            .get_json(url.as_str(), self.api.bearer_token.as_deref())
            .await?;
        parse_post(&body, item, Utc::now())
    }
}

fn parse_post(
    body: &FetchedBody,
    item: &ItemReference,
    fetched_at: DateTime<Utc>,
) -> Result<Record, FetchError> {
    let response: PostResponse = parse_json(body)?;
    let Some(post) = response.data else {
        let mut message = format!("post {} not found", item.locator);
        if !response.errors.is_empty() {
            message = format!("{message}: {}", ApiProblem::describe(&response.errors));
        }
        return Err(FetchError::not_found(message));
    };

    let text = post
        .text
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| FetchError::malformed(format!("post {} has no text", post.id)))?;

    let mut record = Record::new(item.id.clone(), post_title(&text), fetched_at);
    record.body = text;
    record.published_at = post
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));
    record.metrics = post.public_metrics;
    Ok(record)
}

/// First line of the text, shortened to a readable title.
fn post_title(text: &str) -> String {
    let first_line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    if first_line.chars().count() <= TITLE_CHARS {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(TITLE_CHARS).collect();
    title.push('…');
    title
}

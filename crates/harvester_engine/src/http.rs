use std::time::Duration;

use futures_util::StreamExt;
use harvester_core::{FetchError, HarvestConfig};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<&HarvestConfig> for HttpSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            max_bytes: config.max_body_bytes,
            ..Self::default()
        }
    }
}

/// Raw response body plus what is needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub final_url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Shared HTTP client handed explicitly to discoverers and fetchers.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Result<Self, FetchError> {
        let redirect_limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(policy)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::transient(err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// GET an HTML page.
    pub async fn get_page(&self, url: &str) -> Result<FetchedBody, FetchError> {
        self.get(url, "text/html,application/xhtml+xml", None).await
    }

    /// GET a JSON document, optionally with a bearer token.
    pub async fn get_json(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<FetchedBody, FetchError> {
        self.get(url, "application/json", bearer_token).await
    }

    async fn get(
        &self,
        url: &str,
        accept: &str,
        bearer_token: Option<&str>,
    ) -> Result<FetchedBody, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::malformed(format!("invalid url {url}: {err}")))?;

        let mut request = self.client.get(parsed).header(ACCEPT, accept);
        if let Some(token) = bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody {
            final_url,
            content_type,
            bytes,
        })
    }
}

/// 404/410 mean the target is gone; 408, 429 and 5xx are worth retrying; any
/// other client error will not change on retry and is treated as not found.
pub fn classify_status(status: StatusCode) -> FetchError {
    let message = format!("http status {}", status.as_u16());
    match status.as_u16() {
        404 | 410 => FetchError::not_found(message),
        408 | 429 => FetchError::transient(message),
        code if code >= 500 => FetchError::transient(message),
        _ => FetchError::not_found(message),
    }
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::malformed(format!("response too large (max {max_bytes}, actual {actual})"))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::transient(format!("timeout: {err}"));
    }
    if err.is_redirect() {
        return FetchError::not_found(format!("redirect limit exceeded: {err}"));
    }
    if err.is_decode() {
        return FetchError::malformed(err.to_string());
    }
    FetchError::transient(format!("network error: {err}"))
}

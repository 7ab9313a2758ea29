//! Web search client
//!
//! Provides web search via configurable providers (Serper, Brave). Requests
//! are built from a normalized [`SearchRequest`]; provider responses are
//! normalized into ranked [`SearchResult`]s.

use std::time::Duration;

use reqwest::{Client, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{ProviderKind, SearchConfig};
use crate::error::SearchError;
use crate::{Error, Result};

/// Results per provider page
pub const PAGE_SIZE: u32 = 10;

/// Upstream error bodies longer than this are cut before being surfaced
const MAX_ERROR_BODY_CHARS: usize = 2_000;

/// Recency filter
///
/// Known codes normalize to a variant; anything else is kept verbatim and
/// left for the provider to accept or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimePeriod {
    Hour,
    Day,
    Week,
    Month,
    Year,
    /// Unrecognized provider token, forwarded unchanged
    Other(String),
}

impl TimePeriod {
    /// Parse `h|d|w|m|y` or the provider-native `qdr:X` form
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let code = trimmed.strip_prefix("qdr:").unwrap_or(trimmed);
        Some(match code {
            "h" => Self::Hour,
            "d" => Self::Day,
            "w" => Self::Week,
            "m" => Self::Month,
            "y" => Self::Year,
            _ => Self::Other(trimmed.to_string()),
        })
    }

    /// Serper `tbs` value
    #[must_use]
    pub fn serper_token(&self) -> String {
        match self {
            Self::Hour => "qdr:h".to_string(),
            Self::Day => "qdr:d".to_string(),
            Self::Week => "qdr:w".to_string(),
            Self::Month => "qdr:m".to_string(),
            Self::Year => "qdr:y".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }

    /// Brave `freshness` value (Brave has no hour granularity)
    #[must_use]
    pub fn brave_token(&self) -> String {
        match self {
            Self::Hour | Self::Day => "pd".to_string(),
            Self::Week => "pw".to_string(),
            Self::Month => "pm".to_string(),
            Self::Year => "py".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }
}

/// Normalized search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Query string, non-empty
    pub query: String,
    /// Two-letter country code, lower-case
    pub country: Option<String>,
    /// Two-letter language code, lower-case
    pub language: Option<String>,
    /// Free-form location ("Prague, Czech Republic")
    pub location: Option<String>,
    /// Recency filter
    pub time_period: Option<TimePeriod>,
    /// 1-based page number
    pub page: u32,
}

impl SearchRequest {
    /// Request for the first page with no filters
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            country: None,
            language: None,
            location: None,
            time_period: None,
            page: 1,
        }
    }

    /// Page 1 unless a positive page is given
    #[must_use]
    pub fn normalize_page(page: Option<i64>) -> u32 {
        page.filter(|p| *p > 0)
            .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX))
    }

    /// Page actually requested from the provider
    #[must_use]
    pub const fn effective_page(&self) -> u32 {
        if self.page == 0 { 1 } else { self.page }
    }

    /// Zero-based rank of the first result on the requested page
    #[must_use]
    pub const fn offset(&self) -> u32 {
        (self.effective_page() - 1).saturating_mul(PAGE_SIZE)
    }
}

/// Search result from web search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title
    pub title: String,
    /// Result URL (absolute http/https)
    pub url: String,
    /// Result snippet/description
    pub snippet: String,
    /// 1-based provider rank
    pub position: u32,
}

/// Search provider selection with its credentials
#[derive(Debug)]
pub enum SearchProvider {
    /// Brave Search API
    Brave {
        /// API key for Brave Search
        api_key: SecretString,
    },
    /// Serper (Google) Search API
    Serper {
        /// API key for Serper
        api_key: SecretString,
    },
}

impl SearchProvider {
    /// Provider kind
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Brave { .. } => ProviderKind::Brave,
            Self::Serper { .. } => ProviderKind::Serper,
        }
    }
}

/// Web search client
pub struct SearchClient {
    provider: SearchProvider,
    base_url: String,
    client: Client,
}

/// Serper API request body
#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tbs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    num: u32,
}

impl<'a> From<&'a SearchRequest> for SerperRequest<'a> {
    fn from(req: &'a SearchRequest) -> Self {
        let page = req.effective_page();
        Self {
            q: &req.query,
            gl: req.country.as_deref(),
            hl: req.language.as_deref(),
            location: req.location.as_deref(),
            tbs: req.time_period.as_ref().map(TimePeriod::serper_token),
            page: (page > 1).then_some(page),
            num: PAGE_SIZE,
        }
    }
}

/// Serper API response
#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    #[serde(default)]
    organic: Option<Vec<SerperResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<u32>,
}

/// Brave Search API response
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: String,
}

/// Provider item before normalization
struct RawResult {
    title: String,
    link: Option<String>,
    snippet: String,
    position: Option<u32>,
}

impl SearchClient {
    /// Create a search client for a provider
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(provider: SearchProvider, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("search-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build search client: {e}")))?;

        Ok(Self {
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a search client with Serper at its public endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_serper(api_key: SecretString) -> Result<Self> {
        Self::new(
            SearchProvider::Serper { api_key },
            ProviderKind::Serper.default_base_url(),
            crate::config::DEFAULT_SEARCH_TIMEOUT,
        )
    }

    /// Create a search client with Brave at its public endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_brave(api_key: SecretString) -> Result<Self> {
        Self::new(
            SearchProvider::Brave { api_key },
            ProviderKind::Brave.default_base_url(),
            crate::config::DEFAULT_SEARCH_TIMEOUT,
        )
    }

    /// Create a search client from configuration
    ///
    /// Returns `Ok(None)` when the selected provider has no API key.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let provider = match config.provider {
            ProviderKind::Serper => SearchProvider::Serper { api_key },
            ProviderKind::Brave => SearchProvider::Brave { api_key },
        };
        Self::new(provider, config.base_url.clone(), config.timeout).map(Some)
    }

    /// Selected provider
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Perform a web search
    ///
    /// Results come back in provider rank order. No retries: upstream calls
    /// are metered.
    ///
    /// # Errors
    ///
    /// Returns error if the provider answers with a non-success status, does
    /// not answer in time, or returns an unexpected body
    pub async fn search(&self, req: &SearchRequest) -> std::result::Result<Vec<SearchResult>, SearchError> {
        let response = match &self.provider {
            SearchProvider::Serper { api_key } => self.send_serper(api_key, req).await?,
            SearchProvider::Brave { api_key } => self.send_brave(api_key, req).await?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "failed to read search provider error body");
                format!("<unreadable body: {e}>")
            });
            tracing::warn!(status = status.as_u16(), provider = self.provider().name(), "search provider error");
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let raw = match self.provider {
            SearchProvider::Serper { .. } => parse_serper(&bytes)?,
            SearchProvider::Brave { .. } => parse_brave(&bytes)?,
        };
        let results = normalize_results(raw, req.offset());

        tracing::debug!(
            provider = self.provider().name(),
            page = req.effective_page(),
            count = results.len(),
            "search completed"
        );

        Ok(results)
    }

    /// Send a Serper search request
    async fn send_serper(
        &self,
        api_key: &SecretString,
        req: &SearchRequest,
    ) -> std::result::Result<Response, SearchError> {
        self.client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", api_key.expose_secret())
            .json(&SerperRequest::from(req))
            .send()
            .await
            .map_err(map_reqwest_error)
    }

    /// Send a Brave search request
    async fn send_brave(
        &self,
        api_key: &SecretString,
        req: &SearchRequest,
    ) -> std::result::Result<Response, SearchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("q", req.query.clone()),
            ("count", PAGE_SIZE.to_string()),
            ("offset", (req.effective_page() - 1).to_string()),
        ];
        if let Some(country) = &req.country {
            query.push(("country", country.clone()));
        }
        if let Some(language) = &req.language {
            query.push(("search_lang", language.clone()));
        }
        if let Some(period) = &req.time_period {
            query.push(("freshness", period.brave_token()));
        }
        if req.location.is_some() {
            tracing::debug!("brave does not support location filtering, ignoring");
        }

        self.client
            .get(format!("{}/res/v1/web/search", self.base_url))
            .header("X-Subscription-Token", api_key.expose_secret())
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else if e.is_decode() {
        SearchError::Parse(e.to_string())
    } else {
        SearchError::Network(e.to_string())
    }
}

fn parse_serper(body: &[u8]) -> std::result::Result<Vec<RawResult>, SearchError> {
    let response: SerperSearchResponse =
        serde_json::from_slice(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    Ok(response
        .organic
        .unwrap_or_default()
        .into_iter()
        .map(|r| RawResult {
            title: r.title,
            link: r.link,
            snippet: r.snippet,
            position: r.position,
        })
        .collect())
}

fn parse_brave(body: &[u8]) -> std::result::Result<Vec<RawResult>, SearchError> {
    let response: BraveSearchResponse =
        serde_json::from_slice(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    Ok(response
        .web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| RawResult {
            title: r.title,
            link: r.url,
            snippet: r.description,
            position: None,
        })
        .collect())
}

/// Keep provider order, drop items without an absolute http(s) link, fill
/// missing positions from the page offset
fn normalize_results(raw: Vec<RawResult>, offset: u32) -> Vec<SearchResult> {
    raw.into_iter()
        .zip(1u32..)
        .filter_map(|(item, rank)| {
            let Some(url) = item.link.filter(|l| is_absolute_http(l)) else {
                tracing::debug!(title = %item.title, "skipping search result without a valid link");
                return None;
            };
            Some(SearchResult {
                title: item.title,
                url,
                snippet: item.snippet,
                position: item
                    .position
                    .filter(|p| *p >= 1)
                    .unwrap_or_else(|| offset.saturating_add(rank)),
            })
        })
        .collect()
}

fn is_absolute_http(link: &str) -> bool {
    Url::parse(link).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn key() -> SecretString {
        SecretString::from("test-key".to_string())
    }

    fn serper(server: &MockServer, timeout: Duration) -> SearchClient {
        SearchClient::new(SearchProvider::Serper { api_key: key() }, server.uri(), timeout).unwrap()
    }

    #[test]
    fn test_new_serper() {
        let tool = SearchClient::new_serper(key()).unwrap();
        assert_eq!(tool.provider(), ProviderKind::Serper);
        assert_eq!(tool.base_url, "https://google.serper.dev");
    }

    #[test]
    fn test_new_brave() {
        let tool = SearchClient::new_brave(key()).unwrap();
        assert_eq!(tool.provider(), ProviderKind::Brave);
    }

    #[test]
    fn test_page_normalization() {
        assert_eq!(SearchRequest::normalize_page(None), 1);
        assert_eq!(SearchRequest::normalize_page(Some(0)), 1);
        assert_eq!(SearchRequest::normalize_page(Some(-3)), 1);
        assert_eq!(SearchRequest::normalize_page(Some(4)), 4);

        let mut req = SearchRequest::new("q");
        req.page = 0;
        assert_eq!(req.effective_page(), 1);
        assert_eq!(req.offset(), 0);
        req.page = 3;
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_time_period_parse() {
        assert_eq!(TimePeriod::parse("w"), Some(TimePeriod::Week));
        assert_eq!(TimePeriod::parse("qdr:y"), Some(TimePeriod::Year));
        assert_eq!(TimePeriod::parse("  "), None);
        assert_eq!(
            TimePeriod::parse("cdr:1,cd_min:1/1/2024"),
            Some(TimePeriod::Other("cdr:1,cd_min:1/1/2024".to_string()))
        );
        assert_eq!(TimePeriod::Hour.serper_token(), "qdr:h");
        assert_eq!(TimePeriod::Hour.brave_token(), "pd");
        assert_eq!(TimePeriod::Other("xyz".into()).serper_token(), "xyz");
    }

    #[test]
    fn test_serper_request_body() {
        let mut req = SearchRequest::new("rust ownership");
        req.country = Some("cz".to_string());
        req.time_period = Some(TimePeriod::Day);

        let body = serde_json::to_value(SerperRequest::from(&req)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"q": "rust ownership", "gl": "cz", "tbs": "qdr:d", "num": 10})
        );

        req.page = 2;
        let body = serde_json::to_value(SerperRequest::from(&req)).unwrap();
        assert_eq!(body["page"], 2);
    }

    #[test]
    fn test_normalize_fills_positions_and_skips_bad_links() {
        let raw = vec![
            RawResult { title: "a".into(), link: Some("https://a.example".into()), snippet: String::new(), position: None },
            RawResult { title: "b".into(), link: Some("not a url".into()), snippet: String::new(), position: None },
            RawResult { title: "c".into(), link: Some("http://c.example/x".into()), snippet: String::new(), position: None },
            RawResult { title: "d".into(), link: None, snippet: String::new(), position: Some(4) },
        ];
        let results = normalize_results(raw, 10);
        let summary: Vec<(&str, u32)> = results.iter().map(|r| (r.title.as_str(), r.position)).collect();
        assert_eq!(summary, vec![("a", 11), ("c", 13)]);
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 100 bytes, sends 7, hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 100\r\n\r\npartial")
                .await;
        });

        let client = SearchClient::new(
            SearchProvider::Serper { api_key: key() },
            format!("http://{addr}"),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.search(&SearchRequest::new("q")).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Upstream { status: 502, ref body } if body.starts_with("<unreadable body")
        ));
    }

    #[tokio::test]
    async fn test_serper_search_returns_ranked_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "test-key"))
            .and(body_partial_json(serde_json::json!({"q": "test query", "hl": "en"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchParameters": {"q": "test query"},
                "knowledgeGraph": {"title": "ignored"},
                "organic": [
                    {"title": "First", "link": "https://one.example", "snippet": "1", "position": 1, "sitelinks": []},
                    {"title": "Second", "link": "https://two.example", "snippet": "2", "position": 2}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tool = serper(&mock_server, Duration::from_secs(5));
        let mut req = SearchRequest::new("test query");
        req.language = Some("en".to_string());

        let results = tool.search(&req).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First");
        assert_eq!(results[0].position, 1);
        assert_eq!(results[1].url, "https://two.example");
    }

    #[tokio::test]
    async fn test_missing_organic_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"searchParameters": {}})))
            .mount(&mock_server)
            .await;

        let results = serper(&mock_server, Duration::from_secs(5))
            .search(&SearchRequest::new("nothing"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Unauthorized."))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = serper(&mock_server, Duration::from_secs(5))
            .search(&SearchRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Upstream { status: 403, ref body } if body == "Unauthorized."));
    }

    #[tokio::test]
    async fn test_malformed_response_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"organic": "nope"})))
            .mount(&mock_server)
            .await;

        let err = serper(&mock_server, Duration::from_secs(5))
            .search(&SearchRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"organic": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let err = serper(&mock_server, Duration::from_millis(100))
            .search(&SearchRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout));
    }

    #[tokio::test]
    async fn test_brave_request_mapping() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(header("X-Subscription-Token", "test-key"))
            .and(query_param("q", "rust"))
            .and(query_param("offset", "1"))
            .and(query_param("freshness", "pw"))
            .and(query_param("country", "de"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "search",
                "web": {"results": [
                    {"title": "Rust", "url": "https://www.rust-lang.org", "description": "A language"}
                ]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tool = SearchClient::new(
            SearchProvider::Brave { api_key: key() },
            mock_server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        let mut req = SearchRequest::new("rust");
        req.page = 2;
        req.country = Some("de".to_string());
        req.time_period = Some(TimePeriod::Week);

        let results = tool.search(&req).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "A language");
        assert_eq!(results[0].position, 11);
    }
}

//! Tool dispatcher: authenticates, validates and routes tool calls

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::render::{self, RenderMode, RenderedPayload};
use super::web::{
    ExtractedPage, HttpFetcher, SearchClient, SearchRequest, TimePeriod, extract_article,
    extract_plain,
};
use crate::config::{Config, ExtractConfig, ProviderKind};
use crate::error::{FetchError, SearchError, ValidationError};
use crate::security::AuthGate;
use crate::{Error, Result};

/// Plain web search
pub const SEARCH_WEB: &str = "search_web";
/// Web search with interactive presentation
pub const SEARCH_WEB_UI: &str = "search_web_ui";
/// Webpage text extraction
pub const EXTRACT_WEBPAGE: &str = "extract_webpage";

/// Behavior hints advertised with a tool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub title: &'static str,
    pub read_only_hint: bool,
    pub open_world_hint: bool,
}

/// Tool definition as listed to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
}

/// Validated `search_web` / `search_web_ui` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub country: Option<String>,
    pub language: Option<String>,
    pub location: Option<String>,
    pub time_period: Option<TimePeriod>,
    pub page: Option<i64>,
}

impl SearchParams {
    /// Validate raw call arguments
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field
    pub fn from_args(args: &Value) -> std::result::Result<Self, ValidationError> {
        let args = as_object(args)?;

        let query = required_str(args, "query")?;
        if query.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "query",
                reason: "must not be empty".to_string(),
            });
        }

        let page = match args.get("page") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64().ok_or_else(|| ValidationError::InvalidValue {
                field: "page",
                reason: format!("expected an integer, got {v}"),
            })?),
        };

        Ok(Self {
            query: query.to_string(),
            country: optional_code(args, "country")?,
            language: optional_code(args, "language")?,
            location: optional_str(args, "location")?.map(str::to_string),
            time_period: optional_str(args, "time_period")?.and_then(TimePeriod::parse),
            page,
        })
    }

    /// Provider-independent search request
    #[must_use]
    pub fn into_request(self) -> SearchRequest {
        SearchRequest {
            query: self.query,
            country: self.country,
            language: self.language,
            location: self.location,
            time_period: self.time_period,
            page: SearchRequest::normalize_page(self.page),
        }
    }
}

/// Validated `extract_webpage` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractParams {
    pub url: String,
}

impl ExtractParams {
    /// Validate raw call arguments
    ///
    /// Only the URL shape is checked here; scheme and destination checks
    /// belong to the fetcher.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `url` is absent, not a string or not an
    /// absolute URL
    pub fn from_args(args: &Value) -> std::result::Result<Self, ValidationError> {
        let args = as_object(args)?;
        let url = required_str(args, "url")?.trim();

        Url::parse(url).map_err(|e| ValidationError::InvalidValue {
            field: "url",
            reason: e.to_string(),
        })?;

        Ok(Self {
            url: url.to_string(),
        })
    }
}

/// Arguments object; `null` counts as no arguments
fn as_object(args: &Value) -> std::result::Result<&Map<String, Value>, ValidationError> {
    static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

    match args {
        Value::Null => Ok(&*EMPTY),
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::InvalidValue {
            field: "arguments",
            reason: format!("expected an object, got {other}"),
        }),
    }
}

fn required_str<'a>(
    args: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<&'a str, ValidationError> {
    optional_str_raw(args, field)?.ok_or(ValidationError::MissingField(field))
}

/// String field, `None` when absent, null or blank
fn optional_str<'a>(
    args: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<Option<&'a str>, ValidationError> {
    Ok(optional_str_raw(args, field)?
        .map(str::trim)
        .filter(|s| !s.is_empty()))
}

fn optional_str_raw<'a>(
    args: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<Option<&'a str>, ValidationError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ValidationError::InvalidValue {
            field,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Two-letter alphabetic code, lower-cased
fn optional_code(
    args: &Map<String, Value>,
    field: &'static str,
) -> std::result::Result<Option<String>, ValidationError> {
    let Some(code) = optional_str(args, field)? else {
        return Ok(None);
    };
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidEnum {
            field,
            value: code.to_string(),
            expected: "two-letter code",
        });
    }
    Ok(Some(code.to_ascii_lowercase()))
}

/// Result of a successful tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Search results with their text transcript
    Search {
        text: String,
        payload: RenderedPayload,
    },
    /// Extracted webpage
    Extract(ExtractedPage),
}

impl ToolOutput {
    /// Text returned to callers reading only text content
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Search { text, .. } => text.clone(),
            Self::Extract(page) => match &page.title {
                Some(title) => format!("{title}\n\n{}", page.text),
                None => page.text.clone(),
            },
        }
    }
}

/// Routes tool calls to the search client or the fetch/extract pipeline
///
/// Shared read-only between concurrent calls.
pub struct ToolDispatcher {
    auth: Arc<AuthGate>,
    search: Option<SearchClient>,
    provider: ProviderKind,
    fetcher: HttpFetcher,
    extract: ExtractConfig,
}

impl ToolDispatcher {
    /// Create a dispatcher; `search` is `None` when no provider key is set
    #[must_use]
    pub fn new(
        auth: Arc<AuthGate>,
        search: Option<SearchClient>,
        provider: ProviderKind,
        fetcher: HttpFetcher,
        extract: ExtractConfig,
    ) -> Self {
        Self {
            auth,
            search,
            provider,
            fetcher,
            extract,
        }
    }

    /// Build every component from configuration, guarded by `auth`
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built
    pub fn from_config(config: &Config, auth: AuthGate) -> Result<Self> {
        let auth = Arc::new(auth);
        let search = SearchClient::from_config(&config.search)?;
        if search.is_none() {
            tracing::warn!(
                provider = config.search.provider.name(),
                "no search provider API key configured, search tools will fail"
            );
        }
        let fetcher = HttpFetcher::new(config.fetch.clone())?;

        Ok(Self::new(
            auth,
            search,
            config.search.provider,
            fetcher,
            config.extract,
        ))
    }

    /// Auth gate applied to every tool call
    #[must_use]
    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    /// Definitions of all tools, in listing order
    #[must_use]
    pub fn definitions() -> Vec<ToolDefinition> {
        let search_schema = json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query string"},
                "country": {"type": "string", "description": "Country code for localized results (e.g. 'us', 'cz', 'de')"},
                "language": {"type": "string", "description": "Language code for results (e.g. 'en', 'cs', 'de')"},
                "location": {"type": "string", "description": "Geographic location for results (e.g. 'Prague, Czech Republic')"},
                "time_period": {"type": "string", "description": "Time filter: 'h' (past hour), 'd' (past day), 'w' (past week), 'm' (past month), 'y' (past year); 'qdr:X' forms are accepted"},
                "page": {"type": "integer", "minimum": 1, "default": 1, "description": "Page number for pagination (starts at 1)"}
            },
            "required": ["query"]
        });

        vec![
            ToolDefinition {
                name: SEARCH_WEB,
                description: "Search the web. Returns ranked results as text.",
                input_schema: search_schema.clone(),
                annotations: ToolAnnotations {
                    title: "Web Search",
                    read_only_hint: true,
                    open_world_hint: true,
                },
            },
            ToolDefinition {
                name: SEARCH_WEB_UI,
                description: "Search the web and display results with a visual UI. Use this for a rich visual presentation of search results.",
                input_schema: search_schema,
                annotations: ToolAnnotations {
                    title: "Web Search (Visual UI)",
                    read_only_hint: true,
                    open_world_hint: true,
                },
            },
            ToolDefinition {
                name: EXTRACT_WEBPAGE,
                description: "Extract the main text content from a webpage URL.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "The URL of the webpage to extract content from"}
                    },
                    "required": ["url"]
                }),
                annotations: ToolAnnotations {
                    title: "Extract Webpage Content",
                    read_only_hint: true,
                    open_world_hint: true,
                },
            },
        ]
    }

    /// Authenticate, validate and run one tool call
    ///
    /// Authentication runs before anything else; validation runs before any
    /// network I/O.
    ///
    /// # Errors
    ///
    /// Returns the auth, validation, search or fetch error that stopped the
    /// call
    pub async fn call(&self, name: &str, args: &Value, token: Option<&str>) -> Result<ToolOutput> {
        let start = Instant::now();
        let result = self.dispatch(name, args, token).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => tracing::info!(tool = name, elapsed_ms, "tool/{name} completed"),
            Err(e) => tracing::info!(tool = name, elapsed_ms, kind = e.kind(), error = %e, "tool/{name} failed"),
        }

        result
    }

    async fn dispatch(&self, name: &str, args: &Value, token: Option<&str>) -> Result<ToolOutput> {
        self.auth.authorize(token)?;

        match name {
            SEARCH_WEB => self.search(SearchParams::from_args(args)?, RenderMode::Plain).await,
            SEARCH_WEB_UI => {
                self.search(SearchParams::from_args(args)?, RenderMode::Interactive)
                    .await
            }
            EXTRACT_WEBPAGE => self.extract(ExtractParams::from_args(args)?).await,
            other => Err(ValidationError::UnknownTool(other.to_string()).into()),
        }
    }

    async fn search(&self, params: SearchParams, mode: RenderMode) -> Result<ToolOutput> {
        let Some(client) = &self.search else {
            return Err(SearchError::NotConfigured(self.provider.name()).into());
        };

        let request = params.into_request();
        let results = client.search(&request).await?;
        let text = render::plain_text(&results);
        let payload = render::render(&request.query, results, mode);

        Ok(ToolOutput::Search { text, payload })
    }

    async fn extract(&self, params: ExtractParams) -> Result<ToolOutput> {
        let page = self.fetcher.fetch(&params.url).await?;
        if !page.is_success() {
            return Err(FetchError::HttpStatus(page.status).into());
        }

        let max_chars = self.extract.max_chars;
        let body_truncated = page.body_truncated;
        let mut extracted = tokio::task::spawn_blocking(move || {
            let text = page.text();
            if page.is_html() {
                extract_article(&text, &page.url, max_chars)
            } else {
                extract_plain(&text, &page.url, max_chars)
            }
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        // A body cut at the byte cap is incomplete even if the text fit
        extracted.truncated |= body_truncated;

        Ok(ToolOutput::Extract(extracted))
    }
}

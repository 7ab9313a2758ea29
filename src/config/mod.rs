//! Configuration management for the search gateway
//!
//! Everything is read once at startup (env > toml > default) and never
//! revisited per request.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Search provider deadline
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Webpage fetch deadline
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum redirect hops for webpage fetches
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Maximum response body read from a webpage
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Maximum characters of extracted text returned to callers
pub const DEFAULT_MAX_EXTRACT_CHARS: usize = 20_000;

/// Search gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Deployment environment ("development", "production", ...)
    pub environment: String,

    /// Transport and listener configuration
    pub server: ServerConfig,

    /// Upstream search provider configuration
    pub search: SearchConfig,

    /// Webpage fetch limits
    pub fetch: FetchConfig,

    /// Text extraction limits
    pub extract: ExtractConfig,
}

/// Inbound transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// JSON-RPC over HTTP (`POST /mcp`)
    #[default]
    Http,
    /// Newline-delimited JSON-RPC over stdin/stdout
    Stdio,
}

impl Transport {
    /// Parse from string representation
    ///
    /// # Errors
    ///
    /// Returns error for unknown transport names
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" | "streamable-http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            other => Err(Error::Config(format!(
                "unknown transport {other:?} (expected \"http\" or \"stdio\")"
            ))),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Stdio => write!(f, "stdio"),
        }
    }
}

/// Transport and listener configuration
#[derive(Debug)]
pub struct ServerConfig {
    /// Selected transport
    pub transport: Transport,

    /// Bind host for the HTTP transport
    pub host: String,

    /// Bind port for the HTTP transport
    pub port: u16,

    /// Expected bearer token (from `MCP_API_KEY`); `None` means open mode
    pub api_key: Option<SecretString>,

    /// Hide upstream bodies and transport details from callers
    pub mask_error_details: bool,
}

/// Supported upstream search providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Serper (Google) Search API
    #[default]
    Serper,
    /// Brave Search API
    Brave,
}

impl ProviderKind {
    /// Parse from string representation
    ///
    /// # Errors
    ///
    /// Returns error for unknown provider names
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "serper" | "google" => Ok(Self::Serper),
            "brave" => Ok(Self::Brave),
            other => Err(Error::Config(format!("unknown search provider {other:?}"))),
        }
    }

    /// Human-readable provider name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Serper => "serper",
            Self::Brave => "brave",
        }
    }

    /// Public API base URL of the provider
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Serper => "https://google.serper.dev",
            Self::Brave => "https://api.search.brave.com",
        }
    }
}

/// Upstream search provider configuration
#[derive(Debug)]
pub struct SearchConfig {
    /// Selected provider
    pub provider: ProviderKind,

    /// API key for the selected provider
    pub api_key: Option<SecretString>,

    /// Provider base URL (overridable for self-hosted proxies and tests)
    pub base_url: String,

    /// Deadline for one provider call
    pub timeout: Duration,
}

/// Webpage fetch limits
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Deadline for one fetch including redirects and body
    pub timeout: Duration,

    /// Maximum redirect hops
    pub max_redirects: usize,

    /// Maximum body bytes read; the rest is discarded
    pub max_body_bytes: usize,

    /// Permit loopback/private destinations
    pub allow_private_addresses: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allow_private_addresses: false,
        }
    }
}

/// Text extraction limits
#[derive(Debug, Clone, Copy)]
pub struct ExtractConfig {
    /// Maximum characters of extracted text
    pub max_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_EXTRACT_CHARS,
        }
    }
}

/// Load variables from a `.env` file outside production
///
/// Must run before [`Config::load`] so the values are visible to it.
pub fn load_dotenv() {
    let production = std::env::var("ENVIRONMENT").is_ok_and(|v| v.eq_ignore_ascii_case("production"));
    if production {
        return;
    }
    if let Ok(path) = dotenv::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }
}

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the environment and the optional TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a transport or provider name is not recognized
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a transport or provider name is not recognized
    pub fn from_sources(
        fc: file::GatewayConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let environment = env("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        // Server (env > toml > default)
        let transport = env("MCP_TRANSPORT")
            .or(fc.server.transport)
            .map(|s| Transport::parse(&s))
            .transpose()?
            .unwrap_or_default();
        let server = ServerConfig {
            transport,
            host: env("MCP_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env("MCP_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            api_key: env("MCP_API_KEY")
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            mask_error_details: env("MCP_MASK_ERROR_DETAILS")
                .map(|v| parse_bool(&v))
                .or(fc.server.mask_error_details)
                .unwrap_or(false),
        };

        // Search provider (env > toml > default)
        let provider = env("SEARCH_PROVIDER")
            .or(fc.search.provider)
            .map(|s| ProviderKind::parse(&s))
            .transpose()?
            .unwrap_or_default();
        let api_key = match provider {
            ProviderKind::Serper => env("SERPER_API_KEY").or(fc.search.serper_api_key),
            ProviderKind::Brave => env("BRAVE_API_KEY").or(fc.search.brave_api_key),
        };
        let search = SearchConfig {
            provider,
            api_key: api_key.filter(|k| !k.is_empty()).map(SecretString::from),
            base_url: env("SEARCH_BASE_URL")
                .or(fc.search.base_url)
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            timeout: fc
                .limits
                .search_timeout_secs
                .map_or(DEFAULT_SEARCH_TIMEOUT, Duration::from_secs),
        };

        let fetch = FetchConfig {
            timeout: fc
                .limits
                .fetch_timeout_secs
                .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_secs),
            max_redirects: fc.limits.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
            max_body_bytes: fc.limits.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            allow_private_addresses: env("FETCH_ALLOW_PRIVATE")
                .map(|v| parse_bool(&v))
                .or(fc.limits.allow_private_addresses)
                .unwrap_or(false),
        };

        let extract = ExtractConfig {
            max_chars: fc
                .limits
                .max_extract_chars
                .unwrap_or(DEFAULT_MAX_EXTRACT_CHARS),
        };

        Ok(Self {
            environment,
            server,
            search,
            fetch,
            extract,
        })
    }

    /// Check if running in production environment
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

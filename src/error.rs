//! Error types for the search gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication failures raised by the auth gate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token absent or not matching the configured one
    #[error("authentication required: missing or invalid bearer token")]
    Unauthorized,
}

/// Parameter validation failures, raised before any network I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required parameter is absent or null
    #[error("missing required parameter: {0}")]
    MissingField(&'static str),

    /// A parameter is not one of its allowed codes
    #[error("invalid value for {field}: {value:?} ({expected})")]
    InvalidEnum {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A parameter has the wrong type or shape
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// No tool registered under this name
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Search provider failures
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider answered with a non-success status
    #[error("search provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Provider response did not have the expected shape
    #[error("failed to parse search provider response: {0}")]
    Parse(String),

    /// Provider did not answer within the deadline
    #[error("search provider timed out")]
    Timeout,

    /// Connection-level failure talking to the provider
    #[error("search provider connection error: {0}")]
    Network(String),

    /// No API key configured for the selected provider
    #[error("search provider {0} is not configured (missing API key)")]
    NotConfigured(&'static str),
}

/// Webpage fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request did not complete within the deadline
    #[error("request timed out")]
    Timeout,

    /// Redirect chain exceeded the configured hop limit
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Only http and https are fetched
    #[error("invalid scheme: {0}. Only http and https are allowed")]
    InvalidScheme(String),

    /// URL could not be parsed as an absolute URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Destination resolves to a private or internal address
    #[error("blocked: {host} resolves to private/internal IP {ip}")]
    Blocked { host: String, ip: std::net::IpAddr },

    /// Page answered with a non-success status
    #[error("page returned HTTP {0}")]
    HttpStatus(u16),

    /// Any other transport failure
    #[error("request failed: {0}")]
    Network(String),
}

/// Errors that can occur in the search gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Parameter validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Search provider error
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Webpage fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stable machine-readable kind, reported to callers next to the message
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Auth(AuthError::Unauthorized) => "unauthorized",
            Self::Validation(e) => match e {
                ValidationError::MissingField(_) => "missing_field",
                ValidationError::InvalidEnum { .. } => "invalid_enum",
                ValidationError::InvalidValue { .. } => "invalid_value",
                ValidationError::UnknownTool(_) => "unknown_tool",
            },
            Self::Search(e) => match e {
                SearchError::Upstream { .. } => "upstream_error",
                SearchError::Parse(_) => "parse_error",
                SearchError::Timeout => "timeout",
                SearchError::Network(_) => "network_error",
                SearchError::NotConfigured(_) => "not_configured",
            },
            Self::Fetch(e) => match e {
                FetchError::Timeout => "timeout",
                FetchError::TooManyRedirects(_) => "too_many_redirects",
                FetchError::InvalidScheme(_) => "invalid_scheme",
                FetchError::InvalidUrl(_) => "invalid_url",
                FetchError::Blocked { .. } => "blocked",
                FetchError::HttpStatus(_) => "http_status",
                FetchError::Network(_) => "network_error",
            },
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Toml(_) => "config_error",
        }
    }

    /// Message safe to show callers when internal details are masked
    ///
    /// Upstream bodies and transport details are dropped; everything the
    /// caller itself supplied (field names, values) is kept.
    #[must_use]
    pub fn masked_message(&self) -> String {
        match self {
            Self::Search(SearchError::Upstream { status, .. }) => {
                format!("search provider returned {status}")
            }
            Self::Search(SearchError::Network(_)) => "search provider connection error".to_string(),
            Self::Fetch(FetchError::Network(_)) => "request failed".to_string(),
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Toml(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_failures() {
        assert_eq!(Error::from(AuthError::Unauthorized).kind(), "unauthorized");
        assert_eq!(
            Error::from(ValidationError::MissingField("query")).kind(),
            "missing_field"
        );
        assert_eq!(Error::from(SearchError::Timeout).kind(), "timeout");
        assert_eq!(Error::from(FetchError::TooManyRedirects(5)).kind(), "too_many_redirects");
        assert_eq!(
            Error::from(FetchError::InvalidScheme("ftp".into())).kind(),
            "invalid_scheme"
        );
    }

    #[test]
    fn test_masked_message_hides_upstream_body() {
        let err = Error::from(SearchError::Upstream {
            status: 403,
            body: "key abc123 revoked".to_string(),
        });
        assert!(err.to_string().contains("abc123"));
        assert_eq!(err.masked_message(), "search provider returned 403");
    }
}

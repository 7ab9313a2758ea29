//! TOML configuration file loading
//!
//! Supports `~/.config/search-gateway/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigFile {
    /// Server/transport configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Search provider configuration
    #[serde(default)]
    pub search: SearchFileConfig,

    /// Timeouts and size limits
    #[serde(default)]
    pub limits: LimitsFileConfig,
}

/// Server/transport configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Transport: "http" or "stdio"
    pub transport: Option<String>,

    /// Bind host for the HTTP transport
    pub host: Option<String>,

    /// Bind port for the HTTP transport
    pub port: Option<u16>,

    /// Hide upstream response bodies and transport details from callers
    pub mask_error_details: Option<bool>,
}

/// Search provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct SearchFileConfig {
    /// Provider name ("serper" or "brave")
    pub provider: Option<String>,

    /// Serper API key
    pub serper_api_key: Option<String>,

    /// Brave Search API key
    pub brave_api_key: Option<String>,

    /// Override of the provider base URL
    pub base_url: Option<String>,
}

/// Timeouts and size limits
#[derive(Debug, Default, Deserialize)]
pub struct LimitsFileConfig {
    pub search_timeout_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub max_redirects: Option<usize>,
    pub max_body_bytes: Option<usize>,
    pub max_extract_chars: Option<usize>,
    pub allow_private_addresses: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GatewayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GatewayConfigFile {
    config_file_path().map_or_else(GatewayConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> GatewayConfigFile {
    if !path.exists() {
        return GatewayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GatewayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GatewayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/search-gateway/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("search-gateway").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let fc: GatewayConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000

            [limits]
            max_extract_chars = 500
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.port, Some(9000));
        assert_eq!(fc.server.host, None);
        assert_eq!(fc.limits.max_extract_chars, Some(500));
        assert!(fc.search.provider.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let fc = load_from(Path::new("/nonexistent/search-gateway/config.toml"));
        assert!(fc.server.port.is_none());
    }
}

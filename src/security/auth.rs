//! Bearer token authentication
//!
//! Two modes:
//! - Open: no token configured, every call is authorized
//! - Token: callers must present the configured bearer token

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// Authentication mode derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication required (development/trusted network)
    Open,

    /// Bearer token authentication
    Token,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Token => write!(f, "token"),
        }
    }
}

/// Immutable gate checking inbound tokens against the configured one
///
/// Built once at startup and shared read-only between concurrent calls.
#[derive(Debug)]
pub struct AuthGate {
    expected: Option<SecretString>,
}

impl AuthGate {
    /// Create a gate; `None` puts it in open mode
    #[must_use]
    pub fn new(expected: Option<SecretString>) -> Self {
        Self { expected }
    }

    /// Gate that authorizes everything
    #[must_use]
    pub const fn open() -> Self {
        Self { expected: None }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        if self.expected.is_some() {
            AuthMode::Token
        } else {
            AuthMode::Open
        }
    }

    /// Check a caller-supplied token
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` if a token is configured and the
    /// supplied one is absent or different
    pub fn authorize(&self, token: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };

        match token {
            Some(token) if constant_time_eq(token, expected.expose_secret()) => Ok(()),
            Some(_) => {
                tracing::warn!("invalid bearer token provided");
                Err(AuthError::Unauthorized)
            }
            None => {
                tracing::debug!("no bearer token provided");
                Err(AuthError::Unauthorized)
            }
        }
    }
}

/// Compare two strings in constant time
///
/// Length mismatches still run a comparison so the rejection takes the same
/// path as a content mismatch.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = b_bytes.ct_eq(b_bytes);
        false
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// Any other scheme yields `None`, which the gate treats as an absent token.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(token: &str) -> AuthGate {
        AuthGate::new(Some(SecretString::from(token.to_string())))
    }

    #[test]
    fn test_open_mode_authorizes_anything() {
        let gate = AuthGate::open();
        assert_eq!(gate.mode(), AuthMode::Open);
        assert!(gate.authorize(None).is_ok());
        assert!(gate.authorize(Some("")).is_ok());
        assert!(gate.authorize(Some("whatever")).is_ok());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(AuthGate::open().mode().to_string(), "open");
        assert_eq!(gate("k").mode().to_string(), "token");
    }

    #[test]
    fn test_token_mode_accepts_exact_match() {
        let gate = gate("test-key-123");
        assert_eq!(gate.mode(), AuthMode::Token);
        assert!(gate.authorize(Some("test-key-123")).is_ok());
    }

    #[test]
    fn test_token_mode_rejects_wrong_or_absent() {
        let gate = gate("test-key-123");
        assert_eq!(gate.authorize(None), Err(AuthError::Unauthorized));
        assert_eq!(gate.authorize(Some("test-key-124")), Err(AuthError::Unauthorized));
        assert_eq!(gate.authorize(Some("test-key-1234")), Err(AuthError::Unauthorized));
        assert_eq!(gate.authorize(Some("")), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("hello", "hellp"));
        assert!(!constant_time_eq("hello", "hello!"));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer test-key-123"), Some("test-key-123"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("test-key-123"), None);
    }
}

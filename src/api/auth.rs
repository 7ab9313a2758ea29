//! Bearer token extraction for HTTP requests

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::security::bearer_token;

/// Extract the bearer token from the `Authorization` header
///
/// Missing, non-UTF-8 or non-Bearer headers all read as "no token".
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();

        // No header
        assert_eq!(extract_bearer(&headers), None);

        // With Bearer token
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer test-key-123"));
        assert_eq!(extract_bearer(&headers), Some("test-key-123"));

        // Other scheme
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer(&headers), None);
    }
}

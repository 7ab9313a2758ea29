//! MCP endpoint: JSON-RPC 2.0 over HTTP POST

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;

use super::ApiState;
use super::auth::extract_bearer;
use crate::rpc::{JsonRpcError, JsonRpcResponse};

/// Handle one JSON-RPC message
///
/// Notifications are acknowledged with `202 Accepted` and no body. A
/// rejected token answers `401` with the JSON-RPC error as body; every other
/// outcome is `200` (or `400` for unparseable JSON).
async fn handle_mcp(State(state): State<Arc<ApiState>>, headers: HeaderMap, body: Bytes) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable MCP request body");
            let response = JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("parse error: {e}")),
            );
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    if !message.is_object() {
        let response = JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "expected a single JSON-RPC object"),
        );
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    }

    let token = extract_bearer(&headers);
    match state.handler.handle_value(message, token).await {
        None => StatusCode::ACCEPTED.into_response(),
        Some(response) => {
            let unauthorized = response
                .error
                .as_ref()
                .is_some_and(|e| e.code == JsonRpcError::UNAUTHORIZED);
            if unauthorized {
                let mut resp = (StatusCode::UNAUTHORIZED, Json(response)).into_response();
                resp.headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                resp
            } else {
                Json(response).into_response()
            }
        }
    }
}

/// Build MCP router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .with_state(state)
}

//! Shared test utilities

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use search_gateway::api::ApiServer;
use search_gateway::config::{ExtractConfig, FetchConfig, ProviderKind};
use search_gateway::rpc::RpcHandler;
use search_gateway::security::AuthGate;
use search_gateway::{HttpFetcher, SearchClient, SearchProvider, ToolDispatcher};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Gateway wiring for a test, pointed at mock upstreams
pub struct TestGateway {
    pub api_key: Option<&'static str>,
    pub search_base: Option<String>,
    pub fetch_timeout: Duration,
    pub allow_private: bool,
    pub mask_errors: bool,
}

impl Default for TestGateway {
    fn default() -> Self {
        Self {
            api_key: None,
            search_base: None,
            fetch_timeout: Duration::from_secs(5),
            allow_private: true,
            mask_errors: false,
        }
    }
}

impl TestGateway {
    /// Build the full HTTP router
    pub fn router(self) -> Router {
        let search = self.search_base.map(|base| {
            SearchClient::new(
                SearchProvider::Serper {
                    api_key: SecretString::from("serper-test-key".to_string()),
                },
                base,
                Duration::from_secs(5),
            )
            .expect("failed to build search client")
        });
        let fetcher = HttpFetcher::new(FetchConfig {
            timeout: self.fetch_timeout,
            allow_private_addresses: self.allow_private,
            ..FetchConfig::default()
        })
        .expect("failed to build fetcher");

        let auth = AuthGate::new(self.api_key.map(|k| SecretString::from(k.to_string())));
        let dispatcher = ToolDispatcher::new(
            Arc::new(auth),
            search,
            ProviderKind::Serper,
            fetcher,
            ExtractConfig::default(),
        );
        let handler = RpcHandler::new(Arc::new(dispatcher), self.mask_errors);

        ApiServer::new(handler, "127.0.0.1", 0).router()
    }
}

/// POST a raw body to `/mcp`, returning status and parsed JSON (null if empty)
pub async fn post_raw(app: Router, body: String, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let response = app
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

/// POST a JSON-RPC message to `/mcp`
pub async fn post_mcp(app: Router, message: Value, token: Option<&str>) -> (StatusCode, Value) {
    post_raw(app, message.to_string(), token).await
}

/// `tools/call` message with id 1
pub fn tool_call(name: &str, arguments: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

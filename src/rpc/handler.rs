//! Transport-independent MCP request handling

use std::sync::Arc;

use serde_json::{Value, json};

use super::protocol::{
    CallToolParams, CallToolResult, EmbeddedResource, InitializeResult, JSONRPC_VERSION,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ToolContent,
};
use crate::Error;
use crate::tools::render::PREFERRED_FRAME_SIZE;
use crate::tools::{RenderedPayload, ToolDispatcher, ToolOutput};

/// Handles decoded JSON-RPC messages for any transport
///
/// `initialize`, `ping` and notifications are answered without a token;
/// every `tools/*` method goes through the auth gate.
#[derive(Clone)]
pub struct RpcHandler {
    dispatcher: Arc<ToolDispatcher>,
    mask_error_details: bool,
}

impl RpcHandler {
    /// Create a handler around a shared dispatcher
    #[must_use]
    pub const fn new(dispatcher: Arc<ToolDispatcher>, mask_error_details: bool) -> Self {
        Self {
            dispatcher,
            mask_error_details,
        }
    }

    /// Decode and handle one raw message
    ///
    /// Undecodable input yields a parse error response with a null id.
    pub async fn handle_value(&self, message: Value, token: Option<&str>) -> Option<JsonRpcResponse> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(request) => self.handle(request, token).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, format!("invalid request: {e}")),
            )),
        }
    }

    /// Handle one request; notifications produce no response
    pub async fn handle(&self, request: JsonRpcRequest, token: Option<&str>) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            Self::handle_notification(&request);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    JsonRpcError::INVALID_REQUEST,
                    format!("unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(Self::initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(token),
            "tools/call" => self.call_tool(request.params, token).await,
            other => {
                tracing::debug!(method = other, "unknown method");
                Err(JsonRpcError::new(
                    JsonRpcError::METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                ))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn handle_notification(request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => tracing::debug!("client initialized"),
            "notifications/cancelled" => tracing::debug!(params = ?request.params, "client cancelled request"),
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    fn initialize(params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let result = InitializeResult::negotiate(requested);
        tracing::info!(protocol_version = %result.protocol_version, "client connected");
        to_value(&result)
    }

    fn list_tools(&self, token: Option<&str>) -> Result<Value, JsonRpcError> {
        self.dispatcher
            .auth()
            .authorize(token)
            .map_err(|e| self.rpc_error(&Error::from(e)))?;

        Ok(to_value(&ListToolsResult {
            tools: ToolDispatcher::definitions(),
        }))
    }

    async fn call_tool(&self, params: Option<Value>, token: Option<&str>) -> Result<Value, JsonRpcError> {
        // Token first so unauthenticated callers learn nothing about params
        self.dispatcher
            .auth()
            .authorize(token)
            .map_err(|e| self.rpc_error(&Error::from(e)))?;

        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "missing params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| {
                    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, format!("invalid params: {e}"))
                })
            })?;
        let arguments = params.arguments.unwrap_or(Value::Null);

        let output = self
            .dispatcher
            .call(&params.name, &arguments, token)
            .await
            .map_err(|e| self.rpc_error(&e))?;

        Ok(to_value(&call_result(output)))
    }

    fn rpc_error(&self, error: &Error) -> JsonRpcError {
        JsonRpcError::from_error(error, self.mask_error_details)
    }
}

/// Shape a tool output as an MCP call result
#[must_use]
pub fn call_result(output: ToolOutput) -> CallToolResult {
    let text = output.text();

    match output {
        ToolOutput::Search {
            payload: RenderedPayload::Plain(results),
            ..
        } => CallToolResult {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(json!({ "results": results })),
            is_error: None,
        },
        ToolOutput::Search {
            payload: RenderedPayload::Interactive(page),
            ..
        } => CallToolResult {
            content: vec![
                ToolContent::Resource {
                    resource: EmbeddedResource {
                        uri: page.uri.clone(),
                        mime_type: "text/html".to_string(),
                        text: page.html.clone(),
                        meta: Some(json!({
                            "mcpui.dev/ui-preferred-frame-size": PREFERRED_FRAME_SIZE,
                        })),
                    },
                },
                ToolContent::Text { text },
            ],
            structured_content: Some(to_value(&page)),
            is_error: None,
        },
        ToolOutput::Extract(page) => CallToolResult {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(to_value(&page)),
            is_error: None,
        },
    }
}

/// Serialize a response body; these types always serialize
fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        Value::Null
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::config::{ExtractConfig, FetchConfig, ProviderKind};
    use crate::security::AuthGate;
    use crate::tools::HttpFetcher;
    use crate::tools::render::{RenderMode, render};
    use crate::tools::{ExtractedPage, SearchResult};

    fn handler(token: Option<&str>) -> RpcHandler {
        let fetcher = HttpFetcher::new(FetchConfig {
            timeout: Duration::from_secs(1),
            ..FetchConfig::default()
        })
        .unwrap();
        let dispatcher = ToolDispatcher::new(
            Arc::new(AuthGate::new(token.map(|t| SecretString::from(t.to_string())))),
            None,
            ProviderKind::Serper,
            fetcher,
            ExtractConfig::default(),
        );
        RpcHandler::new(Arc::new(dispatcher), false)
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    #[tokio::test]
    async fn test_initialize_and_ping_skip_auth() {
        let h = handler(Some("secret"));

        let resp = h
            .handle(request("initialize", Some(json!({"protocolVersion": "2024-11-05"}))), None)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "search-gateway");
        assert!(result["capabilities"]["tools"].is_object());

        let resp = h.handle(request("ping", None), None).await.unwrap();
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tools_require_token() {
        let h = handler(Some("secret"));

        let resp = h.handle(request("tools/list", None), None).await.unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::UNAUTHORIZED);

        let resp = h
            .handle(request("tools/call", Some(json!({"name": "search_web"}))), Some("nope"))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::UNAUTHORIZED);

        let resp = h.handle(request("tools/list", None), Some("secret")).await.unwrap();
        assert_eq!(resp.result.unwrap()["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let h = handler(None);
        let note = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(h.handle(note, None).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_params() {
        let h = handler(None);

        let resp = h.handle(request("resources/list", None), None).await.unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let resp = h.handle(request("tools/call", None), None).await.unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let resp = h
            .handle(request("tools/call", Some(json!({"name": "search_web", "arguments": {}}))), None)
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(error.data, Some(json!({"kind": "missing_field"})));

        let resp = h
            .handle(request("tools/call", Some(json!({"name": "search_web", "arguments": {"query": "q"}}))), None)
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::TOOL_ERROR);
        assert_eq!(error.data, Some(json!({"kind": "not_configured"})));
    }

    #[tokio::test]
    async fn test_handle_value_rejects_malformed_request() {
        let h = handler(None);
        let resp = h.handle_value(json!({"id": 3, "method": 12}), None).await.unwrap();
        assert_eq!(resp.id, json!(3));
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[test]
    fn test_call_result_shapes() {
        let results = vec![SearchResult {
            title: "A".to_string(),
            url: "https://a.example".to_string(),
            snippet: "first".to_string(),
            position: 1,
        }];

        let plain = call_result(ToolOutput::Search {
            text: "A\nhttps://a.example\nfirst".to_string(),
            payload: render("a", results.clone(), RenderMode::Plain),
        });
        assert_eq!(plain.text(), "A\nhttps://a.example\nfirst");
        assert_eq!(plain.structured_content.unwrap()["results"][0]["position"], 1);

        let interactive = call_result(ToolOutput::Search {
            text: String::new(),
            payload: render("a", results, RenderMode::Interactive),
        });
        let ToolContent::Resource { resource } = &interactive.content[0] else {
            panic!("expected embedded resource first");
        };
        assert!(resource.uri.starts_with("ui://search-gateway/results-"));
        assert_eq!(resource.mime_type, "text/html");
        let structured = interactive.structured_content.unwrap();
        assert_eq!(structured["items"][0]["affordances"].as_array().unwrap().len(), 2);

        let extract = call_result(ToolOutput::Extract(ExtractedPage {
            url: "https://a.example".to_string(),
            title: None,
            text: "body".to_string(),
            truncated: false,
        }));
        assert_eq!(extract.text(), "body");
        assert_eq!(extract.structured_content.unwrap()["truncated"], false);
    }
}

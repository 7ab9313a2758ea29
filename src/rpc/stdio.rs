//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout
//!
//! Each request runs in its own task so a slow search never blocks the
//! reader. `notifications/cancelled` aborts the matching task.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::AbortHandle;

use super::handler::RpcHandler;
use super::protocol::{JsonRpcError, JsonRpcResponse};
use crate::Result;

type InFlight = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// Serve on the process stdin/stdout until stdin closes
///
/// # Errors
///
/// Returns error if reading stdin or writing stdout fails
pub async fn serve_stdio(handler: RpcHandler) -> Result<()> {
    tracing::info!("serving MCP over stdio");
    serve(handler, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve on arbitrary streams until `input` reaches EOF
///
/// Requests still running at EOF are allowed to finish.
///
/// # Errors
///
/// Returns error if reading `input` or writing `output` fails
pub async fn serve<R, W>(handler: RpcHandler, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
    let writer = tokio::spawn(write_responses(rx, output));
    let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable message on stdin");
                let _ = tx.send(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("parse error: {e}")),
                ));
                continue;
            }
        };

        if message.get("method").and_then(Value::as_str) == Some("notifications/cancelled") {
            cancel(&in_flight, &message).await;
        }

        let key = message
            .get("id")
            .filter(|id| !id.is_null())
            .map(Value::to_string);

        let handler = handler.clone();
        let tx = tx.clone();
        let table = Arc::clone(&in_flight);
        let task_key = key.clone();
        // Holding the lock across spawn + insert keeps a fast task from
        // removing its entry before it exists
        let mut guard = in_flight.lock().await;
        let task = tokio::spawn(async move {
            if let Some(response) = handler.handle_value(message, None).await {
                let _ = tx.send(response);
            }
            if let Some(key) = task_key {
                table.lock().await.remove(&key);
            }
        });
        if let Some(key) = key {
            guard.insert(key, task.abort_handle());
        }
        drop(guard);
    }

    tracing::debug!("stdin closed, waiting for in-flight requests");
    drop(tx);
    writer
        .await
        .map_err(|e| crate::Error::Io(std::io::Error::other(e)))??;
    Ok(())
}

/// Abort the task named by a `notifications/cancelled` message
async fn cancel(in_flight: &InFlight, message: &Value) {
    let Some(request_id) = message.get("params").and_then(|p| p.get("requestId")) else {
        return;
    };
    let key = request_id.to_string();
    if let Some(handle) = in_flight.lock().await.remove(&key) {
        handle.abort();
        tracing::debug!(request_id = %key, "request cancelled");
    }
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}

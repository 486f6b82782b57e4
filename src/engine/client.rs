use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::directory::WorkerDirectory;
use crate::engine::errors::EngineError;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: JsonRpcParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct JsonRpcParams<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<Value>,
    // `Option<JsonRpcError>` already collapses an explicit `"error": null`
    // and a missing `error` key to `None` — both must mean success per the
    // wire protocol, and serde's null handling gives us that for free.
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Issues a JSON-RPC 2.0 `tools/call` to a named worker, resolved through a
/// `WorkerDirectory`, over HTTP POST with a configurable per-request
/// timeout.
pub struct ToolClient {
    http: reqwest::Client,
    directory: Arc<dyn WorkerDirectory>,
}

impl ToolClient {
    pub fn new(directory: Arc<dyn WorkerDirectory>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        ToolClient { http, directory }
    }

    pub async fn call(&self, worker_name: &str, tool_name: &str, arguments: Value) -> Result<Value, EngineError> {
        let endpoint = self.directory.resolve(worker_name)?;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "tools/call",
            params: JsonRpcParams {
                name: tool_name,
                arguments: &arguments,
            },
            id: 1,
        };

        let response = self
            .http
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::TransportError {
                worker: worker_name.to_string(),
                tool: tool_name.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(EngineError::TransportError {
                worker: worker_name.to_string(),
                tool: tool_name.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| EngineError::ProtocolError {
            worker: worker_name.to_string(),
            tool: tool_name.to_string(),
            message: format!("malformed JSON-RPC envelope: {e}"),
        })?;

        if let Some(err) = body.error {
            return Err(EngineError::ToolError {
                worker: worker_name.to_string(),
                tool: tool_name.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

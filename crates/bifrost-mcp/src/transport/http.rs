use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{McpError, McpResult};
use crate::protocol::{CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ToolDescriptor};

use super::Transport;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum HttpMode {
    /// Plain request/response: POST a JSON-RPC envelope, read the JSON-RPC
    /// envelope back from the body.
    Streamable,
    /// The body is an SSE stream; the JSON-RPC response is the first `data:`
    /// frame whose payload carries a matching id.
    Sse,
}

/// A persistent `reqwest::Client`-backed transport for the HTTP and SSE
/// connection kinds.
pub struct HttpTransport {
    name: String,
    url: String,
    client: reqwest::Client,
    mode: HttpMode,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(client_name: &str, url: &str, headers: &[(String, String)], mode: HttpMode) -> McpResult<Self> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| McpError::Handshake {
                client: client_name.to_string(),
                message: format!("invalid header name {key:?}: {e}"),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| McpError::Handshake {
                client: client_name.to_string(),
                message: format!("invalid header value for {key:?}: {e}"),
            })?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::Handshake {
                client: client_name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name: client_name.to_string(),
            url: url.to_string(),
            client,
            mode,
            next_id: AtomicU64::new(1),
        })
    }

    async fn roundtrip(&self, method: &'static str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| McpError::Transport {
                client: self.name.clone(),
                message: e.to_string(),
            })?;

        let envelope: JsonRpcResponse = match self.mode {
            HttpMode::Streamable => response.json().await.map_err(|e| McpError::Protocol {
                client: self.name.clone(),
                message: e.to_string(),
            })?,
            HttpMode::Sse => self.read_sse_envelope(response, id).await?,
        };

        if let Some(error) = envelope.error {
            return Err(McpError::Protocol {
                client: self.name.clone(),
                message: format!("{} (code {})", error.message, error.code),
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    async fn read_sse_envelope(&self, response: reqwest::Response, want_id: u64) -> McpResult<JsonRpcResponse> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| McpError::Transport {
                client: self.name.clone(),
                message: e.to_string(),
            })?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline_at) = buffer.find('\n') {
                let line = buffer[..newline_at].trim_end_matches('\r').to_string();
                buffer.drain(..=newline_at);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }

                let envelope: JsonRpcResponse = serde_json::from_str(data).map_err(|e| McpError::Protocol {
                    client: self.name.clone(),
                    message: format!("{e}: {data}"),
                })?;

                if envelope.id == Some(want_id) {
                    return Ok(envelope);
                }
            }
        }

        Err(McpError::Transport {
            client: self.name.clone(),
            message: "sse stream closed before a matching response arrived".to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let result = self.roundtrip("tools/list", None).await?;
        let parsed: ListToolsResult = serde_json::from_value(result).map_err(|e| McpError::Protocol {
            client: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(parsed.tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        let params = serde_json::to_value(CallToolParams { name, arguments }).map_err(|e| McpError::Protocol {
            client: self.name.clone(),
            message: e.to_string(),
        })?;
        let result = self.roundtrip("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| McpError::Protocol {
            client: self.name.clone(),
            message: e.to_string(),
        })
    }
}

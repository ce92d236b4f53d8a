use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::error::{McpError, McpResult};
use crate::protocol::{CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ToolDescriptor};

use super::Transport;

/// Newline-delimited JSON-RPC over a child process's stdio: `LinesCodec`
/// over the raw pipes, one request in flight at a time.
///
/// The I/O streams live behind a `tokio::sync::Mutex` because request/response
/// spans an `.await`; the request-id counter is a plain atomic.
pub struct StdioTransport {
    name: String,
    child: TokioMutex<Child>,
    reader: TokioMutex<FramedRead<BufReader<ChildStdout>, LinesCodec>>,
    writer: TokioMutex<FramedWrite<ChildStdin, LinesCodec>>,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub async fn spawn(
        client_name: &str,
        command: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> McpResult<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Handshake {
            client: client_name.to_string(),
            message: format!("spawn {command}: {e}"),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Handshake {
            client: client_name.to_string(),
            message: "child process has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Handshake {
            client: client_name.to_string(),
            message: "child process has no stdout".to_string(),
        })?;

        let transport = Self {
            name: client_name.to_string(),
            child: TokioMutex::new(child),
            reader: TokioMutex::new(FramedRead::new(BufReader::new(stdout), LinesCodec::new())),
            writer: TokioMutex::new(FramedWrite::new(stdin, LinesCodec::new())),
            next_id: AtomicU64::new(1),
        };

        // MCP handshake: `initialize` then `notifications/initialized`. The
        // result payload (capabilities) is not consulted; the gateway only
        // cares that the child answered in-protocol.
        transport.roundtrip("initialize", Some(serde_json::json!({}))).await?;
        transport.notify("notifications/initialized", None).await?;

        Ok(transport)
    }

    async fn roundtrip(&self, method: &'static str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request).map_err(|e| McpError::Protocol {
            client: self.name.clone(),
            message: e.to_string(),
        })?;

        {
            let mut writer = self.writer.lock().await;
            writer.send(line).await.map_err(|e| McpError::Transport {
                client: self.name.clone(),
                message: e.to_string(),
            })?;
        }

        let mut reader = self.reader.lock().await;
        loop {
            let line = reader
                .next()
                .await
                .ok_or_else(|| McpError::Transport {
                    client: self.name.clone(),
                    message: "child process closed stdout".to_string(),
                })?
                .map_err(|e| McpError::Transport {
                    client: self.name.clone(),
                    message: e.to_string(),
                })?;

            let response: JsonRpcResponse = serde_json::from_str(&line).map_err(|e| McpError::Protocol {
                client: self.name.clone(),
                message: format!("{e}: {line}"),
            })?;

            if response.id != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(McpError::Protocol {
                    client: self.name.clone(),
                    message: format!("{} (code {})", error.message, error.code),
                });
            }

            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &'static str, params: Option<Value>) -> McpResult<()> {
        #[derive(serde::Serialize)]
        struct Notification {
            jsonrpc: &'static str,
            method: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            params: Option<Value>,
        }

        let line = serde_json::to_string(&Notification {
            jsonrpc: crate::protocol::JSONRPC_VERSION,
            method,
            params,
        })
        .map_err(|e| McpError::Protocol {
            client: self.name.clone(),
            message: e.to_string(),
        })?;

        let mut writer = self.writer.lock().await;
        writer.send(line).await.map_err(|e| McpError::Transport {
            client: self.name.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
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

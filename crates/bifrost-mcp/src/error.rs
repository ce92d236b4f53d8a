#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("mcp client {0:?} is not registered")]
    UnknownClient(String),
    #[error("tool {0:?} is not registered (no local handler, no client catalog entry)")]
    UnknownTool(String),
    #[error("mcp transport error talking to {client:?}: {message}")]
    Transport { client: String, message: String },
    #[error("mcp handshake with {client:?} failed: {message}")]
    Handshake { client: String, message: String },
    #[error("name {0:?} is already registered (must be unique across clients and local tools)")]
    DuplicateName(String),
    #[error("malformed mcp response from {client:?}: {message}")]
    Protocol { client: String, message: String },
}

pub type McpResult<T> = Result<T, McpError>;

//! The HTTP wire transport: an `axum::Router` over the dispatcher and
//! MCP manager, plus the request/response/error body shapes that make up
//! the external wire contract.

mod error;
mod mcp_headers;
mod router;
mod routes;
mod state;

pub use error::{ApiError, ErrorDetail, ErrorResponseBody};
pub use router::bifrost_router;
pub use state::AppState;

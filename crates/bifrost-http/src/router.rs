use axum::Router;
use axum::routing::{get, post};

use crate::routes;
use crate::state::AppState;

/// The HTTP transport surface: one route per endpoint, state injected via
/// `.with_state`.
pub fn bifrost_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(routes::chat_completions))
        .route("/v1/text/completions", post(routes::text_completions))
        .route("/v1/mcp/tool/execute", post(routes::execute_tool))
        .route("/metrics", get(routes::metrics))
        .with_state(state)
}

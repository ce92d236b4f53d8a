use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bifrost_provider_core::ToolCall;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /v1/mcp/tool/execute`: executes a single tool-call payload and
/// returns the tool-role message the dispatcher would otherwise splice into
/// a conversation — always a message, never a bare error, since "tool-call
/// protocol survival requires a response for every tool-call id".
pub async fn execute_tool(State(state): State<AppState>, Json(tool_call): Json<ToolCall>) -> Response {
    let Some(mcp) = state.mcp.as_ref() else {
        return ApiError::invalid_request("mcp sub-engine is disabled").into_response();
    };

    let message = mcp.execute_tool_call(&tool_call).await;
    Json(message).into_response()
}

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bifrost_core::InboundContext;
use bifrost_provider_core::RequestKind;

use crate::error::ApiError;
use crate::mcp_headers;
use crate::state::AppState;

use super::body::DispatchRequestBody;

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DispatchRequestBody>,
) -> Response {
    dispatch(state, headers, body, RequestKind::Chat).await
}

pub async fn text_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DispatchRequestBody>,
) -> Response {
    dispatch(state, headers, body, RequestKind::Text).await
}

async fn dispatch(state: AppState, headers: HeaderMap, body: DispatchRequestBody, kind: RequestKind) -> Response {
    let mcp_options = mcp_headers::parse(&headers);
    let ctx = InboundContext::new().with_mcp_options(mcp_options);
    let spec = body.into_spec(kind);

    match state.dispatcher.submit(&ctx, kind, spec).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

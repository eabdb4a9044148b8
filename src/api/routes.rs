//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name              | Description                                    | Return Type         |
// |-------------------|------------------------------------------------|---------------------|
// | health            | Health check endpoint                          | Response            |
// | json_rpc          | Request/response commands over `POST /`        | ApiResult<Response> |
// | get_connection    | Filters and counters of one connection         | ApiResult<Response> |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map};
use tracing::debug;

use super::{ApiResult, AppState, ConnectionResponse, RpcRequest, RpcResponse};
use crate::domain::models::types::ConnectionId;
use crate::domain::services::subscriptions::SubscriptionError;

/// Health check endpoint
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "node_id": state.config.node_id,
        "connections": state.manager.connection_count()
    }))
}

/// JSON-RPC endpoint. Subscriptions need a streaming session, so
/// `subscribe` and `unsubscribe` are rejected here.
pub async fn json_rpc(
    Extension(_state): Extension<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    let request: RpcRequest = serde_json::from_slice(&body)?;
    debug!(method = %request.method, "JSON-RPC request");

    let response = match request.method.as_str() {
        "subscribe" | "unsubscribe" => {
            let err = SubscriptionError::NotSupportedOnThisTransport;
            RpcResponse::error(err.token(), err.to_string(), request.first_param())
        }
        "ping" => RpcResponse::success(Map::new()),
        other => RpcResponse::error(
            "unknownCmd",
            format!("Unknown method: {}", other),
            request.first_param(),
        ),
    };

    Ok(Json(response).into_response())
}

/// Filters and delivery counters of one connection
pub async fn get_connection(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = ConnectionId::from(id);
    let connection = state
        .manager
        .connection(&id)
        .ok_or_else(|| SubscriptionError::ConnectionNotFound(id.clone()))?;

    Ok(Json(ConnectionResponse::from(connection.as_ref())).into_response())
}

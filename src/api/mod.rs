//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module exposes the subscription engine over HTTP using Axum: a WebSocket streaming
// transport and a JSON-RPC request/response transport that rejects subscriptions.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | API            | Main API structure coordinating routes and services        |
// | Routes         | JSON-RPC, health and connection inspection handlers        |
// | WS             | WebSocket session and command handling                     |
// | DTOs           | Command, response and inspection payloads                  |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                       | Key Methods       |
// |----------------|---------------------------------------------------|-------------------|
// | AppState       | Shared application state                          | new               |
// | Api            | Main API structure                                | routes, serve     |
// | Error          | API error types                                   | from              |
//--------------------------------------------------------------------------------------------------

mod dto;
mod error;
mod routes;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::get,
    Extension, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::domain::services::subscriptions::SubscriptionManager;

pub use dto::*;
pub use error::{ApiError, ApiResult};

/// Shared application state accessible by all handlers
pub struct AppState {
    pub manager: Arc<SubscriptionManager>,
    pub config: Config,
}

impl AppState {
    /// Creates a new application state
    pub fn new(manager: Arc<SubscriptionManager>, config: Config) -> Self {
        Self { manager, config }
    }
}

/// Main API structure
pub struct Api {
    /// API address
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl Api {
    /// Creates a new API instance
    pub fn new(addr: SocketAddr, manager: Arc<SubscriptionManager>, config: Config) -> Self {
        let state = Arc::new(AppState::new(manager, config));
        Self { addr, state }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Creates all routes for the API
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            // Streaming and request/response share the root path
            .route("/", get(ws::ws_handler).post(routes::json_rpc))
            .route("/ws", get(ws::ws_handler))

            // Health check
            .route("/health", get(routes::health))

            // Inspection
            .route("/connections/:id", get(routes::get_connection))

            // Attach application state
            .layer(Extension(self.state.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Starts the API server and runs until shutdown
    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.routes();

        let listener = TcpListener::bind(self.addr).await?;
        info!("API listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;

        Ok(())
    }
}

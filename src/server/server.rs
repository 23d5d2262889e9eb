use crate::{
    actuator::CommandArbiter,
    broadcast::StateBroadcaster,
    config::ServerConfig,
    door::DoorTable,
    error::{GarageError, Result, ServerError},
};
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{health_handler, state_handler, watch_handler, ws_handler};

/// Shared state for the Axum routers
#[derive(Clone)]
pub struct ServerState {
    pub(crate) table: Arc<DoorTable>,
    pub(crate) arbiter: CommandArbiter,
    pub(crate) broadcaster: Arc<StateBroadcaster>,
    pub(crate) started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        table: Arc<DoorTable>,
        arbiter: CommandArbiter,
        broadcaster: Arc<StateBroadcaster>,
    ) -> Self {
        Self {
            table,
            arbiter,
            broadcaster,
            started_at: Utc::now(),
        }
    }
}

/// HTTP surface plus the observer WebSocket endpoint, each on its own port
pub struct ControlServer {
    pub(crate) config: ServerConfig,
    pub(crate) state: ServerState,
}

impl ControlServer {
    pub fn new(config: ServerConfig, state: ServerState) -> Self {
        Self { config, state }
    }

    /// `/watch`, `/state` and `/health`
    pub fn http_router(&self) -> Router {
        Router::new()
            .route("/watch", get(watch_handler))
            .route("/state", get(state_handler))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Observer sessions are upgraded at `/`
    pub fn ws_router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .with_state(self.state.clone())
    }

    async fn bind(&self, port: u16) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.ip, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;
        info!("Listening on {}", addr);
        Ok(listener)
    }

    /// Bind both ports and serve until `token` is cancelled
    pub async fn start(&self, token: CancellationToken) -> Result<()> {
        let http_listener = self.bind(self.config.http_port).await?;
        let ws_listener = self.bind(self.config.ws_port).await?;

        info!(
            "Control server started (http {}, websocket {})",
            self.config.http_port, self.config.ws_port
        );

        let http_token = token.clone();
        let http = axum::serve(http_listener, self.http_router())
            .with_graceful_shutdown(async move { http_token.cancelled().await })
            .into_future();
        let ws = axum::serve(ws_listener, self.ws_router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .into_future();

        tokio::try_join!(http, ws).map_err(|e| ServerError::StartupFailed {
            details: format!("Server error: {}", e),
        })?;

        info!("Control server stopped");
        Ok(())
    }
}

/// Control server builder
pub struct ControlServerBuilder {
    config: Option<ServerConfig>,
    table: Option<Arc<DoorTable>>,
    arbiter: Option<CommandArbiter>,
    broadcaster: Option<Arc<StateBroadcaster>>,
}

impl ControlServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            table: None,
            arbiter: None,
            broadcaster: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn table(mut self, table: Arc<DoorTable>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn arbiter(mut self, arbiter: CommandArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<StateBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn build(self) -> Result<ControlServer> {
        let config = self.config.ok_or_else(|| missing("Server configuration"))?;
        let table = self.table.ok_or_else(|| missing("Door table"))?;
        let arbiter = self.arbiter.ok_or_else(|| missing("Command arbiter"))?;
        let broadcaster = self.broadcaster.ok_or_else(|| missing("State broadcaster"))?;

        Ok(ControlServer::new(
            config,
            ServerState::new(table, arbiter, broadcaster),
        ))
    }
}

impl Default for ControlServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> GarageError {
    GarageError::Server(ServerError::StartupFailed {
        details: format!("{} is required", what),
    })
}

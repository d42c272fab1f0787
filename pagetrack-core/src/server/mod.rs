//! Ingestion endpoint
//!
//! HTTP server accepting event batches from the tracking agent.
//!
//! # Endpoints
//!
//! - `POST /track` - Ingest a batch (plain JSON array, or `-` + JSON array)
//! - `OPTIONS /track` - CORS preflight
//! - `GET /health` - Health check
//!
//! Every `/track` response carries CORS headers for the single configured
//! page origin.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() -> pagetrack_core::Result<()> {
//! use std::sync::Arc;
//! use pagetrack_core::server::IngestServer;
//! use pagetrack_core::{Config, Database};
//!
//! let config = Config::load()?;
//! let db = Database::open(&config.database_path())?;
//! db.migrate()?;
//!
//! let server = IngestServer::new(config.server.clone(), Arc::new(db));
//! server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::ingest::EventSink;

use handlers::{health_check, not_found, preflight, track};

/// Shared state for handlers
pub struct HandlerState {
    pub sink: Arc<dyn EventSink>,
    pub allowed_origin: HeaderValue,
}

/// The ingestion HTTP server
pub struct IngestServer {
    config: ServerConfig,
    sink: Arc<dyn EventSink>,
}

impl IngestServer {
    pub fn new(config: ServerConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Result<Router> {
        let allowed_origin = HeaderValue::from_str(&self.config.allowed_origin).map_err(|e| {
            Error::Config(format!(
                "invalid server.allowed_origin {:?}: {}",
                self.config.allowed_origin, e
            ))
        })?;

        let state = Arc::new(HandlerState {
            sink: Arc::clone(&self.sink),
            allowed_origin,
        });

        Ok(build_router(state, self.config.max_body_bytes))
    }

    /// Bind to the configured address and serve until `shutdown` completes
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let app = self.router()?;
        let address: SocketAddr = listener.local_addr()?;

        tracing::info!(
            address = %address,
            allowed_origin = %self.config.allowed_origin,
            "Ingestion endpoint listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Ingestion endpoint stopped");
        Ok(())
    }
}

/// Build the axum router
fn build_router(state: Arc<HandlerState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/track", post(track).options(preflight))
        .route("/health", get(health_check))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

//! HTTP server setup and routing
//!
//! Sets up the Axum server with the REST routes and the WebSocket endpoint.
//! The registry is closed when a shutdown signal arrives, which disconnects
//! every push subscriber before the server drains.

use crate::device::SharedDevice;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::registry::Registry;
use axum::{
    routing::{get, post},
    Router,
};
use hifi_common::config::TomlConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppContext {
    /// Wire the registry and dispatcher around one device
    pub fn new(device: SharedDevice) -> Self {
        let registry = Arc::new(Registry::new(device.clone()));
        Self {
            dispatcher: Arc::new(Dispatcher::new(device, registry)),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    pub fn device(&self) -> &SharedDevice {
        self.dispatcher.device()
    }
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/api/status", get(super::handlers::get_status))
        .route("/api/state", get(super::handlers::get_state))
        .route(
            "/api/volume",
            get(super::handlers::get_volume).post(super::handlers::set_volume),
        )
        .route("/api/player/play", post(super::handlers::play))
        .route("/api/player/pause", post(super::handlers::pause))
        .route("/api/player/toggle", post(super::handlers::toggle))
        .route("/api/player/next", post(super::handlers::next))
        .route("/api/player/previous", post(super::handlers::previous))
        .route("/api/player/stop", post(super::handlers::stop))
        .route("/api/track", get(super::handlers::get_track))
        .route("/api/artwork", get(super::handlers::get_artwork))
        .route("/api/ws/types", get(super::handlers::ws_types))
        .route("/ws", get(super::ws::ws_handler))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP/WebSocket server until a shutdown signal arrives
pub async fn run(config: &TomlConfig, ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address: {}", e)))?;

    let registry = Arc::clone(ctx.registry());
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            registry.close().await;
        })
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

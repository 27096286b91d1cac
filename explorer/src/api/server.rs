//! API server implementation

use axum::{
    Router,
    http::Method,
};
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::store::SharedStateStore;
use crate::websocket::{self, hub::EventHub};
use crate::api::routes;
use crate::error::{ExplorerError, Result};

pub struct ApiServer {
    store: Arc<SharedStateStore>,
    hub: EventHub,
}

impl ApiServer {
    pub fn new(store: Arc<SharedStateStore>, hub: EventHub) -> Self {
        Self { store, hub }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any);

        Router::new()
            .nest("/api/v1", routes::stats::routes(self.store.clone(), self.hub.clone()))
            .merge(websocket::server::routes(self.hub.clone()))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    pub async fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr).await
            .map_err(|e| ExplorerError::Internal(format!("Failed to bind {}: {}", addr, e)))
    }

    /// Serves on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        tracing::info!("API server listening on {:?}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ExplorerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

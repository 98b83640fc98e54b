// HTTP server
// axum router exposing the assistant, transcription and health endpoints

pub mod handlers;


use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::Result;
use crate::orchestrator::Orchestrator;
use crate::speech::SpeechToText;

use handlers::{health_handler, query_handler, transcribe_handler};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// `None` when no transcription backend is configured
    pub speech: Option<Arc<dyn SpeechToText>>,
    pub started_at: Instant,
}

impl AppState {
    #[inline]
    pub fn new(orchestrator: Arc<Orchestrator>, speech: Option<Arc<dyn SpeechToText>>) -> Self {
        Self {
            orchestrator,
            speech,
            started_at: Instant::now(),
        }
    }
}

#[inline]
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .route("/transcribe", post(transcribe_handler))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse `bind:port`, falling back to loopback on a bad address
#[inline]
pub fn resolve_addr(bind: &str, port: u16) -> SocketAddr {
    let addr = format!("{}:{}", bind, port).parse().unwrap_or_else(|e| {
        warn!(
            "Invalid bind address '{}': {}, falling back to 127.0.0.1:{}",
            bind, e, port
        );
        SocketAddr::from(([127, 0, 0, 1], port))
    });

    if bind == "0.0.0.0" {
        warn!("Server is listening on all interfaces");
    }
    addr
}

/// Serve until the process receives Ctrl-C
#[inline]
pub async fn serve(addr: SocketAddr, state: AppState, max_body_size: usize) -> Result<()> {
    let router = build_router(state, max_body_size);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await?;
    Ok(())
}

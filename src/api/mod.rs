//! HTTP and WebSocket surface for a running playback session
//!
//! Exposes the session state for dashboards and carries the cross-frame
//! remote protocol over `/ws` for embedding pages that cannot post messages
//! to the process directly.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::fetch::TranscriptSource;
use crate::remote::RemoteController;
use crate::session::PlaybackSession;

pub mod models;
pub mod server;

pub use server::AppState;

/// API server bound to one playback session
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(
        session: Arc<PlaybackSession>,
        source: Arc<dyn TranscriptSource>,
        remote: RemoteController,
        config: Arc<Config>,
    ) -> Self {
        Self {
            state: AppState {
                session,
                source,
                remote,
                config,
            },
        }
    }

    /// Start the API server in the background
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Serve until the listener fails
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.state.config.server.host, self.state.config.server.port);
        info!("🚀 Starting API server on {}", addr);
        server::start_http_server(self.state, &addr).await
    }
}

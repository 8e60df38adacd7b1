//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt, Sink};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use super::models::{ApiResponse, HealthStatus};
use crate::config::Config;
use crate::fetch::TranscriptSource;
use crate::remote::{OutboundMessage, RemoteController};
use crate::session::PlaybackSession;
use crate::video_id::VideoId;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<PlaybackSession>,
    pub source: Arc<dyn TranscriptSource>,
    pub remote: RemoteController,
    pub config: Arc<Config>,
}

/// Build the router; split out so tests can drive it without a socket
pub fn router(state: AppState) -> Router {
    // Browsers may only call in from the same origins the remote accepts
    let origins: Vec<HeaderValue> = state
        .remote
        .allow_list()
        .origins()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/api/state", get(state_handler))
        .route("/api/transcript/:id", get(transcript_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState, addr: &str) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 API server listening on http://{}", addr);
    info!("🔗 Remote control endpoint available at ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        video_id: state.session.video_id().map(|id| id.to_string()),
        has_player: state.session.facade().has_player(),
        remote_origins: state.remote.allow_list().len(),
    };
    (StatusCode::OK, Json(ApiResponse::success(health)))
}

async fn state_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(state.session.current_view())))
}

async fn transcript_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let video_id = match VideoId::parse(&id) {
        Ok(video_id) => video_id,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(e.to_string())))
                .into_response()
        }
    };

    // Serve the session's copy when it is the video on screen
    if state.session.video_id().as_ref() == Some(&video_id) {
        let transcript = state.session.store().transcript();
        return (StatusCode::OK, Json(ApiResponse::success(transcript.as_ref().clone())))
            .into_response();
    }

    match state.source.load(&video_id).await {
        Ok(transcript) => (StatusCode::OK, Json(ApiResponse::success(transcript))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(e.user_message())),
        )
            .into_response(),
    }
}

/// WebSocket upgrade; the `Origin` header must be on the allow-list
///
/// The origin is checked before the upgrade itself, so untrusted callers get
/// a 403 whatever else their request carries.
async fn websocket_handler(
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !state.remote.allow_list().allows(&origin) {
        warn!("🚫 Refusing remote connection from untrusted origin '{}'", origin);
        return StatusCode::FORBIDDEN.into_response();
    }

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| websocket_connection(socket, state, origin)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn send_json<S>(sender: &mut S, message: &OutboundMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode outbound message: {}", e);
            true
        }
    }
}

async fn websocket_connection(socket: WebSocket, state: AppState, origin: String) {
    info!("🔌 Remote connected from {}", origin);
    let (mut sender, mut receiver) = socket.split();
    let mut outbound = state.remote.subscribe();

    let snapshot = OutboundMessage::StateChange {
        state: state.session.facade().state(),
    };
    if !send_json(&mut sender, &snapshot).await {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Rejections are logged by the controller and never echoed back
                        if let Err(e) = state.remote.handle(&origin, &text) {
                            debug!("Remote message not applied: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            message = outbound.recv() => {
                match message {
                    Ok(message) => {
                        if !send_json(&mut sender, &message).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Remote listener lagged, skipped {} messages", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("🔌 Remote from {} disconnected", origin);
}

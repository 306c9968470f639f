//! HTTP event-stream transport (§6)
//!
//! Mirrors the stdio transport's dispatch (`McpServer::handle_message`) over
//! HTTP instead of line-delimited stdin/stdout. A client opens a long-lived
//! SSE connection on `GET /events`, receives a `session_id` as the first
//! event, then posts JSON-RPC requests to `POST /rpc/:session_id`; each
//! response is delivered back as a `message` event on the matching stream.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use graphmem::mcp::McpServer;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 64;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state for the HTTP event-stream transport
#[derive(Clone)]
pub struct HttpState {
    server: Arc<McpServer>,
    sessions: Arc<RwLock<std::collections::HashMap<String, broadcast::Sender<String>>>>,
    next_session: Arc<AtomicU64>,
}

impl HttpState {
    pub fn new(server: McpServer) -> Self {
        Self {
            server: Arc::new(server),
            sessions: Arc::new(RwLock::new(std::collections::HashMap::new())),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// Build the axum router for the HTTP event-stream transport
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/events", get(open_events))
        .route("/rpc/:session_id", post(post_rpc))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn open_events(State(state): State<HttpState>) -> Response {
    let session_id = state
        .next_session
        .fetch_add(1, Ordering::Relaxed)
        .to_string();
    let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
    state.sessions.write().await.insert(session_id.clone(), tx);

    let hello = futures::stream::once(async move {
        Ok(Event::default()
            .event("endpoint")
            .data(json!({ "session_id": session_id }).to_string()))
    });

    let messages = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(body) => Some(Ok::<_, Infallible>(Event::default().event("message").data(body))),
            Err(_) => None,
        }
    });

    let sse = Sse::new(hello.chain(messages)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text(": keep-alive"),
    );

    // Proxies buffer SSE by default and sit on events until the buffer
    // fills, defeating the stream; these headers tell them not to.
    (
        [
            (axum::http::header::CACHE_CONTROL, "no-cache"),
            (axum::http::header::CONNECTION, "keep-alive"),
            (axum::http::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response()
}

async fn post_rpc(
    State(state): State<HttpState>,
    Path(session_id): Path<String>,
    body: String,
) -> Response {
    let response_json = state.server.handle_message(&body).await;

    let delivered = {
        let sessions = state.sessions.read().await;
        match sessions.get(&session_id) {
            Some(tx) => tx.send(response_json.clone()).is_ok(),
            None => false,
        }
    };

    if !delivered {
        tracing::warn!("no live /events stream for session {session_id}, returning inline");
        return (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            response_json,
        )
            .into_response();
    }

    (axum::http::StatusCode::ACCEPTED, Json(json!({ "accepted": true }))).into_response()
}

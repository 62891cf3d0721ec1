//! HTTP relay: JSON API plus a server-sent event stream of universe diffs.
//!
//! Endpoints:
//!   GET  /api/health              → liveness + bubble count
//!   GET  /api/bubbles             → every bubble in the local universe
//!   GET  /api/events              → SSE stream of `added` / `updated` events
//!   POST /api/thoughts            → ignite a thought `{ "text": ... }`
//!   GET  /api/thoughts/{id}       → hydrate stored text
//!   POST /api/bubbles/{id}/pulse  → add one view
//!   GET  /api/warp?q=...          → resolve a query to a camera target
//!
//! Remote changes arrive through the feed: a producer task polls the star
//! map and a single consumer task applies each record to the universe, then
//! fans the resulting events out to every SSE subscriber.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use bv_core::{
    Bubble, LifecycleRules, Position, UniverseError, UniverseEvent, WarpDrive, focal_word,
    millis_to_iso8601,
};
use bv_store::Change;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::feed::{self, FeedProducer};
use crate::voyager::{Voyager, VoyagerError};

const EVENT_BUFFER: usize = 1024;

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RelayState {
    voyager: Arc<Mutex<Voyager>>,
    events: broadcast::Sender<UniverseEvent>,
    shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(voyager: Voyager, shutdown: CancellationToken) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            voyager: Arc::new(Mutex::new(voyager)),
            events,
            shutdown,
        }
    }

    /// Forward pending universe events to subscribers. Sending with no
    /// subscribers is not an error.
    fn fan_out(&self, voyager: &mut Voyager) {
        for event in voyager.drain_events() {
            let _ = self.events.send(event);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/bubbles", get(list_bubbles))
        .route("/api/events", get(events))
        .route("/api/thoughts", post(ignite))
        .route("/api/thoughts/{id}", get(hydrate))
        .route("/api/bubbles/{id}/pulse", post(pulse))
        .route("/api/warp", get(warp))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` fires. The feed producer and consumer are stopped
/// and joined before returning; the voyager's star map is checkpointed last.
pub async fn run(
    voyager: Voyager,
    producer: FeedProducer,
    listener: TcpListener,
    poll: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let state = RelayState::new(voyager, shutdown.clone());
    let (producer_task, rx) = feed::spawn(producer, poll, shutdown.clone());
    let consumer_task = tokio::spawn(consume(state.clone(), rx));

    let addr = listener.local_addr().context("listener has no address")?;
    tracing::info!(%addr, "relay listening");

    let stop = shutdown.clone();
    let served = axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await;

    shutdown.cancel();
    if let Err(e) = producer_task.await {
        tracing::warn!("feed producer panicked: {e}");
    }
    if let Err(e) = consumer_task.await {
        tracing::warn!("feed consumer panicked: {e}");
    }
    state.voyager.lock().await.checkpoint();
    tracing::info!("relay stopped");

    served.context("relay server error")
}

/// Apply feed changes one at a time, in arrival order. Ends when the
/// producer drops its sender.
async fn consume(state: RelayState, mut rx: mpsc::Receiver<Change>) {
    while let Some(change) = rx.recv().await {
        let mut voyager = state.voyager.lock().await;
        voyager.apply(&change);
        state.fan_out(&mut voyager);
    }
    tracing::debug!("feed consumer stopped");
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for VoyagerError {
    fn into_response(self) -> Response {
        let status = match &self {
            VoyagerError::EmptyThought | VoyagerError::Universe(UniverseError::InvalidContent) => {
                StatusCode::BAD_REQUEST
            }
            VoyagerError::Universe(UniverseError::UnknownBubble(_)) => StatusCode::NOT_FOUND,
            VoyagerError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            VoyagerError::Universe(UniverseError::MalformedRecord(_)) | VoyagerError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}

#[derive(Serialize)]
struct BubbleJson {
    id: String,
    label: String,
    position: Position,
    view_count: u64,
    scale: f64,
    created_at: String,
    dissipating: bool,
}

impl BubbleJson {
    fn new(bubble: &Bubble, rules: &LifecycleRules) -> Self {
        Self {
            id: bubble.id.clone(),
            label: bubble.label.clone(),
            position: bubble.position,
            view_count: bubble.view_count,
            scale: bubble.visual_scale(),
            created_at: millis_to_iso8601(bubble.created_at),
            dissipating: rules.should_dissipate(bubble),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

// GET /api/health
async fn health(State(state): State<RelayState>) -> impl IntoResponse {
    let voyager = state.voyager.lock().await;
    Json(serde_json::json!({
        "status": "ok",
        "bubbles": voyager.universe().len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/bubbles
async fn list_bubbles(State(state): State<RelayState>) -> impl IntoResponse {
    let voyager = state.voyager.lock().await;
    let rules = voyager.lifecycle();
    let list: Vec<BubbleJson> = voyager
        .universe()
        .bubbles()
        .iter()
        .map(|b| BubbleJson::new(b, &rules))
        .collect();
    Json(list)
}

// GET /api/events
async fn events(
    State(state): State<RelayState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(event) => {
                    let kind = match &event {
                        UniverseEvent::Added { .. } => "added",
                        UniverseEvent::Updated { .. } => "updated",
                    };
                    match Event::default().event(kind).json_data(&event) {
                        Ok(frame) => yield Ok::<Event, Infallible>(frame),
                        Err(e) => tracing::warn!("unserializable event: {e}"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct ThoughtRequest {
    text: String,
}

// POST /api/thoughts
async fn ignite(
    State(state): State<RelayState>,
    body: Result<Json<ThoughtRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let mut voyager = state.voyager.lock().await;
    let result = voyager.ignite(&req.text);
    state.fan_out(&mut voyager);
    match result {
        Ok(bubble) => {
            let rules = voyager.lifecycle();
            (StatusCode::CREATED, Json(BubbleJson::new(&bubble, &rules))).into_response()
        }
        Err(e) => {
            tracing::warn!("ignite rejected: {e}");
            e.into_response()
        }
    }
}

// GET /api/thoughts/{id}
async fn hydrate(State(state): State<RelayState>, Path(id): Path<String>) -> Response {
    let mut voyager = state.voyager.lock().await;
    match voyager.hydrate(&id) {
        Ok(Some(text)) => Json(serde_json::json!({ "id": id, "text": text })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "The thought has evaporated..."),
        Err(e) => e.into_response(),
    }
}

// POST /api/bubbles/{id}/pulse
async fn pulse(State(state): State<RelayState>, Path(id): Path<String>) -> Response {
    let mut voyager = state.voyager.lock().await;
    let result = voyager.pulse(&id);
    state.fan_out(&mut voyager);
    match result {
        Ok(bubble) => {
            let rules = voyager.lifecycle();
            Json(BubbleJson::new(&bubble, &rules)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
struct WarpQuery {
    #[serde(default)]
    q: String,
}

// GET /api/warp?q=
async fn warp(State(state): State<RelayState>, Query(query): Query<WarpQuery>) -> Response {
    if query.q.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query is empty");
    }
    let voyager = state.voyager.lock().await;
    let drive = WarpDrive::new(voyager.config().navigator());
    let target = voyager.resolve_target(&query.q);
    Json(serde_json::json!({
        "query": query.q,
        "focal_word": focal_word(&query.q),
        "target": target,
        "steps_from_origin": drive.steps_to_arrive(Position::origin(), target),
    }))
    .into_response()
}

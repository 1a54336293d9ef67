//! The dashboard's HTTP contract.
//!
//! `GET /api/ui/snapshot` and the `/api/ui/events` SSE stream feed the
//! browser; `/api/config` runs a compare-and-swap edit flow against the
//! on-disk config; `/api/control/*` triggers long-running operations whose
//! progress is polled; `/api/sandbox/*` exists only against sandbox servers.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::Clock;
use settings::{AgentConfig, config_hash, normalize, save_raw, validate};

use crate::bus::StatusBus;
use crate::views::Snapshot;

const HEARTBEAT_EVERY: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Config handle
// ---------------------------------------------------------------------------

struct ConfigFileState {
    raw: String,
    hash: String,
    updated_at_ms: u64,
}

/// In-memory view of the config file plus its content hash, shared between
/// the HTTP layer and bootstrap.
pub struct ConfigHandle {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    state: Mutex<ConfigFileState>,
}

impl ConfigHandle {
    pub fn new(path: impl Into<PathBuf>, raw: String, clock: Arc<dyn Clock>) -> Self {
        let hash = config_hash(&raw);
        let updated_at_ms = clock.now_ms();
        Self {
            path: path.into(),
            clock,
            state: Mutex::new(ConfigFileState {
                raw,
                hash,
                updated_at_ms,
            }),
        }
    }

    pub fn current_hash(&self) -> String {
        self.state.lock().hash.clone()
    }
}

// ---------------------------------------------------------------------------
// Control operations
// ---------------------------------------------------------------------------

/// Long-running operations the dashboard can trigger.
#[async_trait::async_trait]
pub trait ControlActions: Send + Sync {
    async fn restart(&self) -> anyhow::Result<()>;
    async fn clear_order_board(&self) -> anyhow::Result<()>;
    async fn clear_gear_state(&self) -> anyhow::Result<()>;
}

/// Sandbox-only account manipulation. Registered only when the upstream
/// server reports sandbox mode.
#[async_trait::async_trait]
pub trait SandboxActions: Send + Sync {
    async fn give_gold(&self, name: &str, quantity: u64) -> anyhow::Result<()>;
    async fn give_item(&self, name: &str, code: &str, quantity: u32) -> anyhow::Result<()>;
    async fn give_xp(&self, name: &str, skill: &str, quantity: u64) -> anyhow::Result<()>;
    async fn spawn_event(&self, code: &str) -> anyhow::Result<()>;
    async fn reset_account(&self) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: String,
    pub action: String,
    pub status: String,
    pub started_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tracks the most recent control operation for polling.
pub struct ControlState {
    latest: Mutex<Option<OperationRecord>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            latest: Mutex::new(None),
        }
    }
}

impl ControlState {
    fn begin(&self, action: &str, now_ms: u64) -> OperationRecord {
        let record = OperationRecord {
            id: format!("op-{}", Uuid::new_v4().simple()),
            action: action.to_string(),
            status: "running".into(),
            started_at_ms: now_ms,
            error: None,
        };
        *self.latest.lock() = Some(record.clone());
        record
    }

    fn finish(&self, id: &str, result: Result<(), String>) {
        let mut latest = self.latest.lock();
        if let Some(record) = latest.as_mut() {
            if record.id == id {
                match result {
                    Ok(()) => record.status = "done".into(),
                    Err(message) => {
                        record.status = "failed".into();
                        record.error = Some(message);
                    }
                }
            }
        }
    }

    pub fn latest(&self) -> Option<OperationRecord> {
        self.latest.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<StatusBus>,
    pub config: Arc<ConfigHandle>,
    pub control: Arc<ControlState>,
    pub actions: Arc<dyn ControlActions>,
    pub sandbox: Option<Arc<dyn SandboxActions>>,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/ui/snapshot", get(ui_snapshot))
        .route("/api/ui/events", get(ui_events))
        .route("/api/config", get(get_config).post(post_config))
        .route("/api/control/:action", post(post_control))
        .route("/api/control/status", get(control_status));

    if state.sandbox.is_some() {
        router = router.route("/api/sandbox/:action", post(post_sandbox));
    }

    router.with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "status http listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn ui_snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.bus.snapshot().as_ref().clone())
}

struct SseFeed {
    rx: watch::Receiver<Arc<Snapshot>>,
    heartbeat: tokio::time::Interval,
    sent_initial: bool,
}

fn snapshot_event(snapshot: &Snapshot) -> Event {
    let body = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".into());
    Event::default().event("snapshot").data(body)
}

async fn ui_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let feed = SseFeed {
        rx: state.bus.subscribe(),
        heartbeat: tokio::time::interval(HEARTBEAT_EVERY),
        sent_initial: false,
    };

    let stream = futures::stream::unfold(feed, |mut feed| async move {
        if !feed.sent_initial {
            feed.sent_initial = true;
            let event = snapshot_event(&feed.rx.borrow_and_update());
            return Some((Ok(event), feed));
        }

        tokio::select! {
            changed = feed.rx.changed() => {
                if changed.is_err() {
                    return None;
                }
                let event = snapshot_event(&feed.rx.borrow_and_update());
                Some((Ok(event), feed))
            }
            _ = feed.heartbeat.tick() => {
                Some((Ok(Event::default().event("heartbeat").data("")), feed))
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let handle = &state.config;
    let file = handle.state.lock();
    Json(json!({
        "rawJson": file.raw,
        "ifMatchHash": file.hash,
        "configPath": handle.path.display().to_string(),
        "updatedAtMs": file.updated_at_ms,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigUpdate {
    #[serde(default)]
    config: Option<serde_json::Value>,
    #[serde(default)]
    raw_json: Option<String>,
    if_match_hash: String,
}

async fn post_config(State(state): State<AppState>, Json(update): Json<ConfigUpdate>) -> Response {
    let raw = match (update.raw_json, update.config) {
        (Some(raw), _) => raw,
        (None, Some(value)) => match serde_json::to_string_pretty(&value) {
            Ok(raw) => raw,
            Err(e) => {
                return error_rows(StatusCode::BAD_REQUEST, "$", &e.to_string());
            }
        },
        (None, None) => {
            return error_rows(StatusCode::BAD_REQUEST, "$", "config or rawJson is required");
        }
    };

    // Validate before touching anything on disk.
    let mut parsed: AgentConfig = match serde_json::from_str(&raw) {
        Ok(cfg) => cfg,
        Err(e) => return error_rows(StatusCode::BAD_REQUEST, "$", &e.to_string()),
    };
    normalize(&mut parsed);
    let issues = validate(&parsed);
    if !issues.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "errors": issues }))).into_response();
    }

    let handle = &state.config;
    let mut file = handle.state.lock();
    if file.hash != update.if_match_hash {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "currentHash": file.hash })),
        )
            .into_response();
    }

    if let Err(e) = save_raw(&handle.path, &raw) {
        error!(error = %e, "config write failed");
        return error_rows(StatusCode::INTERNAL_SERVER_ERROR, "$", &e.to_string());
    }

    file.raw = raw;
    file.hash = config_hash(&file.raw);
    file.updated_at_ms = handle.clock.now_ms();
    info!(hash = %file.hash, "config updated; applies on restart");

    (StatusCode::OK, Json(json!({ "hash": file.hash }))).into_response()
}

fn error_rows(status: StatusCode, path: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "errors": [{ "path": path, "message": message }] })),
    )
        .into_response()
}

async fn post_control(State(state): State<AppState>, Path(action): Path<String>) -> Response {
    let known = matches!(
        action.as_str(),
        "restart" | "clear-order-board" | "clear-gear-state"
    );
    if !known {
        return error_rows(StatusCode::NOT_FOUND, "action", "unknown control action");
    }

    let record = state
        .control
        .begin(&action, state.config.clock.now_ms());
    let record_id = record.id.clone();

    let control = state.control.clone();
    let actions = state.actions.clone();
    tokio::spawn(async move {
        let result = match action.as_str() {
            "restart" => actions.restart().await,
            "clear-order-board" => actions.clear_order_board().await,
            _ => actions.clear_gear_state().await,
        };
        if let Err(e) = &result {
            warn!(action = %action, error = %e, "control action failed");
        }
        control.finish(&record_id, result.map_err(|e| e.to_string()));
    });

    (StatusCode::ACCEPTED, Json(record)).into_response()
}

async fn control_status(State(state): State<AppState>) -> Response {
    match state.control.latest() {
        Some(record) => Json(record).into_response(),
        None => Json(json!({ "status": "idle" })).into_response(),
    }
}

#[derive(Deserialize)]
struct SandboxBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    skill: String,
    #[serde(default)]
    quantity: u64,
}

async fn post_sandbox(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(body): Json<SandboxBody>,
) -> Response {
    let Some(sandbox) = state.sandbox.clone() else {
        return error_rows(StatusCode::NOT_FOUND, "action", "not a sandbox server");
    };

    let result = match action.as_str() {
        "give-gold" => sandbox.give_gold(&body.name, body.quantity).await,
        "give-item" => {
            sandbox
                .give_item(&body.name, &body.code, body.quantity as u32)
                .await
        }
        "give-xp" => sandbox.give_xp(&body.name, &body.skill, body.quantity).await,
        "spawn-event" => sandbox.spawn_event(&body.code).await,
        "reset-account" => sandbox.reset_account().await,
        _ => return error_rows(StatusCode::NOT_FOUND, "action", "unknown sandbox action"),
    };

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_rows(StatusCode::BAD_GATEWAY, "upstream", &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ManualClock;

    #[test]
    fn control_state_tracks_latest_operation() {
        let control = ControlState::default();
        let record = control.begin("restart", 1_000);
        assert_eq!(control.latest().unwrap().status, "running");

        control.finish(&record.id, Err("boom".into()));
        let latest = control.latest().unwrap();
        assert_eq!(latest.status, "failed");
        assert_eq!(latest.error.as_deref(), Some("boom"));
    }

    #[test]
    fn finish_ignores_superseded_operations() {
        let control = ControlState::default();
        let old = control.begin("restart", 1_000);
        let _new = control.begin("clear-order-board", 2_000);

        control.finish(&old.id, Ok(()));
        assert_eq!(control.latest().unwrap().status, "running");
    }

    #[test]
    fn config_handle_hashes_content() {
        let clock = ManualClock::shared(0);
        let handle = ConfigHandle::new("/tmp/agent.json", "{}".into(), clock);
        assert_eq!(handle.current_hash(), config_hash("{}"));
    }
}

//! Control protocol server: an axum router over a Unix domain socket.
//!
//! All calls arrive on `POST /call`. Protocol failures are reported in-band
//! through the reply's error id; only malformed HTTP or JSON produce non-200
//! responses.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

use rebootmgr_config::{
    CalendarParser, ConfigChange, ConfigError, ConfigWriter, MaintenanceWindow, RebootStrategy,
};

use super::types::*;
use crate::daemon::ShutdownSignal;
use crate::state::ControlState;

/// Shared state accessible to the call handler.
pub struct IpcState {
    /// Locked for the whole of a call, which serializes mutations.
    pub control: Mutex<ControlState>,
    pub writer: ConfigWriter,
    pub calendar: Arc<dyn CalendarParser>,
}

impl IpcState {
    pub fn new(
        control: ControlState,
        writer: ConfigWriter,
        calendar: Arc<dyn CalendarParser>,
    ) -> Self {
        Self {
            control: Mutex::new(control),
            writer,
            calendar,
        }
    }
}

/// Build the axum router for the control protocol.
pub fn router(state: Arc<IpcState>) -> axum::Router {
    axum::Router::new()
        .route("/call", post(handle_call))
        .with_state(state)
}

/// Serve the control protocol on the given Unix socket path.
///
/// Removes any stale socket file before binding. Runs until the
/// shutdown signal is received.
pub async fn serve(
    socket_path: &Path,
    state: Arc<IpcState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if tokio::fs::try_exists(socket_path).await? {
        tokio::fs::remove_file(socket_path).await?;
    }

    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "Control socket listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Control socket shutting down");
        })
        .await?;

    tokio::fs::remove_file(socket_path).await.ok();
    Ok(())
}

type HandlerResult = Result<CallReply, serde_json::Error>;

async fn handle_call(
    State(state): State<Arc<IpcState>>,
    Json(req): Json<CallRequest>,
) -> Result<Json<CallReply>, (StatusCode, Json<ErrorResponse>)> {
    debug!(method = %req.method, "Control call");

    let result = match req.method.as_str() {
        method::REBOOT => reboot(&state, req.parameters).await,
        method::CANCEL => cancel(&state).await,
        method::STATUS => status(&state).await,
        method::FULL_STATUS => full_status(&state).await,
        method::SET_STRATEGY => set_strategy(&state, req.parameters).await,
        method::SET_WINDOW => set_window(&state, req.parameters).await,
        other => {
            warn!(method = other, "Unknown control method");
            Ok(CallReply::error(error_id::METHOD_NOT_FOUND))
        }
    };

    result.map(Json).map_err(|e| {
        error!(error = %e, "Failed to encode reply");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("failed to encode reply: {e}"),
            }),
        )
    })
}

fn decode_params<T: DeserializeOwned>(parameters: Value) -> Result<T, CallReply> {
    serde_json::from_value(parameters).map_err(|e| {
        warn!(error = %e, "Rejecting call parameters");
        CallReply::error(error_id::INVALID_PARAMETER)
    })
}

fn persist_failed(err: &ConfigError) -> CallReply {
    match err {
        ConfigError::Validation(reason) => {
            warn!(reason = %reason, "Rejected configuration change");
            CallReply::error(error_id::INVALID_PARAMETER)
        }
        other => {
            error!(error = %other, "Failed to persist configuration change");
            CallReply::error(error_id::WRITE_FAILED)
        }
    }
}

async fn reboot(state: &IpcState, parameters: Value) -> HandlerResult {
    let params: RebootParams = match decode_params(parameters) {
        Ok(params) => params,
        Err(reply) => return Ok(reply),
    };

    let now = chrono::Local::now().to_rfc3339();
    let mut control = state.control.lock().await;
    match control.request_reboot(params.method, params.force, &now) {
        Ok(pending) => {
            info!(
                method = %pending.method,
                force = params.force,
                status = %control.status(),
                "Reboot requested"
            );
            CallReply::ok(&RebootReply {
                method: pending.method,
                scheduled: pending.scheduled,
            })
        }
        Err(existing) => {
            info!(method = %existing.method, "Reboot already in progress");
            CallReply::error_with(
                error_id::ALREADY_IN_PROGRESS,
                &RebootReply {
                    method: existing.method,
                    scheduled: existing.scheduled,
                },
            )
        }
    }
}

async fn cancel(state: &IpcState) -> HandlerResult {
    let success = state.control.lock().await.cancel();
    if success {
        info!("Reboot cancelled");
    }
    CallReply::ok(&CancelReply { success })
}

async fn status(state: &IpcState) -> HandlerResult {
    let control = state.control.lock().await;
    let pending = control.pending();
    CallReply::ok(&StatusReply {
        reboot_status: control.status(),
        reboot_time: pending.as_ref().and_then(|p| p.scheduled.clone()),
        requested_method: pending.map(|p| p.method),
    })
}

async fn full_status(state: &IpcState) -> HandlerResult {
    let control = state.control.lock().await;
    let pending = control.pending();
    let (start, duration) = match control.window() {
        Some(window) => (window.start.to_string(), window.duration.as_secs()),
        None => (String::new(), 0),
    };
    CallReply::ok(&FullStatusReply {
        reboot_status: control.status(),
        reboot_time: pending.as_ref().and_then(|p| p.scheduled.clone()),
        requested_method: pending.map(|p| p.method),
        reboot_strategy: control.strategy(),
        maintenance_window_start: start,
        maintenance_window_duration: duration,
    })
}

async fn set_strategy(state: &IpcState, parameters: Value) -> HandlerResult {
    let params: SetStrategyParams = match decode_params(parameters) {
        Ok(params) => params,
        Err(reply) => return Ok(reply),
    };
    if params.strategy == RebootStrategy::Unknown {
        return Ok(CallReply::error(error_id::INVALID_PARAMETER));
    }

    let mut control = state.control.lock().await;
    if let Err(e) = state
        .writer
        .write(&ConfigChange::Strategy(params.strategy))
        .await
    {
        return Ok(persist_failed(&e));
    }
    control.set_strategy(params.strategy);
    info!(strategy = %params.strategy, "Reboot strategy changed");
    Ok(CallReply::empty())
}

async fn set_window(state: &IpcState, parameters: Value) -> HandlerResult {
    let params: SetWindowParams = match decode_params(parameters) {
        Ok(params) => params,
        Err(reply) => return Ok(reply),
    };

    let window = if params.start.trim().is_empty() {
        None
    } else {
        let start = match state.calendar.parse(&params.start) {
            Ok(start) => start,
            Err(e) => {
                warn!(error = %e, "Rejecting maintenance window");
                return Ok(CallReply::error(error_id::INVALID_PARAMETER));
            }
        };
        if params.duration == 0 {
            warn!("Rejecting maintenance window with zero duration");
            return Ok(CallReply::error(error_id::INVALID_PARAMETER));
        }
        Some(MaintenanceWindow {
            start,
            duration: Duration::from_secs(params.duration),
        })
    };

    let mut control = state.control.lock().await;
    if let Err(e) = state
        .writer
        .write(&ConfigChange::MaintenanceWindow(window.clone()))
        .await
    {
        return Ok(persist_failed(&e));
    }
    match &window {
        Some(w) => info!(start = %w.start, secs = w.duration.as_secs(), "Maintenance window changed"),
        None => info!("Maintenance window cleared"),
    }
    control.set_window(window);
    Ok(CallReply::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use rebootmgr_config::{ConfigResolver, RebootMethod, RebootStatus, SystemdCalendar};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(tmp: &TempDir, strategy: RebootStrategy) -> Arc<IpcState> {
        Arc::new(IpcState::new(
            ControlState::new(strategy, None),
            ConfigWriter::new(tmp.path().join("rebootmgr.conf.d")),
            Arc::new(SystemdCalendar),
        ))
    }

    async fn call(state: &Arc<IpcState>, method: &str, parameters: Value) -> CallReply {
        let body = json!({"method": method, "parameters": parameters});
        let req = Request::post("/call")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn params<T: DeserializeOwned>(reply: &CallReply) -> T {
        serde_json::from_value(reply.parameters.clone().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_status_when_idle() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, method::STATUS, json!({})).await;
        assert_eq!(reply.error_id(), None);
        assert_eq!(
            reply.parameters,
            Some(json!({"RebootStatus": 0}))
        );
    }

    #[tokio::test]
    async fn test_reboot_then_already_in_progress() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, method::REBOOT, json!({"Reboot": 1, "Force": false})).await;
        assert_eq!(reply.error_id(), None);
        let first: RebootReply = params(&reply);
        assert_eq!(first.method, RebootMethod::Soft);
        assert!(first.scheduled.is_some());

        let reply = call(&state, method::REBOOT, json!({"Reboot": 0, "Force": false})).await;
        assert_eq!(reply.error_id(), Some(error_id::ALREADY_IN_PROGRESS));
        let existing: RebootReply = params(&reply);
        assert_eq!(existing, first);

        let status: StatusReply = params(&call(&state, method::STATUS, json!({})).await);
        assert_eq!(status.reboot_status, RebootStatus::Requested);
        assert_eq!(status.requested_method, Some(RebootMethod::Soft));
    }

    #[tokio::test]
    async fn test_reboot_rejects_missing_method() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, method::REBOOT, json!({"Force": true})).await;
        assert_eq!(reply.error_id(), Some(error_id::INVALID_PARAMETER));
        assert_eq!(
            state.control.lock().await.status(),
            RebootStatus::NotRequested
        );
    }

    #[tokio::test]
    async fn test_cancel() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let cancel: CancelReply = params(&call(&state, method::CANCEL, json!({})).await);
        assert!(!cancel.success);

        call(&state, method::REBOOT, json!({"Reboot": 0})).await;
        let cancel: CancelReply = params(&call(&state, method::CANCEL, json!({})).await);
        assert!(cancel.success);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, "org.openSUSE.rebootmgr.Explode", json!({})).await;
        assert_eq!(reply.error_id(), Some(error_id::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_malformed_body_is_transport_error() {
        let tmp = TempDir::new().unwrap();
        let req = Request::post("/call")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router(test_state(&tmp, RebootStrategy::BestEffort))
            .oneshot(req)
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_set_strategy_persists_then_updates_state() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, method::SET_STRATEGY, json!({"Strategy": 3})).await;
        assert_eq!(reply.error_id(), None);
        assert_eq!(state.control.lock().await.strategy(), RebootStrategy::Off);

        let dropin = tmp.path().join("rebootmgr.conf.d").join("50-strategy.conf");
        let resolved = ConfigResolver::from_layers(vec![dropin])
            .resolve(&SystemdCalendar)
            .await
            .unwrap();
        assert_eq!(resolved.strategy.value(), RebootStrategy::Off);
    }

    #[tokio::test]
    async fn test_set_strategy_rejects_unknown_value() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::Instantly);

        let reply = call(&state, method::SET_STRATEGY, json!({"Strategy": 9})).await;
        assert_eq!(reply.error_id(), Some(error_id::INVALID_PARAMETER));
        assert_eq!(
            state.control.lock().await.strategy(),
            RebootStrategy::Instantly
        );
        assert!(!tmp.path().join("rebootmgr.conf.d").exists());
    }

    #[tokio::test]
    async fn test_set_strategy_write_failure_keeps_state() {
        rebootmgr_test_utils::tracing_setup::init_test_tracing();
        let tmp = TempDir::new().unwrap();
        // A regular file where the override directory should be.
        std::fs::write(tmp.path().join("rebootmgr.conf.d"), b"").unwrap();
        let state = test_state(&tmp, RebootStrategy::BestEffort);

        let reply = call(&state, method::SET_STRATEGY, json!({"Strategy": 1})).await;
        assert_eq!(reply.error_id(), Some(error_id::WRITE_FAILED));
        assert_eq!(
            state.control.lock().await.strategy(),
            RebootStrategy::BestEffort
        );
    }

    #[tokio::test]
    async fn test_set_window_and_full_status() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::MaintWindow);

        let reply = call(
            &state,
            method::SET_WINDOW,
            json!({"Start": "Sat  04:00", "Duration": 5400}),
        )
        .await;
        assert_eq!(reply.error_id(), None);

        let full: FullStatusReply = params(&call(&state, method::FULL_STATUS, json!({})).await);
        assert_eq!(full.reboot_strategy, RebootStrategy::MaintWindow);
        assert_eq!(full.maintenance_window_start, "Sat 04:00");
        assert_eq!(full.maintenance_window_duration, 5400);

        let reply = call(&state, method::REBOOT, json!({"Reboot": 0})).await;
        let pending: RebootReply = params(&reply);
        assert_eq!(pending.scheduled.as_deref(), Some("Sat 04:00"));
        assert_eq!(
            state.control.lock().await.status(),
            RebootStatus::WaitingWindow
        );
    }

    #[tokio::test]
    async fn test_set_window_rejects_bad_calendar() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::MaintWindow);

        let reply = call(
            &state,
            method::SET_WINDOW,
            json!({"Start": "whenever", "Duration": 3600}),
        )
        .await;
        assert_eq!(reply.error_id(), Some(error_id::INVALID_PARAMETER));
        assert!(state.control.lock().await.window().is_none());
    }

    #[tokio::test]
    async fn test_set_window_empty_start_clears() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp, RebootStrategy::MaintWindow);

        call(
            &state,
            method::SET_WINDOW,
            json!({"Start": "daily", "Duration": 600}),
        )
        .await;
        assert!(state.control.lock().await.window().is_some());

        let reply = call(&state, method::SET_WINDOW, json!({"Start": "", "Duration": 0})).await;
        assert_eq!(reply.error_id(), None);
        assert!(state.control.lock().await.window().is_none());

        let full: FullStatusReply = params(&call(&state, method::FULL_STATUS, json!({})).await);
        assert!(!full.has_window());
        assert_eq!(full.maintenance_window_duration, 0);
    }
}

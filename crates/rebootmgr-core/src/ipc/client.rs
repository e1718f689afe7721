//! Control protocol client.
//!
//! Each call opens one connection to the daemon socket, sends one HTTP/1.1
//! request with `hyper` and closes. Setters validate their arguments locally
//! so that an invalid value is never sent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::UnixStream;
use tracing::debug;

use rebootmgr_config::{
    CalendarParser, DEFAULT_WINDOW_DURATION, RebootMethod, RebootStrategy, parse_duration,
};

use super::types::*;

/// Upper bound on one call, connection included.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the control client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("request failed: {0}")]
    Request(String),

    /// The daemon answered with an error id.
    #[error("{method} failed: {error_id}")]
    Daemon { method: String, error_id: String },

    /// The reply could not be decoded, e.g. a mandatory field is missing.
    #[error("invalid reply to {method}: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },

    /// Rejected locally; nothing was sent.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Result of a reboot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebootOutcome {
    Scheduled(RebootReply),
    /// A reboot was already pending and the request was ignored. Carries the
    /// pending request when the daemon reported it.
    AlreadyScheduled(Option<RebootReply>),
}

/// Client for the control protocol.
#[derive(Debug, Clone)]
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// POST a JSON body to `/call` and return the response body.
    async fn post(&self, body: Vec<u8>) -> Result<Bytes, IpcClientError> {
        if !self.daemon_available() {
            return Err(IpcClientError::NotRunning(self.socket_path.clone()));
        }

        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| IpcClientError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake::<
            _,
            http_body_util::Full<Bytes>,
        >(TokioIo::new(stream))
        .await
        .map_err(|e| IpcClientError::Request(format!("HTTP handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "Control connection error");
            }
        });

        let req = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri("/call")
            .header("host", "localhost")
            .header("content-type", "application/json")
            .body(http_body_util::Full::new(Bytes::from(body)))
            .map_err(|e| IpcClientError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IpcClientError::Request(format!("request failed: {e}")))?;

        let status = resp.status();
        let resp_body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| IpcClientError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&resp_body) {
                return Err(IpcClientError::Request(err.error));
            }
            return Err(IpcClientError::Request(format!(
                "unexpected status: {status}"
            )));
        }

        Ok(resp_body)
    }

    /// Issue one call and return the raw reply, error id included.
    pub async fn call(&self, request: &CallRequest) -> Result<CallReply, IpcClientError> {
        debug!(method = %request.method, "Control call");

        let body =
            serde_json::to_vec(request).map_err(|e| encode_failed(&request.method, &e))?;
        let bytes = tokio::time::timeout(CALL_TIMEOUT, self.post(body))
            .await
            .map_err(|_| IpcClientError::Request(format!("{} timed out", request.method)))??;

        serde_json::from_slice(&bytes).map_err(|e| IpcClientError::Decode {
            method: request.method.clone(),
            source: e,
        })
    }

    /// Issue one call and decode its parameters, failing on any error id.
    async fn invoke<T: DeserializeOwned>(
        &self,
        request: &CallRequest,
    ) -> Result<T, IpcClientError> {
        let reply = self.call(request).await?;
        if let Some(id) = reply.error_id() {
            return Err(IpcClientError::Daemon {
                method: request.method.clone(),
                error_id: id.to_string(),
            });
        }
        decode_reply(&request.method, reply.parameters)
    }

    /// Request a reboot. `AlreadyInProgress` is not an error.
    pub async fn reboot(
        &self,
        method: RebootMethod,
        force: bool,
    ) -> Result<RebootOutcome, IpcClientError> {
        if method == RebootMethod::Unknown {
            return Err(IpcClientError::InvalidArgument(
                "reboot method must be hard or soft".to_string(),
            ));
        }
        let request = self.request(method::REBOOT, &RebootParams { method, force })?;
        let reply = self.call(&request).await?;
        let error = reply.error_id().map(str::to_string);
        match error.as_deref() {
            Some(error_id::ALREADY_IN_PROGRESS) => Ok(RebootOutcome::AlreadyScheduled(
                reply
                    .parameters
                    .and_then(|p| serde_json::from_value(p).ok()),
            )),
            Some(id) => Err(IpcClientError::Daemon {
                method: request.method,
                error_id: id.to_string(),
            }),
            None => decode_reply(&request.method, reply.parameters).map(RebootOutcome::Scheduled),
        }
    }

    /// Cancel a pending reboot. Returns whether one was pending.
    pub async fn cancel(&self) -> Result<bool, IpcClientError> {
        let reply: CancelReply = self.invoke(&CallRequest::bare(method::CANCEL)).await?;
        Ok(reply.success)
    }

    pub async fn status(&self) -> Result<StatusReply, IpcClientError> {
        self.invoke(&CallRequest::bare(method::STATUS)).await
    }

    pub async fn full_status(&self) -> Result<FullStatusReply, IpcClientError> {
        self.invoke(&CallRequest::bare(method::FULL_STATUS)).await
    }

    /// Change the strategy. The name is validated before anything is sent.
    pub async fn set_strategy(&self, name: &str) -> Result<RebootStrategy, IpcClientError> {
        let strategy = name
            .parse::<RebootStrategy>()
            .map_err(|e| IpcClientError::InvalidArgument(e.to_string()))?;
        let request = self.request(method::SET_STRATEGY, &SetStrategyParams { strategy })?;
        let _: Value = self.invoke(&request).await?;
        Ok(strategy)
    }

    /// Change the maintenance window.
    ///
    /// `start` is checked with `calendar` and `duration` with the duration
    /// grammar before anything is sent. An empty `start` together with an
    /// empty `duration` clears the window; an empty `start` with a duration is
    /// rejected. An empty `duration` with a start uses the default duration.
    pub async fn set_window(
        &self,
        start: &str,
        duration: &str,
        calendar: &dyn CalendarParser,
    ) -> Result<SetWindowParams, IpcClientError> {
        let params = validate_window(start, duration, calendar)?;
        let request = self.request(method::SET_WINDOW, &params)?;
        let _: Value = self.invoke(&request).await?;
        Ok(params)
    }

    fn request<P: serde::Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<CallRequest, IpcClientError> {
        CallRequest::new(method, params).map_err(|e| encode_failed(method, &e))
    }
}

/// A request that cannot be serialized never reached the daemon, so it is
/// not a reply decoding failure.
fn encode_failed(method: &str, err: &serde_json::Error) -> IpcClientError {
    IpcClientError::Request(format!("failed to encode {method} request: {err}"))
}

/// Decode reply parameters. A reply without parameters is treated as an
/// empty object so that missing mandatory fields are reported by name.
fn decode_reply<T: DeserializeOwned>(
    method: &str,
    parameters: Option<Value>,
) -> Result<T, IpcClientError> {
    let parameters = parameters.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(parameters).map_err(|e| IpcClientError::Decode {
        method: method.to_string(),
        source: e,
    })
}

/// Check `set-window` arguments without contacting the daemon.
pub fn validate_window(
    start: &str,
    duration: &str,
    calendar: &dyn CalendarParser,
) -> Result<SetWindowParams, IpcClientError> {
    let start = start.trim();
    let duration = duration.trim();

    if start.is_empty() {
        if !duration.is_empty() {
            return Err(IpcClientError::InvalidArgument(
                "a maintenance window duration requires a start time".to_string(),
            ));
        }
        return Ok(SetWindowParams {
            start: String::new(),
            duration: 0,
        });
    }

    let spec = calendar
        .parse(start)
        .map_err(|e| IpcClientError::InvalidArgument(e.to_string()))?;
    let length = if duration.is_empty() {
        DEFAULT_WINDOW_DURATION
    } else {
        parse_duration(duration).map_err(|e| IpcClientError::InvalidArgument(e.to_string()))?
    };
    if length.is_zero() {
        return Err(IpcClientError::InvalidArgument(
            "maintenance window duration must not be zero".to_string(),
        ));
    }

    Ok(SetWindowParams {
        start: spec.to_string(),
        duration: length.as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rebootmgr_config::SystemdCalendar;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = IpcClient::new("/tmp/test-rebootmgr-absent.sock");
        assert!(!client.daemon_available());
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        let client = IpcClient::new("/tmp/nonexistent-rebootmgr.sock");
        let result = client.status().await;
        assert!(matches!(result, Err(IpcClientError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_invalid_strategy_rejected_before_connecting() {
        // The socket does not exist, so reaching the transport would yield
        // NotRunning instead.
        let client = IpcClient::new("/tmp/nonexistent-rebootmgr.sock");
        let result = client.set_strategy("sometimes").await;
        assert!(matches!(result, Err(IpcClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_window_duration_without_start_rejected_before_connecting() {
        let client = IpcClient::new("/tmp/nonexistent-rebootmgr.sock");
        let result = client.set_window("", "1h", &SystemdCalendar).await;
        assert!(matches!(result, Err(IpcClientError::InvalidArgument(_))));
    }

    #[test]
    fn test_unencodable_request_is_not_a_decode_error() {
        let client = IpcClient::new("/tmp/nonexistent-rebootmgr.sock");
        // JSON object keys must be strings.
        let params = std::collections::BTreeMap::from([((1, 2), "x")]);
        let err = client.request(method::SET_WINDOW, &params).unwrap_err();
        assert!(matches!(err, IpcClientError::Request(_)), "{err:?}");
        assert!(err.to_string().contains(method::SET_WINDOW));
    }

    #[test]
    fn test_validate_window() {
        let params = validate_window(" Mon..Fri  03:30 ", "1h30m", &SystemdCalendar).unwrap();
        assert_eq!(params.start, "Mon..Fri 03:30");
        assert_eq!(params.duration, 5400);

        let params = validate_window("daily", "", &SystemdCalendar).unwrap();
        assert_eq!(params.duration, DEFAULT_WINDOW_DURATION.as_secs());

        let cleared = validate_window("", "", &SystemdCalendar).unwrap();
        assert_eq!(cleared.start, "");

        assert!(validate_window("whenever", "1h", &SystemdCalendar).is_err());
        assert!(validate_window("daily", "forever", &SystemdCalendar).is_err());
        assert!(validate_window("daily", "0", &SystemdCalendar).is_err());
    }

    #[test]
    fn test_decode_missing_mandatory_field() {
        let err = decode_reply::<FullStatusReply>(
            method::FULL_STATUS,
            Some(json!({
                "RebootStatus": 0,
                "MaintenanceWindowStart": "",
                "MaintenanceWindowDuration": 0,
            })),
        )
        .unwrap_err();
        match err {
            IpcClientError::Decode { method: called, source } => {
                assert_eq!(called, method::FULL_STATUS);
                assert!(source.to_string().contains("RebootStrategy"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_absent_parameters() {
        let err = decode_reply::<CancelReply>(method::CANCEL, None).unwrap_err();
        assert!(matches!(err, IpcClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_integration_server_client() {
        use super::super::server::{self, IpcState};
        use crate::daemon::ShutdownSignal;
        use crate::state::ControlState;
        use rebootmgr_config::{ConfigWriter, RebootStatus};
        use std::sync::Arc;
        use tokio::sync::broadcast;

        let tmp = tempfile::TempDir::new().unwrap();
        let state = Arc::new(IpcState::new(
            ControlState::default(),
            ConfigWriter::new(tmp.path().join("rebootmgr.conf.d")),
            Arc::new(SystemdCalendar),
        ));
        let sock_path = tmp.path().join("rebootmgrd.sock");

        let (shutdown_tx, _) = broadcast::channel::<ShutdownSignal>(1);
        let shutdown_rx = shutdown_tx.subscribe();
        let serve_path = sock_path.clone();
        let server_handle = tokio::spawn(async move {
            server::serve(&serve_path, state, shutdown_rx).await.unwrap();
        });

        let client = IpcClient::new(&sock_path);
        for _ in 0..50 {
            if client.daemon_available() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let status = client.status().await.unwrap();
        assert_eq!(status.reboot_status, RebootStatus::NotRequested);

        let outcome = client.reboot(RebootMethod::Soft, false).await.unwrap();
        assert!(matches!(outcome, RebootOutcome::Scheduled(_)));

        let outcome = client.reboot(RebootMethod::Hard, false).await.unwrap();
        match outcome {
            RebootOutcome::AlreadyScheduled(Some(existing)) => {
                assert_eq!(existing.method, RebootMethod::Soft);
            }
            other => panic!("expected AlreadyScheduled, got {other:?}"),
        }

        assert_eq!(
            client.set_strategy("maint_window").await.unwrap(),
            RebootStrategy::MaintWindow
        );
        client
            .set_window("Sun 02:00", "90m", &SystemdCalendar)
            .await
            .unwrap();

        let full = client.full_status().await.unwrap();
        assert_eq!(full.reboot_status, RebootStatus::Requested);
        assert_eq!(full.requested_method, Some(RebootMethod::Soft));
        assert_eq!(full.reboot_strategy, RebootStrategy::MaintWindow);
        assert_eq!(full.maintenance_window_start, "Sun 02:00");
        assert_eq!(full.maintenance_window_duration, 5400);

        assert!(client.cancel().await.unwrap());
        assert!(!client.cancel().await.unwrap());

        let raw = client
            .call(&CallRequest::bare("org.openSUSE.rebootmgr.Explode"))
            .await
            .unwrap();
        assert_eq!(raw.error_id(), Some(error_id::METHOD_NOT_FOUND));

        shutdown_tx.send(ShutdownSignal).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(2), server_handle).await;
    }
}

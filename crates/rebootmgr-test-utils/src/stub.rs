//! A scripted daemon that answers each method with a fixed reply body.
//!
//! Useful for exercising client behaviour against replies the real daemon
//! never sends, such as a reply missing a mandatory field.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::routing::post;
use rebootmgr_core::IpcClient;
use rebootmgr_core::ipc::{CallRequest, error_id};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::oneshot;

use crate::daemon::wait_for_socket;

struct StubState {
    replies: HashMap<String, Value>,
    calls: Mutex<Vec<CallRequest>>,
}

/// Serves canned replies on a temporary socket until dropped.
pub struct StubDaemon {
    pub socket_path: PathBuf,
    state: Arc<StubState>,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl StubDaemon {
    /// Start a stub. Each entry maps a method name to the JSON reply body.
    /// Unlisted methods answer `MethodNotFound`.
    pub async fn start<'a>(replies: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = dir.path().join("stub.sock");

        let state = Arc::new(StubState {
            replies: replies
                .into_iter()
                .map(|(method, reply)| (method.to_string(), reply))
                .collect(),
            calls: Mutex::new(Vec::new()),
        });

        let listener = UnixListener::bind(&socket_path).expect("failed to bind stub socket");
        let app = axum::Router::new()
            .route("/call", post(answer))
            .with_state(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        wait_for_socket(&socket_path).await;

        Self {
            socket_path,
            state,
            shutdown: Some(shutdown_tx),
            _dir: dir,
        }
    }

    pub fn client(&self) -> IpcClient {
        IpcClient::new(&self.socket_path)
    }

    /// Method names received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .expect("stub call log poisoned")
            .iter()
            .map(|call| call.method.clone())
            .collect()
    }

    /// Parameters of the most recent call.
    pub fn last_parameters(&self) -> Option<Value> {
        self.state
            .calls
            .lock()
            .expect("stub call log poisoned")
            .last()
            .map(|call| call.parameters.clone())
    }
}

impl Drop for StubDaemon {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn answer(State(state): State<Arc<StubState>>, Json(call): Json<CallRequest>) -> Json<Value> {
    let reply = state
        .replies
        .get(&call.method)
        .cloned()
        .unwrap_or_else(|| json!({ "error": error_id::METHOD_NOT_FOUND }));
    state
        .calls
        .lock()
        .expect("stub call log poisoned")
        .push(call);
    Json(reply)
}

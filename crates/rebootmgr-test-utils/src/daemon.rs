//! A real daemon on a temporary socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rebootmgr_core::{Daemon, DaemonError, IpcClient};
use tokio::task::JoinHandle;

use crate::config::TestConfigBuilder;
use crate::layers::ConfigTree;

/// A running [`Daemon`] over its own [`ConfigTree`].
///
/// Dropping the value removes the tree; call [`TestDaemon::stop`] to shut the
/// daemon down and observe its result.
pub struct TestDaemon {
    pub daemon: Arc<Daemon>,
    pub tree: ConfigTree,
    pub socket_path: PathBuf,
    handle: Option<JoinHandle<Result<(), DaemonError>>>,
}

impl TestDaemon {
    /// Start a daemon with no configuration layers.
    pub async fn start() -> Self {
        Self::start_with(ConfigTree::new()).await
    }

    /// Start a daemon over a prepared tree and wait for its socket.
    pub async fn start_with(tree: ConfigTree) -> Self {
        let config = TestConfigBuilder::new()
            .paths(tree.paths().clone())
            .socket_path(tree.path().join("rebootmgrd.sock"))
            .build();
        let socket_path = config.daemon.socket_path.clone();

        let daemon = Arc::new(
            Daemon::bootstrap(config)
                .await
                .expect("failed to bootstrap test daemon"),
        );
        let runner = daemon.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        wait_for_socket(&socket_path).await;

        Self {
            daemon,
            tree,
            socket_path,
            handle: Some(handle),
        }
    }

    pub fn client(&self) -> IpcClient {
        IpcClient::new(&self.socket_path)
    }

    /// Shut the daemon down and return its exit result.
    pub async fn stop(mut self) -> Result<(), DaemonError> {
        self.daemon.shutdown();
        let handle = self.handle.take().expect("daemon already stopped");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("daemon did not stop in time")
            .expect("daemon task panicked")
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.daemon.shutdown();
        }
    }
}

pub(crate) async fn wait_for_socket(path: &std::path::Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("socket {} never appeared", path.display());
}

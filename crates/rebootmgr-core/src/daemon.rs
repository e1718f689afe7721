//! Daemon process: startup, control socket, and shutdown.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use rebootmgr_config::{
    AppConfig, CalendarParser, ConfigError, ConfigResolver, ConfigWriter, SystemdCalendar,
};

use crate::ipc::server::{self, IpcState};
use crate::state::ControlState;

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The rebootmgr daemon.
pub struct Daemon {
    config: AppConfig,
    state: Arc<IpcState>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Daemon {
    /// Resolve the configuration layers and build the initial control state.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, DaemonError> {
        Self::bootstrap_with(config, Arc::new(SystemdCalendar)).await
    }

    /// Like [`Daemon::bootstrap`] with a specific calendar parser.
    pub async fn bootstrap_with(
        config: AppConfig,
        calendar: Arc<dyn CalendarParser>,
    ) -> Result<Self, DaemonError> {
        let resolver = ConfigResolver::discover(&config.paths).await?;
        let resolved = resolver.resolve(calendar.as_ref()).await?;
        let control = ControlState::from_resolved(&resolved);

        match control.window() {
            Some(window) => info!(
                layers = resolver.layers().len(),
                strategy = %control.strategy(),
                window_start = %window.start,
                window_secs = window.duration.as_secs(),
                "Configuration resolved"
            ),
            None => info!(
                layers = resolver.layers().len(),
                strategy = %control.strategy(),
                "Configuration resolved without maintenance window"
            ),
        }

        let writer = ConfigWriter::for_paths(&config.paths);
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            state: Arc::new(IpcState::new(control, writer, calendar)),
            shutdown_tx,
        })
    }

    /// Serve the control socket until shutdown is requested or the process
    /// receives SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let socket_path = self.config.daemon.socket_path.clone();
        info!(
            socket = %socket_path.display(),
            version = %crate::build_info::version_string(),
            "rebootmgrd starting"
        );

        let server = server::serve(
            &socket_path,
            self.state.clone(),
            self.shutdown_tx.subscribe(),
        );
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result?;
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                self.shutdown();
                server.await?;
            }
            _ = terminate() => {
                info!("SIGTERM received, initiating graceful shutdown");
                self.shutdown();
                server.await?;
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// State shared with the protocol handlers.
    pub fn state(&self) -> Arc<IpcState> {
        self.state.clone()
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Cannot install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

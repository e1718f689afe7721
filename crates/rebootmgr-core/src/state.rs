//! In-memory control state owned by the daemon.

use rebootmgr_config::{MaintenanceWindow, RebootMethod, RebootStatus, RebootStrategy, ResolvedConfig};

/// A reboot that has been requested and not yet cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReboot {
    pub method: RebootMethod,
    pub scheduled: Option<String>,
}

/// Current strategy, maintenance window and reboot disposition.
///
/// Strategy and window come from configuration and change only through the
/// `set_*` methods, which the protocol handlers call after the change has
/// been persisted. Status, method and scheduled time describe a pending
/// request and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    strategy: RebootStrategy,
    window: Option<MaintenanceWindow>,
    status: RebootStatus,
    method: RebootMethod,
    scheduled: Option<String>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(RebootStrategy::BestEffort, None)
    }
}

impl ControlState {
    pub fn new(strategy: RebootStrategy, window: Option<MaintenanceWindow>) -> Self {
        Self {
            strategy,
            window,
            status: RebootStatus::NotRequested,
            method: RebootMethod::Unknown,
            scheduled: None,
        }
    }

    /// Seed state from resolved configuration. Decode fallbacks are accepted.
    pub fn from_resolved(resolved: &ResolvedConfig) -> Self {
        Self::new(resolved.strategy.value(), resolved.window.clone())
    }

    pub fn strategy(&self) -> RebootStrategy {
        self.strategy
    }

    pub fn window(&self) -> Option<&MaintenanceWindow> {
        self.window.as_ref()
    }

    pub fn status(&self) -> RebootStatus {
        self.status
    }

    pub fn method(&self) -> RebootMethod {
        self.method
    }

    pub fn scheduled(&self) -> Option<&str> {
        self.scheduled.as_deref()
    }

    pub fn set_strategy(&mut self, strategy: RebootStrategy) {
        self.strategy = strategy;
    }

    pub fn set_window(&mut self, window: Option<MaintenanceWindow>) {
        self.window = window;
    }

    /// The pending request, if any.
    pub fn pending(&self) -> Option<PendingReboot> {
        self.status.is_pending().then(|| PendingReboot {
            method: self.method,
            scheduled: self.scheduled.clone(),
        })
    }

    /// Record a reboot request.
    ///
    /// Without `force`, an existing request is left alone and returned as the
    /// error. A forced request replaces it. `now` is the timestamp used for
    /// requests that are due immediately.
    pub fn request_reboot(
        &mut self,
        method: RebootMethod,
        force: bool,
        now: &str,
    ) -> Result<PendingReboot, PendingReboot> {
        if !force && let Some(existing) = self.pending() {
            return Err(existing);
        }

        let wait_for_window = !force && self.strategy == RebootStrategy::MaintWindow;
        match (&self.window, wait_for_window) {
            (Some(window), true) => {
                self.status = RebootStatus::WaitingWindow;
                self.scheduled = Some(window.start.to_string());
            }
            _ => {
                self.status = RebootStatus::Requested;
                self.scheduled = Some(now.to_string());
            }
        }
        self.method = method;

        Ok(PendingReboot {
            method,
            scheduled: self.scheduled.clone(),
        })
    }

    /// Drop any pending request. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        let had_request = self.status.is_pending();
        self.status = RebootStatus::NotRequested;
        self.method = RebootMethod::Unknown;
        self.scheduled = None;
        had_request
    }
}

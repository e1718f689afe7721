#![deny(unsafe_code)]

//! Control state, control protocol, and daemon runtime for rebootmgr.
//!
//! The daemon owns one [`ControlState`] seeded from the resolved
//! configuration and serves the control protocol on a Unix socket. Clients
//! use [`IpcClient`], which validates setter arguments before sending them.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Daemon startup, socket serving and shutdown.
pub mod daemon;
/// Control protocol messages, server and client.
pub mod ipc;
/// In-memory reboot state.
pub mod state;

pub use daemon::{Daemon, DaemonError, ShutdownSignal};
pub use ipc::{IpcClient, IpcClientError, RebootOutcome};
pub use state::{ControlState, PendingReboot};

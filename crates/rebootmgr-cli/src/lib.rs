#![deny(unsafe_code)]

//! Command-line front ends for rebootmgr.
//!
//! `rebootmgrctl` talks to the daemon through [`rebootmgr_core::IpcClient`];
//! `rebootmgrd` runs the daemon. Argument parsing and command execution live
//! here so they can be tested without spawning processes.

/// `rebootmgrctl` argument definitions.
pub mod args;
/// `rebootmgrctl` command execution and output.
pub mod commands;
/// Subscriber setup shared by both binaries.
pub mod logging;

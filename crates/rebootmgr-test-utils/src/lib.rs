#![deny(unsafe_code)]

//! Shared test utilities for the rebootmgr workspace.
//!
//! Provides configuration trees in temporary directories, settings builders,
//! a real daemon on a temporary socket, a scripted stub daemon, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! rebootmgr-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod layers;
pub mod stub;
pub mod tracing_setup;

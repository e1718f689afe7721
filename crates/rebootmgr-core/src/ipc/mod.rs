//! Control protocol transport over a Unix domain socket.
//!
//! The daemon serves one JSON endpoint over HTTP/1.1; the client opens a
//! connection per call.
//!
//! ```text
//! ┌──────────────┐        Unix socket         ┌──────────────┐
//! │ rebootmgrctl │───────────────────────────▶│  IPC server  │
//! │  IpcClient   │  POST /call (JSON)         │  (axum)      │
//! └──────────────┘                            └──────┬───────┘
//!                                                    │
//!                                             ┌──────▼───────┐
//!                                             │ ControlState │
//!                                             └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{IpcClient, IpcClientError, RebootOutcome};
pub use server::IpcState;
pub use types::*;

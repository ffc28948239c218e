//! Extension server: registration with osquery, the per-uuid thrift service,
//! the liveness watchdog, and deadlock-free shutdown.
//!
//! - `core`: [`ExtensionManagerServer`] lifecycle (start / run / shutdown)
//! - `handler`: routes inbound `Ping`/`Call`/`Shutdown` to the registry
//! - `service`: blocking Unix-socket accept loop with wake-on-stop

pub mod core;
pub(crate) mod handler;
pub(crate) mod service;

pub use core::{ExtensionManagerServer, DEFAULT_PING_INTERVAL, MAX_SOCKET_PATH_CHARACTERS};

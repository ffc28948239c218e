//! Local transport endpoints for the osquery extensions socket.
//!
//! The core client and server only need two operations: dial the daemon's
//! socket and listen on the per-uuid extension socket. POSIX systems use Unix
//! domain sockets; the path comes from osquery's `--extensions_socket` flag.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::{dial, listen};

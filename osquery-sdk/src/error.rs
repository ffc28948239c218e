//! Crate-wide error taxonomy.
//!
//! Transport failures propagate with the operation that hit them, remote
//! non-zero statuses carry osquery's message, and locker errors pass through
//! untouched so their timeout text survives to the caller.

use crate::locker::LockerError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Waiting for the transport slot failed; see [`LockerError`].
    #[error(transparent)]
    Locker(#[from] LockerError),

    /// The thrift layer failed while performing `operation`.
    #[error("transport error in {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: thrift::Error,
    },

    /// The remote reply carried no status struct.
    #[error("{operation} returned nil status")]
    NilStatus { operation: &'static str },

    /// The remote reply carried a non-zero status code.
    #[error("{operation} returned error: {message}")]
    Status {
        operation: &'static str,
        message: String,
    },

    /// `query_row` expects exactly one row.
    #[error("expected 1 row, got {0}")]
    UnexpectedRowCount(usize),

    /// Dialing the osquery socket failed.
    #[error("connecting to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A client was configured with a default wait longer than its ceiling.
    #[error("default wait time larger than max wait time")]
    WaitTimeOrdering,

    /// The socket path leaves no room for the per-uuid suffix.
    #[error(
        "socket path of {0} characters exceeded the maximum socket path character length of {1}"
    )]
    SocketPathTooLong(usize, usize),

    /// `registerExtension` failed at the transport level.
    #[error("registering extension: {0}")]
    RegisterExtension(Box<Error>),

    /// `registerExtension` was answered with a non-zero status.
    #[error("status {code} registering extension: {message}")]
    RegisterExtensionStatus { code: i32, message: String },

    /// Binding the per-uuid listen socket failed.
    #[error("opening server socket ({path}): {source}")]
    OpenServerSocket {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `deregisterExtension` failed at the transport level.
    #[error("deregistering extension: {0}")]
    DeregisterExtension(Box<Error>),

    /// `deregisterExtension` was answered with a non-zero status.
    #[error("status {code} deregistering extension: {message}")]
    DeregisterExtensionStatus { code: i32, message: String },

    /// Cleanup deregistration failed while unwinding from an earlier error.
    #[error("deregistering extension - follows {original}")]
    DeregisterFollowingError { original: Box<Error> },

    /// The liveness watchdog could not reach osquery.
    #[error("extension ping failed: {0}")]
    PingFailed(Box<Error>),

    /// The liveness watchdog got a non-zero ping status.
    #[error("ping returned status {0}")]
    PingStatus(i32),
}

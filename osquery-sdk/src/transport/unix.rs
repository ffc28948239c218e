//! Unix domain socket transport.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread;
use std::time::{Duration, Instant};

const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Connects to the socket at `path`, retrying until `open_timeout` elapses.
///
/// osquery creates its extensions socket asynchronously at startup, so a
/// missing or refusing socket within the timeout window is not fatal.
pub(crate) fn dial(path: &str, open_timeout: Duration) -> io::Result<UnixStream> {
    let deadline = Instant::now() + open_timeout;
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                let retryable = matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                );
                if !retryable || Instant::now() >= deadline {
                    return Err(err);
                }
            }
        }
        thread::sleep(DIAL_RETRY_INTERVAL);
    }
}

/// Binds a listening socket at `path`, replacing a stale socket file left
/// behind by a previous run.
pub(crate) fn listen(path: &str) -> io::Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
            // Nothing is serving if connect fails; reclaim the path.
            if UnixStream::connect(path).is_err() {
                std::fs::remove_file(path)?;
                UnixListener::bind(path)
            } else {
                Err(err)
            }
        }
        Err(err) => Err(err),
    }
}

//! Blocking thrift service over a Unix domain socket.
//!
//! The `thrift` crate's bundled server only listens on TCP, so the accept
//! loop lives here: one blocking listener, one worker thread per connection.
//! Stopping follows the wake-up pattern: set the flag, then make a dummy
//! connection so a blocked `accept` observes it.

use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use thrift::protocol::{TBinaryInputProtocol, TBinaryOutputProtocol};
use thrift::server::TProcessor;
use thrift::transport::{TBufferedReadTransport, TBufferedWriteTransport};
use thrift::TransportErrorKind;

use crate::transport;

pub(crate) struct ThriftService<PRC: TProcessor + Send + Sync + 'static> {
    listener: UnixListener,
    listen_path: String,
    processor: Arc<PRC>,
    stopped: Arc<AtomicBool>,
}

/// Stops the paired service. Cloneable and callable from any thread,
/// including a connection worker currently inside a served RPC.
#[derive(Clone)]
pub(crate) struct ServiceStopHandle {
    listen_path: String,
    stopped: Arc<AtomicBool>,
}

impl ServiceStopHandle {
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        // Wake a blocked accept() so it can see the flag.
        let _ = UnixStream::connect(&self.listen_path);
    }
}

impl<PRC: TProcessor + Send + Sync + 'static> ThriftService<PRC> {
    pub(crate) fn bind(listen_path: &str, processor: PRC) -> std::io::Result<ThriftService<PRC>> {
        let listener = transport::listen(listen_path)?;
        Ok(ThriftService {
            listener,
            listen_path: listen_path.to_string(),
            processor: Arc::new(processor),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub(crate) fn stop_handle(&self) -> ServiceStopHandle {
        ServiceStopHandle {
            listen_path: self.listen_path.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Accepts connections until stopped. Blocks the calling thread.
    ///
    /// Connection workers are detached; they exit when their peer hangs up.
    /// Stopping does not wait for in-flight requests, which is what makes a
    /// shutdown initiated from inside a served RPC safe.
    pub(crate) fn serve(self) {
        log::debug!("serving extension requests on {}", self.listen_path);
        for stream in self.listener.incoming() {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let processor = Arc::clone(&self.processor);
                    thread::spawn(move || serve_connection(processor, stream));
                }
                Err(err) => {
                    log::warn!("accept failed, stopping listener: {err}");
                    break;
                }
            }
        }

        if let Err(err) = std::fs::remove_file(&self.listen_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove socket file {}: {err}", self.listen_path);
            }
        }
        log::debug!("listener on {} stopped", self.listen_path);
    }
}

fn serve_connection<PRC: TProcessor>(processor: Arc<PRC>, stream: UnixStream) {
    let read_half = match stream.try_clone() {
        Ok(read_half) => read_half,
        Err(err) => {
            log::warn!("failed to clone connection stream: {err}");
            return;
        }
    };
    let mut i_prot = TBinaryInputProtocol::new(TBufferedReadTransport::new(read_half), true);
    let mut o_prot = TBinaryOutputProtocol::new(TBufferedWriteTransport::new(stream), true);

    loop {
        match processor.process(&mut i_prot, &mut o_prot) {
            Ok(()) => {}
            Err(thrift::Error::Transport(ref err))
                if err.kind == TransportErrorKind::EndOfFile =>
            {
                break;
            }
            Err(err) => {
                log::debug!("closing connection: {err}");
                break;
            }
        }
    }
}

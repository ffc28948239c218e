//! Production [`ExtensionManagerApi`] implementation over a Unix socket.

use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use thrift::protocol::{TBinaryInputProtocol, TBinaryOutputProtocol};
use thrift::transport::{TBufferedReadTransport, TBufferedWriteTransport};

use crate::_osquery as osquery;
use crate::_osquery::{TExtensionManagerSyncClient, TExtensionSyncClient};
use crate::client::stub::ExtensionManagerApi;
use crate::transport;

type SyncClient = osquery::ExtensionManagerSyncClient<
    TBinaryInputProtocol<TBufferedReadTransport<UnixStream>>,
    TBinaryOutputProtocol<TBufferedWriteTransport<UnixStream>>,
>;

/// Thrift binary-protocol stub speaking to osquery over a Unix socket.
pub struct ThriftStub {
    client: SyncClient,
    // Kept aside so close() can tear the connection down while the protocol
    // stack owns the buffered halves.
    stream: UnixStream,
}

impl ThriftStub {
    /// Dials the extensions socket at `path`, waiting up to `open_timeout`
    /// for osquery to create it.
    pub fn connect(path: &str, open_timeout: Duration) -> io::Result<ThriftStub> {
        let socket_rx = transport::dial(path, open_timeout)?;
        let socket_tx = socket_rx.try_clone()?;
        let stream = socket_rx.try_clone()?;

        let in_prot = TBinaryInputProtocol::new(TBufferedReadTransport::new(socket_rx), true);
        let out_prot = TBinaryOutputProtocol::new(TBufferedWriteTransport::new(socket_tx), true);

        Ok(ThriftStub {
            client: osquery::ExtensionManagerSyncClient::new(in_prot, out_prot),
            stream,
        })
    }
}

impl ExtensionManagerApi for ThriftStub {
    fn ping(&mut self) -> thrift::Result<osquery::ExtensionStatus> {
        self.client.ping()
    }

    fn call(
        &mut self,
        registry: String,
        item: String,
        request: osquery::ExtensionPluginRequest,
    ) -> thrift::Result<osquery::ExtensionResponse> {
        self.client.call(registry, item, request)
    }

    fn extensions(&mut self) -> thrift::Result<osquery::InternalExtensionList> {
        self.client.extensions()
    }

    fn register_extension(
        &mut self,
        info: osquery::InternalExtensionInfo,
        registry: osquery::ExtensionRegistry,
    ) -> thrift::Result<osquery::ExtensionStatus> {
        self.client.register_extension(info, registry)
    }

    fn deregister_extension(
        &mut self,
        uuid: osquery::ExtensionRouteUUID,
    ) -> thrift::Result<osquery::ExtensionStatus> {
        self.client.deregister_extension(uuid)
    }

    fn options(&mut self) -> thrift::Result<osquery::InternalOptionList> {
        self.client.options()
    }

    fn query(&mut self, sql: String) -> thrift::Result<osquery::ExtensionResponse> {
        self.client.query(sql)
    }

    fn get_query_columns(&mut self, sql: String) -> thrift::Result<osquery::ExtensionResponse> {
        self.client.get_query_columns(sql)
    }

    fn shutdown(&mut self) -> thrift::Result<()> {
        self.client.shutdown()
    }

    fn close(&mut self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            if err.kind() != io::ErrorKind::NotConnected {
                log::debug!("closing osquery transport: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn connect_fails_for_missing_socket() {
        let result = ThriftStub::connect("/nonexistent/socket", Duration::from_millis(50));
        assert!(result.is_err());
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
    }

    #[test]
    fn connect_fails_for_directory_path() {
        let result = ThriftStub::connect("/tmp", Duration::from_millis(50));
        assert!(result.is_err());
    }
}

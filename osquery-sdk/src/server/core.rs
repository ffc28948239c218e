//! Extension server lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use strum::VariantNames;

use crate::_osquery as osquery;
use crate::client::ExtensionManagerClient;
use crate::error::{Error, Result};
use crate::plugin::{OsqueryPlugin, Registry};
use crate::server::handler::{Handler, PluginRegistry};
use crate::server::service::{ServiceStopHandle, ThriftService};
use crate::traces;

/// Default open timeout for the server's own client connection.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// How often the watchdog pings osquery while running.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Longest socket path accepted at construction. The per-uuid suffix
/// appended after registration (a dot and up to five digits) must keep the
/// full listen path under the 103-byte POSIX ceiling.
pub const MAX_SOCKET_PATH_CHARACTERS: usize = 97;

/// An implementation of the full extension manager API. Plugins register
/// with the server, which handles all communication with osquery.
pub struct ExtensionManagerServer {
    name: String,
    registry: PluginRegistry,
    core: Arc<ServerCore>,
    ping_interval: Duration,
}

impl std::fmt::Debug for ExtensionManagerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManagerServer")
            .field("name", &self.name)
            .field("ping_interval", &self.ping_interval)
            .finish()
    }
}

/// State shared between the server, its inbound handler, and shutdown paths.
pub(crate) struct ServerCore {
    sock_path: String,
    pub(crate) client: ExtensionManagerClient,
    client_owned: bool,
    state: Mutex<ServerState>,
    started: Mutex<bool>,
    started_cond: Condvar,
}

struct ServerState {
    uuid: Option<osquery::ExtensionRouteUUID>,
    service: Option<ServiceStopHandle>,
    shutdown_done: bool,
}

fn recover<T>(result: std::result::Result<T, PoisonError<T>>) -> T {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl ExtensionManagerServer {
    /// Creates a server that connects to osquery at `sock_path` with a client
    /// it owns (and will close on shutdown).
    pub fn new(name: &str, sock_path: &str) -> Result<ExtensionManagerServer> {
        let client = ExtensionManagerClient::connect(sock_path, DEFAULT_TIMEOUT)?;
        Self::build(name, sock_path, client, true)
    }

    /// Creates a server around an injected client. The client is left open at
    /// shutdown; its lifetime belongs to the caller.
    pub fn with_client(
        name: &str,
        sock_path: &str,
        client: ExtensionManagerClient,
    ) -> Result<ExtensionManagerServer> {
        Self::build(name, sock_path, client, false)
    }

    fn build(
        name: &str,
        sock_path: &str,
        client: ExtensionManagerClient,
        client_owned: bool,
    ) -> Result<ExtensionManagerServer> {
        if sock_path.len() > MAX_SOCKET_PATH_CHARACTERS {
            return Err(Error::SocketPathTooLong(
                sock_path.len(),
                MAX_SOCKET_PATH_CHARACTERS,
            ));
        }

        let mut registry = PluginRegistry::new();
        for kind in Registry::VARIANTS {
            registry.insert((*kind).to_string(), HashMap::new());
        }

        Ok(ExtensionManagerServer {
            name: name.to_string(),
            registry,
            core: Arc::new(ServerCore {
                sock_path: sock_path.to_string(),
                client,
                client_owned,
                state: Mutex::new(ServerState {
                    uuid: None,
                    service: None,
                    shutdown_done: false,
                }),
                started: Mutex::new(false),
                started_cond: Condvar::new(),
            }),
            ping_interval: DEFAULT_PING_INTERVAL,
        })
    }

    /// Overrides the watchdog ping interval.
    pub fn with_ping_interval(mut self, ping_interval: Duration) -> ExtensionManagerServer {
        self.ping_interval = ping_interval;
        self
    }

    /// Registers a plugin. All plugins must be registered before `start` or
    /// `run` is called.
    ///
    /// # Panics
    ///
    /// Panics if the plugin reports a registry name outside
    /// {table, logger, config, distributed}; that is a programming error in
    /// the plugin, not a runtime condition.
    pub fn register_plugin(&mut self, plugin: impl OsqueryPlugin + 'static) {
        let kind = plugin.registry_name();
        if kind.parse::<Registry>().is_err() {
            panic!("invalid registry name: {kind}");
        }
        let route_table = self.registry.entry(kind).or_default();
        route_table.insert(plugin.name(), Arc::new(plugin));
    }

    fn gen_registry(&self) -> osquery::ExtensionRegistry {
        let mut registry = osquery::ExtensionRegistry::new();
        for (kind, route_table) in &self.registry {
            let table = registry
                .entry(kind.clone())
                .or_insert_with(osquery::ExtensionRouteTable::new);
            for (name, plugin) in route_table {
                table.insert(name.clone(), plugin.routes());
            }
        }
        registry
    }

    /// Registers the extension and serves requests on the per-uuid socket.
    /// Blocks until the server is shut down. All plugins should be registered
    /// with `register_plugin` before calling this.
    pub fn start(&self) -> Result<()> {
        let service = {
            // Serializes registration with any concurrent shutdown.
            let mut state = recover(self.core.state.lock());

            let info = osquery::InternalExtensionInfo {
                name: Some(self.name.clone()),
                version: Some(traces::instrumentation_version().to_string()),
                sdk_version: Some(traces::instrumentation_version().to_string()),
                min_sdk_version: None,
            };
            let status = self
                .core
                .client
                .register_extension(info, self.gen_registry())
                .map_err(|err| Error::RegisterExtension(Box::new(err)))?;

            let code = status.code.unwrap_or(0);
            if code != 0 {
                return Err(Error::RegisterExtensionStatus {
                    code,
                    message: status.message.unwrap_or_default(),
                });
            }

            let uuid = status.uuid.unwrap_or(0);
            state.uuid = Some(uuid);
            log::info!("extension {} registered with uuid {uuid}", self.name);

            let listen_path = format!("{}.{}", self.core.sock_path, uuid);
            let handler = Handler::new(Arc::new(self.registry.clone()), Arc::clone(&self.core));
            let processor = osquery::ExtensionManagerSyncProcessor::new(handler);

            let service = match ThriftService::bind(&listen_path, processor) {
                Ok(service) => service,
                Err(source) => {
                    // Unwind the registration we just made; keep the bind
                    // error primary unless deregistration fails too.
                    state.uuid = None;
                    let open_err = Error::OpenServerSocket {
                        path: listen_path,
                        source,
                    };
                    return match self.core.client.deregister_extension(uuid) {
                        Ok(_) => Err(open_err),
                        Err(_) => Err(Error::DeregisterFollowingError {
                            original: Box::new(open_err),
                        }),
                    };
                }
            };

            state.service = Some(service.stop_handle());
            self.core.mark_started();
            service
        };

        service.serve();
        Ok(())
    }

    /// Starts the server and blocks until it stops, pinging osquery every
    /// `ping_interval` to detect a dead manager. Returns the first error
    /// observed (from `start`, the watchdog, or shutdown).
    pub fn run(&self) -> Result<()> {
        self.run_inner(None)
    }

    /// Like [`ExtensionManagerServer::run`], additionally treating SIGINT and
    /// SIGTERM as a clean stop.
    #[cfg(unix)]
    pub fn run_with_signal_handling(&self) -> Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::flag;

        let signal_flag = Arc::new(AtomicBool::new(false));
        // Failing to register is non-fatal: other shutdown paths still work.
        if let Err(err) = flag::register(SIGINT, Arc::clone(&signal_flag)) {
            log::warn!("failed to register SIGINT handler: {err}");
        }
        if let Err(err) = flag::register(SIGTERM, Arc::clone(&signal_flag)) {
            log::warn!("failed to register SIGTERM handler: {err}");
        }

        self.run_inner(Some(signal_flag))
    }

    fn run_inner(&self, signal_flag: Option<Arc<AtomicBool>>) -> Result<()> {
        // Short tick so stop signals are observed promptly between pings.
        const TICK: Duration = Duration::from_millis(100);

        let (start_tx, start_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        thread::scope(|scope| {
            scope.spawn(move || {
                let _ = start_tx.send(self.start());
            });

            let mut next_ping = Instant::now() + self.ping_interval;
            let cause = loop {
                crossbeam_channel::select! {
                    recv(start_rx) -> outcome => {
                        break outcome.unwrap_or(Ok(()));
                    }
                    default(TICK) => {
                        let interrupted = signal_flag
                            .as_ref()
                            .map(|flag| flag.load(Ordering::Acquire))
                            .unwrap_or(false);
                        if interrupted {
                            log::info!("interrupt received, shutting down");
                            break Ok(());
                        }
                        if Instant::now() >= next_ping {
                            match self.core.client.ping() {
                                Err(err) => break Err(Error::PingFailed(Box::new(err))),
                                Ok(status) if status.code.unwrap_or(0) != 0 => {
                                    break Err(Error::PingStatus(status.code.unwrap_or(0)));
                                }
                                Ok(_) => next_ping = Instant::now() + self.ping_interval,
                            }
                        }
                    }
                }
            };

            let shutdown_result = self.core.shutdown();
            // The scope joins the start thread; shutdown above unblocks it.
            cause.and(shutdown_result)
        })
    }

    /// Deregisters from osquery and stops serving. Idempotent; a second call
    /// returns Ok without side effects.
    pub fn shutdown(&self) -> Result<()> {
        self.core.shutdown()
    }

    /// Blocks until `start` has opened the listening socket.
    pub fn wait_started(&self) {
        let mut started = recover(self.core.started.lock());
        while !*started {
            started = recover(self.core.started_cond.wait(started));
        }
    }

    /// Like [`ExtensionManagerServer::wait_started`] with an upper bound.
    /// Returns whether the server started within `timeout`.
    pub fn wait_started_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = recover(self.core.started.lock());
        while !*started {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, _) = recover(self.core.started_cond.wait_timeout(started, remaining));
            started = guard;
        }
        true
    }
}

impl ServerCore {
    fn mark_started(&self) {
        let mut started = recover(self.started.lock());
        *started = true;
        self.started_cond.notify_all();
    }

    pub(crate) fn shutdown(&self) -> Result<()> {
        let mut state = recover(self.state.lock());
        let mut result = Ok(());

        if !state.shutdown_done {
            state.shutdown_done = true;

            if let Some(uuid) = state.uuid.take() {
                match self.client.deregister_extension(uuid) {
                    Err(err) => {
                        result = Err(Error::DeregisterExtension(Box::new(err)));
                    }
                    Ok(status) => {
                        let code = status.code.unwrap_or(0);
                        if code != 0 {
                            result = Err(Error::DeregisterExtensionStatus {
                                code,
                                message: status.message.unwrap_or_default(),
                            });
                        }
                    }
                }
            }

            if self.client_owned {
                self.client.close();
            }
        }

        if let Some(service) = state.service.take() {
            // Stopping synchronously would deadlock when shutdown is invoked
            // from inside a served RPC; stop from a detached thread instead.
            thread::spawn(move || service.stop());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockExtensionManagerApi;
    use crate::context::Context;
    use crate::plugin::logger::{LogType, Logger};
    use crate::plugin::Plugin;
    use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse,
        ExtensionStatus};
    use thrift::{TransportError, TransportErrorKind};

    struct NullLogger;

    impl Logger for NullLogger {
        fn name(&self) -> String {
            "null_logger".to_string()
        }

        fn log(&self, _typ: LogType, _message: &str) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    struct BogusPlugin;

    impl OsqueryPlugin for BogusPlugin {
        fn name(&self) -> String {
            "bogus".to_string()
        }

        fn registry_name(&self) -> String {
            "telemetry".to_string()
        }

        fn routes(&self) -> ExtensionPluginResponse {
            ExtensionPluginResponse::new()
        }

        fn ping(&self) -> ExtensionStatus {
            ExtensionStatus::ok()
        }

        fn handle_call(
            &self,
            _ctx: &Context,
            _request: ExtensionPluginRequest,
        ) -> ExtensionResponse {
            ExtensionResponse::default()
        }

        fn shutdown(&self) {}
    }

    fn sock_path(dir: &tempfile::TempDir) -> String {
        dir.path().join("osquery.em").to_str().unwrap().to_string()
    }

    fn server_with_mock(
        dir: &tempfile::TempDir,
        mock: MockExtensionManagerApi,
    ) -> ExtensionManagerServer {
        let client = ExtensionManagerClient::with_stub(Box::new(mock));
        ExtensionManagerServer::with_client("test_extension", &sock_path(dir), client).unwrap()
    }

    #[test]
    #[should_panic(expected = "invalid registry name: telemetry")]
    fn registering_an_invalid_kind_panics() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtensionManagerApi::new();
        let mut server = server_with_mock(&dir, mock);
        server.register_plugin(BogusPlugin);
    }

    #[test]
    fn registry_covers_every_kind_and_registered_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtensionManagerApi::new();
        let mut server = server_with_mock(&dir, mock);
        server.register_plugin(Plugin::logger(NullLogger));

        let registry = server.gen_registry();
        assert_eq!(registry.len(), 4);
        for kind in ["table", "logger", "config", "distributed"] {
            assert!(registry.contains_key(kind), "missing kind {kind}");
        }
        assert!(registry["logger"].contains_key("null_logger"));
        assert!(registry["table"].is_empty());
    }

    #[test]
    fn plugins_with_the_same_name_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtensionManagerApi::new();
        let mut server = server_with_mock(&dir, mock);
        server.register_plugin(Plugin::logger(NullLogger));
        server.register_plugin(Plugin::logger(NullLogger));
        assert_eq!(server.gen_registry()["logger"].len(), 1);
    }

    #[test]
    fn socket_path_boundary_is_enforced() {
        let mock = MockExtensionManagerApi::new();
        let client = ExtensionManagerClient::with_stub(Box::new(mock));
        let at_limit = "a".repeat(MAX_SOCKET_PATH_CHARACTERS);
        assert!(ExtensionManagerServer::with_client("x", &at_limit, client).is_ok());

        let mock = MockExtensionManagerApi::new();
        let client = ExtensionManagerClient::with_stub(Box::new(mock));
        let over_limit = "a".repeat(MAX_SOCKET_PATH_CHARACTERS + 1);
        let err = ExtensionManagerServer::with_client("x", &over_limit, client).unwrap_err();
        assert!(err
            .to_string()
            .contains("exceeded the maximum socket path character length"));
    }

    #[test]
    fn run_surfaces_registration_errors_without_deadlocking() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExtensionManagerApi::new();
        mock.expect_register_extension().times(1).returning(|_, _| {
            Err(thrift::Error::Transport(TransportError::new(
                TransportErrorKind::Unknown,
                "boom!",
            )))
        });
        mock.expect_ping()
            .returning(|| Ok(ExtensionStatus::ok()));

        let server =
            server_with_mock(&dir, mock).with_ping_interval(Duration::from_millis(50));
        let err = server.run().unwrap_err();
        assert!(
            err.to_string().starts_with("registering extension:"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn run_shuts_down_when_ping_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExtensionManagerApi::new();
        mock.expect_register_extension()
            .times(1)
            .returning(|_, _| Ok(ExtensionStatus::new(0, None, Some(7))));
        mock.expect_ping().returning(|| {
            Err(thrift::Error::Transport(TransportError::new(
                TransportErrorKind::NotOpen,
                "broken pipe",
            )))
        });
        mock.expect_deregister_extension()
            .times(1)
            .returning(|_| Ok(ExtensionStatus::new(0, None, None)));

        let server =
            server_with_mock(&dir, mock).with_ping_interval(Duration::from_millis(50));
        let err = server.run().unwrap_err();
        assert!(
            err.to_string().starts_with("extension ping failed:"),
            "unexpected error: {err}"
        );
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn run_shuts_down_on_nonzero_ping_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExtensionManagerApi::new();
        mock.expect_register_extension()
            .times(1)
            .returning(|_, _| Ok(ExtensionStatus::new(0, None, Some(8))));
        mock.expect_ping()
            .returning(|| Ok(ExtensionStatus::new(2, None, None)));
        mock.expect_deregister_extension()
            .times(1)
            .returning(|_| Ok(ExtensionStatus::new(0, None, None)));

        let server =
            server_with_mock(&dir, mock).with_ping_interval(Duration::from_millis(50));
        let err = server.run().unwrap_err();
        assert_eq!(err.to_string(), "ping returned status 2");
    }

    #[test]
    fn shutdown_is_idempotent_and_deregisters_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExtensionManagerApi::new();
        mock.expect_register_extension()
            .times(1)
            .returning(|_, _| Ok(ExtensionStatus::new(0, None, Some(3))));
        mock.expect_deregister_extension()
            .times(1)
            .returning(|_| Ok(ExtensionStatus::new(0, None, None)));

        let server = server_with_mock(&dir, mock);
        thread::scope(|scope| {
            scope.spawn(|| {
                let _ = server.start();
            });
            assert!(server.wait_started_timeout(Duration::from_secs(5)));

            server.shutdown().unwrap();
            server.shutdown().unwrap();
        });
    }

    #[test]
    fn registration_status_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExtensionManagerApi::new();
        mock.expect_register_extension().times(1).returning(|_, _| {
            Ok(ExtensionStatus::new(
                2,
                "extension failed".to_string(),
                None,
            ))
        });

        let server = server_with_mock(&dir, mock);
        let err = server.start().unwrap_err();
        assert_eq!(
            err.to_string(),
            "status 2 registering extension: extension failed"
        );
    }
}

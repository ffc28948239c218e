//! High-level client for the osquery extension manager.
//!
//! [`ExtensionManagerClient`] wraps the wire stub with the transport locker:
//! every RPC takes the slot, runs the call, releases. Concurrent callers on
//! the same client therefore never interleave frames on the shared socket.
//!
//! Each operation has a plain variant (background context) and a `_context`
//! variant participating in cancellation, deadlines, and tracing.

pub mod stub;
pub mod thrift_stub;

pub use stub::ExtensionManagerApi;
pub use thrift_stub::ThriftStub;

#[cfg(test)]
pub use stub::MockExtensionManagerApi;

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::_osquery as osquery;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::locker::Locker;
use crate::traces;

const DEFAULT_WAIT_TIME: Duration = Duration::from_millis(200);
const DEFAULT_MAX_WAIT_TIME: Duration = Duration::from_secs(60);

/// A single result row.
pub type Row = BTreeMap<String, String>;

/// Tuning knobs for the client's transport locker.
#[derive(Clone, Copy, Debug)]
pub struct ClientOptions {
    /// Wait bound applied when a call carries no context deadline.
    pub default_wait_time: Duration,
    /// Absolute wait ceiling; overrides even longer caller deadlines.
    pub max_wait_time: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            default_wait_time: DEFAULT_WAIT_TIME,
            max_wait_time: DEFAULT_MAX_WAIT_TIME,
        }
    }
}

/// Client for the osquery extensions API.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ExtensionManagerClient {
    stub: Mutex<Box<dyn ExtensionManagerApi>>,
    lock: Locker,
}

impl ExtensionManagerClient {
    /// Connects to osquery over the socket at `path`.
    pub fn connect(path: &str, socket_open_timeout: Duration) -> Result<ExtensionManagerClient> {
        Self::connect_with_options(path, socket_open_timeout, ClientOptions::default())
    }

    /// Connects with explicit locker bounds.
    pub fn connect_with_options(
        path: &str,
        socket_open_timeout: Duration,
        options: ClientOptions,
    ) -> Result<ExtensionManagerClient> {
        let stub = ThriftStub::connect(path, socket_open_timeout).map_err(|source| {
            Error::Connect {
                path: path.to_string(),
                source,
            }
        })?;
        Self::with_stub_and_options(Box::new(stub), options)
    }

    /// Wraps a pre-built stub. Intended for tests and for callers that manage
    /// their own transport.
    pub fn with_stub(stub: Box<dyn ExtensionManagerApi>) -> ExtensionManagerClient {
        ExtensionManagerClient {
            stub: Mutex::new(stub),
            lock: Locker::new(DEFAULT_WAIT_TIME, DEFAULT_MAX_WAIT_TIME),
        }
    }

    /// Wraps a pre-built stub with explicit locker bounds.
    pub fn with_stub_and_options(
        stub: Box<dyn ExtensionManagerApi>,
        options: ClientOptions,
    ) -> Result<ExtensionManagerClient> {
        if options.default_wait_time > options.max_wait_time {
            return Err(Error::WaitTimeOrdering);
        }
        Ok(ExtensionManagerClient {
            stub: Mutex::new(stub),
            lock: Locker::new(options.default_wait_time, options.max_wait_time),
        })
    }

    /// Closes the underlying transport. Subsequent calls will fail at the
    /// thrift layer.
    pub fn close(&self) {
        let mut stub = self.stub.lock().unwrap_or_else(PoisonError::into_inner);
        stub.close();
    }

    /// Takes the transport slot, runs one RPC, releases the slot.
    fn locked<T>(
        &self,
        ctx: &Context,
        operation: &'static str,
        rpc: impl FnOnce(&mut dyn ExtensionManagerApi) -> thrift::Result<T>,
    ) -> Result<T> {
        self.lock.lock(ctx)?;
        let result = {
            let mut stub = self.stub.lock().unwrap_or_else(PoisonError::into_inner);
            rpc(stub.as_mut())
        };
        self.lock.unlock();
        result.map_err(|source| Error::Transport { operation, source })
    }

    /// Requests metadata from the extension manager.
    pub fn ping(&self) -> Result<osquery::ExtensionStatus> {
        self.ping_context(&Context::background())
    }

    pub fn ping_context(&self, ctx: &Context) -> Result<osquery::ExtensionStatus> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.PingContext", &[]);
        self.locked(&ctx, "ping", |stub| stub.ping())
    }

    /// Requests a call to a registry plugin, in an extension or osquery core.
    pub fn call(
        &self,
        registry: &str,
        item: &str,
        request: osquery::ExtensionPluginRequest,
    ) -> Result<osquery::ExtensionResponse> {
        self.call_context(&Context::background(), registry, item, request)
    }

    pub fn call_context(
        &self,
        ctx: &Context,
        registry: &str,
        item: &str,
        request: osquery::ExtensionPluginRequest,
    ) -> Result<osquery::ExtensionResponse> {
        let (ctx, _span) = traces::start_span(
            ctx,
            "ExtensionManagerClient.CallContext",
            &[("registry", registry), ("item", item)],
        );
        let registry = registry.to_string();
        let item = item.to_string();
        self.locked(&ctx, "call", move |stub| stub.call(registry, item, request))
    }

    /// Requests the list of active registered extensions.
    pub fn extensions(&self) -> Result<osquery::InternalExtensionList> {
        self.extensions_context(&Context::background())
    }

    pub fn extensions_context(&self, ctx: &Context) -> Result<osquery::InternalExtensionList> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.ExtensionsContext", &[]);
        self.locked(&ctx, "extensions", |stub| stub.extensions())
    }

    /// Registers the extension plugins with the osquery process.
    pub fn register_extension(
        &self,
        info: osquery::InternalExtensionInfo,
        registry: osquery::ExtensionRegistry,
    ) -> Result<osquery::ExtensionStatus> {
        self.register_extension_context(&Context::background(), info, registry)
    }

    pub fn register_extension_context(
        &self,
        ctx: &Context,
        info: osquery::InternalExtensionInfo,
        registry: osquery::ExtensionRegistry,
    ) -> Result<osquery::ExtensionStatus> {
        let (ctx, _span) =
            traces::start_span(ctx, "ExtensionManagerClient.RegisterExtensionContext", &[]);
        self.locked(&ctx, "registerExtension", move |stub| {
            stub.register_extension(info, registry)
        })
    }

    /// De-registers the extension plugins from the osquery process.
    pub fn deregister_extension(
        &self,
        uuid: osquery::ExtensionRouteUUID,
    ) -> Result<osquery::ExtensionStatus> {
        self.deregister_extension_context(&Context::background(), uuid)
    }

    pub fn deregister_extension_context(
        &self,
        ctx: &Context,
        uuid: osquery::ExtensionRouteUUID,
    ) -> Result<osquery::ExtensionStatus> {
        let (ctx, _span) = traces::start_span(
            ctx,
            "ExtensionManagerClient.DeregisterExtensionContext",
            &[],
        );
        self.locked(&ctx, "deregisterExtension", move |stub| {
            stub.deregister_extension(uuid)
        })
    }

    /// Requests the list of bootstrap or configuration options.
    pub fn options(&self) -> Result<osquery::InternalOptionList> {
        self.options_context(&Context::background())
    }

    pub fn options_context(&self, ctx: &Context) -> Result<osquery::InternalOptionList> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.OptionsContext", &[]);
        self.locked(&ctx, "options", |stub| stub.options())
    }

    /// Runs a query and returns the raw extension response. Consider the
    /// `query_rows` or `query_row` helpers for a friendlier interface.
    pub fn query(&self, sql: &str) -> Result<osquery::ExtensionResponse> {
        self.query_context(&Context::background(), sql)
    }

    pub fn query_context(&self, ctx: &Context, sql: &str) -> Result<osquery::ExtensionResponse> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.QueryContext", &[]);
        let sql = sql.to_string();
        self.locked(&ctx, "query", move |stub| stub.query(sql))
    }

    /// Runs a query and returns its rows, folding transport failures and
    /// non-zero osquery statuses into one error surface.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        self.query_rows_context(&Context::background(), sql)
    }

    pub fn query_rows_context(&self, ctx: &Context, sql: &str) -> Result<Vec<Row>> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.QueryRowsContext", &[]);
        let response = self.query_context(&ctx, sql)?;
        let status = response
            .status
            .ok_or(Error::NilStatus { operation: "query" })?;
        if status.code.unwrap_or(0) != 0 {
            return Err(Error::Status {
                operation: "query",
                message: status.message.unwrap_or_default(),
            });
        }
        Ok(response.response.unwrap_or_default())
    }

    /// Like `query_rows`, but requires the result to be exactly one row.
    pub fn query_row(&self, sql: &str) -> Result<Row> {
        self.query_row_context(&Context::background(), sql)
    }

    pub fn query_row_context(&self, ctx: &Context, sql: &str) -> Result<Row> {
        let (ctx, _span) = traces::start_span(ctx, "ExtensionManagerClient.QueryRowContext", &[]);
        let mut rows = self.query_rows_context(&ctx, sql)?;
        if rows.len() != 1 {
            return Err(Error::UnexpectedRowCount(rows.len()));
        }
        Ok(rows.remove(0))
    }

    /// Requests the columns the parsed query would return.
    pub fn get_query_columns(&self, sql: &str) -> Result<osquery::ExtensionResponse> {
        self.get_query_columns_context(&Context::background(), sql)
    }

    pub fn get_query_columns_context(
        &self,
        ctx: &Context,
        sql: &str,
    ) -> Result<osquery::ExtensionResponse> {
        let (ctx, _span) =
            traces::start_span(ctx, "ExtensionManagerClient.GetQueryColumnsContext", &[]);
        let sql = sql.to_string();
        self.locked(&ctx, "getQueryColumns", move |stub| {
            stub.get_query_columns(sql)
        })
    }
}

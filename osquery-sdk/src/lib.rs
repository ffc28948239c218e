#![forbid(unsafe_code)]

// Restrict access to the osquery Thrift API to this crate; consumers talk to
// osquery through the client, server, and plugin types only.
pub(crate) mod _osquery;

pub mod client;
pub mod context;
pub mod error;
pub mod locker;
pub mod plugin;
pub mod server;
pub mod traces;

pub(crate) mod transport;

pub use crate::client::{ClientOptions, ExtensionManagerClient};
pub use crate::context::{CancelHandle, Context, ContextError};
pub use crate::error::{Error, Result};
pub use crate::server::{ExtensionManagerServer, MAX_SOCKET_PATH_CHARACTERS};

// Re-exports of the wire-level types every plugin touches.
pub use _osquery::osquery::{
    ExtensionPluginRequest, ExtensionPluginResponse, ExtensionRegistry, ExtensionResponse,
    ExtensionRouteTable, ExtensionRouteUUID, ExtensionStatus, InternalExtensionInfo,
    InternalExtensionList, InternalOptionInfo, InternalOptionList,
};

///
/// Expose all structures required in virtually any osquery extension
///
/// ```
/// use osquery_sdk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::ExtensionManagerClient;
    pub use crate::context::Context;
    pub use crate::plugin::{
        ColumnDef, ColumnOptions, ColumnType, Config, Distributed, DistributedResult,
        GetQueriesResult, LogType, Logger, Plugin, QueryContext, Table, TableRow,
    };
    pub use crate::server::ExtensionManagerServer;
    pub use crate::{
        ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus,
    };
}

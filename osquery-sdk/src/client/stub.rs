//! RPC stub surface used by the high-level client.
//!
//! The trait mirrors osquery's `ExtensionManager` Thrift service one-to-one,
//! which keeps [`crate::client::ExtensionManagerClient`] mockable in tests
//! without a real socket.

use crate::_osquery as osquery;

#[cfg_attr(test, mockall::automock)]
pub trait ExtensionManagerApi: Send {
    /// Basic health check against the extension manager.
    fn ping(&mut self) -> thrift::Result<osquery::ExtensionStatus>;

    /// Invoke a registered plugin (in an extension or in osquery core).
    fn call(
        &mut self,
        registry: String,
        item: String,
        request: osquery::ExtensionPluginRequest,
    ) -> thrift::Result<osquery::ExtensionResponse>;

    /// List the active registered extensions.
    fn extensions(&mut self) -> thrift::Result<osquery::InternalExtensionList>;

    /// Register this process's plugins; the returned status carries the
    /// route uuid osquery assigned.
    fn register_extension(
        &mut self,
        info: osquery::InternalExtensionInfo,
        registry: osquery::ExtensionRegistry,
    ) -> thrift::Result<osquery::ExtensionStatus>;

    /// Remove a previously registered extension by uuid.
    fn deregister_extension(
        &mut self,
        uuid: osquery::ExtensionRouteUUID,
    ) -> thrift::Result<osquery::ExtensionStatus>;

    /// List osquery's bootstrap and configuration options.
    fn options(&mut self) -> thrift::Result<osquery::InternalOptionList>;

    /// Run a SQL query through osquery.
    fn query(&mut self, sql: String) -> thrift::Result<osquery::ExtensionResponse>;

    /// Resolve the column metadata of a parsed query without running it.
    fn get_query_columns(&mut self, sql: String) -> thrift::Result<osquery::ExtensionResponse>;

    /// Ask the remote side to shut down.
    fn shutdown(&mut self) -> thrift::Result<()>;

    /// Tear down the underlying transport. Safe to call more than once.
    fn close(&mut self);
}

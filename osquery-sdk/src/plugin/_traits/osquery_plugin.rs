use crate::context::Context;
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// Capability surface osquery expects from every registered plugin.
pub trait OsqueryPlugin: Send + Sync {
    /// Name is the name used to refer to the plugin (e.g. the name of the
    /// table the plugin implements).
    fn name(&self) -> String;

    /// Which "registry" the plugin belongs to. Valid names are
    /// "table", "logger", "config", and "distributed".
    fn registry_name(&self) -> String;

    /// Routes returns detailed information about the interface exposed by the
    /// plugin (e.g. a table's columns), reported to osquery at registration.
    fn routes(&self) -> ExtensionPluginResponse;

    /// The plugin's health check. A healthy plugin returns status OK.
    fn ping(&self) -> ExtensionStatus;

    /// Performs the plugin's defined behavior for one request and returns the
    /// response envelope.
    fn handle_call(&self, ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse;

    /// Notifies the plugin that the extension is stopping.
    fn shutdown(&self);
}

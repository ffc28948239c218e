//! Inbound request handler: routes osquery's calls to registered plugins.

use std::collections::HashMap;
use std::sync::Arc;

use crate::_osquery as osquery;
use crate::context::Context;
use crate::plugin::{response, OsqueryPlugin};
use crate::server::core::ServerCore;
use crate::traces;

pub(crate) type PluginRegistry = HashMap<String, HashMap<String, Arc<dyn OsqueryPlugin>>>;

pub(crate) struct Handler {
    registry: Arc<PluginRegistry>,
    core: Arc<ServerCore>,
}

impl Handler {
    pub(crate) fn new(registry: Arc<PluginRegistry>, core: Arc<ServerCore>) -> Handler {
        Handler { registry, core }
    }
}

impl osquery::ExtensionSyncHandler for Handler {
    fn handle_ping(&self) -> thrift::Result<osquery::ExtensionStatus> {
        Ok(osquery::ExtensionStatus::ok())
    }

    fn handle_call(
        &self,
        registry: String,
        item: String,
        request: osquery::ExtensionPluginRequest,
    ) -> thrift::Result<osquery::ExtensionResponse> {
        log::trace!("call registry:{registry} item:{item} request:{request:?}");
        let ctx = Context::background();
        let (ctx, _span) = traces::start_span(
            &ctx,
            "ExtensionManagerServer.Call",
            &[("registry", registry.as_str()), ("item", item.as_str())],
        );

        let Some(route_table) = self.registry.get(&registry) else {
            return Ok(response::failure(format!("Unknown registry: {registry}")));
        };
        let Some(plugin) = route_table.get(&item) else {
            return Ok(response::failure(format!("Unknown registry item: {item}")));
        };

        Ok(plugin.handle_call(&ctx, request))
    }

    fn handle_shutdown(&self) -> thrift::Result<()> {
        log::debug!("shutdown request received from osquery");
        // The RPC itself always succeeds; shutdown problems surface through
        // the server's own return values.
        if let Err(err) = self.core.shutdown() {
            log::warn!("shutdown requested by osquery failed: {err}");
        }
        Ok(())
    }
}

impl osquery::ExtensionManagerSyncHandler for Handler {
    fn handle_extensions(&self) -> thrift::Result<osquery::InternalExtensionList> {
        // Extension enumeration is the manager's job, not an extension's.
        Ok(osquery::InternalExtensionList::new())
    }

    fn handle_options(&self) -> thrift::Result<osquery::InternalOptionList> {
        Ok(osquery::InternalOptionList::new())
    }

    fn handle_register_extension(
        &self,
        _info: osquery::InternalExtensionInfo,
        _registry: osquery::ExtensionRegistry,
    ) -> thrift::Result<osquery::ExtensionStatus> {
        Ok(osquery::ExtensionStatus::new(
            1,
            "Extension registration not supported".to_string(),
            None,
        ))
    }

    fn handle_deregister_extension(
        &self,
        _uuid: osquery::ExtensionRouteUUID,
    ) -> thrift::Result<osquery::ExtensionStatus> {
        Ok(osquery::ExtensionStatus::new(
            1,
            "Extension deregistration not supported".to_string(),
            None,
        ))
    }

    fn handle_query(&self, _sql: String) -> thrift::Result<osquery::ExtensionResponse> {
        Ok(response::failure("Query execution not supported"))
    }

    fn handle_get_query_columns(&self, _sql: String) -> thrift::Result<osquery::ExtensionResponse> {
        Ok(response::failure("Query column introspection not supported"))
    }
}

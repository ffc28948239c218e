use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Context;
use crate::plugin::distributed::results::{parse_results, DistributedResult, GetQueriesResult};
use crate::plugin::response;
use crate::plugin::{OsqueryPlugin, Registry};
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// Serves distributed queries pushed through osquery by a fleet controller.
pub trait Distributed: Send + Sync + 'static {
    /// The distributed plugin name.
    fn name(&self) -> String;

    /// Returns the queries to execute in this checkin.
    fn get_queries(&self, ctx: &Context) -> Result<GetQueriesResult, String>;

    /// Writes back the results of previously requested queries.
    fn write_results(&self, ctx: &Context, results: Vec<DistributedResult>) -> Result<(), String>;

    /// Called when the extension is shutting down.
    fn shutdown(&self) {}
}

/// Adapts a [`Distributed`] to the registry plugin surface.
#[derive(Clone)]
pub struct DistributedPlugin {
    distributed: Arc<dyn Distributed>,
}

impl DistributedPlugin {
    pub fn new<D: Distributed>(distributed: D) -> DistributedPlugin {
        DistributedPlugin {
            distributed: Arc::new(distributed),
        }
    }

    fn get_queries(&self, ctx: &Context) -> ExtensionResponse {
        let queries = match self.distributed.get_queries(ctx) {
            Ok(queries) => queries,
            Err(err) => return response::failure(format!("error getting queries: {err}")),
        };
        let payload = match serde_json::to_string(&queries) {
            Ok(payload) => payload,
            Err(err) => return response::failure(format!("error marshalling queries: {err}")),
        };

        let mut row = BTreeMap::new();
        row.insert("results".to_string(), payload);
        response::success(vec![row])
    }

    fn write_results(&self, ctx: &Context, request: &ExtensionPluginRequest) -> ExtensionResponse {
        let raw = request.get("results").map(String::as_str).unwrap_or("");
        let results = match parse_results(raw) {
            Ok(results) => results,
            Err(err) => return response::failure(format!("error unmarshalling results: {err}")),
        };

        match self.distributed.write_results(ctx, results) {
            Ok(()) => response::success(ExtensionPluginResponse::new()),
            Err(err) => response::failure(format!("error writing results: {err}")),
        }
    }
}

impl OsqueryPlugin for DistributedPlugin {
    fn name(&self) -> String {
        self.distributed.name()
    }

    fn registry_name(&self) -> String {
        Registry::Distributed.to_string()
    }

    fn routes(&self) -> ExtensionPluginResponse {
        ExtensionPluginResponse::new()
    }

    fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    fn handle_call(&self, ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse {
        let action = request.get("action").map(String::as_str).unwrap_or("");
        match action {
            "getQueries" => self.get_queries(ctx),
            "writeResults" => self.write_results(ctx, &request),
            _ => response::failure(format!("unknown action: {action}")),
        }
    }

    fn shutdown(&self) {
        self.distributed.shutdown();
    }
}

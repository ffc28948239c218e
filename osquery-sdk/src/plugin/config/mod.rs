use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::context::Context;
use crate::plugin::response;
use crate::plugin::{OsqueryPlugin, Registry};
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// Supplies osquery with its configuration.
///
/// The generator returns a map from config source name (typically `"main"`)
/// to a serialized JSON configuration blob.
pub trait Config: Send + Sync + 'static {
    /// The config plugin name.
    fn name(&self) -> String;

    /// Produces the configuration sources.
    fn generate(&self) -> Result<HashMap<String, String>, String>;

    /// Called when the extension is shutting down.
    fn shutdown(&self) {}
}

/// Adapts a [`Config`] to the registry plugin surface.
#[derive(Clone)]
pub struct ConfigPlugin {
    config: Arc<dyn Config>,
}

impl ConfigPlugin {
    pub fn new<C: Config>(config: C) -> ConfigPlugin {
        ConfigPlugin {
            config: Arc::new(config),
        }
    }
}

impl OsqueryPlugin for ConfigPlugin {
    fn name(&self) -> String {
        self.config.name()
    }

    fn registry_name(&self) -> String {
        Registry::Config.to_string()
    }

    fn routes(&self) -> ExtensionPluginResponse {
        ExtensionPluginResponse::new()
    }

    fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    fn handle_call(&self, _ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse {
        let action = request.get("action").map(String::as_str).unwrap_or("");
        if action != "genConfig" {
            return response::failure("unknown action");
        }

        match self.config.generate() {
            Ok(sources) => {
                let row: BTreeMap<String, String> = sources.into_iter().collect();
                response::success(vec![row])
            }
            Err(err) => response::failure(format!("error getting config: {err}")),
        }
    }

    fn shutdown(&self) {
        self.config.shutdown();
    }
}

use std::sync::Arc;

use crate::context::Context;
use crate::plugin::logger::log_type::LogType;
use crate::plugin::response;
use crate::plugin::{OsqueryPlugin, Registry};
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// Receives log lines from osquery.
///
/// osquery forwards results, snapshots, health reports, and status logs to
/// registered logger plugins; the [`LogType`] tells them apart.
pub trait Logger: Send + Sync + 'static {
    /// The logger plugin name.
    fn name(&self) -> String;

    /// Handles one log line.
    fn log(&self, typ: LogType, message: &str) -> Result<(), String>;

    /// Called when the extension is shutting down.
    fn shutdown(&self) {}
}

/// Adapts a [`Logger`] to the registry plugin surface.
#[derive(Clone)]
pub struct LoggerPlugin {
    logger: Arc<dyn Logger>,
}

// The request carries exactly one of these keys; checked in this order.
const LOG_TYPES: [LogType; 5] = [
    LogType::String,
    LogType::Snapshot,
    LogType::Health,
    LogType::Init,
    LogType::Status,
];

impl LoggerPlugin {
    pub fn new<L: Logger>(logger: L) -> LoggerPlugin {
        LoggerPlugin {
            logger: Arc::new(logger),
        }
    }
}

impl OsqueryPlugin for LoggerPlugin {
    fn name(&self) -> String {
        self.logger.name()
    }

    fn registry_name(&self) -> String {
        Registry::Logger.to_string()
    }

    fn routes(&self) -> ExtensionPluginResponse {
        ExtensionPluginResponse::new()
    }

    fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    fn handle_call(&self, _ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse {
        let Some((typ, message)) = LOG_TYPES
            .iter()
            .find_map(|typ| request.get(typ.request_key()).map(|message| (*typ, message)))
        else {
            return response::failure("unknown log request");
        };

        match self.logger.log(typ, message) {
            Ok(()) => response::success(ExtensionPluginResponse::new()),
            Err(err) => response::failure(format!("error logging: {err}")),
        }
    }

    fn shutdown(&self) {
        self.logger.shutdown();
    }
}

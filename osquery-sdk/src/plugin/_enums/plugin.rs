use crate::context::Context;
use crate::plugin::config::{Config, ConfigPlugin};
use crate::plugin::distributed::{Distributed, DistributedPlugin};
use crate::plugin::logger::{Logger, LoggerPlugin};
use crate::plugin::table::{Table, TablePlugin};
use crate::plugin::{OsqueryPlugin, Registry};
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// The built-in plugin kinds, bundled behind one registrable value.
#[derive(Clone)]
pub enum Plugin {
    Table(TablePlugin),
    Logger(LoggerPlugin),
    Config(ConfigPlugin),
    Distributed(DistributedPlugin),
}

impl Plugin {
    pub fn table<T: Table>(table: T) -> Plugin {
        Plugin::Table(TablePlugin::new(table))
    }

    pub fn logger<L: Logger>(logger: L) -> Plugin {
        Plugin::Logger(LoggerPlugin::new(logger))
    }

    pub fn config<C: Config>(config: C) -> Plugin {
        Plugin::Config(ConfigPlugin::new(config))
    }

    pub fn distributed<D: Distributed>(distributed: D) -> Plugin {
        Plugin::Distributed(DistributedPlugin::new(distributed))
    }

    pub fn registry(&self) -> Registry {
        match self {
            Plugin::Table(_) => Registry::Table,
            Plugin::Logger(_) => Registry::Logger,
            Plugin::Config(_) => Registry::Config,
            Plugin::Distributed(_) => Registry::Distributed,
        }
    }

    fn inner(&self) -> &dyn OsqueryPlugin {
        match self {
            Plugin::Table(table) => table,
            Plugin::Logger(logger) => logger,
            Plugin::Config(config) => config,
            Plugin::Distributed(distributed) => distributed,
        }
    }
}

impl OsqueryPlugin for Plugin {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn registry_name(&self) -> String {
        self.registry().to_string()
    }

    fn routes(&self) -> ExtensionPluginResponse {
        self.inner().routes()
    }

    fn ping(&self) -> ExtensionStatus {
        self.inner().ping()
    }

    fn handle_call(&self, ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse {
        self.inner().handle_call(ctx, request)
    }

    fn shutdown(&self) {
        self.inner().shutdown()
    }
}

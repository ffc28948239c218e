mod _enums;
mod _traits;
pub mod config;
pub mod distributed;
pub mod logger;
pub mod table;

pub(crate) mod response;

// Re-exporting all public structures
pub use _enums::plugin::Plugin;
pub use _enums::registry::Registry;

pub use _traits::osquery_plugin::OsqueryPlugin;

pub use table::column_def::{ColumnDef, ColumnOptions, ColumnType};
pub use table::query_context::{Constraint, ConstraintList, Operator, QueryContext};
pub use table::{Table, TablePlugin, TableRow};

pub use logger::{LogType, Logger, LoggerPlugin};

pub use config::{Config, ConfigPlugin};

pub use distributed::{
    Distributed, DistributedPlugin, DistributedResult, GetQueriesResult, OsqueryInt,
};

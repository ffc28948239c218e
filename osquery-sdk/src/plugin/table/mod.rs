pub mod column_def;
pub mod query_context;
mod table_plugin;

pub use column_def::{ColumnDef, ColumnOptions, ColumnType};
pub use query_context::{Constraint, ConstraintList, Operator, QueryContext};
pub use table_plugin::{Table, TablePlugin, TableRow};

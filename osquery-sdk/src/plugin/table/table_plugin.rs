use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Context;
use crate::plugin::response;
use crate::plugin::table::column_def::ColumnDef;
use crate::plugin::table::query_context::{parse_query_context, QueryContext};
use crate::plugin::{OsqueryPlugin, Registry};
use crate::{ExtensionPluginRequest, ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// One generated result row, keyed by column name.
pub type TableRow = BTreeMap<String, String>;

/// A virtual table backed by this extension.
///
/// osquery calls [`Table::generate`] whenever the table shows up in a query;
/// the query context carries the WHERE-clause constraints, which the
/// implementation may use to narrow generation but is free to ignore.
pub trait Table: Send + Sync + 'static {
    /// The table name as it appears in SQL.
    fn name(&self) -> String;

    /// The table's column definitions, reported at registration.
    fn columns(&self) -> Vec<ColumnDef>;

    /// Produces the table's rows for one query.
    fn generate(&self, ctx: &Context, query_context: &QueryContext)
        -> Result<Vec<TableRow>, String>;

    /// Called when the extension is shutting down.
    fn shutdown(&self) {}
}

/// Adapts a [`Table`] to the registry plugin surface.
#[derive(Clone)]
pub struct TablePlugin {
    table: Arc<dyn Table>,
}

impl TablePlugin {
    pub fn new<T: Table>(table: T) -> TablePlugin {
        TablePlugin {
            table: Arc::new(table),
        }
    }

    fn generate(&self, ctx: &Context, request: &ExtensionPluginRequest) -> ExtensionResponse {
        let raw_context = request.get("context").map(String::as_str).unwrap_or("");
        let query_context = match parse_query_context(raw_context) {
            Ok(query_context) => query_context,
            Err(err) => return response::failure(format!("error parsing context JSON: {err}")),
        };

        match self.table.generate(ctx, &query_context) {
            Ok(rows) => response::success(rows),
            Err(err) => response::failure(format!("error generating table: {err}")),
        }
    }
}

impl OsqueryPlugin for TablePlugin {
    fn name(&self) -> String {
        self.table.name()
    }

    fn registry_name(&self) -> String {
        Registry::Table.to_string()
    }

    fn routes(&self) -> ExtensionPluginResponse {
        let mut resp = ExtensionPluginResponse::new();
        for column in self.table.columns() {
            let mut route: BTreeMap<String, String> = BTreeMap::new();
            route.insert("id".to_string(), "column".to_string());
            route.insert("name".to_string(), column.name());
            route.insert("type".to_string(), column.type_string());
            route.insert("op".to_string(), column.op_string());
            resp.push(route);
        }
        resp
    }

    fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    fn handle_call(&self, ctx: &Context, request: ExtensionPluginRequest) -> ExtensionResponse {
        let action = request.get("action").map(String::as_str).unwrap_or("");
        match action {
            "generate" => self.generate(ctx, &request),
            "columns" => response::success(self.routes()),
            _ => response::failure(format!("unknown action: {action}")),
        }
    }

    fn shutdown(&self) {
        self.table.shutdown();
    }
}

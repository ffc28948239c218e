//! Plugin behavior through the public `Plugin` bundle, the way an extension
//! author wires things up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use osquery_sdk::plugin::{
    ColumnDef, ColumnOptions, ColumnType, Config, Distributed, DistributedResult,
    GetQueriesResult, LogType, Logger, OsqueryPlugin, Plugin, QueryContext, Table, TableRow,
};
use osquery_sdk::{Context, ExtensionPluginRequest};

struct HostnameTable;

impl Table for HostnameTable {
    fn name(&self) -> String {
        "hostname".to_string()
    }

    fn columns(&self) -> Vec<ColumnDef> {
        vec![ColumnDef::new(
            "hostname",
            ColumnType::Text,
            ColumnOptions::DEFAULT,
        )]
    }

    fn generate(
        &self,
        _ctx: &Context,
        _query_context: &QueryContext,
    ) -> Result<Vec<TableRow>, String> {
        let mut row = TableRow::new();
        row.insert("hostname".to_string(), "worklaptop".to_string());
        Ok(vec![row])
    }
}

struct StdoutLogger;

impl Logger for StdoutLogger {
    fn name(&self) -> String {
        "stdout_logger".to_string()
    }

    fn log(&self, typ: LogType, message: &str) -> Result<(), String> {
        println!("{typ}: {message}");
        Ok(())
    }
}

struct StaticConfig;

impl Config for StaticConfig {
    fn name(&self) -> String {
        "static_config".to_string()
    }

    fn generate(&self) -> Result<HashMap<String, String>, String> {
        let mut sources = HashMap::new();
        sources.insert(
            "main".to_string(),
            r#"{"options":{"host_identifier":"hostname"}}"#.to_string(),
        );
        Ok(sources)
    }
}

struct NullDistributed;

impl Distributed for NullDistributed {
    fn name(&self) -> String {
        "null_distributed".to_string()
    }

    fn get_queries(&self, _ctx: &Context) -> Result<GetQueriesResult, String> {
        Ok(GetQueriesResult::default())
    }

    fn write_results(
        &self,
        _ctx: &Context,
        _results: Vec<DistributedResult>,
    ) -> Result<(), String> {
        Ok(())
    }
}

fn request(pairs: &[(&str, &str)]) -> ExtensionPluginRequest {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn bundled_plugins_report_their_registries() {
    let cases: Vec<(Plugin, &str, &str)> = vec![
        (Plugin::table(HostnameTable), "table", "hostname"),
        (Plugin::logger(StdoutLogger), "logger", "stdout_logger"),
        (Plugin::config(StaticConfig), "config", "static_config"),
        (
            Plugin::distributed(NullDistributed),
            "distributed",
            "null_distributed",
        ),
    ];
    for (plugin, registry_name, name) in cases {
        assert_eq!(plugin.registry_name(), registry_name);
        assert_eq!(plugin.name(), name);
        assert_eq!(plugin.ping().code, Some(0));
    }
}

#[test]
fn table_plugin_serves_columns_and_rows() {
    let plugin = Plugin::table(HostnameTable);

    let routes = plugin.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].get("id"), Some(&"column".to_string()));
    assert_eq!(routes[0].get("type"), Some(&"TEXT".to_string()));

    let response = plugin.handle_call(
        &Context::background(),
        request(&[("action", "generate"), ("context", "{}")]),
    );
    assert_eq!(response.status.unwrap().code, Some(0));
    let rows = response.response.unwrap();
    assert_eq!(rows[0].get("hostname"), Some(&"worklaptop".to_string()));
}

#[test]
fn logger_plugin_accepts_status_logs() {
    let plugin = Plugin::logger(StdoutLogger);
    let response = plugin.handle_call(
        &Context::background(),
        request(&[("status", r#"[{"s":"0","message":"started"}]"#)]),
    );
    assert_eq!(response.status.unwrap().code, Some(0));
}

#[test]
fn config_plugin_serves_its_sources() {
    let plugin = Plugin::config(StaticConfig);
    let response = plugin.handle_call(
        &Context::background(),
        request(&[("action", "genConfig")]),
    );
    assert_eq!(response.status.unwrap().code, Some(0));
    let rows = response.response.unwrap();
    assert!(rows[0].get("main").unwrap().contains("host_identifier"));
}

#[test]
fn distributed_plugin_round_trips_queries() {
    let plugin = Plugin::distributed(NullDistributed);

    let response = plugin.handle_call(
        &Context::background(),
        request(&[("action", "getQueries")]),
    );
    assert_eq!(response.status.unwrap().code, Some(0));
    let rows = response.response.unwrap();
    assert_eq!(rows[0].get("results"), Some(&r#"{"queries":{}}"#.to_string()));

    let response = plugin.handle_call(
        &Context::background(),
        request(&[
            ("action", "writeResults"),
            ("results", r#"{"queries":{},"statuses":{}}"#),
        ]),
    );
    assert_eq!(response.status.unwrap().code, Some(0));
}

#[test]
fn shutdown_reaches_the_user_plugin() {
    struct TrackingLogger {
        shut_down: Arc<AtomicBool>,
    }

    impl Logger for TrackingLogger {
        fn name(&self) -> String {
            "tracking".to_string()
        }

        fn log(&self, _typ: LogType, _message: &str) -> Result<(), String> {
            Ok(())
        }

        fn shutdown(&self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    let shut_down = Arc::new(AtomicBool::new(false));
    let plugin = Plugin::logger(TrackingLogger {
        shut_down: Arc::clone(&shut_down),
    });
    plugin.shutdown();
    assert!(shut_down.load(Ordering::SeqCst));
}

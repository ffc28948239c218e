mod distributed_plugin;
mod results;

pub use distributed_plugin::{Distributed, DistributedPlugin};
pub use results::{DistributedResult, GetQueriesResult, OsqueryInt};

mod log_type;
mod logger_plugin;

pub use log_type::LogType;
pub use logger_plugin::{Logger, LoggerPlugin};

//! Envelope constructors shared by the plugin kinds and the call router.

use crate::_osquery::{ExtensionPluginResponse, ExtensionResponse, ExtensionStatus};

/// Success envelope carrying `rows`.
pub(crate) fn success(rows: ExtensionPluginResponse) -> ExtensionResponse {
    ExtensionResponse::new(ExtensionStatus::ok(), rows)
}

/// Failure envelope with status code 1 and a user-visible message.
pub(crate) fn failure(message: impl Into<String>) -> ExtensionResponse {
    ExtensionResponse::new(
        ExtensionStatus::new(1, message.into(), None),
        ExtensionPluginResponse::new(),
    )
}

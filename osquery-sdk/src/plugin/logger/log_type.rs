use strum_macros::Display;

/// The kind of log osquery is emitting, derived from which request key
/// carried the payload.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum LogType {
    String,
    Snapshot,
    Health,
    Init,
    Status,
}

impl LogType {
    /// The request key osquery uses for this log type.
    pub(crate) fn request_key(&self) -> &'static str {
        match self {
            LogType::String => "string",
            LogType::Snapshot => "snapshot",
            LogType::Health => "health",
            LogType::Init => "init",
            LogType::Status => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_request_keys() {
        for typ in [
            LogType::String,
            LogType::Snapshot,
            LogType::Health,
            LogType::Init,
            LogType::Status,
        ] {
            assert_eq!(typ.to_string(), typ.request_key());
        }
    }
}

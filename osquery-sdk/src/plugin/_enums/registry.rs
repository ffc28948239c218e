use strum_macros::{Display, EnumString, VariantNames};

/// The plugin registries osquery accepts extension routes for.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum Registry {
    Config,
    Logger,
    Table,
    Distributed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::VariantNames;

    #[test]
    fn names_match_the_osquery_registries() {
        assert_eq!(Registry::Table.to_string(), "table");
        assert_eq!(Registry::Logger.to_string(), "logger");
        assert_eq!(Registry::Config.to_string(), "config");
        assert_eq!(Registry::Distributed.to_string(), "distributed");
        assert_eq!(Registry::VARIANTS.len(), 4);
    }

    #[test]
    fn parsing_rejects_unknown_registries() {
        assert_eq!(Registry::from_str("table"), Ok(Registry::Table));
        assert!(Registry::from_str("osquery").is_err());
        assert!(Registry::from_str("").is_err());
    }
}

use bitflags::bitflags;
use strum_macros::Display;

// ColumnDef defines a column used in a table plugin.
#[derive(Clone, Debug)]
pub struct ColumnDef {
    name: String,
    column_type: ColumnType,
    options: ColumnOptions,
}

/// The column data types osquery's tables.h defines.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ColumnType {
    Unknown,
    Text,
    Integer,
    BigInt,
    #[strum(serialize = "UNSIGNED BIGINT")]
    UnsignedBigInt,
    Double,
    Blob,
}

impl ColumnType {
    /// Maps an affinity string out of a query context back to a column type.
    /// Unrecognized affinities degrade to `Unknown` rather than failing the
    /// whole context.
    pub(crate) fn from_affinity(affinity: &str) -> ColumnType {
        match affinity {
            "TEXT" => ColumnType::Text,
            "INTEGER" => ColumnType::Integer,
            "BIGINT" => ColumnType::BigInt,
            "UNSIGNED BIGINT" => ColumnType::UnsignedBigInt,
            "DOUBLE" => ColumnType::Double,
            "BLOB" => ColumnType::Blob,
            _ => ColumnType::Unknown,
        }
    }
}

bitflags! {
    // The bit values are fixed by osquery; the route's "op" field carries
    // them verbatim.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColumnOptions: u32 {
        const DEFAULT = 0;
        const INDEX = 1;
        const REQUIRED = 2;
        const ADDITIONAL = 4;
        const OPTIMIZED = 8;
        const HIDDEN = 16;
    }
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType, options: ColumnOptions) -> Self {
        ColumnDef {
            name: name.to_owned(),
            column_type,
            options,
        }
    }

    pub(crate) fn name(&self) -> String {
        self.name.to_string()
    }

    pub(crate) fn type_string(&self) -> String {
        self.column_type.to_string()
    }

    pub(crate) fn op_string(&self) -> String {
        self.options.bits().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_strings_match_osquery() {
        assert_eq!(ColumnType::Text.to_string(), "TEXT");
        assert_eq!(ColumnType::Integer.to_string(), "INTEGER");
        assert_eq!(ColumnType::BigInt.to_string(), "BIGINT");
        assert_eq!(ColumnType::UnsignedBigInt.to_string(), "UNSIGNED BIGINT");
        assert_eq!(ColumnType::Double.to_string(), "DOUBLE");
        assert_eq!(ColumnType::Blob.to_string(), "BLOB");
        assert_eq!(ColumnType::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn affinity_round_trips_known_types() {
        for column_type in [
            ColumnType::Text,
            ColumnType::Integer,
            ColumnType::BigInt,
            ColumnType::UnsignedBigInt,
            ColumnType::Double,
            ColumnType::Blob,
        ] {
            assert_eq!(
                ColumnType::from_affinity(&column_type.to_string()),
                column_type
            );
        }
        assert_eq!(ColumnType::from_affinity("BOOLEAN"), ColumnType::Unknown);
    }

    #[test]
    fn option_bits_are_fixed() {
        assert_eq!(ColumnOptions::INDEX.bits(), 1);
        assert_eq!(ColumnOptions::REQUIRED.bits(), 2);
        assert_eq!(ColumnOptions::ADDITIONAL.bits(), 4);
        assert_eq!(ColumnOptions::OPTIMIZED.bits(), 8);
        assert_eq!(ColumnOptions::HIDDEN.bits(), 16);
    }

    #[test]
    fn op_string_carries_combined_bits() {
        let col = ColumnDef::new(
            "pid",
            ColumnType::Integer,
            ColumnOptions::INDEX | ColumnOptions::REQUIRED,
        );
        assert_eq!(col.op_string(), "3");

        let plain = ColumnDef::new("name", ColumnType::Text, ColumnOptions::DEFAULT);
        assert_eq!(plain.op_string(), "0");
    }
}

//! Payload types for the distributed query sub-protocol.
//!
//! The `writeResults` payload osquery produces is structurally irregular:
//! small integers show up as numbers, numeric strings, or `""`, and a query
//! with no rows may be encoded as the empty string instead of an empty list.
//! Duplicate query names occur in the wild; the last occurrence wins. The
//! decoders in here absorb all of that.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Which queries the distributed system should run, returned by the user's
/// getter and serialized into the `getQueries` response.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GetQueriesResult {
    /// Map from query name to query SQL.
    pub queries: BTreeMap<String, String>,
    /// Discovery queries, keyed like `queries`. When non-empty, only queries
    /// whose discovery query returns results will run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub discovery: BTreeMap<String, String>,
    /// When non-zero, osquery checks in accelerated for this many seconds.
    #[serde(
        default,
        rename = "accelerate",
        skip_serializing_if = "accelerate_is_zero"
    )]
    pub accelerate_seconds: u64,
}

fn accelerate_is_zero(seconds: &u64) -> bool {
    *seconds == 0
}

/// The status and result rows of one distributed query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributedResult {
    /// The name originally provided for the query.
    pub query_name: String,
    /// Status code of the execution; 0 means OK.
    pub status: i32,
    /// The query's result rows.
    pub rows: Vec<BTreeMap<String, String>>,
}

/// An integer as osquery writes them: a number, a numeric string, or the
/// empty string (meaning zero).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OsqueryInt(pub i32);

impl<'de> Deserialize<'de> for OsqueryInt {
    fn deserialize<D>(deserializer: D) -> Result<OsqueryInt, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OsqueryIntVisitor;

        impl Visitor<'_> for OsqueryIntVisitor {
            type Value = OsqueryInt;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an integer, a numeric string, or an empty string")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<OsqueryInt, E> {
                Ok(OsqueryInt(value as i32))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<OsqueryInt, E> {
                Ok(OsqueryInt(value as i32))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<OsqueryInt, E> {
                if value.is_empty() {
                    return Ok(OsqueryInt(0));
                }
                value
                    .parse::<i32>()
                    .map(OsqueryInt)
                    .map_err(|_| E::custom("invalid status"))
            }
        }

        deserializer.deserialize_any(OsqueryIntVisitor)
    }
}

/// Row list for one query, or the `""` stand-in for "no rows".
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum ResultRows {
    Rows(Vec<BTreeMap<String, String>>),
    Empty(String),
}

/// The raw `writeResults` payload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultsPayload {
    #[serde(default)]
    queries: BTreeMap<String, ResultRows>,
    #[serde(default)]
    statuses: BTreeMap<String, OsqueryInt>,
}

impl ResultsPayload {
    /// Pairs every reported status with its rows. A status without a results
    /// entry still yields a result, with no rows.
    pub(crate) fn into_results(mut self) -> Vec<DistributedResult> {
        let mut results = Vec::with_capacity(self.statuses.len());
        for (query_name, OsqueryInt(status)) in std::mem::take(&mut self.statuses) {
            let rows = match self.queries.remove(&query_name) {
                Some(ResultRows::Rows(rows)) => rows,
                Some(ResultRows::Empty(_)) | None => Vec::new(),
            };
            results.push(DistributedResult {
                query_name,
                status,
                rows,
            });
        }
        results
    }
}

pub(crate) fn parse_results(raw: &str) -> Result<Vec<DistributedResult>, String> {
    let payload: ResultsPayload = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    Ok(payload.into_results())
}

//! WHERE-clause hints osquery forwards to table generators.
//!
//! The context arrives as JSON whose shape drifted across osquery releases:
//! before 3.0 operators are stringified integers and empty constraint lists
//! are encoded as `""`; from 3.0 on operators are JSON numbers and empty
//! lists are `[]`. The parser accepts both.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::plugin::table::column_def::ColumnType;

/// QueryContext contains the constraints from the WHERE clause of the query,
/// that can optionally be used to optimize the table generation. Note that
/// the osquery SQLite engine will perform the filtering with these
/// constraints, so it is not mandatory that they be used.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    /// Map from column name to the details of the constraints on that column.
    pub constraints: HashMap<String, ConstraintList>,
}

/// ConstraintList contains the details of the constraints for a given column.
#[derive(Clone, Debug)]
pub struct ConstraintList {
    pub affinity: ColumnType,
    pub constraints: Vec<Constraint>,
}

/// A single operator/expression pair applied as a constraint in the query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Constraint {
    pub operator: Operator,
    pub expression: String,
}

/// Constraint operators, with osquery's numeric codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    Unique = 1,
    Equals = 2,
    GreaterThan = 4,
    LessThanOrEquals = 8,
    LessThan = 16,
    GreaterThanOrEquals = 32,
    Match = 64,
    Like = 65,
    Glob = 66,
    Regexp = 67,
}

impl TryFrom<i64> for Operator {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Operator::Unique),
            2 => Ok(Operator::Equals),
            4 => Ok(Operator::GreaterThan),
            8 => Ok(Operator::LessThanOrEquals),
            16 => Ok(Operator::LessThan),
            32 => Ok(Operator::GreaterThanOrEquals),
            64 => Ok(Operator::Match),
            65 => Ok(Operator::Like),
            66 => Ok(Operator::Glob),
            67 => Ok(Operator::Regexp),
            _ => Err(format!("unknown operator code: {value}")),
        }
    }
}

#[derive(Deserialize)]
struct QueryContextJson {
    #[serde(default)]
    constraints: Vec<ConstraintListJson>,
}

#[derive(Deserialize)]
struct ConstraintListJson {
    name: String,
    #[serde(default)]
    affinity: String,
    #[serde(default)]
    list: Value,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses the `context` value of a `generate` request.
pub(crate) fn parse_query_context(raw: &str) -> Result<QueryContext, String> {
    let parsed: QueryContextJson = serde_json::from_str(raw).map_err(|err| err.to_string())?;

    let mut ctx = QueryContext {
        constraints: HashMap::new(),
    };
    for list in parsed.constraints {
        let constraints = parse_constraint_list(&list.list)?;
        ctx.constraints.insert(
            list.name,
            ConstraintList {
                affinity: ColumnType::from_affinity(&list.affinity),
                constraints,
            },
        );
    }
    Ok(ctx)
}

fn parse_constraint_list(list: &Value) -> Result<Vec<Constraint>, String> {
    let entries = match list {
        // A bare string indicates an empty list (osquery < 3.0).
        Value::String(_) => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => return Err(format!("unexpected context list: {other}")),
    };

    let mut constraints = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(fields) = entry else {
            return Err(format!("unexpected constraint entry: {entry}"));
        };

        let op_value = fields.get("op").unwrap_or(&Value::Null);
        let code = match op_value {
            // osquery < 3.0 with stringy types
            Value::String(op) => op
                .parse::<i64>()
                .map_err(|_| format!("parsing operator int: {op}"))?,
            // osquery >= 3.0 with strong types
            Value::Number(op) => op
                .as_i64()
                .ok_or_else(|| format!("parsing operator int: {op}"))?,
            other => return Err(format!("cannot parse type {}", json_type_name(other))),
        };
        let operator = Operator::try_from(code)?;

        let expression = match fields.get("expr") {
            Some(Value::String(expr)) => expr.clone(),
            Some(other) => return Err(format!("expr should be string: {other}")),
            None => return Err("expr should be string: null".to_string()),
        };

        constraints.push(Constraint {
            operator,
            expression,
        });
    }
    Ok(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;

    // osquery >= 3.0: numeric ops, [] for empty lists.
    const STRONG_CONTEXT: &str = r#"{
        "constraints": [
            {"name": "path", "affinity": "TEXT", "list": [{"op": 2, "expr": "/usr/bin"}]},
            {"name": "pid", "affinity": "INTEGER", "list": []}
        ]
    }"#;

    // osquery < 3.0: stringified ops, "" for empty lists.
    const STRINGY_CONTEXT: &str = r#"{
        "constraints": [
            {"name": "path", "affinity": "TEXT", "list": [{"op": "2", "expr": "/usr/bin"}]},
            {"name": "pid", "affinity": "INTEGER", "list": ""}
        ]
    }"#;

    fn assert_shape(ctx: &QueryContext) {
        let path = ctx.constraints.get("path").unwrap();
        assert_eq!(path.affinity, ColumnType::Text);
        assert_eq!(
            path.constraints,
            vec![Constraint {
                operator: Operator::Equals,
                expression: "/usr/bin".to_string(),
            }]
        );

        let pid = ctx.constraints.get("pid").unwrap();
        assert_eq!(pid.affinity, ColumnType::Integer);
        assert!(pid.constraints.is_empty());
    }

    #[test]
    fn parses_strong_typed_contexts() {
        let ctx = parse_query_context(STRONG_CONTEXT).unwrap();
        assert_shape(&ctx);
    }

    #[test]
    fn parses_stringy_contexts() {
        let ctx = parse_query_context(STRINGY_CONTEXT).unwrap();
        assert_shape(&ctx);
    }

    #[test]
    fn both_historical_shapes_agree() {
        let strong = parse_query_context(STRONG_CONTEXT).unwrap();
        let stringy = parse_query_context(STRINGY_CONTEXT).unwrap();
        assert_eq!(strong.constraints.len(), stringy.constraints.len());
        for (name, list) in &strong.constraints {
            let other = stringy.constraints.get(name).unwrap();
            assert_eq!(list.affinity, other.affinity);
            assert_eq!(list.constraints, other.constraints);
        }
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_query_context("not json").is_err());
    }

    #[test]
    fn rejects_unparseable_op_types() {
        let raw = r#"{"constraints": [{"name": "x", "affinity": "TEXT", "list": [{"op": true, "expr": "1"}]}]}"#;
        let err = parse_query_context(raw).unwrap_err();
        assert_eq!(err, "cannot parse type bool");
    }

    #[test]
    fn rejects_non_numeric_op_strings() {
        let raw = r#"{"constraints": [{"name": "x", "affinity": "TEXT", "list": [{"op": "eq", "expr": "1"}]}]}"#;
        let err = parse_query_context(raw).unwrap_err();
        assert_eq!(err, "parsing operator int: eq");
    }

    #[test]
    fn rejects_non_string_expressions() {
        let raw = r#"{"constraints": [{"name": "x", "affinity": "TEXT", "list": [{"op": 2, "expr": 7}]}]}"#;
        let err = parse_query_context(raw).unwrap_err();
        assert_eq!(err, "expr should be string: 7");
    }

    #[test]
    fn rejects_unknown_operator_codes() {
        let raw = r#"{"constraints": [{"name": "x", "affinity": "TEXT", "list": [{"op": 3, "expr": "1"}]}]}"#;
        let err = parse_query_context(raw).unwrap_err();
        assert!(err.contains("unknown operator code: 3"));
    }

    #[test]
    fn all_operator_codes_resolve() {
        for (code, operator) in [
            (1, Operator::Unique),
            (2, Operator::Equals),
            (4, Operator::GreaterThan),
            (8, Operator::LessThanOrEquals),
            (16, Operator::LessThan),
            (32, Operator::GreaterThanOrEquals),
            (64, Operator::Match),
            (65, Operator::Like),
            (66, Operator::Glob),
            (67, Operator::Regexp),
        ] {
            assert_eq!(Operator::try_from(code), Ok(operator));
        }
    }

    #[test]
    fn missing_constraints_key_yields_empty_context() {
        let ctx = parse_query_context("{}").unwrap();
        assert!(ctx.constraints.is_empty());
    }
}

use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// A field value as produced by the render host.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Floats are truncated toward zero; everything else is unchanged.
    pub fn coerce(self) -> Self {
        match self {
            Value::Float(f) => Value::Integer(f.trunc() as i64),
            other => other,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Integer(b as i64),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            // nested structures are stored as their JSON text
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Float(x) => ToSqlOutput::Borrowed(ValueRef::Real(*x)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_their_kind() {
        assert_eq!(Value::from(json!(3)), Value::Integer(3));
        assert_eq!(Value::from(json!(2.5)), Value::Float(2.5));
        assert_eq!(Value::from(json!("2")), Value::text("2"));
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(true)), Value::Integer(1));
        assert_eq!(Value::from(json!([1, 2])), Value::text("[1,2]"));
    }

    #[test]
    fn coerce_truncates_floats_only() {
        assert_eq!(Value::Float(55.0).coerce(), Value::Integer(55));
        assert_eq!(Value::Float(7.9).coerce(), Value::Integer(7));
        assert_eq!(Value::Float(-1.5).coerce(), Value::Integer(-1));
        assert_eq!(Value::text("55.0").coerce(), Value::text("55.0"));
        assert_eq!(Value::Null.coerce(), Value::Null);
    }

    #[test]
    fn binds_into_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let (i, t, n): (i64, String, Option<i64>) = conn
            .query_row(
                "SELECT ?1, ?2, ?3",
                rusqlite::params![Value::Integer(4), Value::text("Rare"), Value::Null],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((i, t.as_str(), n), (4, "Rare", None));
    }
}

//! Decoded values and portable type inference.
//!
//! Every backend decodes its native values into a tagged [`SqlValue`]. The
//! portable [`PropertyType`] of a column comes from its declared source type
//! when that type is precise enough, and otherwise from the kind of value the
//! first row holds.

use crate::Result;
use crate::error::ConnectorError;
use crate::models::{Property, PropertyType};
use serde_json::Value as JsonValue;

/// Raw byte values longer than this many decoded characters are long text.
pub const LONG_TEXT_THRESHOLD: usize = 1024;

/// A single decoded column value.
///
/// Dates, times, decimals, UUIDs and JSON documents arrive as [`SqlValue::Text`]
/// in their canonical text form.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`
    Null,
    /// Boolean column value
    Bool(bool),
    /// Any signed or unsigned integer that fits an `i64`
    Integer(i64),
    /// Single or double precision float
    Float(f64),
    /// Character data, or the text form of a richer native type
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Text form of the value, used where precision must survive untouched.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Generic JSON form of the value. Bytes become text; non-finite floats
    /// become `null`.
    pub fn into_json(self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(b),
            SqlValue::Integer(i) => JsonValue::from(i),
            SqlValue::Float(f) => float_json(f),
            SqlValue::Text(s) => JsonValue::String(s),
            SqlValue::Bytes(b) => JsonValue::String(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

fn float_json(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Infers the portable type of a column from a sample value.
///
/// # Examples
/// ```rust
/// use sqlpub_core::models::PropertyType;
/// use sqlpub_core::publisher::{SqlValue, infer_property_type};
///
/// assert_eq!(infer_property_type(&SqlValue::Integer(3)), PropertyType::Integer);
/// assert_eq!(infer_property_type(&SqlValue::Null), PropertyType::String);
/// ```
pub fn infer_property_type(value: &SqlValue) -> PropertyType {
    match value {
        SqlValue::Integer(_) => PropertyType::Integer,
        SqlValue::Float(_) => PropertyType::Float,
        SqlValue::Bool(_) => PropertyType::Bool,
        SqlValue::Text(_) => PropertyType::String,
        SqlValue::Bytes(bytes) => {
            if String::from_utf8_lossy(bytes).chars().count() > LONG_TEXT_THRESHOLD {
                PropertyType::Text
            } else {
                PropertyType::String
            }
        }
        SqlValue::Null => PropertyType::String,
    }
}

/// Maps a declared source type name to a portable type.
///
/// Returns `None` when the name alone does not settle the type: plain
/// character and binary kinds, and columns the driver could not name. Those
/// fall back to [`infer_property_type`].
///
/// # Examples
/// ```rust
/// use sqlpub_core::models::PropertyType;
/// use sqlpub_core::publisher::declared_property_type;
///
/// assert_eq!(declared_property_type("INT8"), Some(PropertyType::Integer));
/// assert_eq!(declared_property_type("DATETIME"), Some(PropertyType::String));
/// assert_eq!(declared_property_type("VARCHAR"), None);
/// ```
pub fn declared_property_type(type_at_source: &str) -> Option<PropertyType> {
    let declared = type_at_source.trim().to_ascii_uppercase();

    match declared.as_str() {
        "BOOL" | "BOOLEAN" => Some(PropertyType::Bool),
        "INT2" | "INT4" | "INT8" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER"
        | "BIGINT" | "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED"
        | "INT UNSIGNED" => Some(PropertyType::Integer),
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" => Some(PropertyType::Float),
        "NUMERIC" | "DECIMAL" => Some(PropertyType::Decimal),
        // Published in their text form
        "DATE" | "TIME" | "TIMETZ" | "DATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" | "UUID" => {
            Some(PropertyType::String)
        }
        // Declared lengths always beyond LONG_TEXT_THRESHOLD
        "MEDIUMTEXT" | "LONGTEXT" => Some(PropertyType::Text),
        _ => None,
    }
}

/// Picks the portable type of a discovered column.
///
/// The declared source type wins when [`declared_property_type`] knows it,
/// otherwise the first row's value decides. A query without rows gives
/// STRING whatever the declaration.
pub fn resolve_property_type(type_at_source: &str, first_value: Option<&SqlValue>) -> PropertyType {
    match first_value {
        None => PropertyType::String,
        Some(value) => {
            declared_property_type(type_at_source).unwrap_or_else(|| infer_property_type(value))
        }
    }
}

/// Converts a decoded value into the JSON value published for `property`.
///
/// INTEGER, FLOAT and BOOL properties are coerced to their JSON form, DECIMAL
/// is carried as text so no precision is lost, everything else is published
/// generically. NULL is always published as JSON `null`.
///
/// # Errors
/// Returns a decode error when the value cannot be represented as the
/// property's numeric or boolean type.
pub fn decode_for_property(value: SqlValue, property: &Property) -> Result<JsonValue> {
    if value == SqlValue::Null {
        return Ok(JsonValue::Null);
    }

    match property.property_type {
        PropertyType::Integer => to_integer(value, &property.id).map(JsonValue::from),
        PropertyType::Float => to_float(value, &property.id).map(float_json),
        PropertyType::Bool => to_bool(value, &property.id).map(JsonValue::Bool),
        PropertyType::Decimal => Ok(value
            .to_text()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)),
        _ => Ok(value.into_json()),
    }
}

fn to_integer(value: SqlValue, id: &str) -> Result<i64> {
    match value {
        SqlValue::Integer(i) => Ok(i),
        SqlValue::Bool(b) => Ok(i64::from(b)),
        SqlValue::Float(f) => {
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(f as i64)
            } else {
                Err(ConnectorError::decode(format!(
                    "failed to decode value for '{}': {} is not an integer",
                    id, f
                )))
            }
        }
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ConnectorError::decode_field(id, e)),
        SqlValue::Bytes(b) => String::from_utf8_lossy(&b)
            .trim()
            .parse::<i64>()
            .map_err(|e| ConnectorError::decode_field(id, e)),
        SqlValue::Null => Err(ConnectorError::decode(format!(
            "failed to decode value for '{}': unexpected null",
            id
        ))),
    }
}

fn to_float(value: SqlValue, id: &str) -> Result<f64> {
    match value {
        SqlValue::Float(f) => Ok(f),
        SqlValue::Integer(i) => Ok(i as f64),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| ConnectorError::decode_field(id, e)),
        SqlValue::Bytes(b) => String::from_utf8_lossy(&b)
            .trim()
            .parse::<f64>()
            .map_err(|e| ConnectorError::decode_field(id, e)),
        SqlValue::Bool(_) | SqlValue::Null => Err(ConnectorError::decode(format!(
            "failed to decode value for '{}': not a floating point number",
            id
        ))),
    }
}

fn to_bool(value: SqlValue, id: &str) -> Result<bool> {
    let text = match value {
        SqlValue::Bool(b) => return Ok(b),
        SqlValue::Integer(i) => return Ok(i != 0),
        SqlValue::Text(s) => s,
        SqlValue::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        SqlValue::Float(_) | SqlValue::Null => String::new(),
    };

    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConnectorError::decode(format!(
            "failed to decode value for '{}': not a boolean",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(property_type: PropertyType) -> Property {
        let mut property = Property::new("[value]", "value");
        property.property_type = property_type;
        property
    }

    #[test]
    fn test_infer_scalar_types() {
        assert_eq!(
            infer_property_type(&SqlValue::Integer(42)),
            PropertyType::Integer
        );
        assert_eq!(
            infer_property_type(&SqlValue::Float(1.5)),
            PropertyType::Float
        );
        assert_eq!(
            infer_property_type(&SqlValue::Bool(true)),
            PropertyType::Bool
        );
        assert_eq!(
            infer_property_type(&SqlValue::Text("x".to_string())),
            PropertyType::String
        );
    }

    #[test]
    fn test_infer_bytes_by_decoded_length() {
        let short = SqlValue::Bytes(vec![b'a'; LONG_TEXT_THRESHOLD]);
        assert_eq!(infer_property_type(&short), PropertyType::String);

        let long = SqlValue::Bytes(vec![b'a'; LONG_TEXT_THRESHOLD + 1]);
        assert_eq!(infer_property_type(&long), PropertyType::Text);
    }

    #[test]
    fn test_infer_bytes_counts_characters_not_bytes() {
        // 600 two-byte characters: 1200 bytes, 600 characters
        let bytes = "é".repeat(600).into_bytes();
        assert_eq!(bytes.len(), 1200);
        assert_eq!(
            infer_property_type(&SqlValue::Bytes(bytes)),
            PropertyType::String
        );
    }

    #[test]
    fn test_null_defaults_to_string() {
        assert_eq!(infer_property_type(&SqlValue::Null), PropertyType::String);
    }

    #[test]
    fn test_decode_integer_property() {
        let p = property(PropertyType::Integer);
        assert_eq!(
            decode_for_property(SqlValue::Integer(7), &p).unwrap(),
            serde_json::json!(7)
        );
        assert_eq!(
            decode_for_property(SqlValue::Text(" 12 ".to_string()), &p).unwrap(),
            serde_json::json!(12)
        );
        assert_eq!(
            decode_for_property(SqlValue::Float(3.0), &p).unwrap(),
            serde_json::json!(3)
        );
        assert!(decode_for_property(SqlValue::Float(3.5), &p).is_err());
        assert!(decode_for_property(SqlValue::Text("abc".to_string()), &p).is_err());
    }

    #[test]
    fn test_decode_float_property() {
        let p = property(PropertyType::Float);
        assert_eq!(
            decode_for_property(SqlValue::Integer(2), &p).unwrap(),
            serde_json::json!(2.0)
        );
        assert_eq!(
            decode_for_property(SqlValue::Text("0.25".to_string()), &p).unwrap(),
            serde_json::json!(0.25)
        );
        assert_eq!(
            decode_for_property(SqlValue::Float(f64::NAN), &p).unwrap(),
            JsonValue::Null
        );
    }

    #[test]
    fn test_decode_decimal_keeps_text() {
        let p = property(PropertyType::Decimal);
        assert_eq!(
            decode_for_property(SqlValue::Text("12345678901234567890.01".to_string()), &p)
                .unwrap(),
            serde_json::json!("12345678901234567890.01")
        );
        assert_eq!(
            decode_for_property(SqlValue::Integer(5), &p).unwrap(),
            serde_json::json!("5")
        );
    }

    #[test]
    fn test_decode_generic_bytes_become_text() {
        let p = property(PropertyType::Text);
        assert_eq!(
            decode_for_property(SqlValue::Bytes(b"hello".to_vec()), &p).unwrap(),
            serde_json::json!("hello")
        );
    }

    #[test]
    fn test_decode_null_is_json_null() {
        for property_type in [
            PropertyType::Integer,
            PropertyType::Float,
            PropertyType::Decimal,
            PropertyType::String,
        ] {
            assert_eq!(
                decode_for_property(SqlValue::Null, &property(property_type)).unwrap(),
                JsonValue::Null
            );
        }
    }

    #[test]
    fn test_declared_types_map_to_portable_types() {
        assert_eq!(declared_property_type("bool"), Some(PropertyType::Bool));
        assert_eq!(declared_property_type("INT4"), Some(PropertyType::Integer));
        assert_eq!(
            declared_property_type("INT UNSIGNED"),
            Some(PropertyType::Integer)
        );
        assert_eq!(declared_property_type("FLOAT8"), Some(PropertyType::Float));
        assert_eq!(
            declared_property_type("NUMERIC"),
            Some(PropertyType::Decimal)
        );
        assert_eq!(
            declared_property_type("TIMESTAMPTZ"),
            Some(PropertyType::String)
        );
        assert_eq!(
            declared_property_type("LONGTEXT"),
            Some(PropertyType::Text)
        );
    }

    #[test]
    fn test_declared_types_left_to_values() {
        for declared in ["TEXT", "VARCHAR", "BLOB", "BYTEA", "NULL", "BIGINT UNSIGNED", ""] {
            assert_eq!(declared_property_type(declared), None, "{declared}");
        }
    }

    #[test]
    fn test_resolve_prefers_declared_type() {
        // A NULL first value no longer hides an integer column
        assert_eq!(
            resolve_property_type("INTEGER", Some(&SqlValue::Null)),
            PropertyType::Integer
        );
        assert_eq!(
            resolve_property_type("DATETIME", Some(&SqlValue::Text("2024-01-31".into()))),
            PropertyType::String
        );
        assert_eq!(
            resolve_property_type("BLOB", Some(&SqlValue::Bytes(vec![b'a'; 2000]))),
            PropertyType::Text
        );
        assert_eq!(
            resolve_property_type("NULL", Some(&SqlValue::Float(19.99))),
            PropertyType::Float
        );
    }

    #[test]
    fn test_resolve_without_rows_is_string() {
        assert_eq!(resolve_property_type("INTEGER", None), PropertyType::String);
        assert_eq!(resolve_property_type("LONGTEXT", None), PropertyType::String);
    }

    #[test]
    fn test_decode_bool_property() {
        let p = property(PropertyType::Bool);
        assert_eq!(
            decode_for_property(SqlValue::Integer(1), &p).unwrap(),
            serde_json::json!(true)
        );
        assert_eq!(
            decode_for_property(SqlValue::Text("f".to_string()), &p).unwrap(),
            serde_json::json!(false)
        );
        assert_eq!(
            decode_for_property(SqlValue::Bool(true), &p).unwrap(),
            serde_json::json!(true)
        );
        assert!(decode_for_property(SqlValue::Text("maybe".to_string()), &p).is_err());
    }
}

//! PostgreSQL value decoding, driven by the column's native type name.

use super::{DecodeValue, column_label, text_or_bytes};
use crate::Result;
use crate::error::ConnectorError;
use crate::publisher::type_mapping::SqlValue;
use sqlx::postgres::PgRow;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Row, TypeInfo, ValueRef};

impl DecodeValue for PgRow {
    fn value_at(&self, index: usize) -> Result<SqlValue> {
        let kind = {
            let raw = self
                .try_get_raw(index)
                .map_err(|e| ConnectorError::decode_field(&column_label(self, index), e))?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }
            raw.type_info().name().to_string()
        };

        let decoded = match kind.as_str() {
            "BOOL" => self.try_get::<bool, _>(index).map(SqlValue::Bool),
            "INT2" => self
                .try_get::<i16, _>(index)
                .map(|v| SqlValue::Integer(i64::from(v))),
            "INT4" => self
                .try_get::<i32, _>(index)
                .map(|v| SqlValue::Integer(i64::from(v))),
            "INT8" => self.try_get::<i64, _>(index).map(SqlValue::Integer),
            "FLOAT4" => self
                .try_get::<f32, _>(index)
                .map(|v| SqlValue::Float(f64::from(v))),
            "FLOAT8" => self.try_get::<f64, _>(index).map(SqlValue::Float),
            "NUMERIC" => self
                .try_get::<BigDecimal, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "DATE" => self
                .try_get::<NaiveDate, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "TIME" => self
                .try_get::<NaiveTime, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "TIMESTAMP" => self
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "TIMESTAMPTZ" => self
                .try_get::<DateTime<Utc>, _>(index)
                .map(|v| SqlValue::Text(v.to_rfc3339())),
            "UUID" => self
                .try_get::<Uuid, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "JSON" | "JSONB" => self
                .try_get::<serde_json::Value, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "BYTEA" => self.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes),
            "TEXT" | "VARCHAR" | "CHAR" | "NAME" => {
                self.try_get::<String, _>(index).map(SqlValue::Text)
            }
            other => return Ok(text_or_bytes(self, index, other)),
        };

        decoded.map_err(|e| ConnectorError::decode_field(&column_label(self, index), e))
    }
}

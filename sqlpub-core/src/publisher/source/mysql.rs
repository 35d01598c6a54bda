//! MySQL and MariaDB value decoding, driven by the column's native type name.

use super::{DecodeValue, column_label, text_or_bytes};
use crate::Result;
use crate::error::ConnectorError;
use crate::publisher::type_mapping::SqlValue;
use sqlx::mysql::MySqlRow;
use sqlx::types::BigDecimal;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Row, TypeInfo, ValueRef};

impl DecodeValue for MySqlRow {
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
            "BOOLEAN" => self.try_get::<bool, _>(index).map(SqlValue::Bool),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                self.try_get::<i64, _>(index).map(SqlValue::Integer)
            }
            unsigned if unsigned.ends_with(" UNSIGNED") => {
                // BIGINT UNSIGNED may not fit an i64; keep those digits as text
                self.try_get::<u64, _>(index).map(|v| match i64::try_from(v) {
                    Ok(v) => SqlValue::Integer(v),
                    Err(_) => SqlValue::Text(v.to_string()),
                })
            }
            "FLOAT" => self
                .try_get::<f32, _>(index)
                .map(|v| SqlValue::Float(f64::from(v))),
            "DOUBLE" => self.try_get::<f64, _>(index).map(SqlValue::Float),
            "DECIMAL" => self
                .try_get::<BigDecimal, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "DATE" => self
                .try_get::<NaiveDate, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "TIME" => self
                .try_get::<NaiveTime, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "DATETIME" => self
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "TIMESTAMP" => self
                .try_get::<DateTime<Utc>, _>(index)
                .map(|v| SqlValue::Text(v.to_rfc3339())),
            "JSON" => self
                .try_get::<serde_json::Value, _>(index)
                .map(|v| SqlValue::Text(v.to_string())),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                self.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes)
            }
            other => return Ok(text_or_bytes(self, index, other)),
        };

        decoded.map_err(|e| ConnectorError::decode_field(&column_label(self, index), e))
    }
}

//! SQLite value decoding.
//!
//! SQLite values carry their runtime storage class (`INTEGER`, `REAL`, `TEXT`,
//! `BLOB`) whatever the column was declared as, so decoding follows the storage
//! class. Dates and decimals stored as text or numbers decode as such.

use super::{DecodeValue, column_label, text_or_bytes};
use crate::Result;
use crate::error::ConnectorError;
use crate::publisher::type_mapping::SqlValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

impl DecodeValue for SqliteRow {
    fn value_at(&self, index: usize) -> Result<SqlValue> {
        let storage = {
            let raw = self
                .try_get_raw(index)
                .map_err(|e| ConnectorError::decode_field(&column_label(self, index), e))?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }
            raw.type_info().name().to_string()
        };

        let decoded = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => self.try_get::<i64, _>(index).map(SqlValue::Integer),
            "REAL" => self.try_get::<f64, _>(index).map(SqlValue::Float),
            "BLOB" => self.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes),
            "TEXT" => self.try_get::<String, _>(index).map(SqlValue::Text),
            other => return Ok(text_or_bytes(self, index, other)),
        };

        decoded.map_err(|e| ConnectorError::decode_field(&column_label(self, index), e))
    }
}

//! Column discovery and type inference for a shape's query.

use super::source::SourcePool;
use super::type_mapping::{SqlValue, resolve_property_type};
use crate::Result;
use crate::error::ConnectorError;
use crate::models::{Property, Shape};
use futures::TryStreamExt;

/// Column metadata as reported by the driver for a prepared query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name, empty for unnamed expressions
    pub name: String,
    /// Native type name, recorded as the property's `typeAtSource`
    pub type_name: String,
    /// `None` when the driver cannot tell
    pub nullable: Option<bool>,
}

impl ColumnMetadata {
    /// Metadata for a column whose nullability is unknown.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: None,
        }
    }
}

/// Doubles every single quote in the query text.
pub fn escape_single_quotes(query: &str) -> String {
    query.replace('\'', "''")
}

/// Derives `(id, name)` pairs for a column list.
///
/// Named columns become `[Name]`; unnamed columns become `[UNKNOWN_<n>]` where
/// `n` counts unnamed columns only, starting at zero.
pub fn column_property_ids<'a, I>(names: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut unnamed = 0usize;
    names
        .into_iter()
        .map(|name| {
            let name = if name.is_empty() {
                let generated = format!("UNKNOWN_{}", unnamed);
                unnamed += 1;
                generated
            } else {
                name.to_string()
            };
            (format!("[{}]", name), name)
        })
        .collect()
}

/// Fails when two columns derive the same property id, as `SELECT a.ID, b.ID`
/// does. The second column would otherwise overwrite the first.
///
/// # Errors
/// Returns a decode error naming the duplicated id.
pub fn ensure_unique_ids(ids: &[(String, String)]) -> Result<()> {
    for (position, (id, _)) in ids.iter().enumerate() {
        if ids[..position].iter().any(|(earlier, _)| earlier == id) {
            return Err(ConnectorError::decode(format!(
                "duplicate column {} in query result",
                id
            )));
        }
    }
    Ok(())
}

/// Merges driver columns into the shape's property list.
///
/// Existing properties with a matching id are updated in place, new ones are
/// appended in column order. Returns the property index for every column.
pub fn merge_columns(shape: &mut Shape, columns: &[ColumnMetadata]) -> Vec<usize> {
    let ids = column_property_ids(columns.iter().map(|c| c.name.as_str()));
    let mut indices = Vec::with_capacity(columns.len());

    for ((id, name), column) in ids.into_iter().zip(columns) {
        let index = match shape.properties.iter().position(|p| p.id == id) {
            Some(index) => index,
            None => {
                shape.properties.push(Property::new(id, name));
                shape.properties.len() - 1
            }
        };

        let property = &mut shape.properties[index];
        property.type_at_source = column.type_name.clone();
        property.is_nullable = column.nullable.unwrap_or(true);
        property.is_key = false;

        indices.push(index);
    }

    indices
}

/// Discovers the columns of a shape's query and infers their portable types.
///
/// Declared source types decide where they can; otherwise the first row's
/// values do.
///
/// # Errors
/// Returns an error if the query is empty, cannot be prepared or fails to
/// execute, returns the same column id twice, or the first row cannot be
/// decoded.
pub(crate) async fn populate_shape_columns(pool: &SourcePool, shape: &mut Shape) -> Result<()> {
    if shape.query.is_empty() {
        return Err(ConnectorError::EmptyQuery {
            shape: shape.id.clone(),
        });
    }

    let query = escape_single_quotes(&shape.query);
    let columns = pool.column_metadata(&query).await?;
    ensure_unique_ids(&column_property_ids(columns.iter().map(|c| c.name.as_str())))?;
    let property_indices = merge_columns(shape, &columns);

    tracing::debug!(
        shape = %shape.id,
        columns = columns.len(),
        "Collected column metadata"
    );

    let first_row = pool.fetch(&query).try_next().await?;

    for (column, &index) in property_indices.iter().enumerate() {
        let property = &mut shape.properties[index];
        let first_value = first_row
            .as_ref()
            .map(|row| row.values.get(column).unwrap_or(&SqlValue::Null));
        property.property_type = resolve_property_type(&property.type_at_source, first_value);
    }

    Ok(())
}

//! Core data models exchanged with the caller.
//!
//! Shapes, properties, counts and records are all serializable so the
//! transport layer can carry them as JSON without knowing their meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Portable type vocabulary, independent of the source driver's native types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    /// Short character data, and the fallback for anything unrecognized
    #[default]
    String,
    /// Signed 64-bit integer
    Integer,
    /// Double precision float
    Float,
    /// Exact numeric, published as text
    Decimal,
    /// Boolean
    Bool,
    /// Character data longer than the long-text threshold
    Text,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::String => write!(f, "STRING"),
            PropertyType::Integer => write!(f, "INTEGER"),
            PropertyType::Float => write!(f, "FLOAT"),
            PropertyType::Decimal => write!(f, "DECIMAL"),
            PropertyType::Bool => write!(f, "BOOL"),
            PropertyType::Text => write!(f, "TEXT"),
        }
    }
}

/// One column of a shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// `[ColumnName]`, or `[UNKNOWN_<n>]` for unnamed columns
    pub id: String,
    /// Column name as the driver reports it
    pub name: String,
    /// Portable type, serialized as `type`
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    /// Native type name reported by the source driver
    #[serde(default)]
    pub type_at_source: String,
    /// `true` unless the driver reports the column as non-nullable
    #[serde(default)]
    pub is_nullable: bool,
    /// Keys are never inferred
    #[serde(default)]
    pub is_key: bool,
}

impl Property {
    /// Creates a property with the given id and display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// How reliable a count value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountKind {
    /// Every row was counted
    Exact,
    /// Approximate count
    Estimate,
    /// The count did not finish within its budget
    Unavailable,
}

/// Row count of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    /// Reliability of `value`
    pub kind: CountKind,
    /// Only meaningful for `Exact` and `Estimate`
    #[serde(default)]
    pub value: u64,
}

impl Count {
    /// An exact count.
    pub fn exact(value: u64) -> Self {
        Self {
            kind: CountKind::Exact,
            value,
        }
    }

    /// A count that could not be obtained in time.
    pub fn unavailable() -> Self {
        Self {
            kind: CountKind::Unavailable,
            value: 0,
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CountKind::Unavailable => write!(f, "unavailable"),
            CountKind::Estimate => write!(f, "~{}", self.value),
            CountKind::Exact => write!(f, "{}", self.value),
        }
    }
}

/// What the consumer should do with a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordAction {
    /// Insert the record or replace the one with the same key
    #[default]
    Upsert,
}

/// One emitted row: an action plus the JSON-encoded `{property id: value}` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// What to do with the record
    pub action: RecordAction,
    /// JSON object mapping property ids to values
    pub data_json: String,
}

impl Record {
    /// Encodes a row map into a record.
    ///
    /// # Errors
    /// Returns a serialization error if the map cannot be encoded.
    pub fn new(
        action: RecordAction,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> crate::Result<Self> {
        let data_json = serde_json::to_string(data).map_err(|e| {
            crate::error::ConnectorError::serialization("failed to encode record", e)
        })?;

        Ok(Self { action, data_json })
    }

    /// Decodes the record payload back into a map.
    ///
    /// # Errors
    /// Returns a serialization error if the payload is not a JSON object.
    pub fn data(&self) -> crate::Result<serde_json::Map<String, serde_json::Value>> {
        serde_json::from_str(&self.data_json).map_err(|e| {
            crate::error::ConnectorError::serialization("failed to decode record", e)
        })
    }
}

/// A named, query-defined virtual table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    /// Unique id, also the sort key of discovery responses
    pub id: String,
    /// Display name
    pub name: String,
    /// Query whose result set defines the shape
    #[serde(default)]
    pub query: String,
    /// Columns in first-seen order
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Row count from the last discovery, if it got that far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Count>,
    /// Sample records from the last discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample: Vec<Record>,
    /// Human-readable diagnostics accumulated during discovery, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Shape {
    /// Creates a shape from its id, display name and query.
    pub fn new(id: impl Into<String>, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    /// Looks up a property by id.
    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }
}

/// Which shapes a discovery call should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoverMode {
    /// Enumerate every shape in the source (not supported, yields nothing)
    #[default]
    All,
    /// Refresh only the shapes supplied by the caller
    Refresh,
}

/// Request for shape discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverShapesRequest {
    /// ALL or REFRESH
    #[serde(default)]
    pub mode: DiscoverMode,
    /// Shapes to refresh in REFRESH mode
    #[serde(default)]
    pub to_refresh: Vec<Shape>,
    /// Number of sample records per shape; 0 disables sampling
    #[serde(default)]
    pub sample_size: u32,
}

/// Discovered shapes, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverShapesResponse {
    /// Refreshed shapes, including those that recorded errors
    pub shapes: Vec<Shape>,
}

/// Request to stream the records of a shape whose properties are known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Shape to publish, with its properties already discovered
    pub shape: Shape,
    /// Maximum number of rows; 0 streams everything
    #[serde(default)]
    pub limit: u32,
}

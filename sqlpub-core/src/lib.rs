//! Core engine for SQLPub, a connector that publishes relational data as typed
//! record streams.
//!
//! The engine connects to SQLite, PostgreSQL or MySQL through native `sqlx`
//! pools picked by URL scheme, discovers the columns and portable types of query-defined shapes, counts
//! their rows under a time budget, and streams their rows as JSON records.
//!
//! # Security Guarantees
//! - Passwords are held in zeroizing containers and never logged
//! - Connection strings are redacted before they reach logs or errors
//!
//! # Architecture
//! - `config`: caller settings and engine tuning
//! - `publisher`: the session owner plus discovery and streaming
//! - `models`: serializable shapes, properties, counts and records
//! - `error`: one error type with credential-safe messages

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod publisher;

// Re-export commonly used types
pub use config::{EngineConfig, Settings};
pub use error::{ConnectorError, Result};
pub use models::{
    Count, CountKind, DiscoverMode, DiscoverShapesRequest, DiscoverShapesResponse, Property,
    PropertyType, PublishRequest, Record, RecordAction, Shape,
};
pub use publisher::{Publisher, RecordSink};

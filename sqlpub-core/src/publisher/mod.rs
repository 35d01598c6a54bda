//! The publisher engine: session ownership, shape discovery and record
//! streaming.
//!
//! # Module Structure
//! - `connection`: Session open/close over a bounded pool
//! - `source`: Backend-native pools and per-driver row decoding
//! - `type_mapping`: Declared and value-driven portable type inference
//! - `schema_collection`: Column metadata and first-row type inference
//! - `counting`: Row counts under a time budget
//! - `sampling`: Sample records through the streaming pipeline
//! - `discovery`: One task per shape, joined and sorted by id
//! - `streaming`: Pre/post publish queries around a producer/consumer pipeline
//!
//! # Example
//! ```rust,no_run
//! use sqlpub_core::models::{DiscoverMode, DiscoverShapesRequest, Shape};
//! use sqlpub_core::publisher::Publisher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = Publisher::default();
//! publisher
//!     .connect(r#"{"connectionString": "sqlite:///var/data/w3.db", "password": "unused"}"#)
//!     .await?;
//!
//! let response = publisher
//!     .discover_shapes(DiscoverShapesRequest {
//!         mode: DiscoverMode::Refresh,
//!         to_refresh: vec![Shape::new("[Agents]", "Agents", "SELECT * FROM Agents")],
//!         sample_size: 5,
//!     })
//!     .await?;
//!
//! for shape in &response.shapes {
//!     println!("{}: {} properties", shape.id, shape.properties.len());
//! }
//! publisher.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod counting;
mod discovery;
mod sampling;
mod schema_collection;
mod source;
mod streaming;
mod type_mapping;


use crate::Result;
use crate::config::{EngineConfig, Settings};
use crate::error::ConnectorError;
use crate::models::{DiscoverShapesRequest, DiscoverShapesResponse, PublishRequest};
use connection::Session;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub use schema_collection::{
    ColumnMetadata, column_property_ids, ensure_unique_ids, escape_single_quotes, merge_columns,
};
pub use streaming::{RecordSink, build_query};
pub use type_mapping::{
    LONG_TEXT_THRESHOLD, SqlValue, declared_property_type, decode_for_property,
    infer_property_type, resolve_property_type,
};

/// Entry point for the four external operations: connect, discover, publish
/// and disconnect.
///
/// At most one session is live at a time. Connecting again replaces it.
pub struct Publisher {
    config: EngineConfig,
    session: RwLock<Option<Arc<Session>>>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            session: RwLock::new(None),
        }
    }
}

impl Publisher {
    /// Creates a publisher with the given engine configuration.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: RwLock::new(None),
        })
    }

    /// Engine configuration this publisher was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Connects using a JSON settings blob.
    ///
    /// Any previous session is closed first, even if the new settings turn
    /// out to be invalid.
    ///
    /// # Errors
    /// Returns a configuration error for malformed or incomplete settings and
    /// a connection error if the database cannot be reached.
    pub async fn connect(&self, settings_json: &str) -> Result<()> {
        let mut session = self.session.write().await;
        close_session(session.take()).await;

        let settings = Settings::from_json(settings_json)?;
        *session = Some(Arc::new(Session::open(settings, &self.config).await?));

        tracing::info!("Connected");
        Ok(())
    }

    /// Connects using already decoded settings.
    ///
    /// # Errors
    /// Same as [`Publisher::connect`].
    pub async fn connect_with(&self, settings: Settings) -> Result<()> {
        let mut session = self.session.write().await;
        close_session(session.take()).await;

        *session = Some(Arc::new(Session::open(settings, &self.config).await?));

        tracing::info!("Connected");
        Ok(())
    }

    /// Closes the session. Calling this while disconnected does nothing.
    pub async fn disconnect(&self) {
        let previous = self.session.write().await.take();
        if previous.is_some() {
            close_session(previous).await;
            tracing::info!("Disconnected");
        }
    }

    /// Whether a session is live.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Discovers the columns, count and optional sample of each requested
    /// shape.
    ///
    /// Per-shape failures are recorded in [`crate::models::Shape::errors`].
    ///
    /// # Errors
    /// Returns [`ConnectorError::NotConnected`] when there is no session.
    pub async fn discover_shapes(
        &self,
        request: DiscoverShapesRequest,
    ) -> Result<DiscoverShapesResponse> {
        let session = self.current_session().await?;
        Ok(discovery::discover_shapes(session, self.config.count_budget, request).await)
    }

    /// Streams the records of a shape into `sink`.
    ///
    /// # Errors
    /// Returns an error when not connected, when the pre- or post-publish
    /// query fails, when a row cannot be read or decoded, or when the sink
    /// rejects a record.
    pub async fn publish_stream<S>(&self, request: &PublishRequest, sink: &mut S) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        self.publish_stream_with_cancellation(request, sink, CancellationToken::new())
            .await
    }

    /// Like [`Publisher::publish_stream`], ending the stream cleanly once
    /// `cancel` is cancelled. The post-publish query still runs.
    ///
    /// # Errors
    /// Same as [`Publisher::publish_stream`].
    pub async fn publish_stream_with_cancellation<S>(
        &self,
        request: &PublishRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        let session = self.current_session().await?;
        tracing::debug!(
            shape = %request.shape.id,
            limit = request.limit,
            properties = request.shape.properties.len(),
            "Publishing shape"
        );

        streaming::publish(&session, request, sink, &cancel).await
    }

    async fn current_session(&self) -> Result<Arc<Session>> {
        self.session
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(ConnectorError::NotConnected)
    }
}

async fn close_session(session: Option<Arc<Session>>) {
    if let Some(session) = session {
        session.close().await;
    }
}

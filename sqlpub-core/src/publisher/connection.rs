//! Session lifecycle: opening, pinging and closing the connection pool.

use super::source::SourcePool;
use crate::Result;
use crate::config::{EngineConfig, Settings};
use crate::error::{ConnectorError, redact_database_url};
use tokio_util::sync::CancellationToken;

/// Everything owned between a successful connect and the next disconnect.
pub(crate) struct Session {
    pub(crate) pool: SourcePool,
    pub(crate) settings: Settings,
    /// Cancelled on disconnect; in-flight streams and counts observe it
    pub(crate) shutdown: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("backend", &self.pool.backend())
            .field("pool_size", &self.pool.size())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Session {
    /// Validates settings, opens a pool and checks that a connection can be
    /// established.
    ///
    /// # Errors
    /// Returns a configuration error for invalid settings, or a connection
    /// error if the pool cannot be created or the ping fails.
    pub(crate) async fn open(settings: Settings, config: &EngineConfig) -> Result<Self> {
        settings.validate()?;

        let connection_string = settings.connection_string();
        tracing::debug!(
            target_url = %redact_database_url(&connection_string),
            max_connections = config.max_connections,
            "Opening connection pool"
        );

        let pool = SourcePool::connect_lazy(&connection_string, config)
            .map_err(|e| ConnectorError::connection_failed("could not open connection", e))?;

        if let Err(e) = pool.ping().await {
            pool.close().await;
            return Err(ConnectorError::connection_failed("could not ping", e));
        }

        Ok(Self {
            pool,
            settings,
            shutdown: CancellationToken::new(),
        })
    }

    /// Signals shutdown to in-flight work and closes the pool.
    pub(crate) async fn close(&self) {
        self.shutdown.cancel();
        self.pool.close().await;
        tracing::debug!("Connection pool closed");
    }
}

//! Backend-native connection pools.
//!
//! Each compiled-in driver has its own pool type and its own row decoder, so
//! every native column type (dates, decimals, UUIDs, JSON) decodes through the
//! driver that understands it. The backend is picked from the URL scheme.
//!
//! # Module Structure
//! - `sqlite`: Storage-class driven decoding for SQLite rows
//! - `postgres`: Type-name driven decoding for PostgreSQL rows
//! - `mysql`: Type-name driven decoding for MySQL and MariaDB rows

#[cfg(not(any(feature = "sqlite", feature = "postgresql", feature = "mysql")))]
compile_error!("at least one database driver feature must be enabled: sqlite, postgresql or mysql");

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgresql")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

use super::counting::count_stream;
use super::schema_collection::ColumnMetadata;
use super::type_mapping::SqlValue;
use crate::Result;
use crate::config::EngineConfig;
use crate::error::ConnectorError;
use crate::models::Count;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::pool::{PoolConnection, PoolOptions};
use sqlx::{Column, Connection, Database, Executor, Row, Statement, TypeInfo};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "mysql")]
use sqlx::mysql::MySql;
#[cfg(feature = "postgresql")]
use sqlx::postgres::Postgres;
#[cfg(feature = "sqlite")]
use sqlx::sqlite::Sqlite;

/// Runs the same body against whichever backend variant is live.
macro_rules! on_backend {
    ($enum:ident, $value:expr, $inner:ident => $body:expr) => {
        match $value {
            #[cfg(feature = "sqlite")]
            $enum::Sqlite($inner) => $body,
            #[cfg(feature = "postgresql")]
            $enum::Postgres($inner) => $body,
            #[cfg(feature = "mysql")]
            $enum::MySql($inner) => $body,
        }
    };
}

/// Database family named by a connection URL's scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    Sqlite,
    Postgres,
    MySql,
}

impl Backend {
    /// Picks the backend from the scheme in front of the first `:`.
    pub(crate) fn from_url(url: &str) -> std::result::Result<Self, sqlx::Error> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();

        match scheme.as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "mysql" | "mariadb" => Ok(Backend::MySql),
            _ => Err(sqlx::Error::Configuration(
                format!("unsupported database scheme {:?}", scheme).into(),
            )),
        }
    }
}

/// A bounded pool over one of the compiled-in drivers.
#[derive(Clone)]
pub(crate) enum SourcePool {
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "postgresql")]
    Postgres(sqlx::PgPool),
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlPool),
}

/// One connection checked out of a [`SourcePool`].
pub(crate) enum SourceConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(PoolConnection<Sqlite>),
    #[cfg(feature = "postgresql")]
    Postgres(PoolConnection<Postgres>),
    #[cfg(feature = "mysql")]
    MySql(PoolConnection<MySql>),
}

/// A fully decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceRow {
    pub(crate) columns: Vec<String>,
    pub(crate) values: Vec<SqlValue>,
}

/// Per-driver decoding of a single column value.
pub(crate) trait DecodeValue: Row {
    /// Decodes the value at `index` from the driver's native type.
    fn value_at(&self, index: usize) -> Result<SqlValue>;
}

impl SourceRow {
    fn decode<R: DecodeValue>(row: &R) -> Result<Self> {
        let columns = row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let values = (0..row.len())
            .map(|index| row.value_at(index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, values })
    }
}

fn pool_options<DB: Database>(config: &EngineConfig) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
}

impl SourcePool {
    /// Creates a pool that opens connections on first use.
    pub(crate) fn connect_lazy(
        url: &str,
        config: &EngineConfig,
    ) -> std::result::Result<Self, sqlx::Error> {
        match Backend::from_url(url)? {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => pool_options::<Sqlite>(config)
                .connect_lazy(url)
                .map(SourcePool::Sqlite),
            #[cfg(feature = "postgresql")]
            Backend::Postgres => pool_options::<Postgres>(config)
                .connect_lazy(url)
                .map(SourcePool::Postgres),
            #[cfg(feature = "mysql")]
            Backend::MySql => pool_options::<MySql>(config)
                .connect_lazy(url)
                .map(SourcePool::MySql),
            #[allow(unreachable_patterns)]
            other => Err(sqlx::Error::Configuration(
                format!("support for {:?} databases is not compiled in", other).into(),
            )),
        }
    }

    /// Database family behind this pool.
    pub(crate) fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "sqlite")]
            SourcePool::Sqlite(_) => Backend::Sqlite,
            #[cfg(feature = "postgresql")]
            SourcePool::Postgres(_) => Backend::Postgres,
            #[cfg(feature = "mysql")]
            SourcePool::MySql(_) => Backend::MySql,
        }
    }

    /// Number of open connections, idle or in use.
    pub(crate) fn size(&self) -> u32 {
        on_backend!(SourcePool, self, pool => pool.size())
    }

    /// Checks out one connection and pings it.
    pub(crate) async fn ping(&self) -> std::result::Result<(), sqlx::Error> {
        on_backend!(SourcePool, self, pool => {
            let mut conn = pool.acquire().await?;
            conn.ping().await
        })
    }

    /// Closes the pool, waiting for checked-out connections to come back.
    pub(crate) async fn close(&self) {
        on_backend!(SourcePool, self, pool => pool.close().await)
    }

    /// Waits for a pooled connection.
    pub(crate) async fn acquire(&self) -> std::result::Result<SourceConnection, sqlx::Error> {
        Ok(match self {
            #[cfg(feature = "sqlite")]
            SourcePool::Sqlite(pool) => SourceConnection::Sqlite(pool.acquire().await?),
            #[cfg(feature = "postgresql")]
            SourcePool::Postgres(pool) => SourceConnection::Postgres(pool.acquire().await?),
            #[cfg(feature = "mysql")]
            SourcePool::MySql(pool) => SourceConnection::MySql(pool.acquire().await?),
        })
    }

    /// Executes one or more statements, discarding any rows.
    pub(crate) async fn execute_raw(&self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        on_backend!(SourcePool, self, pool => {
            sqlx::raw_sql(sql).execute(pool).await.map(|_| ())
        })
    }

    /// Prepares `query` and reports its result columns.
    pub(crate) async fn column_metadata(&self, query: &str) -> Result<Vec<ColumnMetadata>> {
        on_backend!(SourcePool, self, pool => {
            let statement = pool
                .prepare(query)
                .await
                .map_err(|e| ConnectorError::query_failed(query, e))?;

            Ok(statement
                .columns()
                .iter()
                .map(|c| ColumnMetadata::new(c.name(), c.type_info().name()))
                .collect())
        })
    }

    /// Streams the rows of `query`, each decoded through the native driver.
    pub(crate) fn fetch<'a>(&'a self, query: &'a str) -> BoxStream<'a, Result<SourceRow>> {
        on_backend!(SourcePool, self, pool => {
            sqlx::query(query)
                .fetch(pool)
                .map_err(move |e| ConnectorError::query_failed(query, e))
                .and_then(|row| futures::future::ready(SourceRow::decode(&row)))
                .boxed()
        })
    }
}

impl SourceConnection {
    /// Reads every row of `query` without decoding, stopping early as
    /// unavailable once `shutdown` fires.
    pub(crate) async fn count_rows(
        &mut self,
        query: &str,
        shutdown: &CancellationToken,
    ) -> Result<Count> {
        on_backend!(SourceConnection, self, conn => {
            count_stream(sqlx::query(query).fetch(&mut **conn), query, shutdown).await
        })
    }
}

/// Human-readable name of the column at `index`, for decode errors.
pub(crate) fn column_label<R: Row>(row: &R, index: usize) -> String {
    row.columns()
        .get(index)
        .map(|c| c.name().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("column {}", index))
}

/// Last-resort decoding for native types without a dedicated branch: text,
/// then raw bytes, then `NULL`.
pub(crate) fn text_or_bytes<'r, R>(row: &'r R, index: usize, kind: &str) -> SqlValue
where
    R: Row,
    usize: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Vec<u8>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    if let Ok(text) = row.try_get::<String, _>(index) {
        return SqlValue::Text(text);
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
        return SqlValue::Bytes(bytes);
    }

    tracing::debug!(
        column = %column_label(row, index),
        kind,
        "No decoder for column type, publishing null"
    );
    SqlValue::Null
}

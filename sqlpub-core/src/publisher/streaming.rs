//! Record streaming: pre/post publish queries around a producer/consumer
//! pipeline.
//!
//! A producer task reads rows and encodes them as records; the caller's side
//! drains a channel of capacity one into a [`RecordSink`]. Cancellation is
//! checked once per row on both sides of the channel.

use super::connection::Session;
use super::schema_collection::{column_property_ids, ensure_unique_ids};
use super::source::{SourcePool, SourceRow};
use super::type_mapping::{SqlValue, decode_for_property};
use crate::Result;
use crate::error::{ConnectorError, stopped_after};
use crate::models::{Property, PublishRequest, Record, RecordAction};
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Destination for published records.
#[async_trait]
pub trait RecordSink: Send {
    /// Accepts one record.
    ///
    /// # Errors
    /// An error stops the stream; the post-publish query still runs.
    async fn send(&mut self, record: Record) -> Result<()>;
}

#[async_trait]
impl RecordSink for Vec<Record> {
    async fn send(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

#[async_trait]
impl RecordSink for mpsc::Sender<Record> {
    async fn send(&mut self, record: Record) -> Result<()> {
        mpsc::Sender::send(self, record)
            .await
            .map_err(|_| ConnectorError::sink("record receiver closed"))
    }
}

/// Applies a row limit to a shape query. A limit of zero leaves it unchanged.
///
/// # Examples
/// ```rust
/// use sqlpub_core::publisher::build_query;
///
/// assert_eq!(
///     build_query("SELECT * FROM Agents", 10),
///     "SELECT * FROM (SELECT * FROM Agents) AS q LIMIT 10"
/// );
/// assert_eq!(build_query("SELECT 1", 0), "SELECT 1");
/// ```
pub fn build_query(query: &str, limit: u32) -> String {
    if limit > 0 {
        format!("SELECT * FROM ({}) AS q LIMIT {}", query, limit)
    } else {
        query.to_string()
    }
}

/// Stops the producer when either the caller or the session is done.
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
    caller: CancellationToken,
    session: CancellationToken,
}

impl StopSignal {
    pub(crate) fn new(caller: CancellationToken, session: CancellationToken) -> Self {
        Self { caller, session }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.caller.is_cancelled() || self.session.is_cancelled()
    }
}

/// Runs a full publish: pre-publish query, the record pipeline, then the
/// post-publish query whatever the pipeline's outcome.
pub(crate) async fn publish<S>(
    session: &Session,
    request: &PublishRequest,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: RecordSink + ?Sized,
{
    if let Some(pre) = session.settings.pre_publish_query() {
        tracing::debug!(shape = %request.shape.id, "Running pre-publish query");
        session
            .pool
            .execute_raw(pre)
            .await
            .map_err(|source| ConnectorError::PrePublish { source })?;
    }

    let result = run_pipeline(&session.pool, request, sink, &session.shutdown, cancel).await;

    if let Some(post) = session.settings.post_publish_query() {
        tracing::debug!(shape = %request.shape.id, "Running post-publish query");
        if let Err(post_error) = session.pool.execute_raw(post).await {
            let message = match &result {
                Err(prior) => stopped_after(&post_error, prior),
                Ok(()) => post_error.to_string(),
            };
            return Err(ConnectorError::PostPublish { message });
        }
    }

    result
}

/// Streams the records of a request into `sink`.
///
/// Read errors from the producer and sink errors are both reported; when both
/// occur the read error is layered on top of the sink error.
pub(crate) async fn run_pipeline<S>(
    pool: &SourcePool,
    request: &PublishRequest,
    sink: &mut S,
    shutdown: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: RecordSink + ?Sized,
{
    let producer_cancel = cancel.child_token();
    let stop = StopSignal::new(producer_cancel.clone(), shutdown.clone());
    let (tx, mut rx) = mpsc::channel::<Record>(1);

    let producer = tokio::spawn(read_records(pool.clone(), request.clone(), tx, stop.clone()));

    let mut sink_error = None;
    let mut emitted: u64 = 0;
    while let Some(record) = rx.recv().await {
        if stop.is_stopped() {
            break;
        }
        if let Err(e) = sink.send(record).await {
            producer_cancel.cancel();
            sink_error = Some(e);
            break;
        }
        emitted += 1;
    }
    drop(rx);

    let read_error = match producer.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) => Some(ConnectorError::task_failed("record reader failed", e)),
    };

    tracing::debug!(shape = %request.shape.id, records = emitted, "Record stream finished");

    match (sink_error, read_error) {
        (None, None) => Ok(()),
        (Some(e), None) | (None, Some(e)) => Err(e),
        (Some(sink), Some(read)) => Err(ConnectorError::Stream {
            message: stopped_after(&read, &sink),
        }),
    }
}

/// Producer side of the pipeline.
///
/// Returns cleanly when the stop signal fires or the consumer goes away.
async fn read_records(
    pool: SourcePool,
    request: PublishRequest,
    out: mpsc::Sender<Record>,
    stop: StopSignal,
) -> Result<()> {
    let shape = &request.shape;
    if shape.query.is_empty() {
        return Err(ConnectorError::configuration("query cannot be empty"));
    }

    let query = build_query(&shape.query, request.limit);
    let mut rows = pool.fetch(&query);
    let mut column_map: Option<Vec<usize>> = None;

    while let Some(row) = rows.try_next().await? {
        if stop.is_stopped() {
            tracing::debug!(shape = %shape.id, "Record stream cancelled");
            return Ok(());
        }

        if column_map.is_none() {
            column_map = Some(resolve_columns(&shape.properties, &row)?);
        }
        let columns = column_map.as_deref().unwrap_or_default();

        let record = encode_row(row, &shape.properties, columns)?;
        if out.send(record).await.is_err() {
            return Ok(());
        }
    }

    Ok(())
}

/// Finds the column index of every property by id.
fn resolve_columns(properties: &[Property], row: &SourceRow) -> Result<Vec<usize>> {
    let ids = column_property_ids(row.columns.iter().map(String::as_str));
    ensure_unique_ids(&ids)?;

    properties
        .iter()
        .map(|property| {
            ids.iter()
                .position(|(id, _)| *id == property.id)
                .ok_or_else(|| {
                    ConnectorError::decode(format!(
                        "property {} is not returned by the shape query",
                        property.id
                    ))
                })
        })
        .collect()
}

fn encode_row(row: SourceRow, properties: &[Property], columns: &[usize]) -> Result<Record> {
    let mut values = row.values;
    let mut data = serde_json::Map::with_capacity(properties.len());
    for (property, &column) in properties.iter().zip(columns) {
        let value = values
            .get_mut(column)
            .map(|slot| std::mem::replace(slot, SqlValue::Null))
            .unwrap_or(SqlValue::Null);
        data.insert(property.id.clone(), decode_for_property(value, property)?);
    }

    Record::new(RecordAction::Upsert, &data)
}

//! Row counting under a time budget.

use super::source::SourcePool;
use crate::Result;
use crate::error::ConnectorError;
use crate::models::{Count, Shape};
use futures::{Stream, TryStreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Counts the rows of a shape's query, giving up after `budget`.
///
/// A pooled connection is checked out first and the budget only starts once
/// it is held, so waiting behind other discovery units does not eat into it.
/// The count then runs on its own task. If it finishes first the count is
/// exact; if the budget elapses first the task is aborted and the count is
/// reported as unavailable. Session shutdown also ends the count as
/// unavailable.
///
/// # Errors
/// Returns an error if the query is empty, no connection can be acquired, or
/// the query fails before the budget elapses.
pub(crate) async fn estimate_count(
    pool: &SourcePool,
    shape: &Shape,
    budget: Duration,
    shutdown: &CancellationToken,
) -> Result<Count> {
    if shape.query.is_empty() {
        return Err(ConnectorError::EmptyQuery {
            shape: shape.id.clone(),
        });
    }

    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(_) if shutdown.is_cancelled() => return Ok(Count::unavailable()),
        Err(e) => return Err(ConnectorError::query_failed(&shape.query, e)),
    };

    let query = shape.query.clone();
    let shutdown = shutdown.clone();
    let mut counter = tokio::spawn(async move { conn.count_rows(&query, &shutdown).await });

    match tokio::time::timeout(budget, &mut counter).await {
        Ok(joined) => joined.map_err(|e| ConnectorError::task_failed("row count task failed", e))?,
        Err(_) => {
            counter.abort();
            tracing::warn!(
                shape = %shape.id,
                budget_ms = budget.as_millis() as u64,
                "Row count did not finish in time"
            );
            Ok(Count::unavailable())
        }
    }
}

/// Rows counted between voluntary yields to the runtime.
const YIELD_EVERY: u64 = 1024;

/// Drains a row stream, counting rows until it ends or `shutdown` fires.
pub(crate) async fn count_stream<S, R>(
    mut rows: S,
    query: &str,
    shutdown: &CancellationToken,
) -> Result<Count>
where
    S: Stream<Item = std::result::Result<R, sqlx::Error>> + Unpin,
{
    let mut count: u64 = 0;

    while rows
        .try_next()
        .await
        .map_err(|e| ConnectorError::query_failed(query, e))?
        .is_some()
    {
        if shutdown.is_cancelled() {
            return Ok(Count::unavailable());
        }
        count += 1;
        if count % YIELD_EVERY == 0 {
            // a driver that always has the next row ready never returns Pending
            tokio::task::yield_now().await;
        }
    }

    Ok(Count::exact(count))
}

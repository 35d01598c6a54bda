//! Concurrent shape discovery.
//!
//! Every shape is refreshed on its own task. Failures are recorded on the
//! shape itself and never abort the batch.

use super::connection::Session;
use super::counting::estimate_count;
use super::sampling::collect_sample;
use super::schema_collection::populate_shape_columns;
use crate::models::{DiscoverMode, DiscoverShapesRequest, DiscoverShapesResponse, Shape};
use std::sync::Arc;
use std::time::Duration;

/// Refreshes the requested shapes in parallel and returns them sorted by id.
pub(crate) async fn discover_shapes(
    session: Arc<Session>,
    count_budget: Duration,
    request: DiscoverShapesRequest,
) -> DiscoverShapesResponse {
    if request.mode == DiscoverMode::All {
        tracing::debug!("Automatic shape discovery is not supported");
        return DiscoverShapesResponse::default();
    }

    tracing::debug!(
        shapes = request.to_refresh.len(),
        sample_size = request.sample_size,
        "Refreshing shapes"
    );

    let sample_size = request.sample_size;
    let mut pending = Vec::with_capacity(request.to_refresh.len());
    for shape in request.to_refresh {
        let original = shape.clone();
        let session = Arc::clone(&session);
        let handle = tokio::spawn(async move {
            refresh_shape(&session, shape, count_budget, sample_size).await
        });
        pending.push((original, handle));
    }

    let mut shapes = Vec::with_capacity(pending.len());
    for (mut original, handle) in pending {
        match handle.await {
            Ok(shape) => shapes.push(shape),
            Err(e) => {
                tracing::error!(shape = %original.id, error = %e, "Shape discovery task failed");
                original.errors.push(format!("Could not discover shape: {}", e));
                shapes.push(original);
            }
        }
    }

    shapes.sort_by(|a, b| a.id.cmp(&b.id));
    DiscoverShapesResponse { shapes }
}

/// Columns, then count, then sample. The first failing step ends the refresh,
/// except sampling which is last anyway.
async fn refresh_shape(
    session: &Session,
    mut shape: Shape,
    count_budget: Duration,
    sample_size: u32,
) -> Shape {
    tracing::debug!(shape = %shape.id, "Getting details for shape");

    shape.count = None;
    shape.sample.clear();
    shape.errors.clear();

    if let Err(e) = populate_shape_columns(&session.pool, &mut shape).await {
        tracing::error!(shape = %shape.id, error = %e, "Error discovering columns");
        shape.errors.push(format!("Could not discover columns: {}", e));
        return shape;
    }

    match estimate_count(&session.pool, &shape, count_budget, &session.shutdown).await {
        Ok(count) => {
            tracing::debug!(shape = %shape.id, count = %count, "Got row count");
            shape.count = Some(count);
        }
        Err(e) => {
            tracing::error!(shape = %shape.id, error = %e, "Error getting row count");
            shape
                .errors
                .push(format!("Could not get row count for shape: {}", e));
            return shape;
        }
    }

    if sample_size > 0
        && let Err(e) = collect_sample(session, &mut shape, sample_size).await
    {
        tracing::error!(shape = %shape.id, error = %e, "Error collecting sample");
        shape.errors.push(format!("Could not collect sample: {}", e));
    }

    shape
}

//! Sample collection for discovered shapes.
//!
//! Samples go through the same record pipeline as a publish, limited to the
//! requested size. Pre/post publish queries are not run.

use super::connection::Session;
use super::streaming::run_pipeline;
use crate::Result;
use crate::models::{PublishRequest, Shape};
use tokio_util::sync::CancellationToken;

/// Appends up to `sample_size` records of the shape to `shape.sample`.
///
/// Records read before a failure are kept.
///
/// # Errors
/// Returns the pipeline error if reading or decoding fails.
pub(crate) async fn collect_sample(
    session: &Session,
    shape: &mut Shape,
    sample_size: u32,
) -> Result<()> {
    let request = PublishRequest {
        shape: shape.clone(),
        limit: sample_size,
    };

    run_pipeline(
        &session.pool,
        &request,
        &mut shape.sample,
        &session.shutdown,
        &CancellationToken::new(),
    )
    .await?;

    tracing::debug!(shape = %shape.id, size = shape.sample.len(), "Collected sample");
    Ok(())
}

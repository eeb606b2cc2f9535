//! Conversion dispatcher: submit chunks to the conversion service in
//! bounded batches.
//!
//! All chunks in a batch are submitted concurrently and the dispatcher
//! waits for the whole batch before starting the next, bounding peak
//! external concurrency (request rate and local memory) while still giving
//! close-to-linear speedup up to the parallelism limit. A chunk whose
//! conversion fails yields a typed `Err` outcome instead of aborting — the
//! batch continues with the remaining chunks. After each batch the
//! temporary chunk files are deleted, reclaiming storage without waiting
//! for the whole document to finish.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::convert::DocumentConverter;
use crate::error::ChunkError;
use crate::monitor::{PipelineMonitor, Provider};
use crate::output::ChunkResult;
use crate::pipeline::normalize;
use crate::pipeline::split::ChunkFile;
use crate::progress::{emit, ProgressCallback};

/// Typed per-chunk outcome consumed by the merge step. Expected failure is
/// data here, not an exception path.
pub type ChunkOutcome = Result<ChunkResult, ChunkError>;

/// Convert all chunks in batches of `parallelism`.
///
/// Outcomes are returned in chunk order (the merger re-sorts by page
/// anyway). Every attempt is recorded in the monitor: one conversion call
/// and one chunk success/failure per chunk.
pub async fn dispatch_chunks(
    converter: &Arc<dyn DocumentConverter>,
    chunks: &[ChunkFile],
    parallelism: usize,
    monitor: &mut PipelineMonitor,
    progress: &Option<ProgressCallback>,
) -> Vec<ChunkOutcome> {
    let parallelism = parallelism.max(1);
    let total = chunks.len();
    let total_batches = total.div_ceil(parallelism);
    let mut outcomes = Vec::with_capacity(total);

    for (batch_num, batch) in chunks.chunks(parallelism).enumerate() {
        emit(
            progress,
            "convert",
            format!(
                "batch {}/{}: converting chunks {}-{}",
                batch_num + 1,
                total_batches,
                batch[0].index + 1,
                batch[batch.len() - 1].index + 1
            ),
            (15 + (outcomes.len() * 55) / total.max(1)) as u8,
        );

        let batch_futures = batch.iter().map(|chunk| convert_one(converter, chunk));
        let batch_outcomes = join_all(batch_futures).await;

        let succeeded = batch_outcomes.iter().filter(|o| o.is_ok()).count();
        info!(
            batch = batch_num + 1,
            total_batches,
            succeeded,
            attempted = batch.len(),
            "batch finished"
        );

        for outcome in batch_outcomes {
            monitor.record_api_call(Provider::Conversion);
            monitor.record_chunk(outcome.is_ok());
            if let Err(ref e) = outcome {
                monitor.record_error("conversion", e.to_string());
            }
            outcomes.push(outcome);
        }

        // Reclaim the batch's temporary artifacts before the next batch.
        for chunk in batch {
            if let Err(e) = tokio::fs::remove_file(&chunk.path).await {
                warn!(
                    chunk = chunk.index,
                    path = %chunk.path.display(),
                    "could not remove chunk artifact: {e}"
                );
            }
        }
    }

    outcomes
}

/// Convert one chunk; failures become the `Err` half of the outcome.
async fn convert_one(converter: &Arc<dyn DocumentConverter>, chunk: &ChunkFile) -> ChunkOutcome {
    match converter.convert_sync(&chunk.path).await {
        Ok(raw) => Ok(normalize::normalize_chunk(raw, chunk)),
        Err(e) => {
            warn!(
                chunk = chunk.index,
                pages = format!("{}-{}", chunk.page_start + 1, chunk.page_end).as_str(),
                "chunk conversion failed: {e}"
            );
            Err(ChunkError::ConversionFailed {
                chunk: chunk.index,
                page_start: chunk.page_start,
                page_end: chunk.page_end,
                detail: e.to_string(),
            })
        }
    }
}

//! Error types for the tender-analyzer library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`AnalyzeError`] — **Fatal to the run**: the analysis cannot proceed at
//!   all (missing input file, invalid configuration, total conversion
//!   failure). Returned as `Err(AnalyzeError)` from the top-level `analyze*`
//!   functions.
//!
//! * [`ConversionError`] — one call to the document-conversion service went
//!   wrong (non-2xx, missing task id, terminal failure status, poll
//!   timeout). Fatal for a whole-document single-shot conversion; per-chunk
//!   it is downgraded to a [`ChunkError`] and the run continues.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk failed to convert but all
//!   other chunks are fine. Stored as the `Err` half of a chunk outcome so
//!   callers can inspect partial success rather than losing the whole
//!   document to one bad page range.
//!
//! Conflict-resolution ambiguity and validation gaps are *not* errors — they
//! surface as `needs_review` and `missing` data in the final output.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tender-analyzer library.
///
/// Chunk-level failures use [`ChunkError`] and are recorded in the pipeline
/// report rather than propagated here.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input exists but is not a document type the pipeline accepts.
    #[error("unsupported input '{input}': {detail}")]
    InvalidInput { input: String, detail: String },

    /// The PDF could not be parsed for page counting or splitting.
    #[error("failed to read PDF '{path}': {detail}")]
    PdfParse { path: PathBuf, detail: String },

    // ── External-service errors ───────────────────────────────────────────
    /// A whole-document conversion call failed. Per-chunk conversion
    /// failures never reach this variant.
    #[error("document conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// Every chunk of a split document failed to convert; there is no
    /// content to analyze.
    #[error("all {total} chunks failed conversion — no content extracted")]
    AllChunksFailed { total: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No field extractor was supplied; the pipeline cannot query the
    /// language-understanding service.
    #[error("no field extractor configured.\nSet AnalyzeConfigBuilder::extractor(...) before calling analyze().")]
    ExtractorNotConfigured,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a run artifact failed.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from one request/response exchange with the conversion service.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The HTTP request itself failed (connection refused, DNS, TLS).
    #[error("conversion request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status.
    #[error("conversion service returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// An async submit succeeded but the response carried no task id.
    #[error("async submit returned no task id")]
    MissingTaskId,

    /// The async job reached the terminal `failure` status.
    #[error("conversion job '{task_id}' failed: {detail}")]
    JobFailed { task_id: String, detail: String },

    /// Polling exceeded the configured maximum wait. The job is abandoned,
    /// not cancelled upstream.
    #[error("conversion job '{task_id}' timed out after {secs}s")]
    PollTimeout { task_id: String, secs: u64 },

    /// The response body could not be interpreted in any known dialect.
    #[error("malformed conversion response: {detail}")]
    BadResponse { detail: String },
}

/// A non-fatal error for a single chunk.
///
/// Stored as the `Err` half of a chunk outcome when conversion of one page
/// range fails. The overall run continues unless ALL chunks fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The conversion call for this chunk failed after the client's own
    /// error mapping.
    #[error("chunk {chunk} (pages {page_start}-{page_end}): conversion failed: {detail}")]
    ConversionFailed {
        chunk: usize,
        page_start: usize,
        page_end: usize,
        detail: String,
    },
}

impl ChunkError {
    /// Index of the chunk this error belongs to.
    pub fn chunk_index(&self) -> usize {
        match self {
            ChunkError::ConversionFailed { chunk, .. } => *chunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_chunks_failed_display() {
        let e = AnalyzeError::AllChunksFailed { total: 4 };
        assert!(e.to_string().contains("all 4 chunks"), "got: {e}");
    }

    #[test]
    fn poll_timeout_display() {
        let e = ConversionError::PollTimeout {
            task_id: "t-123".into(),
            secs: 600,
        };
        assert!(e.to_string().contains("t-123"));
        assert!(e.to_string().contains("600s"));
    }

    #[test]
    fn chunk_error_carries_page_range() {
        let e = ChunkError::ConversionFailed {
            chunk: 2,
            page_start: 20,
            page_end: 25,
            detail: "HTTP 502".into(),
        };
        assert_eq!(e.chunk_index(), 2);
        let msg = e.to_string();
        assert!(msg.contains("pages 20-25"), "got: {msg}");
        assert!(msg.contains("502"));
    }

    #[test]
    fn conversion_error_converts_to_fatal() {
        let e: AnalyzeError = ConversionError::MissingTaskId.into();
        assert!(e.to_string().contains("no task id"));
    }
}

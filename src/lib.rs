//! # tender-analyzer
//!
//! Analyze procurement ("tender") documents — PDFs, scans, office files —
//! into a structured record of bid-relevant fields: deadlines, amounts,
//! guarantee ratios, service hours, contact data, line items.
//!
//! ## Why this crate?
//!
//! A tender bundle routinely runs to hundreds of pages, too large for one
//! analysis call, and a single extraction pass frequently misses or
//! contradicts fields found elsewhere in the same document. This crate
//! splits, parallelizes, merges, reconciles, and validates before claiming
//! a field is "known" — combining an external document-to-text conversion
//! service with an external language-understanding service behind narrow
//! request/response contracts.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Split      fixed-size page ranges, one sub-PDF each (lopdf)
//!  ├─ 2. Dispatch   bounded batches to the conversion service
//!  ├─ 3. Normalize  any response dialect → one canonical shape
//!  ├─ 4. Merge      page-ordered text + provenance-tagged tables/images
//!  ├─ 5. Extract    per-chunk candidate values via the extractor seam
//!  ├─ 6. Reconcile  conflict detection + per-field resolution strategies
//!  ├─ 7. Validate   critical fields, targeted re-extraction for gaps
//!  └─ 8. Score      confidence bands, verification flags, run report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tender_analyzer::{analyze, AnalyzeConfig, HttpExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzeConfig::builder()
//!         .conversion_base_url("http://localhost:5001")
//!         .extractor(Arc::new(HttpExtractor::new("http://localhost:8080")))
//!         .build()?;
//!     let output = analyze("ihale_dokumani.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.analysis)?);
//!     eprintln!(
//!         "completeness: {:.0}%, needs review: {}",
//!         output.validation.after.completeness * 100.0,
//!         output.needs_review.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A chunk that fails conversion contributes nothing and is counted as
//! failed in the report; the run continues. Conflicting values that cannot
//! be reconciled become `needs_review` items, never errors. Only unusable
//! input, missing configuration, and total conversion failure abort a run.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod monitor;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, convert_document};
pub use config::{AnalyzeConfig, AnalyzeConfigBuilder, ConfidenceBands, ResolutionThresholds};
pub use convert::{ConversionClient, DocumentConverter};
pub use error::{AnalyzeError, ChunkError, ConversionError};
pub use extract::{CandidateValue, ExtractionRequest, ExtractError, FieldExtractor, HttpExtractor};
pub use monitor::{PipelineMonitor, PipelineReport, Provider};
pub use output::{
    AnalysisOutput, ChunkResult, DocumentMeta, MergedResult, MimeClass, ReviewItem,
};
pub use pipeline::validate::DocType;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressEvent};

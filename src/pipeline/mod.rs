//! Pipeline stages for tender-document analysis.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! split ──▶ dispatch ──▶ normalize ──▶ merge ──▶ (extract) ──▶ conflict ──▶ resolve ──▶ validate / confidence
//! (lopdf)  (batched I/O)  (dialects)   (ordered)  (service)    (detect)     (strategies)  (critical fields / bands)
//! ```
//!
//! 1. [`split`]      — partition pages into fixed-size ranges, each
//!    materialized as an independent sub-document
//! 2. [`dispatch`]   — submit chunks to the conversion service in bounded
//!    batches; per-chunk failures become typed outcomes, never panics
//! 3. [`normalize`]  — map any conversion-response dialect into the one
//!    canonical shape
//! 4. [`merge`]      — re-establish page order and produce one logical
//!    result per document
//! 5. [`conflict`]   — group candidate values by field and flag
//!    disagreements
//! 6. [`resolve`]    — pick or merge winning values per field strategy,
//!    or mark fields for review
//! 7. [`validate`]   — check business-critical fields and rank re-query
//!    chunks for the missing ones
//! 8. [`confidence`] — classify every field into confidence bands and
//!    raise verification flags
pub mod confidence;
pub mod conflict;
pub mod dispatch;
pub mod merge;
pub mod normalize;
pub mod resolve;
pub mod split;
pub mod validate;

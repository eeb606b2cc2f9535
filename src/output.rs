//! Canonical result types produced by the pipeline.
//!
//! Every shape here is plain data: `Serialize + Deserialize`, no handles, no
//! cycles, safe to persist or send over a wire. Downstream stages rely on
//! the normalizer always producing these shapes regardless of which response
//! dialect the conversion service returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::monitor::PipelineReport;
use crate::pipeline::confidence::ConfidenceReport;
use crate::pipeline::conflict::{Conflict, ConflictSummary};
use crate::pipeline::resolve::ResolutionSummary;
use crate::pipeline::validate::ValidationOutcome;

/// Coarse mime classification of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeClass {
    Pdf,
    Word,
    Excel,
    Image,
    Html,
    Other,
}

impl MimeClass {
    /// Classify by file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => MimeClass::Pdf,
            Some("doc") | Some("docx") => MimeClass::Word,
            Some("xls") | Some("xlsx") => MimeClass::Excel,
            Some("png") | Some("jpg") | Some("jpeg") | Some("tiff") => MimeClass::Image,
            Some("html") | Some("htm") => MimeClass::Html,
            _ => MimeClass::Other,
        }
    }

    /// MIME type string for multipart uploads.
    pub fn content_type(&self, path: &Path) -> &'static str {
        match (self, path.extension().and_then(|e| e.to_str())) {
            (MimeClass::Pdf, _) => "application/pdf",
            (MimeClass::Word, Some("doc")) => "application/msword",
            (MimeClass::Word, _) => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            (MimeClass::Excel, Some("xls")) => "application/vnd.ms-excel",
            (MimeClass::Excel, _) => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            (MimeClass::Image, Some("png")) => "image/png",
            (MimeClass::Image, Some("tiff")) => "image/tiff",
            (MimeClass::Image, _) => "image/jpeg",
            (MimeClass::Html, _) => "text/html",
            (MimeClass::Other, _) => "application/octet-stream",
        }
    }
}

/// Identity and shape of one ingested document. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Run-local document id, e.g. `doc_20260808_120000`.
    pub id: String,
    /// Source path of the ingested file.
    pub source_path: PathBuf,
    /// Total page count (1 for non-paginated formats).
    pub page_count: usize,
    /// Coarse mime classification.
    pub mime: MimeClass,
    /// Source size in bytes.
    pub size_bytes: u64,
}

/// A table extracted by the conversion service, with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBlock {
    /// Position within its source response.
    pub index: usize,
    /// Chunk the table came from; `None` for unsplit documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// Originating 1-based page range, e.g. `"11-20"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    /// Markdown rendering when the service provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    /// Raw cell data as returned by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An image extracted by the conversion service, with provenance.
///
/// Image payloads are opaque to this pipeline — they are forwarded to the
/// language-understanding service as-is, never decoded locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlock {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Canonical conversion result for one chunk, produced by the normalizer.
///
/// `page_start` is the merge key: the merger sorts by it to re-establish
/// document order regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_index: usize,
    /// 0-based inclusive start page.
    pub page_start: usize,
    /// 0-based exclusive end page.
    pub page_end: usize,
    pub text: String,
    pub tables: Vec<TableBlock>,
    pub images: Vec<ImageBlock>,
    /// The raw service response, kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ChunkResult {
    /// The chunk's 1-based page range as displayed to humans.
    pub fn page_range_label(&self) -> String {
        format!("{}-{}", self.page_start + 1, self.page_end)
    }

    /// Source id used to tag candidate values from this chunk.
    pub fn source_id(&self) -> String {
        format!("chunk_{}", self.chunk_index)
    }
}

/// Merge bookkeeping carried on a [`MergedResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedMetadata {
    /// Whether the document went through the chunked path.
    pub chunked: bool,
    /// Chunks that converted successfully.
    pub total_chunks: usize,
    /// Chunks that were attempted (successful + failed).
    pub attempted_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// One logical conversion result for a whole document.
///
/// Invariants: `text` is the page-ordered concatenation of chunk texts, each
/// introduced by an explicit page-boundary marker; `tables`/`images` carry
/// chunk-index and page-range provenance and are never deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedResult {
    /// `false` means zero chunks converted; all content fields are empty.
    pub success: bool,
    pub text: String,
    pub tables: Vec<TableBlock>,
    pub images: Vec<ImageBlock>,
    pub page_count: usize,
    pub metadata: MergedMetadata,
}

impl MergedResult {
    /// An empty-but-well-formed result for a document where nothing
    /// converted. Downstream stages never need to branch on this.
    pub fn empty(page_count: usize) -> Self {
        MergedResult {
            success: false,
            text: String::new(),
            tables: Vec::new(),
            images: Vec::new(),
            page_count,
            metadata: MergedMetadata::default(),
        }
    }
}

/// An unresolved field surfaced for human review.
///
/// Distinct from a *missing* field: a review item has candidate values that
/// could not be reconciled automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub field: String,
    pub reason: String,
    /// All candidate values that disagreed, with provenance.
    pub conflict: Conflict,
}

/// The aggregate output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub document: DocumentMeta,
    /// Field-keyed analysis record. Scalars, nested objects, and arrays of
    /// typed entries, depending on field type.
    pub analysis: Value,
    /// The merged conversion result the analysis was drawn from.
    pub merged: MergedResult,
    /// Aggregate view of detected conflicts.
    pub conflicts: ConflictSummary,
    /// Fields that had conflicting candidates and how resolution went.
    pub resolutions: ResolutionSummary,
    /// Fields needing manual review ("extracted but conflicting").
    pub needs_review: Vec<ReviewItem>,
    /// Critical-field completeness, including fallback-fill before/after.
    pub validation: ValidationOutcome,
    /// Confidence bands and verification flags.
    pub confidence: ConfidenceReport,
    /// Telemetry for this run.
    pub report: PipelineReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_class_from_extension() {
        assert_eq!(MimeClass::from_path(Path::new("a/b/ihale.pdf")), MimeClass::Pdf);
        assert_eq!(MimeClass::from_path(Path::new("sartname.DOCX")), MimeClass::Word);
        assert_eq!(MimeClass::from_path(Path::new("fiyat.xlsx")), MimeClass::Excel);
        assert_eq!(MimeClass::from_path(Path::new("scan.jpeg")), MimeClass::Image);
        assert_eq!(MimeClass::from_path(Path::new("noext")), MimeClass::Other);
    }

    #[test]
    fn content_type_distinguishes_legacy_office() {
        let doc = Path::new("old.doc");
        assert_eq!(MimeClass::from_path(doc).content_type(doc), "application/msword");
        let xlsx = Path::new("new.xlsx");
        assert!(MimeClass::from_path(xlsx).content_type(xlsx).contains("spreadsheetml"));
    }

    #[test]
    fn chunk_result_labels() {
        let c = ChunkResult {
            chunk_index: 2,
            page_start: 20,
            page_end: 25,
            text: String::new(),
            tables: vec![],
            images: vec![],
            raw: None,
        };
        assert_eq!(c.page_range_label(), "21-25");
        assert_eq!(c.source_id(), "chunk_2");
    }

    #[test]
    fn empty_merged_result_is_well_formed() {
        let m = MergedResult::empty(40);
        assert!(!m.success);
        assert!(m.text.is_empty());
        assert!(m.tables.is_empty());
        assert_eq!(m.page_count, 40);
    }
}

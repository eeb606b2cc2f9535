//! Chunk splitter: partition a PDF into fixed-size page ranges.
//!
//! Each range is materialized as an independent sub-document under the
//! run's temporary directory so the conversion service sees ordinary small
//! PDFs. The ranges partition `[0, total_pages)` exactly — no gaps, no
//! overlaps — which is what lets the merger later reassemble the document
//! without consulting the original file.

use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::AnalyzeError;

/// One materialized chunk awaiting conversion. The file is owned by the
/// dispatcher for the lifetime of its conversion and deleted after its
/// batch completes.
#[derive(Debug, Clone)]
pub struct ChunkFile {
    pub index: usize,
    /// 0-based inclusive start page.
    pub page_start: usize,
    /// 0-based exclusive end page.
    pub page_end: usize,
    pub path: PathBuf,
}

/// Compute `ceil(total_pages / chunk_size)` contiguous, non-overlapping
/// `[start, end)` ranges covering all pages exactly once.
pub fn page_ranges(total_pages: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if total_pages == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::with_capacity(total_pages.div_ceil(chunk_size));
    let mut start = 0;
    while start < total_pages {
        let end = (start + chunk_size).min(total_pages);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Number of pages in a PDF.
pub fn count_pages(path: &Path) -> Result<usize, AnalyzeError> {
    let doc = Document::load(path).map_err(|e| AnalyzeError::PdfParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}

/// Split a PDF into per-range sub-documents under `out_dir`.
///
/// Returns the total page count and one [`ChunkFile`] per range. Sub-PDFs
/// are produced by deleting the pages outside each range from a copy of the
/// source document, which preserves fonts and resources without
/// re-encoding page content.
pub fn split_document(
    path: &Path,
    chunk_size: usize,
    out_dir: &Path,
) -> Result<(usize, Vec<ChunkFile>), AnalyzeError> {
    let source = Document::load(path).map_err(|e| AnalyzeError::PdfParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let total_pages = source.get_pages().len();
    let ranges = page_ranges(total_pages, chunk_size);

    info!(
        total_pages,
        chunks = ranges.len(),
        chunk_size,
        "splitting document into page ranges"
    );

    let mut chunks = Vec::with_capacity(ranges.len());
    for (index, (start, end)) in ranges.into_iter().enumerate() {
        let mut chunk_doc = source.clone();

        // Page numbers are 1-based in the page tree.
        let delete: Vec<u32> = (1..=total_pages as u32)
            .filter(|p| {
                let zero_based = (*p - 1) as usize;
                zero_based < start || zero_based >= end
            })
            .collect();
        if !delete.is_empty() {
            chunk_doc.delete_pages(&delete);
        }
        let _ = chunk_doc.prune_objects();

        let chunk_path = out_dir.join(format!("chunk_{index}.pdf"));
        chunk_doc
            .save(&chunk_path)
            .map_err(|e| AnalyzeError::Io {
                path: chunk_path.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;

        debug!(
            chunk = index,
            pages = format!("{}-{}", start + 1, end).as_str(),
            path = %chunk_path.display(),
            "chunk written"
        );

        chunks.push(ChunkFile {
            index,
            page_start: start,
            page_end: end,
            path: chunk_path,
        });
    }

    Ok((total_pages, chunks))
}

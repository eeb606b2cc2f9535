//! Chunk merger: combine per-chunk results, in page order, into one logical
//! document result.
//!
//! Determinism requirement: merging the same set of chunk results in any
//! input order yields the same [`MergedResult`] — the sort by `page_start`
//! is the only order-sensitivity. Tables and images are unioned with
//! chunk-index and page-range tags and never deduplicated; each is assumed
//! unique to its source location.

use tracing::info;

use crate::output::{ChunkResult, MergedMetadata, MergedResult};

/// Page-boundary marker introducing one chunk's text in the merged body.
/// The 1-based page range makes boundaries locatable in the merged text.
pub fn page_boundary_marker(page_start: usize, page_end: usize) -> String {
    format!("=== Sayfa {}-{} ===", page_start + 1, page_end)
}

/// Merge successfully converted chunks into one result.
///
/// `attempted` is the number of chunks submitted (successful + failed);
/// it is recorded in the metadata so callers can see partial coverage.
pub fn merge_chunk_results(
    mut results: Vec<ChunkResult>,
    total_pages: usize,
    attempted: usize,
) -> MergedResult {
    if results.is_empty() {
        let mut empty = MergedResult::empty(total_pages);
        empty.metadata.chunked = true;
        empty.metadata.attempted_chunks = attempted;
        return empty;
    }

    // Completion order within a batch is arbitrary; page order is not.
    results.sort_by_key(|r| r.page_start);

    let text = results
        .iter()
        .map(|r| {
            let marker = page_boundary_marker(r.page_start, r.page_end);
            if r.text.is_empty() {
                marker
            } else {
                format!("{marker}\n{}", r.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut tables = Vec::new();
    let mut images = Vec::new();
    for result in &results {
        let range = result.page_range_label();
        for table in &result.tables {
            let mut table = table.clone();
            table.chunk_index = Some(result.chunk_index);
            table.page_range = Some(range.clone());
            tables.push(table);
        }
        for image in &result.images {
            let mut image = image.clone();
            image.chunk_index = Some(result.chunk_index);
            image.page_range = Some(range.clone());
            images.push(image);
        }
    }

    info!(
        chunks = results.len(),
        attempted,
        text_len = text.len(),
        tables = tables.len(),
        images = images.len(),
        "chunk results merged"
    );

    MergedResult {
        success: true,
        text,
        tables,
        images,
        page_count: total_pages,
        metadata: MergedMetadata {
            chunked: true,
            total_chunks: results.len(),
            attempted_chunks: attempted,
            title: None,
            format: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TableBlock;

    fn chunk_result(index: usize, start: usize, end: usize, text: &str) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            page_start: start,
            page_end: end,
            text: text.to_string(),
            tables: vec![],
            images: vec![],
            raw: None,
        }
    }

    #[test]
    fn merges_in_page_order_with_boundary_markers() {
        let results = vec![
            chunk_result(2, 20, 25, "son bölüm"),
            chunk_result(0, 0, 10, "ilk bölüm"),
            chunk_result(1, 10, 20, "orta bölüm"),
        ];
        let merged = merge_chunk_results(results, 25, 3);

        assert!(merged.success);
        assert_eq!(merged.metadata.total_chunks, 3);
        assert_eq!(merged.text.matches("=== Sayfa").count(), 3);

        let first = merged.text.find("ilk bölüm").unwrap();
        let middle = merged.text.find("orta bölüm").unwrap();
        let last = merged.text.find("son bölüm").unwrap();
        assert!(first < middle && middle < last);
        assert!(merged.text.contains("=== Sayfa 1-10 ==="));
        assert!(merged.text.contains("=== Sayfa 21-25 ==="));
    }

    #[test]
    fn permutations_merge_identically() {
        let base = vec![
            chunk_result(0, 0, 10, "a"),
            chunk_result(1, 10, 20, "b"),
            chunk_result(2, 20, 25, "c"),
        ];
        let permutations: Vec<Vec<usize>> = vec![
            vec![0, 1, 2],
            vec![2, 1, 0],
            vec![1, 2, 0],
            vec![2, 0, 1],
        ];
        let reference = merge_chunk_results(base.clone(), 25, 3);
        for perm in permutations {
            let shuffled: Vec<ChunkResult> = perm.iter().map(|&i| base[i].clone()).collect();
            let merged = merge_chunk_results(shuffled, 25, 3);
            assert_eq!(
                serde_json::to_string(&merged).unwrap(),
                serde_json::to_string(&reference).unwrap()
            );
        }
    }

    #[test]
    fn failed_chunk_leaves_survivors_intact() {
        // Chunk 2 failed conversion: only chunks 0 and 1 arrive here.
        let results = vec![
            chunk_result(0, 0, 10, "ilk"),
            chunk_result(1, 10, 20, "orta"),
        ];
        let merged = merge_chunk_results(results, 25, 3);

        assert!(merged.success);
        assert!(merged.text.contains("ilk"));
        assert!(merged.text.contains("orta"));
        assert_eq!(merged.metadata.total_chunks, 2);
        assert_eq!(merged.metadata.attempted_chunks, 3);
    }

    #[test]
    fn zero_chunks_yields_failed_empty_result() {
        let merged = merge_chunk_results(vec![], 40, 4);
        assert!(!merged.success);
        assert!(merged.text.is_empty());
        assert_eq!(merged.page_count, 40);
        assert_eq!(merged.metadata.attempted_chunks, 4);
    }

    #[test]
    fn tables_are_tagged_not_deduplicated() {
        let table = TableBlock {
            index: 0,
            chunk_index: None,
            page_range: None,
            markdown: Some("| a |\n| --- |\n".into()),
            data: None,
        };
        let mut c0 = chunk_result(0, 0, 10, "x");
        c0.tables.push(table.clone());
        let mut c1 = chunk_result(1, 10, 20, "y");
        c1.tables.push(table);

        let merged = merge_chunk_results(vec![c0, c1], 20, 2);
        assert_eq!(merged.tables.len(), 2);
        assert_eq!(merged.tables[0].chunk_index, Some(0));
        assert_eq!(merged.tables[0].page_range.as_deref(), Some("1-10"));
        assert_eq!(merged.tables[1].chunk_index, Some(1));
        assert_eq!(merged.tables[1].page_range.as_deref(), Some("11-20"));
    }
}

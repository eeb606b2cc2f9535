//! Result normalizer: map any conversion-service response dialect into the
//! canonical shape.
//!
//! The service may return structured text elements (`document.texts[]`), a
//! single flattened `main_text` field, or pre-rendered `md` — depending on
//! its version and the requested output format. This module is the single
//! place that knows about those dialects: one normalization function with
//! ordered fallback checks, defaulting to an empty-but-well-formed result
//! when nothing matches, so downstream stages never branch on input shape.

use serde_json::Value;

use crate::output::{ChunkResult, ImageBlock, MergedMetadata, MergedResult, TableBlock};
use crate::pipeline::split::ChunkFile;

/// Text, tables, and images lifted out of one service response.
struct Normalized {
    text: String,
    tables: Vec<TableBlock>,
    images: Vec<ImageBlock>,
    page_count: Option<usize>,
    title: Option<String>,
    format: Option<String>,
}

/// Normalize one raw response into a per-chunk result.
pub fn normalize_chunk(raw: Value, chunk: &ChunkFile) -> ChunkResult {
    let n = normalize(&raw);
    ChunkResult {
        chunk_index: chunk.index,
        page_start: chunk.page_start,
        page_end: chunk.page_end,
        text: n.text,
        tables: n.tables,
        images: n.images,
        raw: Some(raw),
    }
}

/// Normalize one raw response for an unsplit document.
///
/// `fallback_pages` is used when the response does not report a page count.
pub fn normalize_single(raw: Value, fallback_pages: usize) -> MergedResult {
    let n = normalize(&raw);
    let page_count = n.page_count.unwrap_or(fallback_pages.max(1));
    MergedResult {
        success: !n.text.is_empty() || !n.tables.is_empty(),
        text: n.text,
        tables: n.tables,
        images: n.images,
        page_count,
        metadata: MergedMetadata {
            chunked: false,
            total_chunks: 1,
            attempted_chunks: 1,
            title: n.title,
            format: n.format,
        },
    }
}

/// The single variant-detection step.
fn normalize(raw: &Value) -> Normalized {
    // Responses either wrap the payload in `document` or are the payload.
    let doc = raw.get("document").unwrap_or(raw);

    // Ordered dialect fallback for the text body.
    let text = if let Some(texts) = doc.get("texts").and_then(Value::as_array) {
        texts
            .iter()
            .filter_map(|t| match t {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    } else if let Some(main) = doc.get("main_text").and_then(Value::as_str) {
        main.to_string()
    } else if let Some(md) = doc.get("md").and_then(Value::as_str) {
        md.to_string()
    } else {
        String::new()
    };

    let tables = doc
        .get("tables")
        .and_then(Value::as_array)
        .map(|tables| {
            tables
                .iter()
                .enumerate()
                .map(|(index, table)| TableBlock {
                    index,
                    chunk_index: None,
                    page_range: None,
                    markdown: table
                        .get("md")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| table_to_markdown(table.get("data").unwrap_or(table))),
                    data: table.get("data").cloned().or_else(|| Some(table.clone())),
                })
                .collect()
        })
        .unwrap_or_default();

    let images = doc
        .get("pictures")
        .and_then(Value::as_array)
        .map(|pics| {
            pics.iter()
                .enumerate()
                .map(|(index, pic)| ImageBlock {
                    index,
                    chunk_index: None,
                    page_range: None,
                    caption: pic.get("caption").and_then(Value::as_str).map(str::to_string),
                    data: pic.get("data").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    let page_count = doc
        .get("num_pages")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .or_else(|| doc.get("pages").and_then(Value::as_array).map(|p| p.len()));

    Normalized {
        text,
        tables,
        images,
        page_count,
        title: doc
            .get("name")
            .or_else(|| doc.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string),
        format: doc
            .get("file_format")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Render raw row data as a GFM table when the service gave no markdown.
fn table_to_markdown(data: &Value) -> Option<String> {
    let rows = data.as_array()?;
    let header = rows.first()?.as_array()?;
    if header.is_empty() {
        return None;
    }

    let cell = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut md = String::new();
    md.push_str("| ");
    md.push_str(&header.iter().map(&cell).collect::<Vec<_>>().join(" | "));
    md.push_str(" |\n| ");
    md.push_str(&header.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    md.push_str(" |\n");
    for row in rows.iter().skip(1) {
        if let Some(cells) = row.as_array() {
            md.push_str("| ");
            md.push_str(&cells.iter().map(&cell).collect::<Vec<_>>().join(" | "));
            md.push_str(" |\n");
        }
    }
    Some(md)
}

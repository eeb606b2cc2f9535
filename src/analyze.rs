//! Pipeline entry points.
//!
//! [`analyze`] runs the whole pipeline over one document: chunked parallel
//! conversion, result merging, per-chunk extraction, conflict detection and
//! resolution, critical-field validation with targeted re-extraction, and
//! confidence scoring — with the monitor observing every stage.
//!
//! Errors local to one chunk or one field never abort the run. Only
//! configuration errors (no extractor), unreadable input, a failed
//! whole-document conversion, or total chunk failure propagate to the
//! caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::AnalyzeConfig;
use crate::convert::{ConversionClient, DocumentConverter};
use crate::error::AnalyzeError;
use crate::extract::{CandidateValue, ExtractionRequest};
use crate::monitor::{PipelineMonitor, Provider};
use crate::output::{AnalysisOutput, ChunkResult, DocumentMeta, MergedResult, MimeClass, ReviewItem};
use crate::pipeline::conflict::{detect_conflicts, summarize_conflicts, Conflict};
use crate::pipeline::resolve::{apply_resolutions, assemble_analysis, resolve_conflicts};
use crate::pipeline::validate::{
    field_spec, find_relevant_chunks, has_content, validate_critical_fields, ValidationOutcome,
};
use crate::pipeline::{confidence, dispatch, merge, normalize, split};
use crate::progress::emit;

/// Analyze a tender document end to end.
///
/// # Returns
/// `Ok(AnalysisOutput)` on success, even when some chunks failed conversion
/// or some fields need review (check `output.needs_review` and
/// `output.validation`).
///
/// # Errors
/// Returns `Err(AnalyzeError)` only for fatal conditions: missing input,
/// missing extractor, whole-document conversion failure, or zero chunks
/// converted.
pub async fn analyze(
    input: impl AsRef<Path>,
    config: &AnalyzeConfig,
) -> Result<AnalysisOutput, AnalyzeError> {
    let path = input.as_ref().to_path_buf();
    if !path.exists() {
        return Err(AnalyzeError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(AnalyzeError::InvalidInput {
            input: path.display().to_string(),
            detail: "expected a document file, got a directory".into(),
        });
    }
    let Some(extractor) = config.extractor.clone() else {
        return Err(AnalyzeError::ExtractorNotConfigured);
    };

    let size_bytes = std::fs::metadata(&path)
        .map_err(|e| AnalyzeError::Io {
            path: path.clone(),
            source: e,
        })?
        .len();
    let mime = MimeClass::from_path(&path);
    let document_id = new_document_id();

    info!(
        document_id = document_id.as_str(),
        path = %path.display(),
        size_kb = size_bytes / 1024,
        ?mime,
        "analysis started"
    );

    let mut monitor = PipelineMonitor::new(&document_id);
    let progress = &config.progress_callback;
    emit(progress, "prepare", format!("document loaded ({} KB)", size_bytes / 1024), 5);

    let converter: Arc<dyn DocumentConverter> = match &config.converter {
        Some(custom) => Arc::clone(custom),
        None => Arc::new(ConversionClient::from_config(config)),
    };

    // ── Conversion ───────────────────────────────────────────────────────
    // The run's temp dir lives in this guard; it is removed when `analyze`
    // returns, success or not.
    let (document, merged, chunk_results, _tmp_guard) = convert_phase(
        &path,
        &document_id,
        size_bytes,
        mime,
        config,
        &converter,
        &mut monitor,
    )
    .await?;

    emit(progress, "merge", "conversion results merged", 72);

    // ── Extraction ───────────────────────────────────────────────────────
    monitor.start_stage("extraction");
    emit(progress, "extract", format!("extracting fields from {} chunks", chunk_results.len()), 75);

    let mut candidates: Vec<CandidateValue> = Vec::new();
    for chunk in &chunk_results {
        let request = ExtractionRequest {
            prompt: String::new(),
            text: chunk.text.clone(),
            images: chunk.images.clone(),
            source_chunk_id: chunk.source_id(),
            context: None,
        };
        monitor.record_api_call(Provider::Analysis);
        match extractor.extract(request).await {
            Ok(found) => {
                debug!(chunk = chunk.chunk_index, candidates = found.len(), "extraction pass done");
                candidates.extend(found);
            }
            Err(e) => {
                warn!(chunk = chunk.chunk_index, "extraction pass failed: {e}");
                monitor.record_error("extraction", e.to_string());
            }
        }
    }

    // ── Conflict detection and resolution ────────────────────────────────
    monitor.start_stage("conflicts");
    emit(progress, "conflicts", "reconciling candidate values", 88);

    let conflicts = detect_conflicts(&candidates);
    let conflict_summary = summarize_conflicts(&conflicts);
    let (resolved, resolution_summary) = resolve_conflicts(&conflicts, &config.thresholds);

    let mut field_confidences: BTreeMap<String, f64> = BTreeMap::new();
    let mut analysis = assemble_analysis(&candidates, &conflicts, &mut field_confidences);
    apply_resolutions(&mut analysis, &resolved, &mut field_confidences);

    let needs_review = collect_review_items(&conflicts, &resolved);

    // ── Critical-field validation (+ targeted re-extraction) ─────────────
    monitor.start_stage("validation");
    emit(progress, "validate", "checking critical fields", 92);

    let before = validate_critical_fields(&analysis, config.doc_type);
    let mut filled_by_fallback = Vec::new();

    if !before.valid && config.refill_missing {
        for missing in &before.missing {
            let Some(spec) = field_spec(&missing.field) else { continue };
            let relevant = find_relevant_chunks(&chunk_results, spec);
            if relevant.is_empty() {
                // Valid outcome: the field stays missing, no re-query.
                debug!(field = missing.field.as_str(), "no relevant chunks for re-query");
                continue;
            }

            let text: String = relevant
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
                .chars()
                .take(15_000)
                .collect();
            let request = ExtractionRequest {
                prompt: spec.fallback_prompt.to_string(),
                text,
                images: Vec::new(),
                source_chunk_id: relevant[0].source_id(),
                context: Some("refill".to_string()),
            };

            monitor.record_api_call(Provider::Analysis);
            match extractor.extract(request).await {
                Ok(found) => {
                    if let Some(candidate) = found
                        .iter()
                        .find(|c| c.field == missing.field && has_content(&c.value))
                    {
                        info!(field = missing.field.as_str(), "critical field filled by re-extraction");
                        if let Some(obj) = analysis.as_object_mut() {
                            obj.insert(missing.field.clone(), candidate.value.clone());
                        }
                        if let Some(confidence) = candidate.confidence {
                            field_confidences.insert(missing.field.clone(), confidence);
                        }
                        filled_by_fallback.push(missing.field.clone());
                    }
                }
                Err(e) => {
                    warn!(field = missing.field.as_str(), "re-extraction failed: {e}");
                    monitor.record_error("validation", e.to_string());
                }
            }
        }
    }

    let after = if filled_by_fallback.is_empty() {
        before.clone()
    } else {
        validate_critical_fields(&analysis, config.doc_type)
    };
    let validation = ValidationOutcome {
        before,
        after,
        filled_by_fallback,
    };

    // ── Confidence scoring ───────────────────────────────────────────────
    monitor.start_stage("confidence");
    emit(progress, "confidence", "scoring field confidence", 96);

    let confidence_report = confidence::analyze_confidence(&field_confidences, &analysis, &config.bands);

    // ── Finalize ─────────────────────────────────────────────────────────
    let report = monitor.generate_report();
    emit(progress, "complete", "analysis finished", 100);

    info!(
        document_id = document.id.as_str(),
        completeness = format!("{:.1}%", validation.after.completeness * 100.0).as_str(),
        needs_review = needs_review.len(),
        overall_confidence = confidence_report.overall_confidence,
        "analysis finished"
    );

    Ok(AnalysisOutput {
        document,
        analysis,
        merged,
        conflicts: conflict_summary,
        resolutions: resolution_summary,
        needs_review,
        validation,
        confidence: confidence_report,
        report,
    })
}

/// Analyze document bytes held in memory.
///
/// The bytes are written to a managed temporary file (whose extension is
/// taken from `filename` so mime classification still works) and cleaned up
/// automatically on return.
pub async fn analyze_bytes(
    bytes: &[u8],
    filename: &str,
    config: &AnalyzeConfig,
) -> Result<AnalysisOutput, AnalyzeError> {
    let dir = tempfile::tempdir().map_err(|e| AnalyzeError::Internal(format!("tempdir: {e}")))?;
    let path = dir.path().join(sanitize_filename(filename));
    tokio::fs::write(&path, bytes).await.map_err(|e| AnalyzeError::Io {
        path: path.clone(),
        source: e,
    })?;
    // `dir` is dropped (and the file deleted) when `analyze` returns.
    analyze(&path, config).await
}

/// Convert a document without running the analysis stages.
///
/// Useful for inspecting what the conversion service produces and for
/// callers that do their own extraction downstream. Does not require an
/// extractor.
pub async fn convert_document(
    input: impl AsRef<Path>,
    config: &AnalyzeConfig,
) -> Result<(DocumentMeta, MergedResult), AnalyzeError> {
    let path = input.as_ref().to_path_buf();
    if !path.exists() {
        return Err(AnalyzeError::FileNotFound { path });
    }
    let size_bytes = std::fs::metadata(&path)
        .map_err(|e| AnalyzeError::Io {
            path: path.clone(),
            source: e,
        })?
        .len();
    let mime = MimeClass::from_path(&path);
    let document_id = new_document_id();

    let converter: Arc<dyn DocumentConverter> = match &config.converter {
        Some(custom) => Arc::clone(custom),
        None => Arc::new(ConversionClient::from_config(config)),
    };

    let mut monitor = PipelineMonitor::new(&document_id);
    let (document, merged, _chunks, _tmp_guard) =
        convert_phase(&path, &document_id, size_bytes, mime, config, &converter, &mut monitor)
            .await?;
    monitor.generate_report();
    Ok((document, merged))
}

/// Shared conversion phase: choose the path (chunked / async / sync),
/// convert, and produce the merged result plus per-chunk views.
async fn convert_phase(
    path: &Path,
    document_id: &str,
    size_bytes: u64,
    mime: MimeClass,
    config: &AnalyzeConfig,
    converter: &Arc<dyn DocumentConverter>,
    monitor: &mut PipelineMonitor,
) -> Result<(DocumentMeta, MergedResult, Vec<ChunkResult>, Option<tempfile::TempDir>), AnalyzeError>
{
    let progress = &config.progress_callback;
    monitor.start_stage("prepare");

    let use_chunked = mime == MimeClass::Pdf && size_bytes > config.chunked_threshold_bytes;

    if use_chunked {
        // ── Chunked parallel path ────────────────────────────────────────
        monitor.start_stage("chunking");
        let tmp_dir =
            tempfile::tempdir().map_err(|e| AnalyzeError::Internal(format!("tempdir: {e}")))?;

        let split_path = path.to_path_buf();
        let out_dir = tmp_dir.path().to_path_buf();
        let chunk_size = config.chunk_size_pages;
        let (total_pages, chunk_files) =
            tokio::task::spawn_blocking(move || split::split_document(&split_path, chunk_size, &out_dir))
                .await
                .map_err(|e| AnalyzeError::Internal(format!("split task: {e}")))??;

        emit(
            progress,
            "chunking",
            format!("{total_pages} pages split into {} chunks", chunk_files.len()),
            12,
        );

        monitor.start_stage("conversion");
        let outcomes =
            dispatch::dispatch_chunks(converter, &chunk_files, config.parallelism, monitor, progress)
                .await;

        let attempted = outcomes.len();
        let successes: Vec<ChunkResult> = outcomes.into_iter().filter_map(Result::ok).collect();
        if successes.is_empty() {
            return Err(AnalyzeError::AllChunksFailed { total: attempted });
        }

        let merged = merge::merge_chunk_results(successes.clone(), total_pages, attempted);
        let document = DocumentMeta {
            id: document_id.to_string(),
            source_path: path.to_path_buf(),
            page_count: total_pages,
            mime,
            size_bytes,
        };
        // Hold the temp dir guard until the caller is done; chunk files are
        // already gone, this covers the directory itself.
        Ok((document, merged, sorted_by_page(successes), Some(tmp_dir)))
    } else {
        // ── Single-shot path ─────────────────────────────────────────────
        monitor.start_stage("conversion");
        let raw = if size_bytes > config.async_threshold_bytes {
            emit(progress, "convert", "large document: async conversion job", 20);
            converter.convert_async(path).await?
        } else {
            emit(progress, "convert", "converting document", 20);
            converter.convert_sync(path).await?
        };
        monitor.record_api_call(Provider::Conversion);
        monitor.record_chunk(true);

        let fallback_pages = if mime == MimeClass::Pdf {
            let count_path = path.to_path_buf();
            tokio::task::spawn_blocking(move || split::count_pages(&count_path))
                .await
                .map_err(|e| AnalyzeError::Internal(format!("page-count task: {e}")))?
                .unwrap_or_else(|e| {
                    warn!("page count unavailable: {e}");
                    1
                })
        } else {
            1
        };

        let merged = normalize::normalize_single(raw, fallback_pages);
        let document = DocumentMeta {
            id: document_id.to_string(),
            source_path: path.to_path_buf(),
            page_count: merged.page_count,
            mime,
            size_bytes,
        };
        // One pseudo-chunk so extraction and re-query work uniformly.
        let chunk_view = ChunkResult {
            chunk_index: 0,
            page_start: 0,
            page_end: merged.page_count,
            text: merged.text.clone(),
            tables: merged.tables.clone(),
            images: merged.images.clone(),
            raw: None,
        };
        Ok((document, merged, vec![chunk_view], None))
    }
}

fn sorted_by_page(mut chunks: Vec<ChunkResult>) -> Vec<ChunkResult> {
    chunks.sort_by_key(|c| c.page_start);
    chunks
}

fn collect_review_items(
    conflicts: &[Conflict],
    resolved: &[crate::pipeline::resolve::ResolvedConflict],
) -> Vec<ReviewItem> {
    resolved
        .iter()
        .filter(|r| r.needs_review)
        .filter_map(|r| {
            conflicts
                .iter()
                .find(|c| c.field == r.field)
                .map(|conflict| ReviewItem {
                    field: r.field.clone(),
                    reason: r.resolution.reason.clone(),
                    conflict: conflict.clone(),
                })
        })
        .collect()
}

fn new_document_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("doc_{millis}")
}

fn sanitize_filename(filename: &str) -> PathBuf {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_are_prefixed() {
        assert!(new_document_id().starts_with("doc_"));
    }

    #[test]
    fn filenames_are_stripped_to_base_name() {
        assert_eq!(sanitize_filename("/a/b/ihale.pdf"), PathBuf::from("ihale.pdf"));
        assert_eq!(sanitize_filename("sartname.docx"), PathBuf::from("sartname.docx"));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let config = AnalyzeConfig::default();
        let result = convert_document("/definitely/not/a/real/file.pdf", &config).await;
        assert!(matches!(result, Err(AnalyzeError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn missing_extractor_is_fatal() {
        // A config without an extractor must fail before any I/O beyond the
        // existence check.
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = AnalyzeConfig::default();
        let result = analyze(tmp.path(), &config).await;
        assert!(matches!(result, Err(AnalyzeError::ExtractorNotConfigured)));
    }
}

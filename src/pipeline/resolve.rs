//! Conflict resolver: apply a per-field strategy to pick (or merge) a
//! winning value, or mark the field for review.
//!
//! Resolution never throws — ambiguity is data. A failed resolution writes
//! nothing into the analysis and surfaces the field as an item requiring
//! manual review, distinct from a field that was never extracted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::ResolutionThresholds;
use crate::extract::CandidateValue;
use crate::pipeline::conflict::{normalize_for_comparison, Conflict};

/// Resolution strategies, selected per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pick the candidate with the clearly highest confidence.
    HighestConfidence,
    /// Pick the longest (most detailed) string value.
    MostDetailed,
    /// Pick the candidate from the latest chunk — later document position
    /// is assumed more authoritative for running totals and final figures.
    LatestChunk,
    /// Rank candidates by the reliability of their source context.
    SourcePriority,
    /// Union the deduplicated values — for naturally collection-typed
    /// fields like penalty clauses and personnel requirements.
    MergeValues,
    /// No automatic resolution; a human must decide.
    ManualReview,
}

/// The outcome of resolving one conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: Strategy,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_value: Option<Value>,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    /// Candidate whose value was selected, when a single one won.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_from: Option<CandidateValue>,
}

/// A conflict paired with its resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConflict {
    pub field: String,
    pub resolution: Resolution,
    pub needs_review: bool,
}

/// Counts over one run's resolutions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Percent of conflicts resolved automatically.
    pub resolution_rate: u32,
}

/// Per-field strategy table: exact field path first, then the field-group
/// prefix before the first `.`, then the global default.
const FIELD_STRATEGIES: &[(&str, Strategy)] = &[
    ("dates", Strategy::HighestConfidence),
    ("dates.ihale_tarihi", Strategy::HighestConfidence),
    ("dates.son_teklif_tarihi", Strategy::HighestConfidence),
    ("dates.baslangic", Strategy::LatestChunk),
    ("dates.bitis", Strategy::LatestChunk),
    ("amounts", Strategy::SourcePriority),
    ("amounts.yaklasik_maliyet", Strategy::HighestConfidence),
    ("amounts.birim_fiyat", Strategy::SourcePriority),
    ("tahmini_bedel", Strategy::SourcePriority),
    ("penalties", Strategy::MergeValues),
    ("ceza_kosullari", Strategy::MergeValues),
    ("meals", Strategy::SourcePriority),
    ("ogun_bilgileri", Strategy::SourcePriority),
    ("personnel", Strategy::MergeValues),
    ("personel_detaylari", Strategy::MergeValues),
    ("teknik_sartlar", Strategy::MergeValues),
];

/// Select the strategy for a field.
pub fn strategy_for(field: &str) -> Strategy {
    if let Some((_, s)) = FIELD_STRATEGIES.iter().find(|(name, _)| *name == field) {
        return *s;
    }
    let group = field.split('.').next().unwrap_or(field);
    if let Some((_, s)) = FIELD_STRATEGIES.iter().find(|(name, _)| *name == group) {
        return *s;
    }
    Strategy::HighestConfidence
}

/// Resolve every detected conflict.
pub fn resolve_conflicts(
    conflicts: &[Conflict],
    thresholds: &ResolutionThresholds,
) -> (Vec<ResolvedConflict>, ResolutionSummary) {
    let mut resolved_list = Vec::with_capacity(conflicts.len());
    let mut summary = ResolutionSummary {
        total: conflicts.len(),
        ..Default::default()
    };

    for conflict in conflicts {
        let resolution = resolve_conflict(conflict, thresholds);
        if resolution.success {
            summary.resolved += 1;
        } else {
            summary.unresolved += 1;
        }
        resolved_list.push(ResolvedConflict {
            field: conflict.field.clone(),
            needs_review: !resolution.success,
            resolution,
        });
    }

    summary.resolution_rate = if summary.total > 0 {
        ((summary.resolved as f64 / summary.total as f64) * 100.0).round() as u32
    } else {
        100
    };

    info!(
        total = summary.total,
        resolved = summary.resolved,
        unresolved = summary.unresolved,
        "conflict resolution finished"
    );

    (resolved_list, summary)
}

/// Resolve one conflict with the strategy selected for its field.
pub fn resolve_conflict(conflict: &Conflict, thresholds: &ResolutionThresholds) -> Resolution {
    let values = &conflict.values;
    match strategy_for(&conflict.field) {
        Strategy::HighestConfidence => resolve_by_confidence(values, thresholds),
        Strategy::MostDetailed => resolve_by_detail(values, thresholds),
        Strategy::LatestChunk => resolve_by_chunk_order(values),
        Strategy::SourcePriority => resolve_by_source_priority(values, thresholds),
        Strategy::MergeValues => resolve_by_merge(values),
        Strategy::ManualReview => manual_review("no automatic resolution"),
    }
}

fn manual_review(reason: &str) -> Resolution {
    Resolution {
        strategy: Strategy::ManualReview,
        success: false,
        selected_value: None,
        reason: reason.to_string(),
        warnings: Vec::new(),
        selected_from: None,
    }
}

fn confidence_of(candidate: &CandidateValue) -> f64 {
    candidate.confidence.unwrap_or(0.0)
}

/// Highest-confidence strategy.
///
/// Accept the top candidate when its lead over the runner-up reaches the
/// configured gap. A small gap with both candidates confident is
/// ambiguous-but-confident and unsafe to auto-pick; a small gap with a
/// merely-reasonable top candidate is accepted with a warning.
pub fn resolve_by_confidence(
    values: &[CandidateValue],
    thresholds: &ResolutionThresholds,
) -> Resolution {
    let mut sorted: Vec<&CandidateValue> = values.iter().collect();
    sorted.sort_by(|a, b| {
        confidence_of(b)
            .partial_cmp(&confidence_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let Some(&best) = sorted.first() else {
        return manual_review("no candidate values");
    };
    let second_confidence = sorted.get(1).map(|c| confidence_of(c)).unwrap_or(0.0);
    let gap = confidence_of(best) - second_confidence;

    if gap >= thresholds.confidence_gap {
        return Resolution {
            strategy: Strategy::HighestConfidence,
            success: true,
            selected_value: Some(best.value.clone()),
            reason: format!(
                "confidence gap sufficient: {:.2} vs {:.2}",
                confidence_of(best),
                second_confidence
            ),
            warnings: Vec::new(),
            selected_from: Some(best.clone()),
        };
    }

    if confidence_of(best) >= thresholds.both_high && second_confidence >= thresholds.both_high {
        return manual_review("both values confident with no clear winner");
    }

    if confidence_of(best) >= thresholds.accept_floor {
        return Resolution {
            strategy: Strategy::HighestConfidence,
            success: true,
            selected_value: Some(best.value.clone()),
            reason: format!("highest confidence selected despite small gap: {:.2}", confidence_of(best)),
            warnings: vec!["low confidence margin".to_string()],
            selected_from: Some(best.clone()),
        };
    }

    manual_review("all candidate values have low confidence")
}

/// Most-detailed strategy: longest string value wins unless it is itself
/// untrustworthy.
pub fn resolve_by_detail(values: &[CandidateValue], thresholds: &ResolutionThresholds) -> Resolution {
    let Some(best) = values.iter().max_by_key(|c| match &c.value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }) else {
        return manual_review("no candidate values");
    };

    if best.confidence.unwrap_or(1.0) < thresholds.detail_floor {
        return manual_review("most detailed value has low confidence");
    }

    Resolution {
        strategy: Strategy::MostDetailed,
        success: true,
        selected_value: Some(best.value.clone()),
        reason: "most detailed value selected".to_string(),
        warnings: Vec::new(),
        selected_from: Some(best.clone()),
    }
}

/// Numeric chunk index from a source id like `chunk_12`.
fn chunk_ordinal(source_chunk_id: &str) -> usize {
    source_chunk_id
        .rsplit('_')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Latest-chunk strategy.
pub fn resolve_by_chunk_order(values: &[CandidateValue]) -> Resolution {
    let Some(best) = values.iter().max_by_key(|c| chunk_ordinal(&c.source_chunk_id)) else {
        return manual_review("no candidate values");
    };

    Resolution {
        strategy: Strategy::LatestChunk,
        success: true,
        selected_value: Some(best.value.clone()),
        reason: format!("value from latest chunk selected ({})", best.source_chunk_id),
        warnings: Vec::new(),
        selected_from: Some(best.clone()),
    }
}

/// Source-type ranking: table > form-field > list > heading > paragraph >
/// unknown. Only table and form sources are trusted outright.
fn source_priority(context: Option<&str>) -> u8 {
    let Some(context) = context else { return 1 };
    let ctx = context.to_lowercase();
    if ctx.contains("tablo") || ctx.contains("table") {
        6
    } else if ctx.contains("form") || ctx.contains("alan") {
        5
    } else if ctx.contains("liste") || ctx.contains("list") || ctx.contains("madde") {
        4
    } else if ctx.contains("başlık") || ctx.contains("baslik") || ctx.contains("heading") || ctx.contains("header") {
        3
    } else {
        2
    }
}

fn source_type(context: Option<&str>) -> &'static str {
    match source_priority(context) {
        6 => "tablo",
        5 => "form",
        4 => "liste",
        3 => "başlık",
        2 => "paragraf",
        _ => "unknown",
    }
}

/// Source-priority strategy: accept the top-priority candidate only when
/// it comes from a high-trust source (table/form), else fall back to
/// confidence.
pub fn resolve_by_source_priority(
    values: &[CandidateValue],
    thresholds: &ResolutionThresholds,
) -> Resolution {
    let Some(best) = values.iter().max_by_key(|c| source_priority(c.context.as_deref())) else {
        return manual_review("no candidate values");
    };

    if source_priority(best.context.as_deref()) >= 5 {
        return Resolution {
            strategy: Strategy::SourcePriority,
            success: true,
            selected_value: Some(best.value.clone()),
            reason: format!(
                "selected from high-priority source ({})",
                source_type(best.context.as_deref())
            ),
            warnings: Vec::new(),
            selected_from: Some(best.clone()),
        };
    }

    resolve_by_confidence(values, thresholds)
}

/// Merge-values strategy: dedup by normalized value, keep the union. Never
/// marks the field for review.
pub fn resolve_by_merge(values: &[CandidateValue]) -> Resolution {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for candidate in values {
        if seen.insert(normalize_for_comparison(&candidate.value)) {
            unique.push(candidate.value.clone());
        }
    }

    Resolution {
        strategy: Strategy::MergeValues,
        success: true,
        reason: format!("{} values merged into {} unique", values.len(), unique.len()),
        selected_value: Some(Value::Array(unique)),
        warnings: Vec::new(),
        selected_from: None,
    }
}

// ── Applying results to the analysis ─────────────────────────────────────

/// Build the base analysis from candidates whose field had no conflict,
/// then collect the per-field confidences for the scorer.
///
/// Unanimous fields are written directly: collection-strategy fields as the
/// deduplicated union, everything else as the most confident candidate's
/// value.
pub fn assemble_analysis(
    candidates: &[CandidateValue],
    conflicts: &[Conflict],
    field_confidences: &mut BTreeMap<String, f64>,
) -> Value {
    let conflicted: std::collections::HashSet<&str> =
        conflicts.iter().map(|c| c.field.as_str()).collect();

    let mut by_field: BTreeMap<&str, Vec<&CandidateValue>> = BTreeMap::new();
    for candidate in candidates {
        if conflicted.contains(candidate.field.as_str()) {
            continue;
        }
        if normalize_for_comparison(&candidate.value).is_empty() {
            continue;
        }
        by_field.entry(&candidate.field).or_default().push(candidate);
    }

    let mut analysis = Value::Object(Map::new());
    for (field, group) in by_field {
        if strategy_for(field) == Strategy::MergeValues {
            let owned: Vec<CandidateValue> = group.iter().map(|c| (*c).clone()).collect();
            let merged = resolve_by_merge(&owned);
            if let Some(value) = merged.selected_value {
                set_field_value(&mut analysis, field, value, None);
            }
            if let Some(max) = group.iter().filter_map(|c| c.confidence).reduce(f64::max) {
                field_confidences.insert(field.to_string(), max);
            }
        } else if let Some(best) = group.iter().max_by(|a, b| {
            confidence_of(a)
                .partial_cmp(&confidence_of(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            set_field_value(&mut analysis, field, best.value.clone(), None);
            if let Some(confidence) = best.confidence {
                field_confidences.insert(field.to_string(), confidence);
            }
        }
    }
    analysis
}

/// Apply successful resolutions to the analysis.
///
/// Failed resolutions write nothing — the field's prior state stays
/// untouched and the item is surfaced for manual review by the caller.
pub fn apply_resolutions(
    analysis: &mut Value,
    resolved: &[ResolvedConflict],
    field_confidences: &mut BTreeMap<String, f64>,
) {
    for item in resolved {
        if !item.resolution.success {
            continue;
        }
        if let Some(value) = &item.resolution.selected_value {
            set_field_value(
                analysis,
                &item.field,
                value.clone(),
                Some(item.resolution.strategy),
            );
            if let Some(confidence) = item
                .resolution
                .selected_from
                .as_ref()
                .and_then(|c| c.confidence)
            {
                field_confidences.insert(item.field.clone(), confidence);
            }
        }
    }
}

/// Write a value at a `group.sub` or plain field path.
///
/// When `group` already holds an array of typed entries, the element whose
/// `type` matches `sub` is updated in place rather than replacing the whole
/// array; otherwise nested objects are created as needed.
fn set_field_value(analysis: &mut Value, field: &str, value: Value, resolved_by: Option<Strategy>) {
    let parts: Vec<&str> = field.splitn(2, '.').collect();

    if parts.len() == 2 {
        let (group, sub) = (parts[0], parts[1]);
        if let Some(Value::Array(items)) = analysis.get_mut(group) {
            if let Some(entry) = items
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .find(|e| e.get("type").and_then(Value::as_str) == Some(sub))
            {
                entry.insert("value".to_string(), value);
                if let Some(strategy) = resolved_by {
                    entry.insert("resolved_by".to_string(), json!(strategy));
                }
                return;
            }
        }
        // No matching array entry: fall through to nested-object write.
        let obj = ensure_object(analysis);
        let group_value = obj
            .entry(group.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(group_obj) = group_value.as_object_mut() {
            group_obj.insert(sub.to_string(), value);
        }
        return;
    }

    ensure_object(analysis).insert(field.to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut().expect("just ensured object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::conflict::{detect_conflicts, ConflictType};
    use serde_json::json;

    fn thresholds() -> ResolutionThresholds {
        ResolutionThresholds::default()
    }

    fn candidate(field: &str, value: Value, confidence: Option<f64>, chunk: &str) -> CandidateValue {
        CandidateValue {
            field: field.to_string(),
            value,
            confidence,
            source_chunk_id: chunk.to_string(),
            context: None,
        }
    }

    fn with_context(mut c: CandidateValue, context: &str) -> CandidateValue {
        c.context = Some(context.to_string());
        c
    }

    #[test]
    fn strategy_table_exact_then_prefix_then_default() {
        assert_eq!(strategy_for("dates.baslangic"), Strategy::LatestChunk);
        assert_eq!(strategy_for("dates.teslim"), Strategy::HighestConfidence);
        assert_eq!(strategy_for("penalties"), Strategy::MergeValues);
        assert_eq!(strategy_for("amounts.birim_fiyat"), Strategy::SourcePriority);
        assert_eq!(strategy_for("bilinmeyen_alan"), Strategy::HighestConfidence);
    }

    #[test]
    fn clear_confidence_gap_selects_top() {
        let values = vec![
            candidate("f", json!("a"), Some(0.9), "chunk_0"),
            candidate("f", json!("b"), Some(0.5), "chunk_1"),
        ];
        let r = resolve_by_confidence(&values, &thresholds());
        assert!(r.success);
        assert_eq!(r.selected_value, Some(json!("a")));
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn both_high_with_small_gap_needs_review() {
        let values = vec![
            candidate("f", json!("a"), Some(0.85), "chunk_0"),
            candidate("f", json!("b"), Some(0.82), "chunk_1"),
        ];
        let r = resolve_by_confidence(&values, &thresholds());
        assert!(!r.success);
        assert_eq!(r.strategy, Strategy::ManualReview);
        assert!(r.selected_value.is_none());
    }

    #[test]
    fn small_gap_reasonable_top_accepted_with_warning() {
        let values = vec![
            candidate("f", json!("a"), Some(0.7), "chunk_0"),
            candidate("f", json!("b"), Some(0.65), "chunk_1"),
        ];
        let r = resolve_by_confidence(&values, &thresholds());
        assert!(r.success);
        assert!(!r.warnings.is_empty());
    }

    #[test]
    fn all_low_confidence_needs_review() {
        let values = vec![
            candidate("f", json!("a"), Some(0.4), "chunk_0"),
            candidate("f", json!("b"), Some(0.35), "chunk_1"),
        ];
        let r = resolve_by_confidence(&values, &thresholds());
        assert!(!r.success);
    }

    #[test]
    fn most_detailed_picks_longest_unless_untrusted() {
        let values = vec![
            candidate("f", json!("kısa"), Some(0.9), "chunk_0"),
            candidate("f", json!("çok daha uzun ve detaylı açıklama"), Some(0.8), "chunk_1"),
        ];
        let r = resolve_by_detail(&values, &thresholds());
        assert!(r.success);
        assert_eq!(r.selected_value, Some(json!("çok daha uzun ve detaylı açıklama")));

        let untrusted = vec![
            candidate("f", json!("kısa"), Some(0.9), "chunk_0"),
            candidate("f", json!("uzun ama şüpheli değer burada"), Some(0.3), "chunk_1"),
        ];
        let r = resolve_by_detail(&untrusted, &thresholds());
        assert!(!r.success);
    }

    #[test]
    fn latest_chunk_wins_by_ordinal() {
        let values = vec![
            candidate("f", json!("eski"), Some(0.9), "chunk_2"),
            candidate("f", json!("yeni"), Some(0.5), "chunk_11"),
        ];
        let r = resolve_by_chunk_order(&values);
        assert!(r.success);
        assert_eq!(r.selected_value, Some(json!("yeni")));
    }

    #[test]
    fn table_source_beats_higher_confidence_paragraph() {
        // Two passes disagree on tahmini_bedel; the table-sourced value wins
        // even though the paragraph mention is longer-winded.
        let values = vec![
            with_context(
                candidate("tahmini_bedel", json!("45.000.000 TL"), Some(0.7), "chunk_1"),
                "tablo",
            ),
            with_context(
                candidate("tahmini_bedel", json!("50.000.000 TL"), Some(0.6), "chunk_3"),
                "paragraf",
            ),
        ];
        let r = resolve_by_source_priority(&values, &thresholds());
        assert!(r.success);
        assert_eq!(r.strategy, Strategy::SourcePriority);
        assert_eq!(r.selected_value, Some(json!("45.000.000 TL")));
    }

    #[test]
    fn source_priority_falls_back_to_confidence_without_table_or_form() {
        let values = vec![
            with_context(candidate("f", json!("a"), Some(0.9), "chunk_0"), "paragraf"),
            with_context(candidate("f", json!("b"), Some(0.5), "chunk_1"), "liste"),
        ];
        let r = resolve_by_source_priority(&values, &thresholds());
        assert!(r.success);
        assert_eq!(r.strategy, Strategy::HighestConfidence);
        assert_eq!(r.selected_value, Some(json!("a")));
    }

    #[test]
    fn merge_dedups_case_insensitive_duplicates() {
        let values = vec![
            candidate("penalties", json!("A"), None, "chunk_0"),
            candidate("penalties", json!("a"), None, "chunk_1"),
            candidate("penalties", json!("B"), None, "chunk_2"),
        ];
        let r = resolve_by_merge(&values);
        assert!(r.success);
        let merged = r.selected_value.unwrap();
        assert_eq!(merged.as_array().unwrap().len(), 2);
    }

    #[test]
    fn resolution_summary_counts() {
        let conflicts = detect_conflicts(&[
            candidate("kurum", json!("A"), Some(0.9), "chunk_0"),
            candidate("kurum", json!("B"), Some(0.5), "chunk_1"),
            candidate("not", json!("x"), Some(0.85), "chunk_0"),
            candidate("not", json!("y"), Some(0.82), "chunk_1"),
        ]);
        let (resolved, summary) = resolve_conflicts(&conflicts, &thresholds());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.resolution_rate, 50);
        assert_eq!(resolved.iter().filter(|r| r.needs_review).count(), 1);
    }

    #[test]
    fn assemble_writes_unanimous_fields_and_collects_confidences() {
        let candidates = vec![
            candidate("kurum", json!("Ankara Valiliği"), Some(0.9), "chunk_0"),
            candidate("penalties", json!("%1 gecikme cezası"), Some(0.8), "chunk_0"),
            candidate("penalties", json!("%1 GECİKME CEZASI"), Some(0.7), "chunk_1"),
        ];
        let conflicts = detect_conflicts(&candidates);
        assert!(conflicts.is_empty());

        let mut confidences = BTreeMap::new();
        let analysis = assemble_analysis(&candidates, &conflicts, &mut confidences);

        assert_eq!(analysis["kurum"], json!("Ankara Valiliği"));
        // Collection-strategy field: union of deduped values.
        assert_eq!(analysis["penalties"].as_array().unwrap().len(), 1);
        assert_eq!(confidences.get("kurum"), Some(&0.9));
    }

    #[test]
    fn apply_updates_array_entry_in_place() {
        let mut analysis = json!({
            "dates": [
                {"type": "ihale_tarihi", "value": "old"},
                {"type": "son_teklif_tarihi", "value": "keep"}
            ]
        });
        let resolved = vec![ResolvedConflict {
            field: "dates.ihale_tarihi".to_string(),
            needs_review: false,
            resolution: Resolution {
                strategy: Strategy::HighestConfidence,
                success: true,
                selected_value: Some(json!("15.03.2026")),
                reason: "test".into(),
                warnings: vec![],
                selected_from: None,
            },
        }];
        let mut confidences = BTreeMap::new();
        apply_resolutions(&mut analysis, &resolved, &mut confidences);

        assert_eq!(analysis["dates"][0]["value"], json!("15.03.2026"));
        assert_eq!(analysis["dates"][0]["resolved_by"], json!("highest_confidence"));
        assert_eq!(analysis["dates"][1]["value"], json!("keep"));
    }

    #[test]
    fn apply_skips_failed_resolutions() {
        let mut analysis = json!({"mevcut": "değer"});
        let resolved = vec![ResolvedConflict {
            field: "kurum".to_string(),
            needs_review: true,
            resolution: Resolution {
                strategy: Strategy::ManualReview,
                success: false,
                selected_value: None,
                reason: "ambiguous".into(),
                warnings: vec![],
                selected_from: None,
            },
        }];
        let mut confidences = BTreeMap::new();
        apply_resolutions(&mut analysis, &resolved, &mut confidences);

        assert!(analysis.get("kurum").is_none());
        assert_eq!(analysis["mevcut"], json!("değer"));
    }

    #[test]
    fn nested_path_creates_objects_when_no_array_exists() {
        let mut analysis = json!({});
        set_field_value(&mut analysis, "iletisim.telefon", json!("0312 111 22 33"), None);
        assert_eq!(analysis["iletisim"]["telefon"], json!("0312 111 22 33"));
    }

    #[test]
    fn detected_partial_match_still_resolves_by_strategy() {
        let candidates = vec![
            candidate("sure", json!("12 ay"), Some(0.9), "chunk_0"),
            candidate("sure", json!("süre 12 ay olup uzatılamaz"), Some(0.4), "chunk_1"),
        ];
        let conflicts = detect_conflicts(&candidates);
        assert_eq!(conflicts[0].conflict_type, ConflictType::PartialMatch);
        let r = resolve_conflict(&conflicts[0], &thresholds());
        assert!(r.success);
        assert_eq!(r.selected_value, Some(json!("12 ay")));
    }
}

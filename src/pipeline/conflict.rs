//! Conflict detector: group candidate values by field and flag
//! disagreements.
//!
//! This module detects conflicts, it never resolves them. For each field
//! name appearing in at least one candidate, a conflict is emitted when the
//! set of distinct normalized values has more than one member.
//! Normalization for comparison folds case, whitespace, `.`/`,`
//! punctuation, and common date-separator variants so `15/03/2026` and
//! `15.03.2026` do not count as a disagreement.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::extract::CandidateValue;

/// How the disagreeing values relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// One normalized value contains the other — often a detail-level
    /// difference rather than a contradiction.
    PartialMatch,
    /// The values are entirely different.
    DifferentValues,
}

/// Two or more candidate values for the same field that disagree after
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub field: String,
    pub values: Vec<CandidateValue>,
    pub conflict_type: ConflictType,
}

/// Aggregate view of a document's conflicts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total: usize,
    /// Conflicts per top-level field group (`dates`, `amounts`, ...).
    pub by_field_group: BTreeMap<String, usize>,
    pub partial_matches: usize,
    pub different_values: usize,
    /// Conflicts on date or amount fields, which block bid decisions.
    pub critical_conflicts: usize,
}

static DATE_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2})[-/](\d{2})[-/](\d{4})").expect("static regex"));

/// Normalize a value for comparison: lowercase, date-separator folding,
/// whitespace collapsing, and `.`/`,` stripping.
pub fn normalize_for_comparison(value: &Value) -> String {
    let raw = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let lower = raw.to_lowercase();
    let folded = DATE_SEPARATORS.replace_all(&lower, "$1.$2.$3");
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .collect()
}

/// Detect conflicts across all extraction passes for one document.
pub fn detect_conflicts(candidates: &[CandidateValue]) -> Vec<Conflict> {
    let mut by_field: BTreeMap<&str, Vec<&CandidateValue>> = BTreeMap::new();
    for candidate in candidates {
        if normalize_for_comparison(&candidate.value).is_empty() {
            continue;
        }
        by_field.entry(&candidate.field).or_default().push(candidate);
    }

    let mut conflicts = Vec::new();
    for (field, group) in by_field {
        let mut distinct: Vec<String> = group
            .iter()
            .map(|c| normalize_for_comparison(&c.value))
            .collect();
        distinct.sort();
        distinct.dedup();

        if distinct.len() < 2 {
            continue;
        }

        let partial = distinct.iter().enumerate().any(|(i, a)| {
            distinct[i + 1..]
                .iter()
                .any(|b| a.contains(b.as_str()) || b.contains(a.as_str()))
        });

        conflicts.push(Conflict {
            field: field.to_string(),
            values: group.into_iter().cloned().collect(),
            conflict_type: if partial {
                ConflictType::PartialMatch
            } else {
                ConflictType::DifferentValues
            },
        });
    }

    if !conflicts.is_empty() {
        info!(
            conflicts = conflicts.len(),
            fields = conflicts
                .iter()
                .map(|c| c.field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
                .as_str(),
            "conflicting field values detected"
        );
    }

    conflicts
}

/// Build the aggregate conflict report.
pub fn summarize_conflicts(conflicts: &[Conflict]) -> ConflictSummary {
    let mut summary = ConflictSummary {
        total: conflicts.len(),
        ..Default::default()
    };
    for conflict in conflicts {
        let group = conflict
            .field
            .split('.')
            .next()
            .unwrap_or(&conflict.field)
            .to_string();
        if matches!(group.as_str(), "dates" | "amounts") {
            summary.critical_conflicts += 1;
        }
        *summary.by_field_group.entry(group).or_insert(0) += 1;
        match conflict.conflict_type {
            ConflictType::PartialMatch => summary.partial_matches += 1,
            ConflictType::DifferentValues => summary.different_values += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(field: &str, value: Value, chunk: &str) -> CandidateValue {
        CandidateValue {
            field: field.to_string(),
            value,
            confidence: None,
            source_chunk_id: chunk.to_string(),
            context: None,
        }
    }

    #[test]
    fn normalization_folds_case_whitespace_and_punctuation() {
        assert_eq!(
            normalize_for_comparison(&json!("  45.000.000  TL ")),
            normalize_for_comparison(&json!("45000000 tl"))
        );
        assert_eq!(
            normalize_for_comparison(&json!("15/03/2026")),
            normalize_for_comparison(&json!("15.03.2026"))
        );
        assert_eq!(normalize_for_comparison(&Value::Null), "");
    }

    #[test]
    fn agreeing_values_produce_no_conflict() {
        let candidates = vec![
            candidate("tahmini_bedel", json!("45.000.000 TL"), "chunk_0"),
            candidate("tahmini_bedel", json!("45000000 tl"), "chunk_1"),
        ];
        assert!(detect_conflicts(&candidates).is_empty());
    }

    #[test]
    fn disagreeing_values_produce_one_conflict_with_all_candidates() {
        let candidates = vec![
            candidate("tahmini_bedel", json!("45.000.000 TL"), "chunk_0"),
            candidate("tahmini_bedel", json!("50.000.000 TL"), "chunk_2"),
            candidate("kurum", json!("Ankara Valiliği"), "chunk_0"),
        ];
        let conflicts = detect_conflicts(&candidates);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "tahmini_bedel");
        assert_eq!(conflicts[0].values.len(), 2);
        assert_eq!(conflicts[0].conflict_type, ConflictType::DifferentValues);
    }

    #[test]
    fn containment_is_classified_partial_match() {
        let candidates = vec![
            candidate("sure", json!("12 ay"), "chunk_0"),
            candidate("sure", json!("sözleşme süresi 12 ay olup uzatılamaz"), "chunk_1"),
        ];
        let conflicts = detect_conflicts(&candidates);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::PartialMatch);
    }

    #[test]
    fn empty_values_never_conflict() {
        let candidates = vec![
            candidate("iletisim", Value::Null, "chunk_0"),
            candidate("iletisim", json!(""), "chunk_1"),
            candidate("iletisim", json!("0312 123 45 67"), "chunk_2"),
        ];
        assert!(detect_conflicts(&candidates).is_empty());
    }

    #[test]
    fn summary_counts_groups_and_critical_fields() {
        let conflicts = detect_conflicts(&[
            candidate("dates.ihale_tarihi", json!("15.03.2026"), "chunk_0"),
            candidate("dates.ihale_tarihi", json!("16.03.2026"), "chunk_1"),
            candidate("amounts.yaklasik_maliyet", json!("1.000 TL"), "chunk_0"),
            candidate("amounts.yaklasik_maliyet", json!("2.000 TL"), "chunk_1"),
            candidate("kurum", json!("A Kurumu"), "chunk_0"),
            candidate("kurum", json!("B Kurumu"), "chunk_1"),
        ]);
        let summary = summarize_conflicts(&conflicts);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.critical_conflicts, 2);
        assert_eq!(summary.by_field_group.get("dates"), Some(&1));
        assert_eq!(summary.by_field_group.get("kurum"), Some(&1));
    }
}

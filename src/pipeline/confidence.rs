//! Confidence scorer: classify extracted fields into confidence bands and
//! raise verification flags.
//!
//! Every field with a confidence value lands in exactly one band. Fields
//! below the medium band are collected with an action recommendation;
//! business-critical fields are held to a stricter bar and generate an
//! explicit verification flag whenever they fall below medium, regardless
//! of their regular band. Array-typed fields are scanned per element under
//! an index-qualified name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ConfidenceBands;

/// The four confidence bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    High,
    Medium,
    Low,
    Rejected,
}

/// Classify one confidence value.
pub fn band_for(confidence: f64, bands: &ConfidenceBands) -> Band {
    if confidence >= bands.high {
        Band::High
    } else if confidence >= bands.medium {
        Band::Medium
    } else if confidence >= bands.low {
        Band::Low
    } else {
        Band::Rejected
    }
}

/// What to do about a low-confidence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Verification against the source document recommended.
    Verify,
    /// Too unreliable to use; re-enter by hand.
    ManualEntry,
}

/// One field (or array element) below the medium band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowConfidenceField {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub confidence: f64,
    pub action: RecommendedAction,
}

/// A critical field that fell below the medium band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFlag {
    pub field: String,
    pub confidence: f64,
    pub message: String,
}

/// Band counts over all scored fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub total_fields: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub rejected: usize,
}

/// The scorer's report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Simple mean of all per-field confidences seen; 0 when none.
    pub overall_confidence: f64,
    pub field_confidences: BTreeMap<String, f64>,
    pub high_confidence_fields: Vec<String>,
    pub low_confidence_fields: Vec<LowConfidenceField>,
    pub needs_verification: Vec<VerificationFlag>,
    pub summary: ConfidenceSummary,
}

/// Fields whose absence or unreliability blocks a bid decision.
pub const CRITICAL_IMPORTANCE: &[&str] = &[
    "tahmini_bedel",
    "ihale_tarihi",
    "son_teklif_tarihi",
    "teminat_oranlari",
];

/// Array-typed analysis fields scanned per element.
const ARRAY_FIELDS: &[&str] = &[
    "dates",
    "amounts",
    "penalties",
    "ogun_bilgileri",
    "personel_detaylari",
];

/// Whether a field path names a critical field, directly or as the final
/// path segment (`dates.ihale_tarihi` counts for `ihale_tarihi`).
fn is_critical(field: &str) -> bool {
    CRITICAL_IMPORTANCE.iter().any(|name| {
        field == *name || field.rsplit('.').next() == Some(*name)
    })
}

/// Score every field confidence and scan array fields element-wise.
pub fn analyze_confidence(
    field_confidences: &BTreeMap<String, f64>,
    analysis: &Value,
    bands: &ConfidenceBands,
) -> ConfidenceReport {
    let mut report = ConfidenceReport {
        field_confidences: field_confidences.clone(),
        ..Default::default()
    };

    for (field, &confidence) in field_confidences {
        report.summary.total_fields += 1;
        match band_for(confidence, bands) {
            Band::High => {
                report.summary.high += 1;
                report.high_confidence_fields.push(field.clone());
            }
            Band::Medium => report.summary.medium += 1,
            Band::Low => {
                report.summary.low += 1;
                report.low_confidence_fields.push(LowConfidenceField {
                    field: field.clone(),
                    value: None,
                    confidence,
                    action: RecommendedAction::Verify,
                });
            }
            Band::Rejected => {
                report.summary.rejected += 1;
                report.low_confidence_fields.push(LowConfidenceField {
                    field: field.clone(),
                    value: None,
                    confidence,
                    action: RecommendedAction::ManualEntry,
                });
            }
        }

        // Critical fields get flagged below medium regardless of band.
        if is_critical(field) && confidence < bands.medium {
            report.needs_verification.push(VerificationFlag {
                field: field.clone(),
                confidence,
                message: format!("kritik alan düşük güvenlikli: {field}"),
            });
        }
    }

    // Element-wise scan of array-typed fields.
    for field in ARRAY_FIELDS {
        let Some(items) = analysis.get(field).and_then(Value::as_array) else {
            continue;
        };
        for (i, item) in items.iter().enumerate() {
            let Some(confidence) = item.get("confidence").and_then(Value::as_f64) else {
                continue;
            };
            if confidence < bands.medium {
                report.low_confidence_fields.push(LowConfidenceField {
                    field: format!("{field}[{i}]"),
                    value: item
                        .get("value")
                        .or_else(|| item.get("tur"))
                        .or_else(|| item.get("pozisyon"))
                        .cloned(),
                    confidence,
                    action: if confidence >= bands.low {
                        RecommendedAction::Verify
                    } else {
                        RecommendedAction::ManualEntry
                    },
                });
            }
        }
    }

    if !field_confidences.is_empty() {
        let sum: f64 = field_confidences.values().sum();
        report.overall_confidence =
            (sum / field_confidences.len() as f64 * 100.0).round() / 100.0;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bands() -> ConfidenceBands {
        ConfidenceBands::default()
    }

    fn confidences(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn band_boundaries() {
        let b = bands();
        assert_eq!(band_for(0.85, &b), Band::High);
        assert_eq!(band_for(0.84, &b), Band::Medium);
        assert_eq!(band_for(0.65, &b), Band::Medium);
        assert_eq!(band_for(0.64, &b), Band::Low);
        assert_eq!(band_for(0.45, &b), Band::Low);
        assert_eq!(band_for(0.44, &b), Band::Rejected);
    }

    #[test]
    fn every_field_lands_in_exactly_one_band() {
        let report = analyze_confidence(
            &confidences(&[("a", 0.9), ("b", 0.7), ("c", 0.5), ("d", 0.2)]),
            &json!({}),
            &bands(),
        );
        let s = &report.summary;
        assert_eq!(s.total_fields, 4);
        assert_eq!(s.high + s.medium + s.low + s.rejected, 4);
        assert_eq!(s.high, 1);
        assert_eq!(s.medium, 1);
        assert_eq!(s.low, 1);
        assert_eq!(s.rejected, 1);
    }

    #[test]
    fn actions_split_at_low_band() {
        let report = analyze_confidence(
            &confidences(&[("dogrulanacak", 0.5), ("elle_girilecek", 0.2)]),
            &json!({}),
            &bands(),
        );
        let verify = report
            .low_confidence_fields
            .iter()
            .find(|f| f.field == "dogrulanacak")
            .unwrap();
        assert_eq!(verify.action, RecommendedAction::Verify);
        let manual = report
            .low_confidence_fields
            .iter()
            .find(|f| f.field == "elle_girilecek")
            .unwrap();
        assert_eq!(manual.action, RecommendedAction::ManualEntry);
    }

    #[test]
    fn critical_field_below_medium_is_flagged() {
        let report = analyze_confidence(
            &confidences(&[("tahmini_bedel", 0.5), ("dates.ihale_tarihi", 0.55), ("notlar", 0.5)]),
            &json!({}),
            &bands(),
        );
        let flagged: Vec<&str> = report
            .needs_verification
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert!(flagged.contains(&"tahmini_bedel"));
        assert!(flagged.contains(&"dates.ihale_tarihi"));
        assert!(!flagged.contains(&"notlar"));
    }

    #[test]
    fn critical_field_above_medium_is_not_flagged() {
        let report = analyze_confidence(
            &confidences(&[("tahmini_bedel", 0.7)]),
            &json!({}),
            &bands(),
        );
        assert!(report.needs_verification.is_empty());
    }

    #[test]
    fn array_elements_are_flagged_individually() {
        let analysis = json!({
            "dates": [
                {"type": "ihale_tarihi", "value": "15.03.2026", "confidence": 0.9},
                {"type": "baslangic", "value": "01.04.2026", "confidence": 0.5}
            ],
            "personel_detaylari": [
                {"pozisyon": "aşçı", "adet": 5, "confidence": 0.3}
            ]
        });
        let report = analyze_confidence(&BTreeMap::new(), &analysis, &bands());
        let fields: Vec<&str> = report
            .low_confidence_fields
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert_eq!(fields, vec!["dates[1]", "personel_detaylari[0]"]);
        assert_eq!(
            report.low_confidence_fields[1].action,
            RecommendedAction::ManualEntry
        );
    }

    #[test]
    fn overall_is_simple_mean() {
        let report = analyze_confidence(
            &confidences(&[("a", 0.8), ("b", 0.6)]),
            &json!({}),
            &bands(),
        );
        assert!((report.overall_confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_zero_overall() {
        let report = analyze_confidence(&BTreeMap::new(), &json!({}), &bands());
        assert_eq!(report.overall_confidence, 0.0);
        assert_eq!(report.summary.total_fields, 0);
    }
}

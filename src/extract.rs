//! Language-understanding boundary: candidate values and the extractor seam.
//!
//! The analysis service is a black box behind a narrow contract: it accepts
//! a prompt plus optional inline text/image payloads and returns free-form
//! content. This module owns the pipeline's side of that contract — the
//! [`FieldExtractor`] trait, the [`CandidateValue`] shape every extraction
//! pass produces, and a tolerant parser that lifts candidate values out of
//! free-form service output. Prompt wording is deliberately not specified
//! here; the pipeline only requires that every response is attributable to a
//! `source_chunk_id` so conflict detection can group candidates correctly.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::output::ImageBlock;

/// One extraction pass's opinion about one field.
///
/// Multiple candidates may exist per field name within one document's
/// analysis; the conflict detector groups them by `field`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateValue {
    /// Field path, e.g. `"tahmini_bedel"` or `"dates.ihale_tarihi"`.
    pub field: String,
    pub value: Value,
    /// Extraction confidence in `[0, 1]` when the service reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Chunk the value was extracted from, e.g. `"chunk_2"`.
    pub source_chunk_id: String,
    /// Document-section context tag ("tablo", "paragraf", ...), used by the
    /// source-priority resolution strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One request to the language-understanding service.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    /// Prompt text. Empty means "use the implementor's default extraction
    /// prompt"; targeted re-queries carry a field-specific fallback prompt.
    pub prompt: String,
    /// Inline text payload (one chunk's text, or merged text).
    pub text: String,
    /// Inline image payloads, passed through opaque.
    pub images: Vec<ImageBlock>,
    /// Tag the response's candidates will carry.
    pub source_chunk_id: String,
    /// Optional section-type hint for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Errors from one extraction call. Fatal to the affected call only — the
/// pipeline records the failure and continues with other chunks.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis service returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("analysis response contained no parseable candidates")]
    Empty,
}

/// The extractor seam.
///
/// Implementors perform the service call and parse the free-form response
/// into candidate values. A pre-built implementation can be injected for
/// tests or custom transports, exactly as a caller would inject middleware.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest) -> Result<Vec<CandidateValue>, ExtractError>;
}

// ── Candidate parsing ────────────────────────────────────────────────────

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex"));

/// Lift candidate values out of free-form service output.
///
/// Accepts either a fenced ```json block or bare JSON embedded in prose.
/// Two shapes are understood:
///
/// * an array of candidate objects `[{"field": ..., "value": ...}, ...]`
/// * an object keyed by field name, where each value is a scalar, a
///   `{value, confidence, context}` wrapper, a nested object, or an array
///   of typed entries (`{"type": ..., "value": ...}` becomes
///   `group.type`).
///
/// Unparseable content yields an empty vector — extraction noise is not an
/// error at this layer.
pub fn parse_candidates(
    content: &str,
    source_chunk_id: &str,
    default_context: Option<&str>,
) -> Vec<CandidateValue> {
    let Some(json) = locate_json(content) else {
        debug!("no JSON found in analysis response ({} bytes)", content.len());
        return Vec::new();
    };

    let parsed: Value = match serde_json::from_str(&json) {
        Ok(v) => v,
        Err(e) => {
            warn!("analysis response JSON did not parse: {e}");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    match parsed {
        Value::Array(items) => {
            for item in items {
                if let Some(c) = candidate_from_entry(&item, source_chunk_id, default_context) {
                    out.push(c);
                }
            }
        }
        Value::Object(map) => {
            for (field, value) in map {
                push_field_candidates(&field, value, source_chunk_id, default_context, &mut out);
            }
        }
        _ => {}
    }
    out
}

/// Find the JSON payload inside free-form content: fenced block first, then
/// the widest braced/bracketed span.
fn locate_json(content: &str) -> Option<String> {
    if let Some(caps) = JSON_FENCE.captures(content) {
        return Some(caps[1].to_string());
    }
    let start = content.find(['{', '['])?;
    let close = match content.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = content.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(content[start..=end].to_string())
}

/// Map one array element shaped `{"field": ..., "value": ...}`.
fn candidate_from_entry(
    item: &Value,
    source_chunk_id: &str,
    default_context: Option<&str>,
) -> Option<CandidateValue> {
    let obj = item.as_object()?;
    let field = obj.get("field")?.as_str()?.to_string();
    let value = obj.get("value")?.clone();
    Some(CandidateValue {
        field,
        value,
        confidence: obj.get("confidence").and_then(Value::as_f64),
        source_chunk_id: source_chunk_id.to_string(),
        context: obj
            .get("context")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| default_context.map(str::to_string)),
    })
}

/// Map one `field: value` pair from an object-shaped response.
fn push_field_candidates(
    field: &str,
    value: Value,
    source_chunk_id: &str,
    default_context: Option<&str>,
    out: &mut Vec<CandidateValue>,
) {
    match value {
        // Typed-entry arrays become `group.type` candidates so the conflict
        // detector can compare like with like across chunks.
        Value::Array(items) => {
            for item in items {
                let (sub, inner, confidence, context) = match item.as_object() {
                    Some(obj) => (
                        obj.get("type").and_then(Value::as_str).map(str::to_string),
                        obj.get("value").cloned().unwrap_or_else(|| item.clone()),
                        obj.get("confidence").and_then(Value::as_f64),
                        obj.get("context").and_then(Value::as_str).map(str::to_string),
                    ),
                    None => (None, item.clone(), None, None),
                };
                let qualified = match sub {
                    Some(t) => format!("{field}.{t}"),
                    None => field.to_string(),
                };
                out.push(CandidateValue {
                    field: qualified,
                    value: inner,
                    confidence,
                    source_chunk_id: source_chunk_id.to_string(),
                    context: context.or_else(|| default_context.map(str::to_string)),
                });
            }
        }
        Value::Object(ref obj) if obj.contains_key("value") => {
            out.push(CandidateValue {
                field: field.to_string(),
                value: obj.get("value").cloned().unwrap_or(Value::Null),
                confidence: obj.get("confidence").and_then(Value::as_f64),
                source_chunk_id: source_chunk_id.to_string(),
                context: obj
                    .get("context")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| default_context.map(str::to_string)),
            });
        }
        other => out.push(CandidateValue {
            field: field.to_string(),
            value: other,
            confidence: None,
            source_chunk_id: source_chunk_id.to_string(),
            context: default_context.map(str::to_string),
        }),
    }
}

// ── HTTP transport ───────────────────────────────────────────────────────

/// Reference [`FieldExtractor`] over HTTP.
///
/// Posts the request as JSON to `{base_url}/v1/extract`, treats the
/// response body as free-form content, and parses candidates out of it.
pub struct HttpExtractor {
    base_url: String,
    http: reqwest::Client,
}

impl HttpExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpExtractor {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FieldExtractor for HttpExtractor {
    async fn extract(&self, request: ExtractionRequest) -> Result<Vec<CandidateValue>, ExtractError> {
        let url = format!("{}/v1/extract", self.base_url);
        let response = self.http.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        let candidates = parse_candidates(&body, &request.source_chunk_id, request.context.as_deref());
        if candidates.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_candidate_array() {
        let content = r#"Here is what I found:
```json
[
  {"field": "tahmini_bedel", "value": "45.000.000 TL", "confidence": 0.7, "context": "tablo"},
  {"field": "dates.ihale_tarihi", "value": "15.03.2026", "confidence": 0.9}
]
```"#;
        let candidates = parse_candidates(content, "chunk_1", None);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].field, "tahmini_bedel");
        assert_eq!(candidates[0].confidence, Some(0.7));
        assert_eq!(candidates[0].context.as_deref(), Some("tablo"));
        assert_eq!(candidates[1].source_chunk_id, "chunk_1");
    }

    #[test]
    fn parses_object_shape_with_wrappers_and_typed_arrays() {
        let content = r#"{
            "tahmini_bedel": {"value": "50.000.000 TL", "confidence": 0.6, "context": "paragraf"},
            "kurum": "Ankara Valiligi",
            "dates": [
                {"type": "ihale_tarihi", "value": "15.03.2026", "confidence": 0.85},
                {"type": "son_teklif_tarihi", "value": "14.03.2026"}
            ]
        }"#;
        let candidates = parse_candidates(content, "chunk_0", Some("idari"));
        let fields: Vec<&str> = candidates.iter().map(|c| c.field.as_str()).collect();
        assert!(fields.contains(&"tahmini_bedel"));
        assert!(fields.contains(&"kurum"));
        assert!(fields.contains(&"dates.ihale_tarihi"));
        assert!(fields.contains(&"dates.son_teklif_tarihi"));

        let kurum = candidates.iter().find(|c| c.field == "kurum").unwrap();
        assert_eq!(kurum.value, json!("Ankara Valiligi"));
        assert_eq!(kurum.context.as_deref(), Some("idari"));

        let tarih = candidates.iter().find(|c| c.field == "dates.ihale_tarihi").unwrap();
        assert_eq!(tarih.confidence, Some(0.85));
    }

    #[test]
    fn bare_json_without_fence_is_found() {
        let content = "model says: {\"sure\": \"12 ay\"} — done";
        let candidates = parse_candidates(content, "chunk_3", None);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].field, "sure");
        assert_eq!(candidates[0].value, json!("12 ay"));
    }

    #[test]
    fn garbage_yields_empty_not_error() {
        assert!(parse_candidates("no json here at all", "chunk_0", None).is_empty());
        assert!(parse_candidates("{broken json", "chunk_0", None).is_empty());
    }
}

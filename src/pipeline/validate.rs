//! Field validator: critical-field completeness and re-query chunk
//! selection.
//!
//! A fixed registry lists the fields a tender analysis must contain before
//! it can be marked complete. Validation never throws — gaps are data: each
//! missing field is reported with a reason and a ranked list of document
//! chunks worth re-querying. An empty relevant-chunk list is a valid
//! outcome; the field simply stays missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::output::ChunkResult;

/// Document-section types the caller may know about an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    /// İdari şartname — administrative specification.
    AdminSpec,
    /// Teknik şartname — technical specification.
    TechSpec,
    /// Birim fiyat cetveli — unit-price schedule.
    UnitPrice,
    /// Sözleşme tasarısı — draft contract.
    Contract,
    /// İhale ilanı — tender announcement.
    Announcement,
}

impl DocType {
    /// Parse Turkish and English aliases, e.g. from an upload form.
    pub fn parse(s: &str) -> Option<DocType> {
        let n = s.to_lowercase();
        if n.contains("admin") || n.contains("idari") {
            Some(DocType::AdminSpec)
        } else if n.contains("tech") || n.contains("teknik") {
            Some(DocType::TechSpec)
        } else if n.contains("unit_price") || n.contains("birim_fiyat") {
            Some(DocType::UnitPrice)
        } else if n.contains("contract") || n.contains("sozlesme") || n.contains("sözleşme") {
            Some(DocType::Contract)
        } else if n.contains("ilan") || n.contains("announcement") {
            Some(DocType::Announcement)
        } else {
            None
        }
    }
}

/// Registry entry for one business-critical field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Sub-fields that must be present for the field to count as complete.
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// Document-section types where the field is normally found.
    pub sources: &'static [&'static str],
    /// Content keywords marking a chunk as worth re-querying.
    pub keywords: &'static [&'static str],
    /// Prompt used for targeted re-extraction when the field is missing.
    pub fallback_prompt: &'static str,
}

/// The fields a catering-tender analysis must contain.
pub const CRITICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "iletisim",
        required: &["telefon", "adres"],
        optional: &["email", "yetkili", "fax"],
        sources: &["idari_sartname", "ilan", "idari"],
        keywords: &["telefon", "adres", "email", "@"],
        fallback_prompt: "Bu metinde İLETİŞİM BİLGİLERİNİ bul: telefon numarası, email adresi, \
adres (il, ilçe, cadde/sokak), yetkili kişi adı. JSON formatında döndür: \
{ \"iletisim\": { \"telefon\": \"...\", \"email\": \"...\", \"adres\": \"...\", \"yetkili\": \"...\" } } \
Bulamadıysan o alanı \"Belirtilmemiş\" yaz.",
    },
    FieldSpec {
        name: "teminat_oranlari",
        required: &["gecici", "kesin"],
        optional: &["ek_kesin"],
        sources: &["idari_sartname", "sozlesme", "idari"],
        keywords: &["teminat", "geçici", "kesin"],
        fallback_prompt: "Bu metinde TEMİNAT ORANLARINI bul: geçici teminat (genellikle %3), \
kesin teminat (genellikle %6). JSON formatında döndür: \
{ \"teminat_oranlari\": { \"gecici\": \"%3\", \"kesin\": \"%6\" } } Bulamadıysan \"Belirtilmemiş\" yaz.",
    },
    FieldSpec {
        name: "servis_saatleri",
        required: &["kahvalti", "ogle", "aksam"],
        optional: &["ara_ogun", "gece", "sahur"],
        sources: &["teknik_sartname", "teknik"],
        keywords: &["saat", "servis", "kahvaltı", "öğle"],
        fallback_prompt: "Bu metinde SERVİS SAATLERİNİ bul: kahvaltı, öğle ve akşam yemeği \
saatleri. JSON formatında döndür: \
{ \"servis_saatleri\": { \"kahvalti\": \"07:00-08:30\", \"ogle\": \"12:00-13:30\", \"aksam\": \"17:30-19:00\" } } \
Bulamadıysan \"Belirtilmemiş\" yaz.",
    },
    FieldSpec {
        name: "tahmini_bedel",
        required: &[],
        optional: &[],
        sources: &["ilan", "idari_sartname", "idari"],
        keywords: &["bedel", "maliyet", "yaklaşık", "tutar"],
        fallback_prompt: "Bu metinde TAHMİNİ BEDEL / YAKLAŞIK MALİYET değerini bul. Genellikle \
\"Yaklaşık maliyet\", \"Tahmini bedel\" veya \"İşin bedeli\" olarak geçer; TL cinsinden tutar \
olmalı. JSON formatında döndür: { \"tahmini_bedel\": \"45.000.000,00 TL\" } \
Bulamadıysan \"Belirtilmemiş\" yaz.",
    },
    FieldSpec {
        name: "mali_kriterler",
        required: &["cari_oran", "ozkaynak_orani"],
        optional: &["is_deneyimi", "banka_referans"],
        sources: &["idari_sartname", "idari"],
        keywords: &["cari oran", "özkaynak", "iş deneyim", "mali yeterlik"],
        fallback_prompt: "Bu metinde MALİ YETERLİK KRİTERLERİNİ bul: cari oran (örn: 0.75), \
özkaynak oranı (örn: 0.15), iş deneyimi (örn: %25). JSON formatında döndür: \
{ \"mali_kriterler\": { \"cari_oran\": \"0.75\", \"ozkaynak_orani\": \"0.15\", \"is_deneyimi\": \"%25\" } }",
    },
];

/// Look up a registry entry by field name.
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    CRITICAL_FIELDS.iter().find(|f| f.name == name)
}

/// Placeholder values the extraction service emits when it found nothing,
/// plus template artifacts it sometimes copies from prompts. None of these
/// count as real content.
const KNOWN_PLACEHOLDERS: &[&str] = &[
    "0xxx xxx xx xx",
    "email@domain.com",
    "xxx@domain.com",
    "tam adres",
    "ad soyad",
    "bulunamadı",
    "belirtilmemiş",
    "bilinmiyor",
    "mevcut değil",
    "yok",
    "sözleşmede belirtilecek tutar",
    "sözleşmede belirtilecek",
    "hesaplanacak",
    "teklif edilecek",
    "rakam ve yazıyla",
];

/// Whether a string is a known placeholder sentinel.
pub fn is_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty()
        || KNOWN_PLACEHOLDERS
            .iter()
            .any(|p| trimmed.to_lowercase() == *p)
}

/// Whether a value carries real content: non-null, non-empty after
/// trimming, not a placeholder. Nested objects have content if any leaf
/// does; arrays if non-empty.
pub fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !is_placeholder(s),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(has_content),
        _ => true,
    }
}

/// Why a critical field is absent from the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The key does not exist at all.
    Missing,
    /// The key exists but is blank or a placeholder.
    Empty,
}

/// One missing critical field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingField {
    pub field: String,
    pub reason: MissingReason,
}

/// Completeness report for one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub missing: Vec<MissingField>,
    pub filled: Vec<String>,
    /// `filled / checked`, 1.0 when nothing was checked.
    pub completeness: f64,
    /// True when the document type carries no critical fields at all.
    pub skipped: bool,
}

/// Before/after view across the fallback-fill step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub before: ValidationReport,
    pub after: ValidationReport,
    /// Fields the fallback extraction managed to fill.
    pub filled_by_fallback: Vec<String>,
}

/// Which critical fields apply to a document type.
///
/// Unit-price schedules carry none; a technical spec only promises service
/// hours; announcements carry contact data and the estimate. An unknown
/// type checks everything.
pub fn fields_for_doc_type(doc_type: Option<DocType>) -> Vec<&'static FieldSpec> {
    let names: &[&str] = match doc_type {
        None | Some(DocType::AdminSpec) => {
            return CRITICAL_FIELDS.iter().collect();
        }
        Some(DocType::TechSpec) => &["servis_saatleri"],
        Some(DocType::UnitPrice) => &[],
        Some(DocType::Contract) => &["teminat_oranlari", "mali_kriterler"],
        Some(DocType::Announcement) => &["iletisim", "tahmini_bedel"],
    };
    names.iter().filter_map(|n| field_spec(n)).collect()
}

/// Check the critical fields applicable to `doc_type` for real content.
pub fn validate_critical_fields(analysis: &Value, doc_type: Option<DocType>) -> ValidationReport {
    let fields = fields_for_doc_type(doc_type);

    if fields.is_empty() {
        info!(?doc_type, "no critical fields for this document type, validation skipped");
        return ValidationReport {
            valid: true,
            missing: Vec::new(),
            filled: Vec::new(),
            completeness: 1.0,
            skipped: true,
        };
    }

    let mut missing = Vec::new();
    let mut filled = Vec::new();

    for spec in &fields {
        match analysis.get(spec.name) {
            None => missing.push(MissingField {
                field: spec.name.to_string(),
                reason: MissingReason::Missing,
            }),
            Some(value) if !has_content(value) => missing.push(MissingField {
                field: spec.name.to_string(),
                reason: MissingReason::Empty,
            }),
            Some(_) => filled.push(spec.name.to_string()),
        }
    }

    let completeness = filled.len() as f64 / fields.len() as f64;

    info!(
        checked = fields.len(),
        filled = filled.len(),
        missing = missing.len(),
        completeness = format!("{:.1}%", completeness * 100.0).as_str(),
        "critical-field validation"
    );

    ValidationReport {
        valid: missing.is_empty(),
        missing,
        filled,
        completeness,
        skipped: false,
    }
}

/// Rank chunks worth re-querying for a missing field.
///
/// A chunk scores for naming one of the field's known source-section types
/// and for containing its content keywords; at most five chunks are
/// returned, best first. No match at all is a valid empty result.
pub fn find_relevant_chunks<'a>(
    chunks: &'a [ChunkResult],
    spec: &FieldSpec,
) -> Vec<&'a ChunkResult> {
    let mut scored: Vec<(usize, &ChunkResult)> = chunks
        .iter()
        .filter_map(|chunk| {
            let text = chunk.text.to_lowercase();
            let mut score = 0;
            for source in spec.sources {
                if text.contains(source) {
                    score += 2;
                }
            }
            for keyword in spec.keywords {
                if text.contains(keyword) {
                    score += 1;
                }
            }
            (score > 0).then_some((score, chunk))
        })
        .collect();

    // Best score first; earlier chunk wins ties.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.chunk_index.cmp(&b.1.chunk_index)));
    scored.into_iter().take(5).map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(index: usize, text: &str) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            page_start: index * 10,
            page_end: index * 10 + 10,
            text: text.to_string(),
            tables: vec![],
            images: vec![],
            raw: None,
        }
    }

    #[test]
    fn full_analysis_is_valid_with_completeness_one() {
        let analysis = json!({
            "iletisim": {"telefon": "0312 111 22 33", "adres": "Çankaya/Ankara"},
            "teminat_oranlari": {"gecici": "%3", "kesin": "%6"},
            "servis_saatleri": {"kahvalti": "07:00-08:30", "ogle": "12:00-13:30", "aksam": "18:00-19:30"},
            "tahmini_bedel": "45.000.000 TL",
            "mali_kriterler": {"cari_oran": "0.75", "ozkaynak_orani": "0.15"}
        });
        let report = validate_critical_fields(&analysis, None);
        assert!(report.valid);
        assert_eq!(report.completeness, 1.0);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn absent_key_reports_missing_blank_key_reports_empty() {
        let analysis = json!({
            "iletisim": {"telefon": "", "adres": ""},
            "teminat_oranlari": {"gecici": "%3", "kesin": "%6"},
            "servis_saatleri": {"kahvalti": "07:00"},
            "mali_kriterler": {"cari_oran": "0.75"}
            // tahmini_bedel absent entirely
        });
        let report = validate_critical_fields(&analysis, None);
        assert!(!report.valid);

        let iletisim = report.missing.iter().find(|m| m.field == "iletisim").unwrap();
        assert_eq!(iletisim.reason, MissingReason::Empty);

        let bedel = report.missing.iter().find(|m| m.field == "tahmini_bedel").unwrap();
        assert_eq!(bedel.reason, MissingReason::Missing);
    }

    #[test]
    fn placeholders_do_not_count_as_content() {
        assert!(!has_content(&json!("Belirtilmemiş")));
        assert!(!has_content(&json!("  ")));
        assert!(!has_content(&json!(null)));
        assert!(!has_content(&json!({"telefon": "Belirtilmemiş", "adres": ""})));
        assert!(has_content(&json!({"telefon": "Belirtilmemiş", "adres": "Ulus/Ankara"})));
        assert!(has_content(&json!(42)));
    }

    #[test]
    fn doc_type_scopes_checked_fields() {
        let empty = json!({});

        // Unit-price docs skip validation entirely.
        let report = validate_critical_fields(&empty, Some(DocType::UnitPrice));
        assert!(report.valid);
        assert!(report.skipped);
        assert_eq!(report.completeness, 1.0);

        // A technical spec only owes service hours.
        let report = validate_critical_fields(&empty, Some(DocType::TechSpec));
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].field, "servis_saatleri");

        // Contracts owe guarantees and financial criteria.
        let report = validate_critical_fields(&empty, Some(DocType::Contract));
        let fields: Vec<&str> = report.missing.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(fields, vec!["teminat_oranlari", "mali_kriterler"]);
    }

    #[test]
    fn doc_type_parsing_accepts_aliases() {
        assert_eq!(DocType::parse("idari_sartname"), Some(DocType::AdminSpec));
        assert_eq!(DocType::parse("zeyilname_tech_spec"), Some(DocType::TechSpec));
        assert_eq!(DocType::parse("birim_fiyat"), Some(DocType::UnitPrice));
        assert_eq!(DocType::parse("sozlesme"), Some(DocType::Contract));
        assert_eq!(DocType::parse("ilan"), Some(DocType::Announcement));
        assert_eq!(DocType::parse("garip"), None);
    }

    #[test]
    fn relevant_chunks_are_ranked_and_capped() {
        let spec = field_spec("teminat_oranlari").unwrap();
        let chunks = vec![
            chunk(0, "genel hükümler ve tanımlar"),
            chunk(1, "geçici teminat %3, kesin teminat %6 oranında alınır"),
            chunk(2, "teminat mektubu bankadan alınmalıdır"),
            chunk(3, "yemek listesi ve gramajlar"),
        ];
        let relevant = find_relevant_chunks(&chunks, spec);
        assert_eq!(relevant.len(), 2);
        // Chunk 1 hits three keywords, chunk 2 one.
        assert_eq!(relevant[0].chunk_index, 1);
        assert_eq!(relevant[1].chunk_index, 2);
    }

    #[test]
    fn no_keyword_match_yields_empty_list() {
        let spec = field_spec("servis_saatleri").unwrap();
        let chunks = vec![chunk(0, "tamamen ilgisiz içerik")];
        assert!(find_relevant_chunks(&chunks, spec).is_empty());
    }

    #[test]
    fn at_most_five_chunks_returned() {
        let spec = field_spec("tahmini_bedel").unwrap();
        let chunks: Vec<ChunkResult> = (0..8)
            .map(|i| chunk(i, "yaklaşık maliyet ve bedel bilgisi"))
            .collect();
        assert_eq!(find_relevant_chunks(&chunks, spec).len(), 5);
    }
}

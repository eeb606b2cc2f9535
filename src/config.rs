//! Configuration for a tender-document analysis run.
//!
//! All pipeline behaviour is controlled through [`AnalyzeConfig`], built via
//! its [`AnalyzeConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ. Global defaults are
//! values on this struct, never process-wide environment state — the
//! pipeline stays testable and reentrant for concurrent runs.

use crate::convert::DocumentConverter;
use crate::error::AnalyzeError;
use crate::extract::FieldExtractor;
use crate::pipeline::validate::DocType;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Thresholds used by the highest-confidence and most-detailed resolution
/// strategies.
///
/// The defaults are carried over from the system this pipeline replaces and
/// are kept as configuration rather than re-derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolutionThresholds {
    /// Minimum confidence gap between the top two candidates for an
    /// automatic pick. Default: 0.15.
    pub confidence_gap: f64,
    /// When the gap is small and both candidates are at or above this,
    /// the field is ambiguous-but-confident and unsafe to auto-pick.
    /// Default: 0.80.
    pub both_high: f64,
    /// When the gap is small, the top candidate is still accepted (with a
    /// low-confidence warning) if it reaches this floor. Default: 0.60.
    pub accept_floor: f64,
    /// The most-detailed strategy refuses candidates below this. Default: 0.50.
    pub detail_floor: f64,
}

impl Default for ResolutionThresholds {
    fn default() -> Self {
        ResolutionThresholds {
            confidence_gap: 0.15,
            both_high: 0.80,
            accept_floor: 0.60,
            detail_floor: 0.50,
        }
    }
}

/// Confidence band boundaries used by the scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceBands {
    /// Reliable data. Default: 0.85.
    pub high: f64,
    /// Use with care; anything below generates follow-up. Default: 0.65.
    pub medium: f64,
    /// Verification recommended. Default: 0.45.
    pub low: f64,
    /// Documented rejection boundary. Default: 0.30.
    pub reject: f64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        ConfidenceBands {
            high: 0.85,
            medium: 0.65,
            low: 0.45,
            reject: 0.30,
        }
    }
}

/// Configuration for one analysis run.
///
/// Built via [`AnalyzeConfig::builder()`] or [`AnalyzeConfig::default()`].
///
/// # Example
/// ```rust
/// use tender_analyzer::AnalyzeConfig;
///
/// let config = AnalyzeConfig::builder()
///     .chunk_size_pages(10)
///     .parallelism(3)
///     .conversion_base_url("http://localhost:5001")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalyzeConfig {
    /// Base URL of the document-conversion service.
    pub conversion_base_url: String,

    /// Pages per chunk when splitting large documents. Default: 10.
    ///
    /// The conversion service handles 10-page sub-documents comfortably
    /// within its synchronous request limit; larger chunks push individual
    /// requests toward the async path and lose the parallel speedup.
    pub chunk_size_pages: usize,

    /// Chunks converted concurrently per batch. Default: 3.
    ///
    /// The dispatcher submits one batch at a time and waits for the whole
    /// batch before starting the next, bounding peak external concurrency
    /// (request rate and local memory) while keeping close-to-linear
    /// speedup up to this limit.
    pub parallelism: usize,

    /// PDFs larger than this go through the chunked parallel path.
    /// Default: 5 MiB.
    pub chunked_threshold_bytes: u64,

    /// Unsplit documents larger than this use the asynchronous
    /// submit → poll → fetch protocol instead of the sync endpoint.
    /// Default: 2 MiB.
    pub async_threshold_bytes: u64,

    /// Fixed interval between status polls for async jobs. Default: 3 s.
    pub poll_interval: Duration,

    /// Maximum total wait for an async job before the dispatcher abandons
    /// it with a timeout error. Default: 600 s.
    pub max_poll_wait: Duration,

    /// Per-request timeout for synchronous conversion calls. Default: 120 s.
    pub request_timeout: Duration,

    /// Document-section type, when the caller knows it. Scopes which
    /// critical fields the validator checks.
    pub doc_type: Option<DocType>,

    /// Attempt targeted re-extraction for missing critical fields.
    /// Default: true.
    pub refill_missing: bool,

    /// Conflict-resolution thresholds.
    pub thresholds: ResolutionThresholds,

    /// Confidence band boundaries.
    pub bands: ConfidenceBands,

    /// Pre-built conversion backend. Takes precedence over
    /// `conversion_base_url`; useful in tests or when the caller needs
    /// custom middleware.
    pub converter: Option<Arc<dyn DocumentConverter>>,

    /// The language-understanding boundary. Required by `analyze()`.
    pub extractor: Option<Arc<dyn FieldExtractor>>,

    /// Optional progress event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        AnalyzeConfig {
            conversion_base_url: "http://localhost:5001".to_string(),
            chunk_size_pages: 10,
            parallelism: 3,
            chunked_threshold_bytes: 5 * 1024 * 1024,
            async_threshold_bytes: 2 * 1024 * 1024,
            poll_interval: Duration::from_secs(3),
            max_poll_wait: Duration::from_secs(600),
            request_timeout: Duration::from_secs(120),
            doc_type: None,
            refill_missing: true,
            thresholds: ResolutionThresholds::default(),
            bands: ConfidenceBands::default(),
            converter: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeConfig")
            .field("conversion_base_url", &self.conversion_base_url)
            .field("chunk_size_pages", &self.chunk_size_pages)
            .field("parallelism", &self.parallelism)
            .field("chunked_threshold_bytes", &self.chunked_threshold_bytes)
            .field("async_threshold_bytes", &self.async_threshold_bytes)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_wait", &self.max_poll_wait)
            .field("doc_type", &self.doc_type)
            .field("refill_missing", &self.refill_missing)
            .field("thresholds", &self.thresholds)
            .field("bands", &self.bands)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn DocumentConverter>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn FieldExtractor>"))
            .finish()
    }
}

impl AnalyzeConfig {
    /// Create a new builder for `AnalyzeConfig`.
    pub fn builder() -> AnalyzeConfigBuilder {
        AnalyzeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzeConfig`].
#[derive(Debug)]
pub struct AnalyzeConfigBuilder {
    config: AnalyzeConfig,
}

impl AnalyzeConfigBuilder {
    pub fn conversion_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.conversion_base_url = url.into();
        self
    }

    pub fn chunk_size_pages(mut self, pages: usize) -> Self {
        self.config.chunk_size_pages = pages.max(1);
        self
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.parallelism = n.max(1);
        self
    }

    pub fn chunked_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.chunked_threshold_bytes = bytes;
        self
    }

    pub fn async_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.async_threshold_bytes = bytes;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_wait(mut self, wait: Duration) -> Self {
        self.config.max_poll_wait = wait;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn doc_type(mut self, doc_type: DocType) -> Self {
        self.config.doc_type = Some(doc_type);
        self
    }

    pub fn refill_missing(mut self, v: bool) -> Self {
        self.config.refill_missing = v;
        self
    }

    pub fn thresholds(mut self, thresholds: ResolutionThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn bands(mut self, bands: ConfidenceBands) -> Self {
        self.config.bands = bands;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzeConfig, AnalyzeError> {
        let c = &self.config;
        if c.parallelism == 0 {
            return Err(AnalyzeError::InvalidConfig("parallelism must be ≥ 1".into()));
        }
        if c.chunk_size_pages == 0 {
            return Err(AnalyzeError::InvalidConfig("chunk size must be ≥ 1 page".into()));
        }
        let t = c.thresholds;
        for (name, v) in [
            ("confidence_gap", t.confidence_gap),
            ("both_high", t.both_high),
            ("accept_floor", t.accept_floor),
            ("detail_floor", t.detail_floor),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AnalyzeError::InvalidConfig(format!(
                    "threshold {name} must be in [0, 1], got {v}"
                )));
            }
        }
        let b = c.bands;
        if !(b.reject <= b.low && b.low <= b.medium && b.medium <= b.high) {
            return Err(AnalyzeError::InvalidConfig(
                "confidence bands must be ordered reject ≤ low ≤ medium ≤ high".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = AnalyzeConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size_pages, 10);
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.thresholds.confidence_gap, 0.15);
        assert_eq!(config.bands.high, 0.85);
    }

    #[test]
    fn parallelism_is_clamped_to_one() {
        let config = AnalyzeConfig::builder().parallelism(0).build().unwrap();
        assert_eq!(config.parallelism, 1);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let result = AnalyzeConfig::builder()
            .thresholds(ResolutionThresholds {
                confidence_gap: 1.5,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(AnalyzeError::InvalidConfig(_))));
    }

    #[test]
    fn misordered_bands_are_rejected() {
        let result = AnalyzeConfig::builder()
            .bands(ConfidenceBands {
                high: 0.4,
                medium: 0.65,
                low: 0.45,
                reject: 0.3,
            })
            .build();
        assert!(matches!(result, Err(AnalyzeError::InvalidConfig(_))));
    }
}

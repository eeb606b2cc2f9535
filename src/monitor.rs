//! Per-run pipeline telemetry.
//!
//! [`PipelineMonitor`] records explicit stage boundaries, external-call
//! counts split by provider, and chunk success/failure counts, then emits a
//! [`PipelineReport`] at finalization. `start_stage` auto-closes any open
//! stage — stages cannot overlap, enforced by closing rather than by
//! panicking.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// External-call providers tracked by the monitor.
///
/// The conversion service is the cheap provider; the language-understanding
/// service is the expensive one. The ratio between them drives the API
/// efficiency rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Conversion,
    Analysis,
}

/// Qualitative rating of the cheap-to-expensive call ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiEfficiency {
    Excellent,
    Good,
    Moderate,
    NeedsOptimization,
    NotAvailable,
}

/// One closed stage.
#[derive(Debug, Clone)]
struct StageRecord {
    name: String,
    duration_ms: u64,
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub failed_chunks: usize,
    pub conversion_calls: usize,
    pub analysis_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub errors: Vec<RecordedError>,
}

/// One recorded non-fatal error, with the stage it occurred in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedError {
    pub stage: String,
    pub message: String,
}

/// Per-stage entry in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub duration_ms: u64,
    /// Share of total stage time, rounded to whole percent.
    pub percentage: u32,
}

/// Throughput and quality figures derived from the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub chunks_per_second: f64,
    /// Percent of attempted chunks that converted.
    pub success_rate: u32,
    pub api_efficiency: ApiEfficiency,
}

/// The final telemetry report for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub document_id: String,
    pub total_duration_ms: u64,
    pub total_duration_readable: String,
    pub stages: Vec<StageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_stage: Option<StageReport>,
    pub metrics: RunMetrics,
    pub performance: PerformanceSummary,
}

/// Pipeline performance recorder for one run.
pub struct PipelineMonitor {
    document_id: String,
    started: Instant,
    stages: Vec<StageRecord>,
    current: Option<(String, Instant)>,
    metrics: RunMetrics,
}

impl PipelineMonitor {
    pub fn new(document_id: impl Into<String>) -> Self {
        PipelineMonitor {
            document_id: document_id.into(),
            started: Instant::now(),
            stages: Vec::new(),
            current: None,
            metrics: RunMetrics::default(),
        }
    }

    /// Open a new stage, closing any currently open one first.
    pub fn start_stage(&mut self, name: &str) {
        self.end_stage();
        debug!(
            document_id = self.document_id.as_str(),
            stage = name,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "stage started"
        );
        self.current = Some((name.to_string(), Instant::now()));
    }

    /// Close the currently open stage, if any.
    pub fn end_stage(&mut self) {
        if let Some((name, start)) = self.current.take() {
            let duration_ms = start.elapsed().as_millis() as u64;
            debug!(
                document_id = self.document_id.as_str(),
                stage = name.as_str(),
                duration_ms,
                "stage finished"
            );
            self.stages.push(StageRecord { name, duration_ms });
        }
    }

    /// Record one external call.
    pub fn record_api_call(&mut self, provider: Provider) {
        match provider {
            Provider::Conversion => self.metrics.conversion_calls += 1,
            Provider::Analysis => self.metrics.analysis_calls += 1,
        }
    }

    /// Record token usage reported by the analysis provider.
    pub fn record_tokens(&mut self, input: u64, output: u64) {
        self.metrics.input_tokens += input;
        self.metrics.output_tokens += output;
    }

    /// Record one chunk attempt.
    pub fn record_chunk(&mut self, success: bool) {
        self.metrics.total_chunks += 1;
        if success {
            self.metrics.processed_chunks += 1;
        } else {
            self.metrics.failed_chunks += 1;
        }
    }

    /// Record a non-fatal error.
    pub fn record_error(&mut self, stage: &str, message: impl Into<String>) {
        self.metrics.errors.push(RecordedError {
            stage: stage.to_string(),
            message: message.into(),
        });
    }

    /// Close the run and produce the report.
    pub fn generate_report(mut self) -> PipelineReport {
        self.end_stage();

        let total_duration_ms = self.started.elapsed().as_millis() as u64;
        let total_stage_ms: u64 = self.stages.iter().map(|s| s.duration_ms).sum();

        let stages: Vec<StageReport> = self
            .stages
            .iter()
            .map(|s| StageReport {
                name: s.name.clone(),
                duration_ms: s.duration_ms,
                percentage: if total_stage_ms > 0 {
                    ((s.duration_ms as f64 / total_stage_ms as f64) * 100.0).round() as u32
                } else {
                    0
                },
            })
            .collect();

        let slowest_stage = stages
            .iter()
            .max_by_key(|s| s.duration_ms)
            .cloned();

        let m = &self.metrics;
        let chunks_per_second = if m.total_chunks > 0 && total_duration_ms > 0 {
            ((m.total_chunks as f64 / (total_duration_ms as f64 / 1000.0)) * 100.0).round() / 100.0
        } else {
            0.0
        };
        let success_rate = if m.total_chunks > 0 {
            ((m.processed_chunks as f64 / m.total_chunks as f64) * 100.0).round() as u32
        } else {
            100
        };

        let report = PipelineReport {
            document_id: self.document_id.clone(),
            total_duration_ms,
            total_duration_readable: format_duration(total_duration_ms),
            stages,
            slowest_stage,
            metrics: self.metrics.clone(),
            performance: PerformanceSummary {
                chunks_per_second,
                success_rate,
                api_efficiency: api_efficiency(&self.metrics),
            },
        };

        info!(
            document_id = report.document_id.as_str(),
            duration = report.total_duration_readable.as_str(),
            chunks = format!("{}/{}", m.processed_chunks, m.total_chunks).as_str(),
            conversion_calls = m.conversion_calls,
            analysis_calls = m.analysis_calls,
            slowest = report
                .slowest_stage
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("-"),
            "pipeline run finished"
        );

        report
    }
}

/// Human-readable duration: `850ms`, `12.3s`, `2m 5s`.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }
    if ms < 60_000 {
        return format!("{:.1}s", ms as f64 / 1000.0);
    }
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000 + 500) / 1000;
    format!("{minutes}m {seconds}s")
}

/// Rating from the cheap-provider call ratio: the more work the conversion
/// service absorbs, the fewer expensive analysis calls per document.
fn api_efficiency(metrics: &RunMetrics) -> ApiEfficiency {
    let total = metrics.conversion_calls + metrics.analysis_calls;
    if total == 0 {
        return ApiEfficiency::NotAvailable;
    }
    let cheap_ratio = metrics.conversion_calls as f64 / total as f64;
    if cheap_ratio >= 0.7 {
        ApiEfficiency::Excellent
    } else if cheap_ratio >= 0.5 {
        ApiEfficiency::Good
    } else if cheap_ratio >= 0.3 {
        ApiEfficiency::Moderate
    } else {
        ApiEfficiency::NeedsOptimization
    }
}

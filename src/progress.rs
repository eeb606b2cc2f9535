//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`std::sync::Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalyzeConfigBuilder::progress_callback`] to receive
//! events at each major transition (preparation, chunking, per-batch
//! progress, completion). Events are informational only — they never drive
//! control flow.
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` so it works
//! when conversion batches run concurrently.

use std::sync::Arc;

/// A progress event emitted at a pipeline transition.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Stage identifier, e.g. `"prepare"`, `"chunking"`, `"convert"`,
    /// `"extract"`, `"conflicts"`, `"validate"`, `"complete"`.
    pub stage: &'static str,
    /// Human-readable description of what is happening.
    pub message: String,
    /// Overall completion estimate, 0–100.
    pub percent: u8,
}

/// Called by the pipeline as it moves through its stages.
///
/// The single required method keeps implementations trivial; the event
/// struct carries everything a progress display needs.
pub trait AnalysisProgressCallback: Send + Sync {
    fn on_progress(&self, event: ProgressEvent) {
        let _ = event;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::AnalyzeConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

/// Internal helper: emit an event through an optional callback.
pub(crate) fn emit(
    cb: &Option<ProgressCallback>,
    stage: &'static str,
    message: impl Into<String>,
    percent: u8,
) {
    if let Some(cb) = cb {
        cb.on_progress(ProgressEvent {
            stage,
            message: message.into(),
            percent: percent.min(100),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        events: Mutex<Vec<(String, u8)>>,
    }

    impl AnalysisProgressCallback for Recorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.events
                .lock()
                .unwrap()
                .push((event.stage.to_string(), event.percent));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_progress(ProgressEvent {
            stage: "prepare",
            message: "loading".into(),
            percent: 5,
        });
    }

    #[test]
    fn emit_routes_to_callback_and_clamps() {
        let rec = Arc::new(Recorder {
            events: Mutex::new(vec![]),
        });
        let cb: Option<ProgressCallback> = Some(rec.clone() as ProgressCallback);
        emit(&cb, "convert", "batch 1/3", 40);
        emit(&cb, "complete", "done", 150);
        let events = rec.events.lock().unwrap();
        assert_eq!(events[0], ("convert".to_string(), 40));
        assert_eq!(events[1], ("complete".to_string(), 100));
    }

    #[test]
    fn emit_with_no_callback_is_silent() {
        emit(&None, "prepare", "nothing listens", 1);
    }
}

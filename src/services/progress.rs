//! Progress reporting service
//!
//! Session operations report the stage they are in; frontends decide how to
//! show it.

use crate::types::OperationReport;
use instant::Instant;

/// Stages a session operation passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Decoding the input or background image
    Loading,
    /// Applying saturation, brightness and contrast
    ToneAdjustment,
    /// Running the segmentation model
    Segmentation,
    /// Blending the foreground over the background
    Compositing,
    /// Writing the preview to disk
    Saving,
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Loading => "Loading image",
            ProcessingStage::ToneAdjustment => "Adjusting tone",
            ProcessingStage::Segmentation => "Removing background",
            ProcessingStage::Compositing => "Compositing over background",
            ProcessingStage::Saving => "Saving result",
            ProcessingStage::Completed => "Done",
        }
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    pub description: String,
    /// Milliseconds since the tracker was created
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            stage,
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

/// Receives progress from session operations
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    /// Called once an operation has produced a new preview
    fn report_completion(&self, report: &OperationReport);

    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _report: &OperationReport) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Forwards progress to the `log` facade
pub struct LoggingProgressReporter;

impl ProgressReporter for LoggingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        log::info!("{} ({}ms elapsed)", update.description, update.elapsed_ms);
    }

    fn report_completion(&self, report: &OperationReport) {
        log::info!(
            "{} finished in {}ms ({}x{})",
            report.operation,
            report.elapsed_ms,
            report.width,
            report.height
        );
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Tracks the current stage of one operation and forwards to a reporter
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl<'a> ProgressTracker<'a> {
    #[must_use]
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    pub fn report_completion(&self, report: &OperationReport) {
        self.reporter.report_completion(report);
    }

    /// Report an error against the most recent stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Loading);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

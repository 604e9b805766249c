//! Status surface for the pipeline
//!
//! The pipeline reports its progress through a small set of recognized
//! states. These are observational outputs only; nothing in the pipeline
//! reads them back. Frontends implement [`StatusReporter`] to surface them.

use instant::Instant;

/// Recognized pipeline status states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStage {
    /// Acquiring the segmentation model
    ModelLoading,
    /// Model loaded, waiting for an image
    Ready,
    /// Decoding a submitted image
    ImageLoading,
    /// Running inference on the image
    Analyzing,
    /// Writing the mask into the alpha channel
    Compositing,
    /// Artifact ready for download
    Done,
}

impl StatusStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            StatusStage::ModelLoading => "Loading model",
            StatusStage::Ready => "Ready",
            StatusStage::ImageLoading => "Loading image",
            StatusStage::Analyzing => "Analyzing image",
            StatusStage::Compositing => "Compositing result",
            StatusStage::Done => "Done",
        }
    }

    /// Typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            StatusStage::ModelLoading => 5,
            StatusStage::Ready => 10,
            StatusStage::ImageLoading => 25,
            StatusStage::Analyzing => 70,
            StatusStage::Compositing => 90,
            StatusStage::Done => 100,
        }
    }
}

/// A single status update with timing information
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// Current stage
    pub stage: StatusStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the tracker was created (milliseconds)
    pub elapsed_ms: u64,
}

impl StatusUpdate {
    /// Create an update for a stage
    #[must_use]
    pub fn new(stage: StatusStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for surfacing pipeline status to a frontend
pub trait StatusReporter: Send + Sync {
    /// Surface a status update
    fn report(&self, update: StatusUpdate);

    /// Surface an error that occurred at a stage
    fn report_error(&self, stage: StatusStage, error: &str);
}

/// Reporter that discards all updates
pub struct NoOpStatusReporter;

impl StatusReporter for NoOpStatusReporter {
    fn report(&self, _update: StatusUpdate) {}

    fn report_error(&self, _stage: StatusStage, _error: &str) {}
}

/// Reporter that writes status text to the log
pub struct ConsoleStatusReporter {
    verbose: bool,
}

impl ConsoleStatusReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StatusReporter for ConsoleStatusReporter {
    fn report(&self, update: StatusUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_error(&self, stage: StatusStage, error: &str) {
        log::error!("error during {}: {error}", stage.description());
    }
}

/// Tracks the current stage and forwards updates to a reporter
pub struct StatusTracker {
    reporter: Box<dyn StatusReporter>,
    start_time: Instant,
    current_stage: Option<StatusStage>,
}

impl StatusTracker {
    /// Create a tracker with the given reporter
    #[must_use]
    pub fn new(reporter: Box<dyn StatusReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Tracker that discards all updates
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpStatusReporter))
    }

    /// Tracker that logs status text
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleStatusReporter::new(verbose)))
    }

    /// Enter a stage and surface it
    pub fn report_stage(&mut self, stage: StatusStage) {
        self.current_stage = Some(stage);
        self.reporter.report(StatusUpdate::new(stage, self.start_time));
    }

    /// Surface an error at the current (or given) stage
    pub fn report_error(&self, stage: StatusStage, error: &str) {
        self.reporter.report_error(stage, error);
    }

    /// The stage last reported, if any
    #[must_use]
    pub fn current_stage(&self) -> Option<StatusStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingReporter {
        stages: Arc<Mutex<Vec<StatusStage>>>,
    }

    impl StatusReporter for RecordingReporter {
        fn report(&self, update: StatusUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_error(&self, _stage: StatusStage, _error: &str) {}
    }

    #[test]
    fn test_stage_descriptions_match_recognized_states() {
        assert_eq!(StatusStage::ModelLoading.description(), "Loading model");
        assert_eq!(StatusStage::Ready.description(), "Ready");
        assert_eq!(StatusStage::ImageLoading.description(), "Loading image");
        assert_eq!(StatusStage::Analyzing.description(), "Analyzing image");
        assert_eq!(StatusStage::Done.description(), "Done");
    }

    #[test]
    fn test_progress_is_monotonic_over_a_run() {
        let stages = [
            StatusStage::ModelLoading,
            StatusStage::Ready,
            StatusStage::ImageLoading,
            StatusStage::Analyzing,
            StatusStage::Compositing,
            StatusStage::Done,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }

    #[test]
    fn test_tracker_records_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = StatusTracker::new(Box::new(RecordingReporter {
            stages: Arc::clone(&stages),
        }));

        tracker.report_stage(StatusStage::ImageLoading);
        tracker.report_stage(StatusStage::Analyzing);
        tracker.report_stage(StatusStage::Done);

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                StatusStage::ImageLoading,
                StatusStage::Analyzing,
                StatusStage::Done
            ]
        );
        assert_eq!(tracker.current_stage(), Some(StatusStage::Done));
    }
}

//! The background removal pipeline
//!
//! [`RemovalPipeline`] is the single pipeline-state object: constructed at
//! startup, populated once by [`RemovalPipeline::initialize`], and read-only
//! afterwards except for the session state. Each submission runs the stages
//! acquire -> infer -> composite to completion before the next is accepted.

use crate::{
    acquire::{ImageAcquirer, InputEvent},
    compositor::Compositor,
    config::PipelineConfig,
    error::{RemovalError, Result},
    inference::{InferenceAdapter, SegmentationBackend},
    status::{StatusReporter, StatusStage, StatusTracker},
    types::{ProcessingTimings, RemovalResult},
};
use image::DynamicImage;
use instant::Instant;
use tracing::{debug, info, span, Level};

/// Session state, advanced by the pipeline as it works
///
/// `Idle -> Loading -> Ready -> Processing -> Done -> Ready|Processing`;
/// `LoadFailed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, model not yet loaded
    Idle,
    /// Model loading in progress
    Loading,
    /// Model loaded, accepting submissions
    Ready,
    /// A submission is being processed
    Processing,
    /// An artifact is available; new submissions are still accepted
    Done,
    /// Model loading failed; the session is blocked
    LoadFailed,
}

/// Background removal pipeline
pub struct RemovalPipeline {
    config: PipelineConfig,
    backend: Option<Box<dyn SegmentationBackend>>,
    status: StatusTracker,
    state: SessionState,
    model_load_ms: u64,
}

impl RemovalPipeline {
    /// Create a pipeline; the backend is built during [`initialize`](Self::initialize)
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let verbose = config.verbose_status;
        Ok(Self {
            config,
            backend: None,
            status: StatusTracker::console(verbose),
            state: SessionState::Idle,
            model_load_ms: 0,
        })
    }

    /// Create a pipeline with an injected backend (e.g. a mock in tests)
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(
        config: PipelineConfig,
        backend: Box<dyn SegmentationBackend>,
    ) -> Result<Self> {
        let mut pipeline = Self::new(config)?;
        pipeline.backend = Some(backend);
        Ok(pipeline)
    }

    /// Replace the status reporter
    pub fn set_status_reporter(&mut self, reporter: Box<dyn StatusReporter>) {
        self.status = StatusTracker::new(reporter);
    }

    /// Load the model and enter the ready state
    ///
    /// Called once at startup. A failure here is fatal to the session: the
    /// pipeline enters [`SessionState::LoadFailed`] and rejects every
    /// subsequent submission. There is no automatic retry.
    ///
    /// # Errors
    /// - Model download, resolution, or session construction failure
    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {},
            SessionState::LoadFailed => {
                return Err(RemovalError::model_load(
                    "model loading already failed; the session is blocked",
                ));
            },
            _ => return Ok(()),
        }

        self.state = SessionState::Loading;
        self.status.report_stage(StatusStage::ModelLoading);
        info!(model = %self.config.model_spec.source.display_name(), "loading model");

        match self.load_backend().await {
            Ok(load_ms) => {
                self.model_load_ms = load_ms;
                self.state = SessionState::Ready;
                self.status.report_stage(StatusStage::Ready);
                info!("pipeline ready");
                Ok(())
            },
            Err(e) => {
                self.state = SessionState::LoadFailed;
                self.status
                    .report_error(StatusStage::ModelLoading, &e.to_string());
                Err(e)
            },
        }
    }

    async fn load_backend(&mut self) -> Result<u64> {
        if self.backend.is_none() {
            self.backend = Some(Self::build_default_backend(&self.config).await?);
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| RemovalError::model_load("no backend available"))?;
        let load_time = backend.initialize()?;
        Ok(load_time.map_or(0, |d| d.as_millis() as u64))
    }

    #[cfg(feature = "onnx")]
    async fn build_default_backend(
        config: &PipelineConfig,
    ) -> Result<Box<dyn SegmentationBackend>> {
        crate::download::ensure_model_available(&config.model_spec, config.show_download_progress)
            .await?;
        let manager = crate::models::ModelManager::from_spec(&config.model_spec)?;
        Ok(Box::new(
            crate::backends::OnnxBackend::new(manager)
                .with_threads(config.intra_threads, config.inter_threads),
        ))
    }

    #[cfg(not(feature = "onnx"))]
    async fn build_default_backend(
        _config: &PipelineConfig,
    ) -> Result<Box<dyn SegmentationBackend>> {
        Err(RemovalError::model_load(
            "no inference backend available; enable the `onnx` feature or inject a backend",
        ))
    }

    /// Process a submission event
    ///
    /// An event with zero files is a no-op: `Ok(None)`, no state transition,
    /// no status output. Decode failures return the pipeline to ready.
    ///
    /// # Errors
    /// - Pipeline not initialized, or the session is blocked
    /// - Decode, inference, or compositing failure
    pub fn submit(&mut self, event: &InputEvent) -> Result<Option<RemovalResult>> {
        if event.is_empty() {
            return Ok(None);
        }
        self.ensure_accepting()?;

        self.state = SessionState::Processing;
        let total_start = Instant::now();
        self.status.report_stage(StatusStage::ImageLoading);

        let decode_start = Instant::now();
        let image = match ImageAcquirer::acquire(event) {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.state = SessionState::Ready;
                return Ok(None);
            },
            Err(e) => {
                self.state = SessionState::Ready;
                self.status
                    .report_error(StatusStage::ImageLoading, &e.to_string());
                return Err(e);
            },
        };
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        debug!(
            width = image.width(),
            height = image.height(),
            decode_ms,
            "image decoded"
        );

        self.run_stages(&image, decode_ms, total_start).map(Some)
    }

    /// Process an already-decoded image
    ///
    /// # Errors
    /// - Pipeline not initialized, or the session is blocked
    /// - Inference or compositing failure
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.ensure_accepting()?;
        self.state = SessionState::Processing;
        self.run_stages(image, 0, Instant::now())
    }

    /// Process raw image bytes
    ///
    /// # Errors
    /// - Pipeline not initialized, or the session is blocked
    /// - Decode, inference, or compositing failure
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.submit(&InputEvent::single(crate::acquire::InputSource::memory(
            image_bytes.to_vec(),
        )))?
        .ok_or_else(|| RemovalError::processing("empty submission"))
    }

    /// Process an image file
    ///
    /// # Errors
    /// - Pipeline not initialized, or the session is blocked
    /// - File read, decode, inference, or compositing failure
    pub fn process_file<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<RemovalResult> {
        self.submit(&InputEvent::single(crate::acquire::InputSource::path(
            path.as_ref(),
        )))?
        .ok_or_else(|| RemovalError::processing("empty submission"))
    }

    /// Process an image from an async reader
    ///
    /// # Errors
    /// - Stream read failure
    /// - Decode, inference, or compositing failure
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &mut self,
        mut reader: R,
    ) -> Result<RemovalResult> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| RemovalError::processing(format!("failed to read from stream: {e}")))?;

        self.process_bytes(&buffer)
    }

    /// Run infer + composite, managing state transitions on both outcomes
    fn run_stages(
        &mut self,
        image: &DynamicImage,
        decode_ms: u64,
        total_start: Instant,
    ) -> Result<RemovalResult> {
        match self.run_stages_inner(image, decode_ms, total_start) {
            Ok(result) => {
                self.state = SessionState::Done;
                self.status.report_stage(StatusStage::Done);
                info!("{}", result.timings.summary());
                Ok(result)
            },
            Err(e) => {
                // Failures after decode are surfaced and the pipeline
                // returns to ready; no partial artifact escapes.
                self.state = SessionState::Ready;
                let stage = self
                    .status
                    .current_stage()
                    .unwrap_or(StatusStage::Analyzing);
                self.status.report_error(stage, &e.to_string());
                Err(e)
            },
        }
    }

    fn run_stages_inner(
        &mut self,
        image: &DynamicImage,
        decode_ms: u64,
        total_start: Instant,
    ) -> Result<RemovalResult> {
        let original_dimensions = (image.width(), image.height());

        self.status.report_stage(StatusStage::Analyzing);
        let analysis_start = Instant::now();
        let mask = {
            let _span = span!(
                Level::DEBUG,
                "analysis",
                width = original_dimensions.0,
                height = original_dimensions.1
            )
            .entered();
            let backend = self
                .backend
                .as_mut()
                .ok_or_else(|| RemovalError::processing("pipeline not initialized"))?;
            InferenceAdapter::infer(image, backend.as_mut())?
        };
        let analysis_ms = analysis_start.elapsed().as_millis() as u64;

        self.status.report_stage(StatusStage::Compositing);
        let compositing_start = Instant::now();
        let composited = Compositor::composite(image, &mask)?;
        let compositing_ms = compositing_start.elapsed().as_millis() as u64;

        let timings = ProcessingTimings {
            model_load_ms: std::mem::take(&mut self.model_load_ms),
            image_decode_ms: decode_ms,
            analysis_ms,
            compositing_ms,
            image_encode_ms: None,
            total_ms: total_start.elapsed().as_millis() as u64,
        };

        Ok(RemovalResult::new(
            composited,
            mask,
            original_dimensions,
            timings,
        ))
    }

    /// Return a finished session to ready, dropping the artifact reference
    pub fn reset(&mut self) {
        if self.state == SessionState::Done {
            self.state = SessionState::Ready;
            self.status.report_stage(StatusStage::Ready);
        }
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.state {
            SessionState::Ready | SessionState::Done => Ok(()),
            SessionState::Idle | SessionState::Loading => {
                Err(RemovalError::processing("pipeline is not initialized"))
            },
            SessionState::Processing => Err(RemovalError::processing(
                "an image is already being processed",
            )),
            SessionState::LoadFailed => Err(RemovalError::model_load(
                "model loading failed; the session is blocked",
            )),
        }
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the model has been loaded
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !matches!(
            self.state,
            SessionState::Idle | SessionState::Loading | SessionState::LoadFailed
        )
    }

    /// The pipeline configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockSegmentationBackend;

    fn mock_pipeline() -> RemovalPipeline {
        RemovalPipeline::with_backend(
            PipelineConfig::default(),
            Box::new(MockSegmentationBackend::with_native_size(64)),
        )
        .unwrap()
    }

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([100, 150, 200]),
        ))
    }

    #[tokio::test]
    async fn test_state_machine_happy_path() {
        let mut pipeline = mock_pipeline();
        assert_eq!(pipeline.state(), SessionState::Idle);

        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.state(), SessionState::Ready);

        let result = pipeline.process_image(&test_image(30, 20)).unwrap();
        assert_eq!(pipeline.state(), SessionState::Done);
        assert_eq!(result.dimensions(), (30, 20));

        // Done accepts both a reset and a new submission
        pipeline.reset();
        assert_eq!(pipeline.state(), SessionState::Ready);
        pipeline.process_image(&test_image(10, 10)).unwrap();
        assert_eq!(pipeline.state(), SessionState::Done);
        pipeline.process_image(&test_image(12, 12)).unwrap();
        assert_eq!(pipeline.state(), SessionState::Done);
    }

    #[tokio::test]
    async fn test_uninitialized_pipeline_rejects_submissions() {
        let mut pipeline = mock_pipeline();
        let err = pipeline.process_image(&test_image(8, 8)).unwrap_err();
        assert!(matches!(err, RemovalError::Processing(_)));
        assert_eq!(pipeline.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_load_failure_blocks_session() {
        let mut pipeline = RemovalPipeline::with_backend(
            PipelineConfig::default(),
            Box::new(MockSegmentationBackend::new_failing_init()),
        )
        .unwrap();

        assert!(pipeline.initialize().await.is_err());
        assert_eq!(pipeline.state(), SessionState::LoadFailed);

        // Blocked for submissions and for re-initialization
        let err = pipeline.process_image(&test_image(8, 8)).unwrap_err();
        assert!(err.is_fatal());
        assert!(pipeline.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_inference_failure_returns_to_ready() {
        let mut pipeline = RemovalPipeline::with_backend(
            PipelineConfig::default(),
            Box::new(MockSegmentationBackend::new_failing_inference()),
        )
        .unwrap();
        pipeline.initialize().await.unwrap();

        let err = pipeline.process_image(&test_image(8, 8)).unwrap_err();
        assert!(matches!(err, RemovalError::Inference(_)));
        assert_eq!(pipeline.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let mut pipeline = mock_pipeline();
        pipeline.initialize().await.unwrap();
        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_empty_submission_is_noop_even_before_init() {
        let mut pipeline = mock_pipeline();
        assert!(pipeline.submit(&InputEvent::empty()).unwrap().is_none());
        assert_eq!(pipeline.state(), SessionState::Idle);
    }
}

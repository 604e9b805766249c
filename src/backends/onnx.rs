//! ONNX Runtime backend for segmentation models
//!
//! Runs the cached model through `ort` with default execution providers.
//! Provider selection is out of scope for this crate; only thread counts are
//! configurable.

use crate::error::{RemovalError, Result};
use crate::inference::SegmentationBackend;
use crate::models::{ModelManager, PreprocessingConfig};
use instant::Duration;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// ONNX Runtime backend
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
    intra_threads: usize,
    inter_threads: usize,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a backend for a resolved model
    #[must_use]
    pub fn new(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
            intra_threads: 0,
            inter_threads: 0,
            initialized: false,
        }
    }

    /// Set thread counts (0 = auto-detect)
    #[must_use]
    pub fn with_threads(mut self, intra_threads: usize, inter_threads: usize) -> Self {
        self.intra_threads = intra_threads;
        self.inter_threads = inter_threads;
        self
    }

    /// Build the ONNX Runtime session from the cached model weights
    fn load_model(&mut self) -> Result<Duration> {
        let load_start = instant::Instant::now();

        let model_data = self.model_manager.load_model()?;

        let available = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if self.intra_threads > 0 {
            self.intra_threads
        } else {
            available
        };
        let inter_threads = if self.inter_threads > 0 {
            self.inter_threads
        } else {
            (available / 4).max(1)
        };

        let session = Session::builder()
            .map_err(|e| {
                RemovalError::model_load(format!("failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                RemovalError::model_load(format!("failed to set optimization level: {e}"))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| RemovalError::model_load(format!("failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| RemovalError::model_load(format!("failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                RemovalError::model_load(format!("failed to create session from model data: {e}"))
            })?;

        let info = self.model_manager.info()?;
        log::debug!(
            "ONNX session ready: model {} ({}), {} intra / {} inter threads",
            info.name,
            crate::cache::format_size(info.size_bytes as u64),
            intra_threads,
            inter_threads
        );

        self.session = Some(session);
        self.initialized = true;

        let load_time = load_start.elapsed();
        log::info!("model loaded in {:.0}ms", load_time.as_secs_f64() * 1000.0);
        Ok(load_time)
    }
}

impl SegmentationBackend for OnnxBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemovalError::inference("backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RemovalError::inference("ONNX session not initialized"))?;

        let infer_start = instant::Instant::now();
        log::debug!("running inference, input shape {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| RemovalError::inference(format!("failed to convert input tensor: {e}")))?;

        // Positional inputs avoid any dependency on the model's tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| RemovalError::inference(format!("model invocation failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| RemovalError::inference("no output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| RemovalError::inference("first output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    RemovalError::inference(format!("failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(RemovalError::inference(format!(
                "expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_data = output_tensor.view().to_owned();
        let result = Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.into_raw_vec_and_offset().0,
        )
        .map_err(|e| RemovalError::inference(format!("failed to reshape output tensor: {e}")))?;

        log::debug!(
            "inference complete in {:.1}ms",
            infer_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.model_manager.preprocessing_config())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .info()
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

//! Mock backend for testing the pipeline without model files
//!
//! The mock produces a deterministic horizontal gradient mask so tests can
//! assert exact alpha bytes without an ONNX runtime or network access.

use crate::{
    error::{RemovalError, Result},
    inference::SegmentationBackend,
    models::PreprocessingConfig,
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Mock segmentation backend with deterministic output
#[derive(Debug, Clone)]
pub struct MockSegmentationBackend {
    initialized: bool,
    preprocessing_config: PreprocessingConfig,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockSegmentationBackend {
    /// Create a mock backend at the model's native 1024x1024 configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            preprocessing_config: PreprocessingConfig::default(),
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Mock backend with a smaller native size, for faster tests
    #[must_use]
    pub fn with_native_size(size: u32) -> Self {
        let mut backend = Self::new();
        backend.preprocessing_config.target_size = [size, size];
        backend
    }

    /// Mock backend that fails during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Mock backend that fails during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Calls recorded so far, for verification in tests
    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    /// Horizontal gradient mask: 0.0 at the left edge, 1.0 at the right
    ///
    /// Per-pixel-varying output lets tests verify that alpha values are not
    /// uniformly 0 or 255 and that bytes land at the right pixels.
    fn generate_mock_output(&self, input: &Array4<f32>) -> Array4<f32> {
        let shape = input.shape();
        let (height, width) = (shape[2], shape[3]);
        let mut output = Array4::<f32>::zeros((1, 1, height, width));

        for y in 0..height {
            for x in 0..width {
                let value = if width > 1 {
                    x as f32 / (width - 1) as f32
                } else {
                    1.0
                };
                output[[0, 0, y, x]] = value;
            }
        }

        output
    }
}

impl Default for MockSegmentationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationBackend for MockSegmentationBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(RemovalError::model_load(
                "mock backend initialization failed",
            ));
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(RemovalError::inference("mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(RemovalError::inference("mock backend inference failed"));
        }

        let shape = input.shape();
        if shape.len() != 4 || shape[1] != 3 {
            return Err(RemovalError::inference(
                "input tensor must be NCHW with 3 channels",
            ));
        }

        Ok(self.generate_mock_output(input))
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.record_call("preprocessing_config");
        Ok(self.preprocessing_config.clone())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.preprocessing_config.target_size;
        (1, 3, height as usize, width as usize)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_lifecycle() {
        let mut backend = MockSegmentationBackend::with_native_size(32);
        assert!(!backend.is_initialized());

        backend.initialize().unwrap();
        assert!(backend.is_initialized());

        let input = Array4::<f32>::zeros((1, 3, 32, 32));
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.shape(), &[1, 1, 32, 32]);

        // Gradient: left edge fully background, right edge fully foreground
        assert!((output[[0, 0, 0, 0]]).abs() < f32::EPSILON);
        assert!((output[[0, 0, 31, 31]] - 1.0).abs() < f32::EPSILON);

        assert_eq!(
            backend.call_history(),
            vec!["initialize".to_string(), "infer".to_string()]
        );
    }

    #[test]
    fn test_failing_variants() {
        let mut backend = MockSegmentationBackend::new_failing_init();
        assert!(backend.initialize().is_err());

        let mut backend = MockSegmentationBackend::new_failing_inference();
        backend.initialize().unwrap();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }
}

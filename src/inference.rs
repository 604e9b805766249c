//! Inference backend abstraction and the inference adapter
//!
//! The adapter feeds a decoded image through the fixed preprocessing, runs
//! the backend, and converts the raw output tensor into an [`AlphaMask`] at
//! the original image's resolution. One image in, one mask out; nothing is
//! cached between calls.

use crate::{
    error::{RemovalError, Result},
    mask::AlphaMask,
    models::PreprocessingConfig,
    preprocess::ImagePreprocessor,
};
use image::DynamicImage;
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for segmentation inference backends
pub trait SegmentationBackend {
    /// Initialize the backend (load the model, build the session)
    ///
    /// Returns the model load time on a fresh initialization.
    ///
    /// # Errors
    /// - Model loading or session construction failures
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run one forward pass on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model invocation failures
    /// - Unexpected output tensor shape
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Preprocessing configuration matching this backend's model
    ///
    /// # Errors
    /// - Model metadata unavailable
    fn preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Expected NCHW input shape
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Whether the backend is ready to run inference
    fn is_initialized(&self) -> bool;
}

/// Adapter between decoded images and a segmentation backend
pub struct InferenceAdapter;

impl InferenceAdapter {
    /// Infer a foreground mask for an image
    ///
    /// The returned mask is guaranteed to match the image's dimensions
    /// exactly: the model-native output is scaled into byte range and
    /// resized (bilinear, like preprocessing) to `image.width() x
    /// image.height()`.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model invocation failures
    /// - Malformed output tensor
    pub fn infer(
        image: &DynamicImage,
        backend: &mut dyn SegmentationBackend,
    ) -> Result<AlphaMask> {
        if !backend.is_initialized() {
            return Err(RemovalError::processing("backend not initialized"));
        }

        let preprocessing_config = backend.preprocessing_config()?;
        let input = ImagePreprocessor::to_tensor(image, &preprocessing_config);

        let output = backend.infer(&input)?;

        let native_mask = AlphaMask::from_tensor(&output)?;
        let mask = native_mask.resize(image.width(), image.height())?;

        debug_assert_eq!(
            mask.len(),
            (image.width() as usize) * (image.height() as usize)
        );
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockSegmentationBackend;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([90, 120, 200]),
        ))
    }

    #[test]
    fn test_mask_matches_image_dimensions() {
        let mut backend = MockSegmentationBackend::new();
        backend.initialize().unwrap();

        for (width, height) in [(64, 64), (720, 480), (33, 97)] {
            let mask = InferenceAdapter::infer(&test_image(width, height), &mut backend).unwrap();
            assert_eq!(mask.dimensions, (width, height));
            assert_eq!(mask.len(), (width * height) as usize);
        }
    }

    #[test]
    fn test_uninitialized_backend_is_rejected() {
        let mut backend = MockSegmentationBackend::new();
        let err = InferenceAdapter::infer(&test_image(16, 16), &mut backend).unwrap_err();
        assert!(matches!(err, RemovalError::Processing(_)));
    }

    #[test]
    fn test_inference_failure_propagates() {
        let mut backend = MockSegmentationBackend::new_failing_inference();
        backend.initialize().unwrap();

        let err = InferenceAdapter::infer(&test_image(16, 16), &mut backend).unwrap_err();
        assert!(matches!(err, RemovalError::Inference(_)));
    }

    #[test]
    fn test_every_call_runs_inference() {
        let mut backend = MockSegmentationBackend::new();
        backend.initialize().unwrap();

        let image = test_image(32, 32);
        InferenceAdapter::infer(&image, &mut backend).unwrap();
        InferenceAdapter::infer(&image, &mut backend).unwrap();

        let infer_calls = backend
            .call_history()
            .iter()
            .filter(|call| call.as_str() == "infer")
            .count();
        assert_eq!(infer_calls, 2);
    }
}

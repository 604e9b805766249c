//! Image preprocessing for model inference
//!
//! Converts a decoded image into the model's normalized NCHW input tensor:
//! bilinear resize to the model-native size, rescale to `[0, 1]`, then
//! per-channel mean/std normalization. The model expects the full frame at
//! its native size, so the resize is direct rather than aspect-preserving.

use crate::models::PreprocessingConfig;
use image::{imageops, DynamicImage, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing for inference
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a normalized input tensor
    ///
    /// The returned tensor has shape `[1, 3, target_height, target_width]`.
    #[must_use]
    pub fn to_tensor(image: &DynamicImage, config: &PreprocessingConfig) -> Array4<f32> {
        let [target_width, target_height] = config.target_size;

        let rgb_image = image.to_rgb8();
        let resized = imageops::resize(
            &rgb_image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Self::normalize(&resized, config)
    }

    /// Convert a resized RGB image into a normalized NCHW tensor
    fn normalize(resized: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Tensor dimensions are pre-allocated to match the resized image
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) * config.rescale_factor;
                tensor[[0, channel, y, x]] = (value - config.normalization_mean[channel])
                    / config.normalization_std[channel];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb(color));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_tensor_shape_is_model_native() {
        let image = solid_image(640, 400, [10, 20, 30]);
        let config = PreprocessingConfig::default();

        let tensor = ImagePreprocessor::to_tensor(&image, &config);
        assert_eq!(tensor.shape(), &[1, 3, 1024, 1024]);
    }

    #[test]
    fn test_normalization_values() {
        let config = PreprocessingConfig::default();

        // White maps to (1.0 - 0.5) / 1.0 = 0.5, black to -0.5
        let white = ImagePreprocessor::to_tensor(&solid_image(8, 8, [255, 255, 255]), &config);
        assert!((white[[0, 0, 0, 0]] - 0.5).abs() < 1e-5);
        assert!((white[[0, 2, 512, 512]] - 0.5).abs() < 1e-5);

        let black = ImagePreprocessor::to_tensor(&solid_image(8, 8, [0, 0, 0]), &config);
        assert!((black[[0, 1, 0, 0]] + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_channels_are_planar() {
        let config = PreprocessingConfig::default();
        // Pure red: R channel at +0.5, G and B at -0.5
        let tensor = ImagePreprocessor::to_tensor(&solid_image(4, 4, [255, 0, 0]), &config);
        assert!((tensor[[0, 0, 100, 100]] - 0.5).abs() < 1e-5);
        assert!((tensor[[0, 1, 100, 100]] + 0.5).abs() < 1e-5);
        assert!((tensor[[0, 2, 100, 100]] + 0.5).abs() < 1e-5);
    }
}

//! Alpha mask produced by the segmentation model

use crate::error::{RemovalError, Result};
use image::{imageops, ImageBuffer, Luma};
use ndarray::Array4;
use std::path::Path;

/// Single-channel alpha mask, one byte per pixel
///
/// Produced at model-native resolution by [`AlphaMask::from_tensor`] and
/// resized to the source image's resolution before compositing. The data is
/// row-major and always holds exactly `width * height` entries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AlphaMask {
    /// Mask values (0 = background, 255 = foreground)
    pub data: Vec<u8>,
    /// Mask dimensions as `(width, height)`
    pub dimensions: (u32, u32),
}

impl AlphaMask {
    /// Create a mask from raw bytes
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = (dimensions.0 as usize) * (dimensions.1 as usize);
        if data.len() != expected {
            return Err(RemovalError::dimension_mismatch(expected, data.len()));
        }
        Ok(Self { data, dimensions })
    }

    /// Convert a model output tensor into a byte mask
    ///
    /// Expects an NCHW tensor of shape `[1, 1, height, width]` with values
    /// in `[0, 1]`; each value is scaled by 255 and truncated to `u8`.
    ///
    /// # Errors
    /// - Tensor shape is not a single-image single-channel NCHW tensor
    pub fn from_tensor(tensor: &Array4<f32>) -> Result<Self> {
        let shape = tensor.shape();
        let (batch, channels) = (
            shape.first().copied().unwrap_or(0),
            shape.get(1).copied().unwrap_or(0),
        );
        if batch != 1 || channels != 1 {
            return Err(RemovalError::processing(format!(
                "expected mask tensor of shape [1, 1, H, W], got {shape:?}"
            )));
        }

        let height = shape.get(2).copied().unwrap_or(0);
        let width = shape.get(3).copied().unwrap_or(0);

        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let value = tensor.get([0, 0, y, x]).copied().unwrap_or(0.0);
                data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        Self::new(data, (width as u32, height as u32))
    }

    /// Create a mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw().clone(),
            dimensions: (width, height),
        }
    }

    /// Convert the mask to a grayscale image
    ///
    /// # Errors
    /// - Mask data and dimensions are inconsistent
    pub fn to_image(&self) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            RemovalError::processing("failed to create image from mask data")
        })
    }

    /// Resize the mask with bilinear resampling
    ///
    /// Bilinear matches the resampling policy used during preprocessing.
    ///
    /// # Errors
    /// - Mask data and dimensions are inconsistent
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<AlphaMask> {
        if (new_width, new_height) == self.dimensions {
            return Ok(self.clone());
        }
        let current = self.to_image()?;
        let resized = imageops::resize(
            &current,
            new_width,
            new_height,
            imageops::FilterType::Triangle,
        );
        Ok(Self::from_image(&resized))
    }

    /// Number of mask entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the mask is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&v| v > 127).count();

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio: if total_pixels == 0 {
                0.0
            } else {
                foreground_pixels as f32 / total_pixels as f32
            },
        }
    }

    /// Save the mask as a grayscale PNG
    ///
    /// # Errors
    /// - Mask data and dimensions are inconsistent
    /// - Encoding or file I/O failure
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.to_image()?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about an alpha mask
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(AlphaMask::new(vec![255, 128, 0, 255], (2, 2)).is_ok());

        let err = AlphaMask::new(vec![255, 128], (2, 2)).unwrap_err();
        assert!(matches!(
            err,
            RemovalError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_from_tensor_scales_to_bytes() {
        let mut tensor = Array4::<f32>::zeros((1, 1, 2, 2));
        tensor[[0, 0, 0, 0]] = 0.0;
        tensor[[0, 0, 0, 1]] = 0.5;
        tensor[[0, 0, 1, 0]] = 1.0;
        tensor[[0, 0, 1, 1]] = 2.0; // clamped

        let mask = AlphaMask::from_tensor(&tensor).unwrap();
        assert_eq!(mask.dimensions, (2, 2));
        assert_eq!(mask.data, vec![0, 127, 255, 255]);
    }

    #[test]
    fn test_from_tensor_rejects_bad_shape() {
        let tensor = Array4::<f32>::zeros((1, 3, 4, 4));
        assert!(AlphaMask::from_tensor(&tensor).is_err());

        let tensor = Array4::<f32>::zeros((2, 1, 4, 4));
        assert!(AlphaMask::from_tensor(&tensor).is_err());
    }

    #[test]
    fn test_resize_targets_exact_dimensions() {
        let mask = AlphaMask::new(vec![255; 16 * 16], (16, 16)).unwrap();
        let resized = mask.resize(7, 5).unwrap();
        assert_eq!(resized.dimensions, (7, 5));
        assert_eq!(resized.len(), 35);
        // Uniform input stays uniform under bilinear resampling
        assert!(resized.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let mask = AlphaMask::new((0..=255).collect(), (16, 16)).unwrap();
        let resized = mask.resize(16, 16).unwrap();
        assert_eq!(resized, mask);
    }

    #[test]
    fn test_statistics() {
        let mask = AlphaMask::new(vec![255, 200, 10, 0], (2, 2)).unwrap();
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.background_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
    }
}

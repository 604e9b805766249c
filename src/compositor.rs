//! Alpha compositing of a source image with an inferred mask

use crate::{
    error::{RemovalError, Result},
    mask::AlphaMask,
};
use image::{DynamicImage, RgbaImage};

/// Compositor that writes a mask into an image's alpha channel
pub struct Compositor;

impl Compositor {
    /// Composite an image with its alpha mask
    ///
    /// Renders the image as RGBA at its own dimensions, then sets the alpha
    /// channel at every pixel index `i` to `mask[i]`. Color channels are
    /// left untouched. The mask must already be at the image's resolution;
    /// a pixel-count mismatch fails with [`RemovalError::DimensionMismatch`]
    /// rather than truncating.
    ///
    /// # Errors
    /// - Mask entry count differs from the image's pixel count
    pub fn composite(image: &DynamicImage, mask: &AlphaMask) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        Self::apply_alpha(&mut rgba, mask)?;
        Ok(rgba)
    }

    /// Substitute the alpha channel of an RGBA image in place
    ///
    /// # Errors
    /// - Mask entry count differs from the image's pixel count
    pub fn apply_alpha(image: &mut RgbaImage, mask: &AlphaMask) -> Result<()> {
        let (width, height) = image.dimensions();
        let expected = (width as usize) * (height as usize);
        if mask.len() != expected {
            return Err(RemovalError::dimension_mismatch(expected, mask.len()));
        }

        for (alpha, pixel) in mask.data.iter().zip(image.pixels_mut()) {
            pixel[3] = *alpha;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_mask(width: u32, height: u32) -> AlphaMask {
        let data = (0..height)
            .flat_map(|_| (0..width).map(|x| (x % 256) as u8))
            .collect();
        AlphaMask::new(data, (width, height)).unwrap()
    }

    #[test]
    fn test_alpha_equals_mask_exactly() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            40,
            30,
            image::Rgb([10, 200, 30]),
        ));
        let mask = gradient_mask(40, 30);

        let composited = Compositor::composite(&image, &mask).unwrap();
        assert_eq!(composited.dimensions(), (40, 30));

        for (i, pixel) in composited.pixels().enumerate() {
            assert_eq!(pixel[3], mask.data[i], "alpha mismatch at pixel {i}");
        }
    }

    #[test]
    fn test_color_channels_untouched() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([7, 77, 177]),
        ));
        // Fully transparent mask still leaves the color planes alone
        let mask = AlphaMask::new(vec![0; 64], (8, 8)).unwrap();

        let composited = Compositor::composite(&image, &mask).unwrap();
        for pixel in composited.pixels() {
            assert_eq!(&pixel.0[..3], &[7, 77, 177]);
            assert_eq!(pixel[3], 0);
        }
    }

    #[test]
    fn test_dimension_mismatch_fails_loudly() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(10, 10));
        let mask = AlphaMask::new(vec![255; 25], (5, 5)).unwrap();

        let err = Compositor::composite(&image, &mask).unwrap_err();
        assert!(matches!(
            err,
            RemovalError::DimensionMismatch {
                expected: 100,
                actual: 25
            }
        ));
    }

    #[test]
    fn test_existing_alpha_is_replaced() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([1, 2, 3, 128]),
        ));
        let mask = AlphaMask::new(vec![200; 16], (4, 4)).unwrap();

        let composited = Compositor::composite(&image, &mask).unwrap();
        for pixel in composited.pixels() {
            assert_eq!(pixel[3], 200);
        }
    }
}

//! Core result types for the pipeline

use crate::{
    error::Result,
    export::{Exporter, FilenamePolicy},
    mask::AlphaMask,
};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Result of one background removal invocation
///
/// The terminal artifact: a copy of the input image with its alpha channel
/// replaced by the inferred mask. Each invocation produces an independent
/// result; a later invocation never mutates an earlier one.
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The composited image with transparent background
    pub image: RgbaImage,

    /// The mask written into the alpha channel, at image resolution
    pub mask: AlphaMask,

    /// Original input dimensions
    pub original_dimensions: (u32, u32),

    /// Timing breakdown of this invocation
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(
        image: RgbaImage,
        mask: AlphaMask,
        original_dimensions: (u32, u32),
        timings: ProcessingTimings,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            timings,
        }
    }

    /// Output dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the artifact as PNG bytes
    ///
    /// # Errors
    /// - PNG encoding failure
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        Exporter::to_png_bytes(&self.image)
    }

    /// Save the artifact as PNG at an explicit path
    ///
    /// # Errors
    /// - Encoding or file I/O failure
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Exporter::save_png(&self.image, path)
    }

    /// Save the artifact into a directory using a filename policy
    ///
    /// # Errors
    /// - Encoding or file I/O failure
    pub fn save_into_dir<P: AsRef<Path>>(
        &self,
        dir: P,
        policy: FilenamePolicy,
    ) -> Result<PathBuf> {
        Exporter::save_into_dir(&self.image, dir, policy)
    }
}

/// Timing breakdown for one invocation
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first invocation only)
    pub model_load_ms: u64,

    /// Image decoding
    pub image_decode_ms: u64,

    /// Preprocessing, inference, and mask resizing
    pub analysis_ms: u64,

    /// Alpha compositing
    pub compositing_ms: u64,

    /// PNG encoding (when the artifact was saved)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Fraction of the total spent in analysis
    #[must_use]
    pub fn analysis_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.analysis_ms as f64 / self.total_ms as f64
        }
    }

    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Analysis: {}ms | Compositing: {}ms",
            self.total_ms, self.image_decode_ms, self.analysis_ms, self.compositing_ms
        );
        if let Some(encode_ms) = self.image_encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_summary() {
        let timings = ProcessingTimings {
            model_load_ms: 0,
            image_decode_ms: 12,
            analysis_ms: 300,
            compositing_ms: 8,
            image_encode_ms: Some(20),
            total_ms: 340,
        };
        let summary = timings.summary();
        assert!(summary.contains("Total: 340ms"));
        assert!(summary.contains("Analysis: 300ms"));
        assert!(summary.contains("Encode: 20ms"));
        assert!(timings.analysis_ratio() > 0.8);
    }

    #[test]
    fn test_result_dimensions() {
        let image = RgbaImage::new(20, 10);
        let mask = AlphaMask::new(vec![0; 200], (20, 10)).unwrap();
        let result = RemovalResult::new(image, mask, (20, 10), ProcessingTimings::default());

        assert_eq!(result.dimensions(), (20, 10));
        assert_eq!(result.original_dimensions, (20, 10));
    }
}

//! Export of composited images
//!
//! The terminal artifact is encoded as lossless PNG, either to bytes or to a
//! file. The output filename is a configuration concern: a static name or a
//! timestamped one.

use crate::error::{RemovalError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Filename used by the static policy
pub const STATIC_FILENAME: &str = "processed-image.png";

/// Prefix used by the timestamped policy
pub const TIMESTAMPED_PREFIX: &str = "no-bg-";

/// Output filename policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum FilenamePolicy {
    /// Always `processed-image.png`
    #[default]
    Static,
    /// `no-bg-<ISO 8601 UTC timestamp, colons replaced with dashes>.png`
    Timestamped,
}

impl FilenamePolicy {
    /// Produce the output filename for an export happening at `at`
    #[must_use]
    pub fn filename(&self, at: DateTime<Utc>) -> String {
        match self {
            FilenamePolicy::Static => STATIC_FILENAME.to_string(),
            FilenamePolicy::Timestamped => {
                let stamp = at
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
                    .replace(':', "-");
                format!("{TIMESTAMPED_PREFIX}{stamp}.png")
            },
        }
    }
}

/// Exporter for composited images
pub struct Exporter;

impl Exporter {
    /// Encode an image as PNG bytes
    ///
    /// # Errors
    /// - PNG encoding failure
    pub fn to_png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| RemovalError::processing(format!("PNG encoding failed: {e}")))?;
        Ok(buffer)
    }

    /// Save an image as PNG at an explicit path
    ///
    /// # Errors
    /// - Parent directory cannot be created
    /// - Encoding or file I/O failure
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RemovalError::file_io("create output directory", parent, &e))?;
            }
        }
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Save an image into a directory using a filename policy
    ///
    /// Returns the path written.
    ///
    /// # Errors
    /// - Encoding or file I/O failure
    pub fn save_into_dir<P: AsRef<Path>>(
        image: &RgbaImage,
        dir: P,
        policy: FilenamePolicy,
    ) -> Result<PathBuf> {
        let path = dir.as_ref().join(policy.filename(Utc::now()));
        Self::save_png(image, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_static_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 13, 45, 9).unwrap();
        assert_eq!(
            FilenamePolicy::Static.filename(at),
            "processed-image.png"
        );
    }

    #[test]
    fn test_timestamped_filename_has_no_colons() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 13, 45, 9).unwrap();
        let name = FilenamePolicy::Timestamped.filename(at);

        assert_eq!(name, "no-bg-2024-03-05T13-45-09.000Z.png");
        assert!(name.starts_with(TIMESTAMPED_PREFIX));
        assert!(name.ends_with(".png"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_png_bytes_round_trip() {
        let mut image = RgbaImage::from_pixel(6, 4, image::Rgba([20, 40, 60, 255]));
        image.put_pixel(0, 0, image::Rgba([1, 2, 3, 0]));

        let bytes = Exporter::to_png_bytes(&image).unwrap();
        // PNG signature
        assert_eq!(bytes.get(..8).unwrap(), &[137, 80, 78, 71, 13, 10, 26, 10]);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 4));
        // Alpha survives the lossless round trip
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(decoded.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_save_into_dir_uses_policy() {
        let temp = TempDir::new().unwrap();
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));

        let path = Exporter::save_into_dir(&image, temp.path(), FilenamePolicy::Static).unwrap();
        assert_eq!(path.file_name().unwrap(), "processed-image.png");
        assert!(path.is_file());

        let path =
            Exporter::save_into_dir(&image, temp.path(), FilenamePolicy::Timestamped).unwrap();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(TIMESTAMPED_PREFIX));
        assert!(path.is_file());
    }
}

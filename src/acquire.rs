//! Input acquisition
//!
//! Frontend events (file picker, drag-and-drop, CLI argument, stdin) funnel
//! into one [`InputEvent`] dispatched to [`ImageAcquirer::acquire`]. An event
//! with zero files is a no-op, not an error; an undecodable file surfaces a
//! decode failure.

use crate::error::{RemovalError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// One user-supplied file
#[derive(Debug, Clone)]
pub enum InputSource {
    /// File on disk
    Path(PathBuf),
    /// In-memory file contents (e.g. a dropped file or stdin)
    Memory {
        /// Original file name, when known
        name: Option<String>,
        /// Raw file bytes
        bytes: Vec<u8>,
    },
}

impl InputSource {
    /// Source for a file path
    pub fn path<P: Into<PathBuf>>(path: P) -> Self {
        Self::Path(path.into())
    }

    /// Source for in-memory bytes
    #[must_use]
    pub fn memory(bytes: Vec<u8>) -> Self {
        Self::Memory { name: None, bytes }
    }

    /// Source for in-memory bytes with a file name
    pub fn named_memory<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self::Memory {
            name: Some(name.into()),
            bytes,
        }
    }

    /// Display name for logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            InputSource::Path(path) => path.display().to_string(),
            InputSource::Memory { name, bytes } => name
                .clone()
                .unwrap_or_else(|| format!("<memory: {} bytes>", bytes.len())),
        }
    }
}

/// A submission event carrying zero or more files
#[derive(Debug, Clone, Default)]
pub struct InputEvent {
    sources: Vec<InputSource>,
}

impl InputEvent {
    /// Event carrying the given files
    #[must_use]
    pub fn new(sources: Vec<InputSource>) -> Self {
        Self { sources }
    }

    /// Event carrying exactly one file
    #[must_use]
    pub fn single(source: InputSource) -> Self {
        Self {
            sources: vec![source],
        }
    }

    /// Event with no files (e.g. a cancelled file dialog)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the event carries no files
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The files carried by this event
    #[must_use]
    pub fn sources(&self) -> &[InputSource] {
        &self.sources
    }
}

/// Decodes user-submitted files into images
pub struct ImageAcquirer;

impl ImageAcquirer {
    /// Acquire an image from a submission event
    ///
    /// Returns `Ok(None)` when the event carries no files. When it carries
    /// more than one, the first is used and the rest are ignored.
    ///
    /// # Errors
    /// - File cannot be read
    /// - Bytes are not a decodable image
    pub fn acquire(event: &InputEvent) -> Result<Option<DynamicImage>> {
        let Some(source) = event.sources.first() else {
            return Ok(None);
        };
        if event.sources.len() > 1 {
            log::debug!(
                "{} files submitted; using '{}'",
                event.sources.len(),
                source.display_name()
            );
        }
        Self::decode(source).map(Some)
    }

    /// Decode one source into an image
    ///
    /// # Errors
    /// - File cannot be read
    /// - Bytes are not a decodable image
    pub fn decode(source: &InputSource) -> Result<DynamicImage> {
        match source {
            InputSource::Path(path) => Self::decode_path(path),
            InputSource::Memory { bytes, .. } => Self::decode_bytes(bytes),
        }
    }

    /// Decode an image file, falling back to content-based format detection
    fn decode_path(path: &Path) -> Result<DynamicImage> {
        if !path.exists() {
            return Err(RemovalError::file_io(
                "read image file",
                path,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path) {
            Ok(img) => Ok(img),
            Err(e) => {
                // The extension may lie about the actual format
                log::debug!(
                    "extension-based decode failed for {}: {e}; trying content detection",
                    path.display()
                );
                let data = std::fs::read(path)
                    .map_err(|io_err| RemovalError::file_io("read image data", path, &io_err))?;
                Self::decode_bytes(&data)
            },
        }
    }

    /// Decode in-memory image bytes
    fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }
}

/// Maximum display bounding box, in CSS pixels
pub const DISPLAY_MAX_WIDTH: f32 = 720.0;
/// Maximum display bounding box, in CSS pixels
pub const DISPLAY_MAX_HEIGHT: f32 = 480.0;

/// Fit an image into the display bounding box, preserving aspect ratio
///
/// Used only by frontends for layout; not part of the processing pipeline.
#[must_use]
pub fn display_box(width: u32, height: u32) -> (f32, f32) {
    let aspect_ratio = width as f32 / height as f32;
    if aspect_ratio > DISPLAY_MAX_WIDTH / DISPLAY_MAX_HEIGHT {
        (DISPLAY_MAX_WIDTH, DISPLAY_MAX_WIDTH / aspect_ratio)
    } else {
        (DISPLAY_MAX_HEIGHT * aspect_ratio, DISPLAY_MAX_HEIGHT)
    }
}

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # nobg
//!
//! Background removal as a linear pipeline: acquire an image, infer a
//! foreground mask with a pretrained segmentation model, write the mask into
//! the image's alpha channel, and export the transparent result as PNG.
//!
//! The segmentation network itself is external: the default model is
//! `briaai/RMBG-1.4`, downloaded from its registry on first use, cached
//! locally, and executed through ONNX Runtime. This crate supplies the
//! stages around it — decoding, the fixed preprocessing (bilinear resize to
//! 1024x1024, rescale 1/255, mean 0.5 / unit std normalization), mask
//! post-processing, and alpha compositing.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nobg::{remove_background_from_path, PipelineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::default();
//! let result = remove_background_from_path("input.jpg", &config).await?;
//! result.save_png("output.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the pipeline directly
//!
//! For a long-lived session (load the model once, process many images), use
//! [`RemovalPipeline`]:
//!
//! ```rust,no_run
//! use nobg::{InputEvent, InputSource, PipelineConfig, RemovalPipeline};
//!
//! # async fn example(uploads: Vec<Vec<u8>>) -> anyhow::Result<()> {
//! let mut pipeline = RemovalPipeline::new(PipelineConfig::default())?;
//! pipeline.initialize().await?; // downloads and loads the model once
//!
//! for bytes in uploads {
//!     let event = InputEvent::single(InputSource::memory(bytes));
//!     if let Some(result) = pipeline.submit(&event)? {
//!         let png = result.to_png_bytes()?;
//!         # let _ = png;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `onnx` (default): ONNX Runtime inference backend
//! - `cli` (default): the `nobg` command-line tool

pub mod acquire;
pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod inference;
pub mod mask;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod status;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use acquire::{display_box, ImageAcquirer, InputEvent, InputSource};
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use compositor::Compositor;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use download::{ensure_model_available, validate_model_url, ModelDownloader};
pub use error::{RemovalError, Result};
pub use export::{Exporter, FilenamePolicy};
pub use inference::{InferenceAdapter, SegmentationBackend};
pub use mask::{AlphaMask, MaskStatistics};
pub use models::{ModelManager, ModelSource, ModelSpec, PreprocessingConfig, DEFAULT_MODEL_URL};
pub use pipeline::{RemovalPipeline, SessionState};
pub use preprocess::ImagePreprocessor;
pub use status::{
    ConsoleStatusReporter, NoOpStatusReporter, StatusReporter, StatusStage, StatusTracker,
    StatusUpdate,
};
pub use types::{ProcessingTimings, RemovalResult};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from an image provided as bytes
///
/// One-call API: loads (and if needed downloads) the configured model, runs
/// the pipeline once, and returns the composited result.
///
/// # Errors
/// - Model download or load failure
/// - Decode, inference, or compositing failure
#[cfg(feature = "onnx")]
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<RemovalResult> {
    let mut pipeline = RemovalPipeline::new(config.clone())?;
    pipeline.initialize().await?;
    pipeline.process_bytes(image_bytes)
}

/// Remove the background from a decoded image
///
/// # Errors
/// - Model download or load failure
/// - Inference or compositing failure
#[cfg(feature = "onnx")]
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &PipelineConfig,
) -> Result<RemovalResult> {
    let mut pipeline = RemovalPipeline::new(config.clone())?;
    pipeline.initialize().await?;
    pipeline.process_image(&image)
}

/// Remove the background from an image file
///
/// # Errors
/// - Model download or load failure
/// - File read, decode, inference, or compositing failure
#[cfg(feature = "onnx")]
pub async fn remove_background_from_path<P: AsRef<std::path::Path>>(
    path: P,
    config: &PipelineConfig,
) -> Result<RemovalResult> {
    let mut pipeline = RemovalPipeline::new(config.clone())?;
    pipeline.initialize().await?;
    pipeline.process_file(path)
}

/// Remove the background from an image read from an async stream
///
/// # Errors
/// - Model download or load failure
/// - Stream read, decode, inference, or compositing failure
#[cfg(feature = "onnx")]
pub async fn remove_background_from_reader<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    config: &PipelineConfig,
) -> Result<RemovalResult> {
    let mut pipeline = RemovalPipeline::new(config.clone())?;
    pipeline.initialize().await?;
    pipeline.process_reader(reader).await
}

//! Error types for the background removal pipeline

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Error taxonomy for the background removal pipeline
///
/// Failures surface to the caller as status text and never crash the host
/// process; only `ModelLoad` is fatal to a session.
#[derive(Error, Debug)]
pub enum RemovalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Supplied bytes could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Model could not be obtained; fatal to the session
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Network failure while fetching a model
    #[error("Network error: {0}")]
    Network(String),

    /// Model invocation failed; the pipeline returns to ready
    #[error("Inference error: {0}")]
    Inference(String),

    /// Mask and image pixel counts disagree after resizing
    ///
    /// Internal contract violation between the inference adapter and the
    /// compositor; must never be papered over by truncation.
    #[error("Dimension mismatch: mask has {actual} entries, image has {expected} pixels")]
    DimensionMismatch {
        /// Pixel count of the image being composited
        expected: usize,
        /// Entry count of the mask
        actual: usize,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal processing failure in a pipeline stage
    #[error("Processing error: {0}")]
    Processing(String),
}

impl RemovalError {
    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a network error with operation context
    pub fn network<S: Into<String>, E: std::fmt::Display>(msg: S, source: E) -> Self {
        Self::Network(format!("{}: {}", msg.into(), source))
    }

    /// Create a file I/O error with operation context
    pub fn file_io<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create a dimension mismatch error from the two pixel counts
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Whether this error terminates the session
    ///
    /// Everything except a model load failure leaves the pipeline usable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelLoad(_))
    }
}

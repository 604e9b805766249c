//! Backend implementations for segmentation inference
//!
//! - ONNX Runtime backend (feature `onnx`)
//! - Mock backend with deterministic output, for tests and examples

#[cfg(feature = "onnx")]
pub mod onnx;

pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

pub use self::test_utils::MockSegmentationBackend;

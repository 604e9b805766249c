//! Model resolution and metadata
//!
//! Models are resolved exclusively from a remote registry URL or from the
//! local download cache; loading a model from an arbitrary filesystem path is
//! intentionally not supported.

use crate::{
    cache::ModelCache,
    error::{RemovalError, Result},
};
use std::fs;
use std::path::{Path, PathBuf};

/// Registry URL of the default segmentation model
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/briaai/RMBG-1.4";

/// Model-type hint for the segmentation architecture
///
/// The registry entry for the default model does not declare a standard
/// architecture, so the loader treats it as a custom segmentation head.
pub const MODEL_TYPE_HINT: &str = "custom";

/// Model source specification
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// Model fetched from a registry URL (downloaded on first use)
    Remote(String),
    /// Model already present in the download cache, by model ID
    Cached(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::Remote(url) => format!("remote:{url}"),
            ModelSource::Cached(model_id) => format!("cached:{model_id}"),
        }
    }

    /// Resolve the cache identifier this source maps to
    #[must_use]
    pub fn model_id(&self) -> String {
        match self {
            ModelSource::Remote(url) => ModelCache::url_to_model_id(url),
            ModelSource::Cached(model_id) => model_id.clone(),
        }
    }
}

/// Complete model specification: source plus optional precision variant
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Remote(DEFAULT_MODEL_URL.to_string()),
            variant: None,
        }
    }
}

/// Fixed preprocessing configuration for the segmentation model
///
/// These values are pinned in code rather than read from the model
/// repository: rescale by 1/255, normalize with mean 0.5 and unit std per
/// channel, resize to 1024x1024 with bilinear resampling, no padding.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessingConfig {
    /// Model-native input size as `[width, height]`
    pub target_size: [u32; 2],
    /// Per-channel normalization mean, applied after rescaling
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization std
    pub normalization_std: [f32; 3],
    /// Factor applied to raw 8-bit channel values before normalization
    pub rescale_factor: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [1024, 1024],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
            rescale_factor: 1.0 / 255.0,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub variant: String,
    pub size_bytes: usize,
    /// NCHW input shape
    pub input_shape: (usize, usize, usize, usize),
    /// NCHW output shape (single-channel mask)
    pub output_shape: (usize, usize, usize, usize),
}

/// ONNX file names per precision variant, as laid out in the registry
const VARIANT_FILES: &[(&str, &str)] = &[("fp32", "model.onnx"), ("fp16", "model_fp16.onnx")];

/// Manager for a resolved, cached model
///
/// Construction requires the model to be present in the cache; remote
/// sources are downloaded ahead of time by [`crate::download::ModelDownloader`].
#[derive(Debug)]
pub struct ModelManager {
    model_id: String,
    model_path: PathBuf,
    model_config: serde_json::Value,
    variant: String,
}

impl ModelManager {
    /// Resolve a model specification against the default cache
    ///
    /// # Errors
    /// - Model not present in the cache
    /// - Missing or unparseable `config.json`
    /// - Requested variant not available
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        Self::from_spec_with_cache(spec, &ModelCache::new()?)
    }

    /// Resolve a model specification against a specific cache
    ///
    /// # Errors
    /// - Model not present in the cache
    /// - Missing or unparseable `config.json`
    /// - Requested variant not available
    pub fn from_spec_with_cache(spec: &ModelSpec, cache: &ModelCache) -> Result<Self> {
        let model_id = spec.source.model_id();

        if !cache.is_model_cached(&model_id) {
            return Err(RemovalError::model_load(format!(
                "model '{}' is not cached; download it first (source: {})",
                model_id,
                spec.source.display_name()
            )));
        }

        let model_path = cache.model_path(&model_id);
        let model_config = Self::read_model_config(&model_path)?;
        let variant = Self::resolve_variant(&model_path, spec.variant.as_deref())?;

        Ok(Self {
            model_id,
            model_path,
            model_config,
            variant,
        })
    }

    fn read_model_config(model_path: &Path) -> Result<serde_json::Value> {
        let config_path = model_path.join("config.json");
        let content = fs::read_to_string(&config_path).map_err(|e| {
            RemovalError::model_load(format!("failed to read {}: {e}", config_path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            RemovalError::model_load(format!("failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Pick a precision variant by scanning the cached `onnx/` directory
    fn resolve_variant(model_path: &Path, requested: Option<&str>) -> Result<String> {
        let onnx_dir = model_path.join("onnx");
        let available: Vec<&str> = VARIANT_FILES
            .iter()
            .filter(|(_, file)| onnx_dir.join(file).exists())
            .map(|(variant, _)| *variant)
            .collect();

        if available.is_empty() {
            return Err(RemovalError::model_load(format!(
                "no ONNX model files found in {}",
                onnx_dir.display()
            )));
        }

        if let Some(variant) = requested {
            if available.contains(&variant) {
                return Ok(variant.to_string());
            }
            return Err(RemovalError::model_load(format!(
                "requested variant '{variant}' not available; cached variants: {available:?}"
            )));
        }

        // Full precision wins when both variants are cached
        Ok((*available
            .first()
            .expect("non-empty checked above"))
        .to_string())
    }

    /// Path of the selected ONNX model file
    #[must_use]
    pub fn model_file_path(&self) -> PathBuf {
        let file = VARIANT_FILES
            .iter()
            .find(|(variant, _)| *variant == self.variant)
            .map_or("model.onnx", |(_, file)| *file);
        self.model_path.join("onnx").join(file)
    }

    /// Load the model weights into memory
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.model_file_path();
        fs::read(&path).map_err(|e| {
            RemovalError::model_load(format!("failed to read {}: {e}", path.display()))
        })
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(self.model_file_path()).map(|m| m.len() as usize)?;
        let [width, height] = self.preprocessing_config().target_size;
        let (width, height) = (width as usize, height as usize);

        Ok(ModelInfo {
            name: format!("{}-{}", self.model_type(), self.variant),
            variant: self.variant.clone(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    /// Preprocessing configuration for this model
    ///
    /// Always the fixed configuration; the registry's preprocessor metadata
    /// is deliberately not consulted.
    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig::default()
    }

    /// Architecture hint from `config.json`, defaulting to the custom hint
    #[must_use]
    pub fn model_type(&self) -> &str {
        self.model_config
            .get("model_type")
            .and_then(|v| v.as_str())
            .unwrap_or(MODEL_TYPE_HINT)
    }

    /// Cache identifier of this model
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Selected precision variant
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage_model(cache_root: &Path, model_id: &str, variants: &[&str]) {
        let model_dir = cache_root.join(model_id);
        let onnx_dir = model_dir.join("onnx");
        fs::create_dir_all(&onnx_dir).unwrap();
        fs::write(model_dir.join("config.json"), r#"{"model_type":"custom"}"#).unwrap();
        for (variant, file) in VARIANT_FILES {
            if variants.contains(variant) {
                fs::write(onnx_dir.join(file), b"onnx-bytes").unwrap();
            }
        }
    }

    #[test]
    fn test_default_preprocessing_is_fixed() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.target_size, [1024, 1024]);
        assert_eq!(config.normalization_mean, [0.5, 0.5, 0.5]);
        assert_eq!(config.normalization_std, [1.0, 1.0, 1.0]);
        assert!((config.rescale_factor - 1.0 / 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_spec_points_at_registry() {
        let spec = ModelSpec::default();
        assert_eq!(
            spec.source,
            ModelSource::Remote(DEFAULT_MODEL_URL.to_string())
        );
        assert_eq!(spec.source.model_id(), "briaai--RMBG-1.4");
    }

    #[test]
    fn test_uncached_model_is_load_failure() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();
        let spec = ModelSpec::default();

        let err = ModelManager::from_spec_with_cache(&spec, &cache).unwrap_err();
        assert!(matches!(err, RemovalError::ModelLoad(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_variant_resolution_prefers_fp32() {
        let temp = TempDir::new().unwrap();
        stage_model(temp.path(), "acme--cutout", &["fp32", "fp16"]);
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();

        let spec = ModelSpec {
            source: ModelSource::Cached("acme--cutout".to_string()),
            variant: None,
        };
        let manager = ModelManager::from_spec_with_cache(&spec, &cache).unwrap();
        assert_eq!(manager.variant(), "fp32");
        assert!(manager.model_file_path().ends_with("onnx/model.onnx"));
    }

    #[test]
    fn test_requested_variant_must_exist() {
        let temp = TempDir::new().unwrap();
        stage_model(temp.path(), "acme--cutout", &["fp16"]);
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();

        let spec = ModelSpec {
            source: ModelSource::Cached("acme--cutout".to_string()),
            variant: Some("fp32".to_string()),
        };
        assert!(ModelManager::from_spec_with_cache(&spec, &cache).is_err());

        let spec = ModelSpec {
            source: ModelSource::Cached("acme--cutout".to_string()),
            variant: Some("fp16".to_string()),
        };
        let manager = ModelManager::from_spec_with_cache(&spec, &cache).unwrap();
        assert_eq!(manager.variant(), "fp16");
        assert_eq!(manager.model_type(), "custom");
        assert_eq!(manager.load_model().unwrap(), b"onnx-bytes");
    }
}

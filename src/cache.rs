//! Model cache management for downloaded models
//!
//! Downloaded models live in an XDG-compliant cache directory, one
//! subdirectory per model ID. This module handles cache directory creation,
//! model-ID generation from registry URLs, and the scanning behind the CLI's
//! `--list-models` and `--clear-cache` maintenance flags.

use crate::error::{RemovalError, Result};
use crate::models::DEFAULT_MODEL_URL;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache location
pub const CACHE_DIR_ENV: &str = "NOBG_CACHE_DIR";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from the registry URL)
    pub model_id: String,
    /// Path to the cached model directory
    pub path: PathBuf,
    /// Whether the model directory has a `config.json`
    pub has_config: bool,
    /// Available ONNX variants (fp32, fp16)
    pub variants: Vec<String>,
    /// Size of the model directory in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager at the default location
    ///
    /// Resolution order: `NOBG_CACHE_DIR` environment variable, then the
    /// platform cache directory (`~/.cache/nobg/models` on Linux).
    ///
    /// # Errors
    /// - Cache directory cannot be determined or created
    pub fn new() -> Result<Self> {
        let cache_dir = if let Ok(overridden) = std::env::var(CACHE_DIR_ENV) {
            PathBuf::from(overridden).join("models")
        } else {
            dirs::cache_dir()
                .ok_or_else(|| {
                    RemovalError::invalid_config(format!(
                        "failed to determine cache directory; set {CACHE_DIR_ENV}"
                    ))
                })?
                .join("nobg")
                .join("models")
        };

        Self::with_cache_dir(cache_dir)
    }

    /// Create a cache manager rooted at a specific models directory
    ///
    /// # Errors
    /// - Directory cannot be created
    pub fn with_cache_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)
                .map_err(|e| RemovalError::file_io("create cache directory", &cache_dir, &e))?;
        }
        Ok(Self { cache_dir })
    }

    /// Generate a model ID from a registry URL
    ///
    /// `https://huggingface.co/briaai/RMBG-1.4` becomes `briaai--RMBG-1.4`.
    /// Non-registry URLs get a hash-based identifier.
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        let prefix = "https://huggingface.co/";
        if let Some(repo) = url.strip_prefix(prefix) {
            repo.trim_end_matches('/').replace('/', "--")
        } else {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(url.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            format!("url-{}", digest.get(..12).unwrap_or(&digest))
        }
    }

    /// Check if a model is cached and structurally valid
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        let model_path = self.cache_dir.join(model_id);
        model_path.is_dir() && Self::validate_model_directory(&model_path)
    }

    /// A valid cached model has a config and at least one ONNX file
    fn validate_model_directory(model_path: &Path) -> bool {
        let has_config = model_path.join("config.json").is_file();
        let onnx_dir = model_path.join("onnx");
        let has_model = onnx_dir.join("model.onnx").is_file()
            || onnx_dir.join("model_fp16.onnx").is_file();
        has_config && has_model
    }

    /// Path of a model directory (may not exist)
    #[must_use]
    pub fn model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    /// The models directory this cache manages
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Scan the cache and describe every model directory found
    ///
    /// # Errors
    /// - Cache directory cannot be read
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| RemovalError::file_io("read cache directory", &self.cache_dir, &e))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| RemovalError::file_io("read cache entry", &self.cache_dir, &e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let model_id = entry.file_name().to_string_lossy().to_string();
            let onnx_dir = path.join("onnx");
            let mut variants = Vec::new();
            if onnx_dir.join("model.onnx").is_file() {
                variants.push("fp32".to_string());
            }
            if onnx_dir.join("model_fp16.onnx").is_file() {
                variants.push("fp16".to_string());
            }

            models.push(CachedModelInfo {
                model_id,
                has_config: path.join("config.json").is_file(),
                variants,
                size_bytes: dir_size(&path),
                path,
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove every cached model, returning the removed IDs
    ///
    /// # Errors
    /// - A model directory cannot be removed
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for info in self.scan_cached_models()? {
            fs::remove_dir_all(&info.path)
                .map_err(|e| RemovalError::file_io("remove model directory", &info.path, &e))?;
            removed.push(info.model_id);
        }
        Ok(removed)
    }

    /// Remove one cached model; returns false when it was not cached
    ///
    /// # Errors
    /// - The model directory cannot be removed
    pub fn clear_model(&self, model_id: &str) -> Result<bool> {
        let path = self.cache_dir.join(model_id);
        if !path.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&path)
            .map_err(|e| RemovalError::file_io("remove model directory", &path, &e))?;
        Ok(true)
    }

    /// Cache identifier of the default model
    #[must_use]
    pub fn default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    /// Registry URL of the default model
    #[must_use]
    pub fn default_model_url() -> &'static str {
        DEFAULT_MODEL_URL
    }
}

/// Recursive directory size; unreadable entries count as zero
fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// Format a byte count for display (e.g. `170.5 MB`)
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS.get(unit).copied().unwrap_or("GB"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_to_model_id() {
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/briaai/RMBG-1.4"),
            "briaai--RMBG-1.4"
        );
        let hashed = ModelCache::url_to_model_id("https://example.com/model.onnx");
        assert!(hashed.starts_with("url-"));
        assert_eq!(hashed.len(), "url-".len() + 12);
    }

    #[test]
    fn test_default_model_id() {
        assert_eq!(ModelCache::default_model_id(), "briaai--RMBG-1.4");
    }

    #[test]
    fn test_empty_cache_scan() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();
        assert!(cache.scan_cached_models().unwrap().is_empty());
        assert!(!cache.is_model_cached("anything"));
    }

    #[test]
    fn test_scan_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();

        let model_dir = cache.model_path("acme--cutout");
        fs::create_dir_all(model_dir.join("onnx")).unwrap();
        fs::write(model_dir.join("config.json"), "{}").unwrap();
        fs::write(model_dir.join("onnx/model.onnx"), vec![0u8; 128]).unwrap();

        assert!(cache.is_model_cached("acme--cutout"));
        let models = cache.scan_cached_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model_id, "acme--cutout");
        assert_eq!(models[0].variants, vec!["fp32"]);
        assert!(models[0].size_bytes >= 128);

        assert!(cache.clear_model("acme--cutout").unwrap());
        assert!(!cache.is_model_cached("acme--cutout"));
        assert!(!cache.clear_model("acme--cutout").unwrap());
    }

    #[test]
    fn test_incomplete_model_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();

        // Config without any model file does not count
        let model_dir = cache.model_path("broken");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("config.json"), "{}").unwrap();
        assert!(!cache.is_model_cached("broken"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}

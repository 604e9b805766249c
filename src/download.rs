//! Model downloading from the registry
//!
//! Async download of model repositories (registry layout: `config.json` plus
//! `onnx/` model files) with progress reporting, SHA-256 verification, and
//! atomic staging into the cache.

use crate::cache::ModelCache;
use crate::error::{RemovalError, Result};
use crate::models::{ModelSource, ModelSpec};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Files every model repository must provide
const REQUIRED_FILES: &[&str] = &["config.json"];

/// ONNX model files to attempt downloading, with their variant names
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without the CLI feature
#[derive(Debug)]
enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a new downloader against the default cache
    ///
    /// # Errors
    /// - HTTP client construction failure
    /// - Cache directory failure
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a new downloader against a specific cache
    ///
    /// # Errors
    /// - HTTP client construction failure
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| RemovalError::network("failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download a model repository into the cache
    ///
    /// Already-cached models are returned immediately. Files are staged into
    /// a temporary directory inside the cache and renamed into place only
    /// once every required file downloaded, so an interrupted download never
    /// leaves a half-populated model behind.
    ///
    /// # Errors
    /// - Unsupported URL
    /// - Network or HTTP failures
    /// - Filesystem failures while staging
    pub async fn download_model(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_model_url(url)?;

        let model_id = ModelCache::url_to_model_id(url);
        if self.cache.is_model_cached(&model_id) {
            log::info!("model already cached: {model_id}");
            return Ok(model_id);
        }

        log::info!("downloading model {model_id} from {url}");

        // Stage inside the cache directory so the final rename stays on one
        // filesystem; the TempDir cleans itself up on any failure path.
        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .tempdir_in(self.cache.cache_dir())
            .map_err(|e| {
                RemovalError::file_io("create staging directory", self.cache.cache_dir(), &e)
            })?;

        let progress = if show_progress {
            Self::progress_indicator()
        } else {
            ProgressIndicator::NoOp
        };

        match self
            .download_repository(url, staging.path(), &progress)
            .await
        {
            Ok(()) => {
                let final_dir = self.cache.model_path(&model_id);
                if final_dir.exists() {
                    fs::remove_dir_all(&final_dir).map_err(|e| {
                        RemovalError::file_io("remove stale model directory", &final_dir, &e)
                    })?;
                }
                let staged = staging.keep();
                fs::rename(&staged, &final_dir).map_err(|e| {
                    RemovalError::file_io("move downloaded model into cache", &final_dir, &e)
                })?;

                progress.finish_with_message(format!("downloaded {model_id}"));
                log::info!("successfully downloaded model: {model_id}");
                Ok(model_id)
            },
            Err(e) => {
                progress.finish_with_message("download failed".to_string());
                Err(e)
            },
        }
    }

    fn progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Download every file of the repository into `download_dir`
    async fn download_repository(
        &self,
        base_url: &str,
        download_dir: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        let raw_base = format!("{}/resolve/main/", base_url.trim_end_matches('/'));

        for file_name in REQUIRED_FILES {
            progress.set_message(format!("downloading {file_name}"));
            let file_url = format!("{raw_base}{file_name}");
            self.download_file(&file_url, &download_dir.join(file_name), progress)
                .await?;
        }

        let onnx_dir = download_dir.join("onnx");
        fs::create_dir_all(&onnx_dir)
            .map_err(|e| RemovalError::file_io("create onnx directory", &onnx_dir, &e))?;

        // At least one variant must come through; missing variants are fine
        let mut downloaded = 0;
        for (file_path, variant) in ONNX_FILES {
            progress.set_message(format!("downloading {variant} model"));
            let file_url = format!("{raw_base}{file_path}");
            match self
                .download_file(&file_url, &download_dir.join(file_path), progress)
                .await
            {
                Ok(()) => {
                    downloaded += 1;
                    log::info!("downloaded {variant} model variant");
                },
                Err(e) => {
                    log::warn!("failed to download {variant} variant: {e}");
                },
            }
        }

        if downloaded == 0 {
            return Err(RemovalError::model_load(format!(
                "no ONNX model variants could be downloaded from {base_url}"
            )));
        }

        Ok(())
    }

    /// Download one file, streaming it to disk
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        log::debug!("downloading {url} -> {}", local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RemovalError::file_io("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemovalError::network(format!("failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(RemovalError::Network(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| RemovalError::file_io("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];
        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| RemovalError::network("failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| RemovalError::file_io("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| RemovalError::file_io("flush file", local_path, &e))?;

        log::debug!("downloaded {downloaded} bytes to {}", local_path.display());
        Ok(())
    }

    /// Verify a downloaded file against an expected SHA-256 digest
    ///
    /// Files without a known digest pass trivially.
    ///
    /// # Errors
    /// - File cannot be read
    pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
        let Some(expected) = expected_hash else {
            return Ok(true);
        };

        let contents = fs::read(file_path)
            .map_err(|e| RemovalError::file_io("read file for verification", file_path, &e))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let actual = format!("{:x}", hasher.finalize());

        if actual == expected {
            Ok(true)
        } else {
            log::warn!(
                "integrity check failed for {}: expected {expected}, got {actual}",
                file_path.display()
            );
            Ok(false)
        }
    }

    /// The cache this downloader populates
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Make sure the model named by a spec is present in the cache
///
/// Remote sources are downloaded when missing; cached sources must already
/// be present. Returns the resolved model ID.
///
/// # Errors
/// - Download failure for a remote source
/// - Cached source not present in the cache
pub async fn ensure_model_available(spec: &ModelSpec, show_progress: bool) -> Result<String> {
    let cache = ModelCache::new()?;
    ensure_model_available_in(spec, &cache, show_progress).await
}

/// [`ensure_model_available`] against a specific cache
///
/// # Errors
/// - Download failure for a remote source
/// - Cached source not present in the cache
pub async fn ensure_model_available_in(
    spec: &ModelSpec,
    cache: &ModelCache,
    show_progress: bool,
) -> Result<String> {
    match &spec.source {
        ModelSource::Remote(url) => {
            let model_id = ModelCache::url_to_model_id(url);
            if cache.is_model_cached(&model_id) {
                return Ok(model_id);
            }
            let downloader = ModelDownloader::with_cache(cache.clone())?;
            downloader.download_model(url, show_progress).await
        },
        ModelSource::Cached(model_id) => {
            if cache.is_model_cached(model_id) {
                Ok(model_id.clone())
            } else {
                Err(RemovalError::model_load(format!(
                    "model '{model_id}' not found in cache"
                )))
            }
        },
    }
}

/// Validate that a URL points at a supported registry
///
/// # Errors
/// - URL does not point at a supported registry
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.starts_with("https://huggingface.co/") {
        Ok(())
    } else {
        Err(RemovalError::invalid_config(format!(
            "unsupported model URL '{url}'; only https://huggingface.co/ repositories are supported"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_model_url() {
        assert!(validate_model_url("https://huggingface.co/briaai/RMBG-1.4").is_ok());
        assert!(validate_model_url("https://example.com/model").is_err());
        assert!(validate_model_url("file:///tmp/model").is_err());
    }

    #[test]
    fn test_verify_file_integrity() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("weights.onnx");
        fs::write(&path, b"abc").unwrap();

        // sha256("abc")
        let digest = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert!(ModelDownloader::verify_file_integrity(&path, Some(digest)).unwrap());
        assert!(!ModelDownloader::verify_file_integrity(&path, Some("deadbeef")).unwrap());
        assert!(ModelDownloader::verify_file_integrity(&path, None).unwrap());
    }

    #[tokio::test]
    async fn test_ensure_available_rejects_missing_cached_source() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_cache_dir(temp.path()).unwrap();
        let spec = ModelSpec {
            source: ModelSource::Cached("missing--model".to_string()),
            variant: None,
        };

        let err = ensure_model_available_in(&spec, &cache, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::ModelLoad(_)));
    }
}

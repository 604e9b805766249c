//! Pipeline configuration

use crate::download::validate_model_url;
use crate::error::Result;
use crate::export::FilenamePolicy;
use crate::models::{ModelSource, ModelSpec};
use serde::{Deserialize, Serialize};

/// Configuration for a background removal pipeline
///
/// Frontends differ in output naming and verbosity, never in pipeline
/// behavior, so one config type covers them all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model specification (registry URL or cached model)
    pub model_spec: ModelSpec,

    /// Output filename policy for directory exports
    pub filename_policy: FilenamePolicy,

    /// Number of intra-op inference threads (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op inference threads (0 = auto)
    pub inter_threads: usize,

    /// Surface verbose status updates (timings per stage)
    pub verbose_status: bool,

    /// Show a progress bar while downloading the model
    pub show_download_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            filename_policy: FilenamePolicy::default(),
            intra_threads: 0,
            inter_threads: 0,
            verbose_status: false,
            show_download_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Remote model URL does not point at a supported registry
    pub fn validate(&self) -> Result<()> {
        if let ModelSource::Remote(url) = &self.model_spec.source {
            validate_model_url(url)?;
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the model specification
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Set the output filename policy
    #[must_use]
    pub fn filename_policy(mut self, policy: FilenamePolicy) -> Self {
        self.config.filename_policy = policy;
        self
    }

    /// Set the number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set the number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both thread counts from a total (intra = total, inter = total/2)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Enable verbose status updates
    #[must_use]
    pub fn verbose_status(mut self, verbose: bool) -> Self {
        self.config.verbose_status = verbose;
        self
    }

    /// Show a progress bar while downloading the model
    #[must_use]
    pub fn show_download_progress(mut self, show: bool) -> Self {
        self.config.show_download_progress = show;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Remote model URL does not point at a supported registry
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.filename_policy, FilenamePolicy::Static);
        assert_eq!(config.intra_threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::builder()
            .filename_policy(FilenamePolicy::Timestamped)
            .num_threads(8)
            .verbose_status(true)
            .build()
            .unwrap();

        assert_eq!(config.filename_policy, FilenamePolicy::Timestamped);
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 4);
        assert!(config.verbose_status);
    }

    #[test]
    fn test_unsupported_registry_url_is_rejected() {
        let result = PipelineConfig::builder()
            .model_spec(ModelSpec {
                source: ModelSource::Remote("https://example.com/model".to_string()),
                variant: None,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_cached_source_needs_no_url_validation() {
        let config = PipelineConfig::builder()
            .model_spec(ModelSpec {
                source: ModelSource::Cached("briaai--RMBG-1.4".to_string()),
                variant: Some("fp16".to_string()),
            })
            .build()
            .unwrap();
        assert_eq!(config.model_spec.variant.as_deref(), Some("fp16"));
    }
}

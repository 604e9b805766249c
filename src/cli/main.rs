//! Background removal CLI
//!
//! Single-image invocation of the removal pipeline, plus maintenance flags
//! for the model cache.

use crate::{
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    config::PipelineConfig,
    download::ensure_model_available,
    export::FilenamePolicy,
    models::{ModelSource, ModelSpec},
    pipeline::RemovalPipeline,
    tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

/// Background removal CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "nobg")]
pub struct Cli {
    /// Input image file (use "-" for stdin)
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = &["only_download", "list_models", "clear_cache", "show_cache_dir"]
    )]
    pub input: Option<String>,

    /// Output file path [default: filename policy applied in the output directory]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Directory for policy-named output [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Name the output no-bg-<timestamp>.png instead of processed-image.png
    #[arg(long)]
    pub timestamped: bool,

    /// Model registry URL or cached model ID [default: briaai/RMBG-1.4]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model variant (fp32, fp16) [default: fp32]
    #[arg(long)]
    pub variant: Option<String>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Download the model but don't process anything
    #[arg(long)]
    pub only_download: bool,

    /// List cached models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear one model)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show the current cache directory and exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Use a custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    if let Some(dir) = &cli.cache_dir {
        // The cache resolves its location through this variable
        std::env::set_var(CACHE_DIR_ENV, dir);
    }

    if cli.list_models {
        return list_cached_models();
    }
    if cli.clear_cache {
        return clear_cached_models(&cli);
    }
    if cli.show_cache_dir {
        let cache = ModelCache::new().context("Failed to open model cache")?;
        println!("{}", cache.cache_dir().display());
        return Ok(());
    }

    let model_spec = build_model_spec(&cli);

    if cli.only_download {
        let model_id = ensure_model_available(&model_spec, true)
            .await
            .context("Failed to download model")?;
        println!("Model available: {model_id}");
        return Ok(());
    }

    let input = cli
        .input
        .as_deref()
        .context("At least one input is required")?;

    let config = PipelineConfig::builder()
        .model_spec(model_spec)
        .num_threads(cli.threads)
        .filename_policy(if cli.timestamped {
            FilenamePolicy::Timestamped
        } else {
            FilenamePolicy::Static
        })
        .verbose_status(cli.verbose > 0)
        .show_download_progress(true)
        .build()
        .context("Invalid configuration")?;

    let mut pipeline =
        RemovalPipeline::new(config).context("Failed to create removal pipeline")?;
    pipeline
        .initialize()
        .await
        .context("Failed to load model")?;

    let result = if input == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read stdin")?;
        pipeline
            .process_bytes(&buffer)
            .context("Failed to process image from stdin")?
    } else {
        pipeline
            .process_file(input)
            .with_context(|| format!("Failed to process '{input}'"))?
    };

    let written = if let Some(output) = &cli.output {
        result
            .save_png(output)
            .with_context(|| format!("Failed to write '{}'", output.display()))?;
        output.clone()
    } else {
        let dir = cli
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        result
            .save_into_dir(&dir, pipeline.config().filename_policy)
            .context("Failed to write output")?
    };

    println!("{} -> {}", input, written.display());
    println!("{}", result.timings.summary());
    Ok(())
}

/// Turn the --model argument into a model specification
fn build_model_spec(cli: &Cli) -> ModelSpec {
    let source = match &cli.model {
        Some(model) if model.starts_with("https://") => ModelSource::Remote(model.clone()),
        Some(model) => ModelSource::Cached(model.clone()),
        None => ModelSpec::default().source,
    };
    ModelSpec {
        source,
        variant: cli.variant.clone(),
    }
}

fn list_cached_models() -> Result<()> {
    let cache = ModelCache::new().context("Failed to open model cache")?;
    let models = cache.scan_cached_models().context("Failed to scan cache")?;

    if models.is_empty() {
        println!(
            "No cached models. Run with --only-download to fetch the default model ({}).",
            ModelCache::default_model_url()
        );
        return Ok(());
    }

    println!("Cached models in {}:", cache.cache_dir().display());
    for info in models {
        println!(
            "  {} [{}] {}",
            info.model_id,
            info.variants.join(", "),
            format_size(info.size_bytes)
        );
    }
    Ok(())
}

fn clear_cached_models(cli: &Cli) -> Result<()> {
    let cache = ModelCache::new().context("Failed to open model cache")?;

    if let Some(model) = &cli.model {
        let model_id = if model.starts_with("https://") {
            ModelCache::url_to_model_id(model)
        } else {
            model.clone()
        };
        if cache.clear_model(&model_id).context("Failed to clear model")? {
            println!("Removed {model_id}");
        } else {
            println!("Model {model_id} is not cached");
        }
    } else {
        let removed = cache.clear_all_models().context("Failed to clear cache")?;
        println!("Removed {} model(s)", removed.len());
    }
    Ok(())
}

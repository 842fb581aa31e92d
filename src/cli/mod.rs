//! Command-line interface
//!
//! Only available when the "cli" feature is enabled. The default
//! subcommand-less invocation starts the web interface; cache maintenance
//! flags run their task and exit.

use crate::cache::{format_size, ModelCache};
use crate::config::ExecutionProvider;
use crate::download::ModelDownloader;
use crate::models::ModelName;
use crate::tracing_config::TracingConfig;
use anyhow::{Context, Result};
use clap::Parser;

/// Background removal web interface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "detourage")]
pub struct Cli {
    /// Address to bind the web interface to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Model to download before serving starts
    #[arg(short, long)]
    pub model: Option<ModelName>,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value = "auto")]
    pub execution_provider: ExecutionProvider,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Use a custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<String>,

    /// List cached models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models and exit (combine with --model for one model)
    #[arg(long)]
    pub clear_cache: bool,

    /// Download the model given with --model (or all models) and exit
    #[arg(long)]
    pub only_download: bool,

    /// Show execution provider availability and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    fn cache(&self) -> Result<ModelCache> {
        match &self.cache_dir {
            Some(dir) => ModelCache::with_dir(dir.clone()).context("Failed to open cache directory"),
            None => ModelCache::new().context("Failed to resolve cache directory"),
        }
    }
}

/// CLI entry point
///
/// # Errors
/// - Invalid arguments or configuration
/// - Cache, download or server failures
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .init()
        .context("Failed to initialize logging")?;

    if cli.show_providers {
        return show_providers();
    }

    let cache = cli.cache()?;

    if cli.list_models {
        return list_models(&cache);
    }
    if cli.clear_cache {
        return clear_cache(&cache, cli.model);
    }
    if cli.only_download {
        return download_models(&cache, cli.model).await;
    }

    serve(&cli, cache).await
}

fn list_models(cache: &ModelCache) -> Result<()> {
    let cached = cache.scan_cached_models()?;
    println!("Cache directory: {}", cache.cache_dir().display());
    for model in ModelName::all() {
        match cached.iter().find(|c| c.model == model) {
            Some(info) => println!(
                "  {model} ({}) - {}",
                format_size(info.size_bytes),
                model.spec().description
            ),
            None => println!("  {model} (not downloaded) - {}", model.spec().description),
        }
    }
    Ok(())
}

fn clear_cache(cache: &ModelCache, model: Option<ModelName>) -> Result<()> {
    match model {
        Some(model) => {
            if cache.clear_model(model)? {
                println!("Removed {model} from cache");
            } else {
                println!("{model} was not cached");
            }
        },
        None => {
            let removed = cache.clear_all()?;
            println!("Removed {removed} cached model(s)");
        },
    }
    Ok(())
}

async fn download_models(cache: &ModelCache, model: Option<ModelName>) -> Result<()> {
    let downloader = ModelDownloader::with_cache(cache.clone())?;
    let models: Vec<ModelName> = match model {
        Some(model) => vec![model],
        None => ModelName::all().to_vec(),
    };
    for model in models {
        let path = downloader.ensure_model(model, true).await?;
        println!("{model}: {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn show_providers() -> Result<()> {
    println!("Execution providers:");
    for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
        let status = if available { "available" } else { "unavailable" };
        println!("  {name:<8} {status:<12} {description}");
    }
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn show_providers() -> Result<()> {
    anyhow::bail!("Provider listing not available (requires the onnx feature)")
}

#[cfg(all(feature = "web", feature = "onnx"))]
async fn serve(cli: &Cli, cache: ModelCache) -> Result<()> {
    use crate::config::RemovalConfig;
    use crate::session_pool::SessionPool;
    use std::net::SocketAddr;
    use std::sync::Arc;

    let base_config = RemovalConfig::builder()
        .execution_provider(cli.execution_provider)
        .num_threads(cli.threads)
        .build()
        .context("Invalid configuration")?;

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("Invalid host/port combination")?;

    // Warm the model cache before binding
    if let Some(model) = cli.model {
        let downloader = ModelDownloader::with_cache(cache.clone())?;
        downloader.ensure_model(model, true).await?;
    }

    let pool = Arc::new(SessionPool::new(base_config, cache)?);
    println!("Serving on http://{addr}");
    crate::web::serve(addr, pool).await?;
    Ok(())
}

#[cfg(not(all(feature = "web", feature = "onnx")))]
async fn serve(_cli: &Cli, _cache: ModelCache) -> Result<()> {
    anyhow::bail!("Web interface not available (requires the web and onnx features)")
}

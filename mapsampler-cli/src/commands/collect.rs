//! The `collect` command: entities in, labeled images and a manifest out.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mapsampler::cache::{DiskCachedFetcher, TileCache};
use mapsampler::collector::{
    CollectionReport, CollectorError, JsonEntityProducer, LabelConverter, LabelKind,
    SampleCollector,
};
use mapsampler::config::CollectorConfig;
use mapsampler::provider::{HttpTileFetcher, ReqwestClient, TileBytesFetcher, TileSource};

use super::common::{resolve_sources, LabelArg};
use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Entity file (.json) or a directory of entity files
    #[arg(long)]
    pub input: PathBuf,

    /// Folder receiving the images and the manifest
    #[arg(long)]
    pub output: PathBuf,

    /// Dataset id, also the manifest file name (<dataset>.csv)
    #[arg(long)]
    pub dataset: String,

    /// Which entities to sample and how to label them
    #[arg(long, value_enum, default_value = "runway")]
    pub label: LabelArg,

    /// Imagery source as [name=]kind:url, repeatable (replaces config sources)
    #[arg(long = "source")]
    pub sources: Vec<TileSource>,

    /// Imagery zoom level (0-22)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=22))]
    pub zoom: Option<u8>,

    /// Fraction the sample box grows by (0.4 = 1.4x)
    #[arg(long)]
    pub grow_factor: Option<f64>,

    /// Minimum sample width and height in meters
    #[arg(long)]
    pub min_bbox_meters: Option<f64>,

    /// Largest side of written images in pixels
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Keep the output folder and reuse images already in it
    #[arg(long)]
    pub incremental: bool,

    /// Concurrent tile fetches
    #[arg(long)]
    pub workers: Option<usize>,

    /// Retries after a failed tile fetch
    #[arg(long)]
    pub retries: Option<u32>,

    /// In-memory tile cache entries
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Keep downloaded tile bytes in this folder across runs
    #[arg(long)]
    pub disk_cache: Option<PathBuf>,
}

impl CollectArgs {
    /// Applies the command-line overrides on top of the file settings.
    fn apply(&self, mut config: CollectorConfig) -> CollectorConfig {
        if let Some(zoom) = self.zoom {
            config = config.with_zoom(zoom);
        }
        if let Some(factor) = self.grow_factor {
            config = config.with_grow_factor(factor);
        }
        if let Some(meters) = self.min_bbox_meters {
            config = config.with_min_bbox_meters(meters);
        }
        if let Some(pixels) = self.max_dimension {
            config = config.with_max_output_dimension(pixels);
        }
        if self.incremental {
            config = config.with_clear_output(false);
        }
        if let Some(workers) = self.workers {
            config = config.with_worker_pool_size(workers);
        }
        if let Some(retries) = self.retries {
            config = config.with_max_retries(retries);
        }
        if let Some(capacity) = self.cache_capacity {
            config = config.with_cache_capacity(capacity);
        }
        if self.disk_cache.is_some() {
            config = config.with_disk_cache_dir(self.disk_cache.clone());
        }
        config
    }

    fn validate(&self) -> Result<(), CliError> {
        if self.dataset.trim().is_empty() {
            return Err(CliError::Config("--dataset must not be empty".to_string()));
        }
        if matches!(self.grow_factor, Some(f) if f < 0.0) {
            return Err(CliError::Config("--grow-factor must be 0 or more".to_string()));
        }
        if matches!(self.min_bbox_meters, Some(m) if m < 0.0) {
            return Err(CliError::Config("--min-bbox-meters must be 0 or more".to_string()));
        }
        for (flag, value) in [
            ("--max-dimension", self.max_dimension.map(|v| v as usize)),
            ("--workers", self.workers),
            ("--cache-capacity", self.cache_capacity),
        ] {
            if value == Some(0) {
                return Err(CliError::Config(format!("{} must be at least 1", flag)));
            }
        }
        Ok(())
    }
}

/// Run the collect command.
pub fn run(args: CollectArgs, verbose: bool) -> Result<(), CliError> {
    args.validate()?;

    let runner = CliRunner::new(verbose)?;
    runner.log_startup("collect");

    let config = args.apply(CollectorConfig::from_config_file(runner.config()));
    let sources = resolve_sources(args.sources.clone(), runner.config())?;
    let converter: Arc<dyn LabelConverter> = Arc::from(LabelKind::from(args.label).converter());

    let client = ReqwestClient::with_timeout(config.http_timeout_secs)
        .map_err(|e| CollectorError::HttpClient(e.to_string()))?;
    let http = HttpTileFetcher::new(client);
    let bytes: Arc<dyn TileBytesFetcher> = match &config.disk_cache_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Disk tile cache enabled");
            Arc::new(DiskCachedFetcher::new(http, dir.clone()))
        }
        None => Arc::new(http),
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling... the manifest for finished samples is still written.");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("failed to install Ctrl-C handler: {}", e)))?;

    let cache = Arc::new(TileCache::new(config.cache_capacity));
    let collector = SampleCollector::with_cache(config, sources, bytes, converter, cache, cancel)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let report = runtime.block_on(collector.collect_from_input(
        &args.dataset,
        &args.input,
        &JsonEntityProducer,
        &args.output,
    ))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &CollectionReport) {
    println!();
    println!("Dataset:   {}", report.dataset_id);
    println!("Entities:  {}", report.entities);
    println!("Saved:     {}", report.saved);
    println!("Reused:    {}", report.reused);
    println!("Skipped:   {}", report.skipped.len());
    println!("Manifest:  {} ({} rows)", report.manifest_path.display(), report.records);
    println!(
        "Cache:     {} hits, {} misses ({:.0}% hit rate)",
        report.cache.hits,
        report.cache.misses,
        report.cache.hit_rate() * 100.0
    );

    if report.cancelled {
        warn!("Run was cancelled before every sample finished");
        println!();
        println!("Run cancelled. Rerun with --incremental to continue where it stopped.");
    }
}

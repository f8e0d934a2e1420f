//! The sample collection loop.
//!
//! For every imagery source and every entity, in that order:
//!
//! ```text
//! Pending → TilesRequested → Assembling → Saved
//!    │            │               │
//!    └────────────┴───────────────┴──────→ Skipped
//! ```
//!
//! A sample whose image already exists in the output folder is reused
//! without fetching anything. Entities are processed a few at a time through
//! an order-preserving buffered stream, so manifest rows follow input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use image::{ImageFormat, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::entity::{input_files, Entity, EntityProducer, Tags};
use super::error::{CollectorError, SkipReason};
use super::labels::{LabelConverter, SampleRecord};
use super::manifest::Manifest;
use crate::assembly::{downscale, RegionAssembler};
use crate::cache::{CacheStats, TileCache};
use crate::config::CollectorConfig;
use crate::coord::GeoBox;
use crate::executor::{RetryPolicy, TileFetcher, WorkerPool};
use crate::provider::{TileBytesFetcher, TileSource};
use crate::tileset::TileSet;

/// Where one sample is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStage {
    Pending,
    TilesRequested,
    Assembling,
    Saved,
    Skipped,
}

impl EntityStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntityStage::Saved | EntityStage::Skipped)
    }
}

/// How one sample ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// A new image was written.
    Saved,
    /// An image from an earlier run was kept.
    Reused,
    Skipped(SkipReason),
}

/// A sample that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSample {
    pub entity_key: i64,
    pub source_index: usize,
    pub reason: SkipReason,
}

/// Summary of a collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionReport {
    pub dataset_id: String,
    /// Entities read from the input
    pub entities: usize,
    pub saved: usize,
    pub reused: usize,
    pub skipped: Vec<SkippedSample>,
    /// Rows written to the manifest
    pub records: usize,
    pub manifest_path: PathBuf,
    pub cancelled: bool,
    pub cache: CacheStats,
}

/// One entity sampled from one source.
struct SampleJob<'a> {
    entity: &'a Entity,
    /// Id when positive, otherwise the position in the input
    key: i64,
    source_index: usize,
    source: &'a Arc<TileSource>,
    bbox: GeoBox,
    stage: EntityStage,
}

impl SampleJob<'_> {
    fn file_name(&self) -> String {
        format!("{}_{}.png", self.key, self.source_index)
    }

    fn advance(&mut self, stage: EntityStage) {
        debug!(
            entity = self.key,
            source_index = self.source_index,
            from = ?self.stage,
            to = ?stage,
            "Sample stage"
        );
        self.stage = stage;
    }

    fn skip(&mut self, reason: SkipReason) -> SampleOutcome {
        self.advance(EntityStage::Skipped);
        warn!(
            entity = self.key,
            source = self.source.name(),
            reason = %reason,
            "Sample skipped"
        );
        SampleOutcome::Skipped(reason)
    }
}

/// Collects labeled image samples for entities.
///
/// The tile cache and worker pool are shared by every sample of every run
/// made with this collector.
pub struct SampleCollector {
    config: CollectorConfig,
    sources: Vec<Arc<TileSource>>,
    cache: Arc<TileCache>,
    fetcher: Arc<TileFetcher>,
    assembler: RegionAssembler,
    converter: Arc<dyn LabelConverter>,
    cancel: CancellationToken,
}

impl SampleCollector {
    /// Creates a collector with its own tile cache.
    ///
    /// Each source is sampled in order; its position is the `sourceIndex`
    /// in image file names.
    pub fn new(
        config: CollectorConfig,
        sources: Vec<TileSource>,
        bytes: Arc<dyn TileBytesFetcher>,
        converter: Arc<dyn LabelConverter>,
    ) -> Result<Self, CollectorError> {
        let cache = Arc::new(TileCache::new(config.cache_capacity));
        Self::with_cache(config, sources, bytes, converter, cache, CancellationToken::new())
    }

    /// Creates a collector using an existing cache and cancellation token.
    pub fn with_cache(
        config: CollectorConfig,
        sources: Vec<TileSource>,
        bytes: Arc<dyn TileBytesFetcher>,
        converter: Arc<dyn LabelConverter>,
        cache: Arc<TileCache>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        if sources.is_empty() {
            return Err(CollectorError::NoSources);
        }

        let pool = Arc::new(WorkerPool::new(config.worker_pool_size));
        let fetcher = TileFetcher::new(bytes, pool, RetryPolicy::with_retries(config.max_retries))
            .with_cancellation(cancel.clone());

        Ok(Self {
            assembler: RegionAssembler::new(config.clip_and_center),
            sources: sources.into_iter().map(Arc::new).collect(),
            cache,
            fetcher: Arc::new(fetcher),
            converter,
            cancel,
            config,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn sources(&self) -> &[Arc<TileSource>] {
        &self.sources
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &Arc<TileFetcher> {
        &self.fetcher
    }

    /// Cancelling this token stops the run. Samples not finished yet are
    /// skipped and the manifest is still written.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Reads entities from `input` (a file, or a directory of files the
    /// producer accepts) and collects samples for those the converter wants.
    pub async fn collect_from_input(
        &self,
        dataset_id: &str,
        input: &Path,
        producer: &dyn EntityProducer,
        out_dir: &Path,
    ) -> Result<CollectionReport, CollectorError> {
        let files = input_files(input, producer)
            .map_err(|source| CollectorError::Filesystem {
                path: input.to_path_buf(),
                source,
            })?
            .ok_or_else(|| CollectorError::InvalidInput(input.to_path_buf()))?;

        let converter = Arc::clone(&self.converter);
        let predicate = move |tags: &Tags| converter.is_good_sample(tags);

        let mut entities = Vec::new();
        for file in &files {
            info!(input = %file.display(), "Processing");
            entities.extend(producer.parse(file, &predicate)?);
        }

        self.collect_samples(dataset_id, &entities, out_dir).await
    }

    /// Samples every entity from every source and writes
    /// `out_dir/<dataset_id>.csv`.
    #[instrument(skip_all, fields(dataset = dataset_id, entities = entities.len()))]
    pub async fn collect_samples(
        &self,
        dataset_id: &str,
        entities: &[Entity],
        out_dir: &Path,
    ) -> Result<CollectionReport, CollectorError> {
        self.prepare_output(out_dir).await?;

        let jobs: Vec<SampleJob<'_>> = self
            .sources
            .iter()
            .enumerate()
            .flat_map(|(source_index, source)| {
                entities.iter().enumerate().map(move |(idx, entity)| SampleJob {
                    entity,
                    key: if entity.id > 0 { entity.id } else { idx as i64 },
                    source_index,
                    source,
                    bbox: self.sample_box(&entity.bbox),
                    stage: EntityStage::Pending,
                })
            })
            .collect();

        info!(
            samples = jobs.len(),
            sources = self.sources.len(),
            out = %out_dir.display(),
            "Collecting samples"
        );

        let results: Vec<(SampleJob<'_>, SampleOutcome, Option<SampleRecord>)> = stream::iter(jobs)
            .map(|job| self.run_job(job, out_dir))
            .buffered(self.config.entity_parallelism.max(1))
            .collect()
            .await;

        let mut manifest = Manifest::new(dataset_id, self.converter.label_columns());
        let mut saved = 0;
        let mut reused = 0;
        let mut skipped = Vec::new();

        for (job, outcome, record) in results {
            match outcome {
                SampleOutcome::Saved => saved += 1,
                SampleOutcome::Reused => reused += 1,
                SampleOutcome::Skipped(reason) => {
                    skipped.push(SkippedSample {
                        entity_key: job.key,
                        source_index: job.source_index,
                        reason,
                    });
                    continue;
                }
            }
            if let Some(record) = record {
                manifest.push(record);
            }
        }

        manifest.retain_existing(out_dir).await;
        let manifest_path = manifest.write_csv(out_dir)?;

        let report = CollectionReport {
            dataset_id: dataset_id.to_string(),
            entities: entities.len(),
            saved,
            reused,
            skipped,
            records: manifest.len(),
            manifest_path,
            cancelled: self.cancel.is_cancelled(),
            cache: self.cache.stats(),
        };
        info!(
            saved = report.saved,
            reused = report.reused,
            skipped = report.skipped.len(),
            records = report.records,
            cancelled = report.cancelled,
            "Collection finished"
        );
        Ok(report)
    }

    /// The entity box grown to the minimum size, then by the grow factor.
    /// Malformed boxes are left as they are and fail later.
    fn sample_box(&self, bbox: &GeoBox) -> GeoBox {
        if bbox.validate().is_err() {
            return *bbox;
        }
        bbox.grow_to_sample(self.config.min_bbox_meters, self.config.grow_factor)
            .clamp_to_world()
    }

    async fn prepare_output(&self, out_dir: &Path) -> Result<(), CollectorError> {
        let fs_error = |source| CollectorError::Filesystem {
            path: out_dir.to_path_buf(),
            source,
        };

        if self.config.clear_output_before_run && tokio::fs::try_exists(out_dir).await.map_err(fs_error)? {
            info!(out = %out_dir.display(), "Clearing output folder");
            tokio::fs::remove_dir_all(out_dir).await.map_err(fs_error)?;
        }
        tokio::fs::create_dir_all(out_dir).await.map_err(fs_error)
    }

    async fn run_job<'a>(
        &self,
        mut job: SampleJob<'a>,
        out_dir: &Path,
    ) -> (SampleJob<'a>, SampleOutcome, Option<SampleRecord>) {
        let file_name = job.file_name();

        let Some(record) = self.converter.convert(&file_name, job.entity) else {
            let outcome = job.skip(SkipReason::NoLabel);
            return (job, outcome, None);
        };

        let outcome = self.sample(&mut job, &out_dir.join(&file_name)).await;
        (job, outcome, Some(record))
    }

    #[instrument(level = "debug", skip_all, fields(entity = job.key, source = job.source.name()))]
    async fn sample(&self, job: &mut SampleJob<'_>, out_path: &Path) -> SampleOutcome {
        if is_file(out_path).await {
            debug!(path = %out_path.display(), "Reusing existing image");
            job.advance(EntityStage::Saved);
            return SampleOutcome::Reused;
        }
        if self.cancel.is_cancelled() {
            return job.skip(SkipReason::Cancelled);
        }

        let set = match TileSet::new(
            Arc::clone(&self.cache),
            Arc::clone(job.source),
            &job.bbox,
            self.config.zoom,
        ) {
            Ok(set) => set,
            Err(e) => return job.skip(SkipReason::InvalidGeometry(e)),
        };
        if set.is_empty() {
            return job.skip(SkipReason::EmptyTileSet);
        }

        job.advance(EntityStage::TilesRequested);
        let summary = set.load_all_blocking(&self.fetcher, false).await;
        if summary.failed > 0 && self.cancel.is_cancelled() {
            return job.skip(SkipReason::Cancelled);
        }

        job.advance(EntityStage::Assembling);
        let image = match self.assembler.assemble(&set, &job.bbox) {
            Ok(image) => downscale(image, self.config.max_output_dimension),
            Err(e) => return job.skip(e.into()),
        };

        let (width, height) = image.dimensions();
        if let Err(e) = save_png(image, out_path.to_path_buf()).await {
            return job.skip(SkipReason::Filesystem(e));
        }

        job.advance(EntityStage::Saved);
        info!(
            entity = job.key,
            source = job.source.name(),
            path = %out_path.display(),
            width,
            height,
            "Sample saved"
        );
        SampleOutcome::Saved
    }
}

/// Encodes and writes a PNG off the async threads.
async fn save_png(image: RgbaImage, path: PathBuf) -> Result<(), String> {
    tokio::task::spawn_blocking(move || image.save_with_format(&path, ImageFormat::Png))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

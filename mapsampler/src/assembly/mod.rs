//! Region image assembly.
//!
//! Stitches the tiles of a loaded [`TileSet`] into one raster, crops it to a
//! geographic box and optionally scales it down. A set with any tile missing
//! never produces an image.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::cache::TileState;
use crate::coord::{self, CoordError, GeoBox, TileCoord, TileRange};
use crate::tileset::TileSet;

/// Errors from assembling a region image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    /// One or more tiles did not load.
    #[error("{} of {} tiles not loaded", .missed.len(), .total)]
    Incomplete { missed: Vec<TileCoord>, total: usize },

    /// The tile set covers no tiles.
    #[error("Tile set is empty")]
    EmptyTileSet,

    /// The crop box has no pixels.
    #[error("Region crops to an empty image")]
    EmptyRegion,

    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Pixel rectangle inside a stitched raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Builds region images from tile sets.
#[derive(Debug, Clone, Copy)]
pub struct RegionAssembler {
    clip_and_center: bool,
}

impl Default for RegionAssembler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RegionAssembler {
    /// With `clip_and_center` off, [`assemble`](Self::assemble) returns the
    /// whole stitched raster.
    pub fn new(clip_and_center: bool) -> Self {
        Self { clip_and_center }
    }

    pub fn clip_and_center(&self) -> bool {
        self.clip_and_center
    }

    /// Stitches `set` and, when clipping, crops it to `bbox`.
    #[instrument(level = "debug", skip_all, fields(source = set.source().name(), tiles = set.len()))]
    pub fn assemble(&self, set: &TileSet, bbox: &GeoBox) -> Result<RgbaImage, AssemblyError> {
        let stitched = self.stitch(set)?;
        if !self.clip_and_center {
            return Ok(stitched);
        }

        let range = set.range().ok_or(AssemblyError::EmptyTileSet)?;
        let rect = crop_rect(&range, set.source().tile_size(), bbox)?;
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "Cropping stitched raster"
        );

        Ok(imageops::crop_imm(&stitched, rect.x, rect.y, rect.width, rect.height).to_image())
    }

    /// Draws every tile of `set` into one raster of
    /// `width * tile_size` by `height * tile_size` pixels.
    pub fn stitch(&self, set: &TileSet) -> Result<RgbaImage, AssemblyError> {
        let range = set.range().ok_or(AssemblyError::EmptyTileSet)?;
        let tile_size = set.source().tile_size();

        let mut tiles = Vec::with_capacity(set.len());
        let mut missed = Vec::new();
        for coord in range.coords() {
            match set.entry(coord) {
                Some(entry) if entry.state() == TileState::Loaded => match entry.image() {
                    Some(image) => tiles.push((coord, image)),
                    None => missed.push(coord),
                },
                _ => missed.push(coord),
            }
        }

        if !missed.is_empty() {
            return Err(AssemblyError::Incomplete {
                missed,
                total: set.len(),
            });
        }

        let mut canvas = RgbaImage::new(range.width() * tile_size, range.height() * tile_size);
        for (coord, image) in tiles {
            let x = ((coord.x - range.min_x) * tile_size) as i64;
            let y = ((coord.y - range.min_y) * tile_size) as i64;
            if image.dimensions() == (tile_size, tile_size) {
                imageops::replace(&mut canvas, image.as_ref(), x, y);
            } else {
                let resized = imageops::resize(image.as_ref(), tile_size, tile_size, FilterType::Triangle);
                imageops::replace(&mut canvas, &resized, x, y);
            }
        }

        Ok(canvas)
    }
}

/// Pixel span of `bbox` inside the raster stitched from `range`.
///
/// The span is clamped to the raster.
pub fn crop_rect(range: &TileRange, tile_size: u32, bbox: &GeoBox) -> Result<PixelRect, AssemblyError> {
    let bbox = bbox.clamp_to_mercator();
    let top_left = coord::to_tile_xy(bbox.max_lat, bbox.min_lon, range.zoom)?;
    let bottom_right = coord::to_tile_xy(bbox.min_lat, bbox.max_lon, range.zoom)?;

    let size = tile_size as f64;
    let full_w = range.width() as f64 * size;
    let full_h = range.height() as f64 * size;
    let to_px = |t: f64, min: u32, full: f64| ((t - min as f64) * size).round().clamp(0.0, full) as u32;

    let x0 = to_px(top_left.x, range.min_x, full_w);
    let y0 = to_px(top_left.y, range.min_y, full_h);
    let x1 = to_px(bottom_right.x, range.min_x, full_w);
    let y1 = to_px(bottom_right.y, range.min_y, full_h);

    if x1 <= x0 || y1 <= y0 {
        return Err(AssemblyError::EmptyRegion);
    }

    Ok(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Output size after limiting the larger side to `max_dimension`.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let larger = width.max(height);
    if max_dimension == 0 || larger <= max_dimension {
        return (width, height);
    }
    let ratio = larger as f64 / max_dimension as f64;
    let scale = |side: u32| {
        if side == larger {
            max_dimension
        } else {
            ((side as f64 / ratio).round() as u32).max(1)
        }
    };
    (scale(width), scale(height))
}

/// Shrinks `image` with bilinear filtering so its larger side is at most
/// `max_dimension`. Smaller images are returned unchanged.
pub fn downscale(image: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = scaled_dimensions(width, height, max_dimension);
    if (new_w, new_h) == (width, height) {
        return image;
    }
    imageops::resize(&image, new_w, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TileCache, TileFetchError, TileKey};
    use crate::provider::{ProviderError, SourceKind, TileSource};
    use image::Rgba;
    use std::sync::Arc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn source(tile_size: u32) -> Arc<TileSource> {
        Arc::new(
            TileSource::new("fixture", SourceKind::Tms, "mem://{z}/{x}/{y}")
                .unwrap()
                .with_tile_size(tile_size),
        )
    }

    fn put_loaded(cache: &TileCache, coord: TileCoord, image: RgbaImage) {
        let entry = cache.get_or_create(&TileKey::new(Arc::from("fixture"), coord));
        assert!(entry.try_claim(true));
        entry.begin_attempt();
        entry.finish_loaded(image);
    }

    fn put_failed(cache: &TileCache, coord: TileCoord) {
        let entry = cache.get_or_create(&TileKey::new(Arc::from("fixture"), coord));
        assert!(entry.try_claim(true));
        entry.begin_attempt();
        entry.record_failure(TileFetchError::Provider(ProviderError::HttpError(
            "timeout".to_string(),
        )));
        entry.finish_failed();
    }

    fn two_tile_set(cache: &Arc<TileCache>) -> TileSet {
        let range = TileRange::new(100, 101, 200, 200, 18).unwrap();
        TileSet::from_range(Arc::clone(cache), source(256), range).unwrap()
    }

    #[test]
    fn test_stitches_two_tiles_to_512_by_256() {
        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(100, 200, 18), RgbaImage::from_pixel(256, 256, RED));
        put_loaded(&cache, TileCoord::new(101, 200, 18), RgbaImage::from_pixel(256, 256, BLUE));
        let set = two_tile_set(&cache);

        let bbox = GeoBox::new(0.0, 0.0, 0.1, 0.1).unwrap();
        let image = RegionAssembler::new(false).assemble(&set, &bbox).unwrap();

        assert_eq!(image.dimensions(), (512, 256));
        assert_eq!(*image.get_pixel(10, 10), RED);
        assert_eq!(*image.get_pixel(300, 10), BLUE);
    }

    #[test]
    fn test_any_missed_tile_fails_assembly() {
        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(100, 200, 18), RgbaImage::from_pixel(256, 256, RED));
        put_failed(&cache, TileCoord::new(101, 200, 18));
        let set = two_tile_set(&cache);
        let bbox = GeoBox::new(0.0, 0.0, 0.1, 0.1).unwrap();

        for clip in [false, true] {
            let result = RegionAssembler::new(clip).assemble(&set, &bbox);
            assert_eq!(
                result,
                Err(AssemblyError::Incomplete {
                    missed: vec![TileCoord::new(101, 200, 18)],
                    total: 2,
                })
            );
        }
    }

    #[test]
    fn test_absent_tile_counts_as_missed() {
        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(101, 200, 18), RgbaImage::from_pixel(256, 256, BLUE));
        let set = two_tile_set(&cache);

        let result = RegionAssembler::new(false).stitch(&set);
        assert!(matches!(result, Err(AssemblyError::Incomplete { .. })));
    }

    #[test]
    fn test_empty_set_fails() {
        let cache = Arc::new(TileCache::new(16));
        let bbox = GeoBox::new(0.0, 0.0, 0.1, 0.1).unwrap();
        let set = TileSet::new(Arc::clone(&cache), source(256), &bbox, 0).unwrap();

        assert_eq!(
            RegionAssembler::default().assemble(&set, &bbox),
            Err(AssemblyError::EmptyTileSet)
        );
    }

    #[test]
    fn test_crop_to_fractional_span() {
        let zoom = 18;
        let (max_lat, min_lon) = coord::to_lat_lon(100.25, 200.25, zoom).unwrap();
        let (min_lat, max_lon) = coord::to_lat_lon(101.5, 200.75, zoom).unwrap();
        let bbox = GeoBox::new(min_lat, min_lon, max_lat, max_lon).unwrap();

        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(100, 200, zoom), RgbaImage::from_pixel(256, 256, RED));
        put_loaded(&cache, TileCoord::new(101, 200, zoom), RgbaImage::from_pixel(256, 256, BLUE));
        let set = two_tile_set(&cache);

        let range = set.range().unwrap();
        assert_eq!(
            crop_rect(&range, 256, &bbox).unwrap(),
            PixelRect {
                x: 64,
                y: 64,
                width: 320,
                height: 128,
            }
        );

        let image = RegionAssembler::new(true).assemble(&set, &bbox).unwrap();
        assert_eq!(image.dimensions(), (320, 128));
        assert_eq!(*image.get_pixel(0, 0), RED);
        assert_eq!(*image.get_pixel(319, 127), BLUE);
    }

    #[test]
    fn test_crop_clamped_to_raster() {
        let range = TileRange::new(100, 101, 200, 200, 18).unwrap();
        let (max_lat, min_lon) = coord::to_lat_lon(99.5, 199.5, 18).unwrap();
        let (min_lat, max_lon) = coord::to_lat_lon(101.0, 201.5, 18).unwrap();
        let bbox = GeoBox::new(min_lat, min_lon, max_lat, max_lon).unwrap();

        let rect = crop_rect(&range, 256, &bbox).unwrap();
        assert_eq!((rect.x, rect.y), (0, 0));
        assert_eq!((rect.width, rect.height), (256, 256));
    }

    #[test]
    fn test_zero_area_box_is_empty_region() {
        let range = TileRange::new(100, 101, 200, 200, 18).unwrap();
        let (lat, lon) = coord::to_lat_lon(100.5, 200.5, 18).unwrap();
        let bbox = GeoBox::new(lat, lon, lat, lon).unwrap();

        assert_eq!(crop_rect(&range, 256, &bbox), Err(AssemblyError::EmptyRegion));
    }

    #[test]
    fn test_odd_sized_tiles_are_resized() {
        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(100, 200, 18), RgbaImage::from_pixel(512, 512, RED));
        put_loaded(&cache, TileCoord::new(101, 200, 18), RgbaImage::from_pixel(128, 128, BLUE));
        let set = two_tile_set(&cache);

        let image = RegionAssembler::new(false).stitch(&set).unwrap();
        assert_eq!(image.dimensions(), (512, 256));
        assert_eq!(*image.get_pixel(255, 255), RED);
        assert_eq!(*image.get_pixel(256, 0), BLUE);
    }

    #[test]
    fn test_downscale_1000_by_500_to_768() {
        let image = RgbaImage::from_pixel(1000, 500, RED);
        let scaled = downscale(image, 768);
        assert_eq!(scaled.dimensions(), (768, 384));
    }

    #[test]
    fn test_downscale_portrait() {
        assert_eq!(scaled_dimensions(300, 900, 768), (256, 768));
    }

    #[test]
    fn test_small_image_unchanged() {
        let image = RgbaImage::from_pixel(300, 200, BLUE);
        let scaled = downscale(image.clone(), 768);
        assert_eq!(scaled, image);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let cache = Arc::new(TileCache::new(16));
        put_loaded(&cache, TileCoord::new(100, 200, 18), RgbaImage::from_pixel(256, 256, RED));
        put_loaded(&cache, TileCoord::new(101, 200, 18), RgbaImage::from_pixel(256, 256, BLUE));
        let set = two_tile_set(&cache);
        let (max_lat, min_lon) = coord::to_lat_lon(100.1, 200.3, 18).unwrap();
        let (min_lat, max_lon) = coord::to_lat_lon(101.7, 200.9, 18).unwrap();
        let bbox = GeoBox::new(min_lat, min_lon, max_lat, max_lon).unwrap();

        let assembler = RegionAssembler::new(true);
        let a = assembler.assemble(&set, &bbox).unwrap();
        let b = assembler.assemble(&set, &bbox).unwrap();
        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a, b);
    }
}

//! Imagery source definitions and URL construction.
//!
//! A [`TileSource`] is plain data: a URL template plus the grid parameters of
//! the server behind it. The [`SourceKind`] tag only changes defaults and the
//! placeholders a template is required to carry.
//!
//! # Templates
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{z}` `{zoom}` | zoom level |
//! | `{x}` `{y}` | tile column and row |
//! | `{-y}` | row counted from the south (TMS) |
//! | `{quadkey}` | Bing quadkey |
//! | `{bbox}` | EPSG:3857 extent `minx,miny,maxx,maxy` (WMS) |
//! | `{width}` `{height}` | tile size in pixels |
//! | `{TileMatrix}` `{TileRow}` `{TileCol}` | WMTS names for z, y and x |
//! | `{switch:a,b,c}` | server shard picked from `(x + y) % n` |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::types::ProviderError;
use crate::coord::{tiles_per_axis, TileCoord, MAX_ZOOM};

/// Half the side of the EPSG:3857 square in meters.
const MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// Default tile edge for slippy-map servers.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default tile edge requested from WMS servers.
pub const DEFAULT_WMS_TILE_SIZE: u32 = 512;

/// How tile URLs are addressed on the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `{z}/{x}/{y}` style servers, including TMS with `{-y}`.
    Tms,
    /// Quadkey addressed servers.
    Bing,
    /// OGC WMS `GetMap` with a per-tile bounding box.
    Wms,
    /// OGC WMTS KVP or REST requests.
    Wmts,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Tms => "tms",
            SourceKind::Bing => "bing",
            SourceKind::Wms => "wms",
            SourceKind::Wmts => "wmts",
        }
    }

    pub fn default_tile_size(&self) -> u32 {
        match self {
            SourceKind::Wms => DEFAULT_WMS_TILE_SIZE,
            _ => DEFAULT_TILE_SIZE,
        }
    }

    /// Placeholders of which a template of this kind must contain at least one.
    fn addressing_placeholders(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Tms => &["{x}"],
            SourceKind::Bing => &["{quadkey}"],
            SourceKind::Wms => &["{bbox}"],
            SourceKind::Wmts => &["{TileCol}", "{x}"],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tms" | "xyz" => Ok(SourceKind::Tms),
            "bing" => Ok(SourceKind::Bing),
            "wms" => Ok(SourceKind::Wms),
            "wmts" => Ok(SourceKind::Wmts),
            other => Err(ProviderError::InvalidSource(format!(
                "unknown source kind '{}' (expected tms, bing, wms or wmts)",
                other
            ))),
        }
    }
}

/// A remote imagery layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    name: Arc<str>,
    kind: SourceKind,
    url_template: String,
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl TileSource {
    /// Creates a source with the kind's default tile size and the full zoom range.
    pub fn new(
        name: impl Into<String>,
        kind: SourceKind,
        url_template: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let name: String = name.into();
        let url_template: String = url_template.into();

        if name.trim().is_empty() {
            return Err(ProviderError::InvalidSource("empty source name".to_string()));
        }
        let placeholders = kind.addressing_placeholders();
        if !placeholders.iter().any(|p| url_template.contains(p)) {
            return Err(ProviderError::InvalidSource(format!(
                "{} template '{}' must contain {}",
                kind,
                url_template,
                placeholders.join(" or ")
            )));
        }

        Ok(Self {
            name: Arc::from(name.as_str()),
            kind,
            url_template,
            tile_size: kind.default_tile_size(),
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
        })
    }

    /// Sets the tile edge length in pixels.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    /// Restricts the zoom levels this source serves.
    pub fn with_zoom_bounds(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom.min(MAX_ZOOM);
        self.max_zoom = max_zoom.clamp(self.min_zoom, MAX_ZOOM);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the name, used for cache keys.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn supports_zoom(&self, zoom: u8) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }

    /// Lowest valid tile index on either axis.
    pub fn tile_min(&self, _zoom: u8) -> u32 {
        0
    }

    /// Highest valid tile index on either axis.
    pub fn tile_max(&self, zoom: u8) -> u32 {
        (tiles_per_axis(zoom) - 1) as u32
    }

    /// Builds the request URL for one tile.
    pub fn url_for(&self, coord: TileCoord) -> Result<String, ProviderError> {
        if !self.supports_zoom(coord.zoom) {
            return Err(ProviderError::UnsupportedZoom(coord.zoom));
        }
        let max = self.tile_max(coord.zoom);
        if coord.x > max || coord.y > max {
            return Err(ProviderError::InvalidSource(format!(
                "tile {} outside the grid",
                coord
            )));
        }

        let mut url = self.url_template.clone();
        url = expand_switch(&url, coord)?;

        let flipped_y = max - coord.y;
        let size = self.tile_size.to_string();
        let zoom = coord.zoom.to_string();
        let x = coord.x.to_string();
        let y = coord.y.to_string();

        url = url
            .replace("{zoom}", &zoom)
            .replace("{z}", &zoom)
            .replace("{x}", &x)
            .replace("{-y}", &flipped_y.to_string())
            .replace("{y}", &y)
            .replace("{TileMatrix}", &zoom)
            .replace("{TileRow}", &y)
            .replace("{TileCol}", &x)
            .replace("{width}", &size)
            .replace("{height}", &size);

        if url.contains("{quadkey}") {
            url = url.replace("{quadkey}", &coord.quadkey());
        }
        if url.contains("{bbox}") {
            let [min_x, min_y, max_x, max_y] = mercator_bounds(coord);
            let bbox = format!("{:.6},{:.6},{:.6},{:.6}", min_x, min_y, max_x, max_y);
            url = url.replace("{bbox}", &bbox);
        }

        Ok(url)
    }
}

impl fmt::Display for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.name, self.kind, self.url_template)
    }
}

/// Parses `[name=]kind:url`.
///
/// Without an explicit name the URL host is used.
impl FromStr for TileSource {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.split_once('=') {
            Some((name, rest)) if !name.contains(':') && !name.contains('/') => {
                (Some(name.trim().to_string()), rest.trim())
            }
            _ => (None, s),
        };

        let (kind, url) = rest.split_once(':').ok_or_else(|| {
            ProviderError::InvalidSource(format!("expected 'kind:url', got '{}'", s))
        })?;
        let kind: SourceKind = kind.parse()?;
        let url = url.trim();

        let name = match name {
            Some(name) => name,
            None => host_of(url).ok_or_else(|| {
                ProviderError::InvalidSource(format!("cannot derive a name from '{}'", url))
            })?,
        };

        TileSource::new(name, kind, url)
    }
}

/// EPSG:3857 extent of a tile as `[min_x, min_y, max_x, max_y]`.
pub fn mercator_bounds(coord: TileCoord) -> [f64; 4] {
    let resolution = 2.0 * MERCATOR_HALF_EXTENT / tiles_per_axis(coord.zoom) as f64;
    let min_x = -MERCATOR_HALF_EXTENT + coord.x as f64 * resolution;
    let max_y = MERCATOR_HALF_EXTENT - coord.y as f64 * resolution;
    [min_x, max_y - resolution, min_x + resolution, max_y]
}

fn expand_switch(url: &str, coord: TileCoord) -> Result<String, ProviderError> {
    let Some(start) = url.find("{switch:") else {
        return Ok(url.to_string());
    };
    let end = url[start..]
        .find('}')
        .map(|i| start + i)
        .ok_or_else(|| ProviderError::InvalidSource(format!("unterminated switch in '{}'", url)))?;

    let choices: Vec<&str> = url[start + "{switch:".len()..end]
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if choices.is_empty() {
        return Err(ProviderError::InvalidSource(format!("empty switch in '{}'", url)));
    }

    // Spread load across shards deterministically
    let pick = choices[((coord.x as u64 + coord.y as u64) % choices.len() as u64) as usize];
    Ok(format!("{}{}{}", &url[..start], pick, &url[end + 1..]))
}

fn host_of(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = without_scheme.split(['/', '?', ':']).next()?.trim();
    if host.is_empty() || host.contains('{') {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osm() -> TileSource {
        TileSource::new("osm", SourceKind::Tms, "https://tile.example.org/{z}/{x}/{y}.png").unwrap()
    }

    #[test]
    fn test_tms_url() {
        let url = osm().url_for(TileCoord::new(100, 200, 18)).unwrap();
        assert_eq!(url, "https://tile.example.org/18/100/200.png");
    }

    #[test]
    fn test_flipped_y() {
        let source =
            TileSource::new("tms", SourceKind::Tms, "https://t.example/{z}/{x}/{-y}.jpg").unwrap();
        let url = source.url_for(TileCoord::new(1, 0, 2)).unwrap();
        assert_eq!(url, "https://t.example/2/1/3.jpg");
    }

    #[test]
    fn test_bing_quadkey_url() {
        let source = TileSource::new(
            "bing",
            SourceKind::Bing,
            "https://ecn.t{switch:0,1,2,3}.tiles.example/a{quadkey}.jpeg?g=1",
        )
        .unwrap();
        let url = source.url_for(TileCoord::new(3, 5, 3)).unwrap();
        assert_eq!(url, "https://ecn.t0.tiles.example/a213.jpeg?g=1");
    }

    #[test]
    fn test_switch_spreads_by_coordinate() {
        let source =
            TileSource::new("s", SourceKind::Tms, "https://{switch:a,b,c}.t.example/{z}/{x}/{y}")
                .unwrap();
        assert!(source
            .url_for(TileCoord::new(1, 0, 4))
            .unwrap()
            .starts_with("https://b."));
        assert!(source
            .url_for(TileCoord::new(1, 1, 4))
            .unwrap()
            .starts_with("https://c."));
    }

    #[test]
    fn test_wms_bbox_url() {
        let source = TileSource::new(
            "wms",
            SourceKind::Wms,
            "https://wms.example/?SERVICE=WMS&REQUEST=GetMap&BBOX={bbox}&WIDTH={width}&HEIGHT={height}",
        )
        .unwrap();
        assert_eq!(source.tile_size(), DEFAULT_WMS_TILE_SIZE);

        let url = source.url_for(TileCoord::new(0, 0, 0)).unwrap();
        assert!(url.contains("BBOX=-20037508.342789,-20037508.342789,20037508.342789,20037508.342789"));
        assert!(url.contains("WIDTH=512&HEIGHT=512"));
    }

    #[test]
    fn test_wmts_url() {
        let source = TileSource::new(
            "wmts",
            SourceKind::Wmts,
            "https://wmts.example/layer/{TileMatrix}/{TileRow}/{TileCol}.png",
        )
        .unwrap();
        let url = source.url_for(TileCoord::new(7, 9, 5)).unwrap();
        assert_eq!(url, "https://wmts.example/layer/5/9/7.png");
    }

    #[test]
    fn test_template_must_address_tiles() {
        let result = TileSource::new("bad", SourceKind::Bing, "https://x.example/{z}/{x}/{y}");
        assert!(matches!(result, Err(ProviderError::InvalidSource(_))));
    }

    #[test]
    fn test_unsupported_zoom() {
        let source = osm().with_zoom_bounds(1, 19);
        assert!(matches!(
            source.url_for(TileCoord::new(0, 0, 20)),
            Err(ProviderError::UnsupportedZoom(20))
        ));
    }

    #[test]
    fn test_tile_bounds() {
        let source = osm();
        assert_eq!(source.tile_min(18), 0);
        assert_eq!(source.tile_max(18), (1 << 18) - 1);
        assert_eq!(source.tile_max(0), 0);
    }

    #[test]
    fn test_parse_with_host_name() {
        let source: TileSource = "tms:https://tile.example.org/{z}/{x}/{y}.png".parse().unwrap();
        assert_eq!(source.name(), "tile.example.org");
        assert_eq!(source.kind(), SourceKind::Tms);
    }

    #[test]
    fn test_parse_with_explicit_name() {
        let source: TileSource = "esri=tms:https://server.example/tile/{z}/{y}/{x}"
            .parse()
            .unwrap();
        assert_eq!(source.name(), "esri");
        assert_eq!(source.url_template(), "https://server.example/tile/{z}/{y}/{x}");
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let result: Result<TileSource, _> = "ftp:https://x.example/{z}/{x}/{y}".parse();
        assert!(matches!(result, Err(ProviderError::InvalidSource(_))));
    }

    #[test]
    fn test_mercator_bounds_quadrants() {
        let [min_x, min_y, max_x, max_y] = mercator_bounds(TileCoord::new(1, 0, 1));
        assert!(min_x.abs() < 1e-6);
        assert!(min_y.abs() < 1e-6);
        assert!((max_x - MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((max_y - MERCATOR_HALF_EXTENT).abs() < 1e-6);
    }
}

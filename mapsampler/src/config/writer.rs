//! INI serialization: [`ConfigFile`] → commented config.ini text.

use super::settings::ConfigFile;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let sources = config
        .imagery
        .sources
        .iter()
        .map(|source| format!("source = {}", source))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"[collector]
; Fraction the sample box grows by after the minimum size is met (0.4 = 1.4x)
grow_factor = {}
; Minimum sample width and height in meters
min_bbox_meters = {}
; Imagery zoom level (0-22)
zoom = {}
; Largest side of written images in pixels
max_output_dimension = {}
; Delete the output folder before a run. When false, existing images are reused
clear_output = {}
; Entities sampled at the same time
entity_parallelism = {}
; Crop stitched tiles to the sample box
clip_and_center = {}

[download]
; HTTP timeout in seconds
timeout = {}
; Retries after a failed tile fetch
max_retries = {}
; Concurrent tile fetches
workers = {}

[cache]
; In-memory tile entries
capacity = {}
; Keep downloaded tile bytes on disk between runs
disk_enabled = {}
directory = {}

[imagery]
; One line per imagery layer: [name=]kind:url
; kinds: tms ({{z}}/{{x}}/{{y}}, {{-y}}), bing ({{quadkey}}), wms ({{bbox}}), wmts ({{TileMatrix}}/{{TileRow}}/{{TileCol}})
{}
"#,
        config.collector.grow_factor,
        config.collector.min_bbox_meters,
        config.collector.zoom,
        config.collector.max_output_dimension,
        config.collector.clear_output,
        config.collector.entity_parallelism,
        config.collector.clip_and_center,
        config.download.timeout,
        config.download.max_retries,
        config.download.workers,
        config.cache.capacity,
        config.cache.disk_enabled,
        config.cache.directory.display(),
        sources,
    )
}

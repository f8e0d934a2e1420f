//! INI parsing: `Ini` → [`ConfigFile`].
//!
//! This is the single place where INI key names map to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_ZOOM;
use crate::provider::TileSource;

/// Overlays the values found in `ini` onto `ConfigFile::default()`.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [collector]
    if let Some(section) = ini.section(Some("collector")) {
        let s = "collector";
        if let Some(v) = section.get("grow_factor") {
            let factor: f64 = parse(s, "grow_factor", v, "must be a number")?;
            if !factor.is_finite() || factor < 0.0 {
                return Err(invalid(s, "grow_factor", v, "must be zero or positive"));
            }
            config.collector.grow_factor = factor;
        }
        if let Some(v) = section.get("min_bbox_meters") {
            let meters: f64 = parse(s, "min_bbox_meters", v, "must be a number (meters)")?;
            if !meters.is_finite() || meters < 0.0 {
                return Err(invalid(s, "min_bbox_meters", v, "must be zero or positive"));
            }
            config.collector.min_bbox_meters = meters;
        }
        if let Some(v) = section.get("zoom") {
            let zoom: u8 = parse(s, "zoom", v, "must be an integer")?;
            if zoom > MAX_ZOOM {
                return Err(invalid(s, "zoom", v, "must be between 0 and 22"));
            }
            config.collector.zoom = zoom;
        }
        if let Some(v) = section.get("max_output_dimension") {
            config.collector.max_output_dimension =
                parse_positive(s, "max_output_dimension", v, "must be a positive integer (pixels)")?;
        }
        if let Some(v) = section.get("clear_output") {
            config.collector.clear_output = parse_bool(s, "clear_output", v)?;
        }
        if let Some(v) = section.get("entity_parallelism") {
            config.collector.entity_parallelism =
                parse_positive(s, "entity_parallelism", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("clip_and_center") {
            config.collector.clip_and_center = parse_bool(s, "clip_and_center", v)?;
        }
    }

    // [download]
    if let Some(section) = ini.section(Some("download")) {
        let s = "download";
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_positive(s, "timeout", v, "must be a positive integer (seconds)")?;
        }
        if let Some(v) = section.get("max_retries") {
            config.download.max_retries = parse(s, "max_retries", v, "must be zero or a positive integer")?;
        }
        if let Some(v) = section.get("workers") {
            config.download.workers = parse_positive(s, "workers", v, "must be a positive integer")?;
        }
    }

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        let s = "cache";
        if let Some(v) = section.get("capacity") {
            config.cache.capacity = parse_positive(s, "capacity", v, "must be a positive integer (tiles)")?;
        }
        if let Some(v) = section.get("disk_enabled") {
            config.cache.disk_enabled = parse_bool(s, "disk_enabled", v)?;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
    }

    // [imagery]
    if let Some(section) = ini.section(Some("imagery")) {
        let sources = parse_sources(section)?;
        if !sources.is_empty() {
            config.imagery.sources = sources;
        }
    }

    Ok(config)
}

/// Every `source = ...` line, in file order.
fn parse_sources(section: &Properties) -> Result<Vec<TileSource>, ConfigFileError> {
    section
        .get_all("source")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<TileSource>()
                .map_err(|e| invalid("imagery", "source", v, &e.to_string()))
        })
        .collect()
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T: FromStr>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + Default + PartialOrd,
{
    let parsed: T = parse(section, key, value, reason)?;
    if parsed <= T::default() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use mapsampler::collector::LabelKind;
use mapsampler::config::ConfigFile;
use mapsampler::coord::GeoBox;
use mapsampler::provider::TileSource;

use crate::error::CliError;

/// Label selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum LabelArg {
    /// Runways labeled by hard or soft surface
    Runway,
    /// Buildings labeled by building class
    Building,
}

impl From<LabelArg> for LabelKind {
    fn from(arg: LabelArg) -> Self {
        match arg {
            LabelArg::Runway => LabelKind::Runway,
            LabelArg::Building => LabelKind::Building,
        }
    }
}

/// Parses `minlat,minlon,maxlat,maxlon` into a validated box.
pub fn parse_bbox(s: &str) -> Result<GeoBox, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [min_lat, min_lon, max_lat, max_lon] => {
            GeoBox::new(*min_lat, *min_lon, *max_lat, *max_lon).map_err(|e| e.to_string())
        }
        _ => Err(format!(
            "expected minlat,minlon,maxlat,maxlon but got {} values",
            values.len()
        )),
    }
}

/// Sources given on the command line replace those in the config file.
pub fn resolve_sources(
    cli_sources: Vec<TileSource>,
    config: &ConfigFile,
) -> Result<Vec<TileSource>, CliError> {
    let sources = if cli_sources.is_empty() {
        config.imagery.sources.clone()
    } else {
        cli_sources
    };

    if sources.is_empty() {
        return Err(CliError::Config("no imagery sources configured".to_string()));
    }
    Ok(sources)
}

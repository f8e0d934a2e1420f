//! The `tiles` command: which tiles cover a bounding box.

use clap::Args;
use mapsampler::coord::{tile_range, GeoBox};

use super::common::parse_bbox;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct TilesArgs {
    /// Bounding box as minlat,minlon,maxlat,maxlon
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: GeoBox,

    /// Zoom level (0-22)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=22))]
    pub zoom: u8,

    /// Also list every tile in the range
    #[arg(long)]
    pub list: bool,
}

/// Run the tiles command.
pub fn run(args: TilesArgs) -> Result<(), CliError> {
    let range = tile_range(&args.bbox, args.zoom).map_err(|e| CliError::Config(e.to_string()))?;

    println!("Range: {}", range);
    println!(
        "Size:  {} x {} = {} tiles",
        range.width(),
        range.height(),
        range.size()
    );

    if args.list {
        for coord in range.coords() {
            println!("  {}", coord);
        }
    }
    Ok(())
}

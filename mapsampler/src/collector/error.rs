//! Collector errors and per-sample skip reasons.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::entity::EntityError;
use crate::assembly::AssemblyError;
use crate::coord::CoordError;

/// Errors that abort a collection run.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Input {0} must be an entity file or a directory containing entity files")]
    InvalidInput(PathBuf),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No imagery sources configured")]
    NoSources,

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Why one entity produced no sample for one source.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The box or zoom cannot be turned into a tile set.
    InvalidGeometry(CoordError),
    /// The box covers no tiles of the source.
    EmptyTileSet,
    /// Some tiles stayed unloaded after all retries.
    MissingTiles { missed: usize, total: usize },
    /// The crop had no pixels.
    EmptyRegion,
    /// The label converter produced no record.
    NoLabel,
    /// The image could not be written.
    Filesystem(String),
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidGeometry(e) => write!(f, "invalid geometry: {}", e),
            SkipReason::EmptyTileSet => write!(f, "no tiles cover the region"),
            SkipReason::MissingTiles { missed, total } => {
                write!(f, "{} of {} tiles missing", missed, total)
            }
            SkipReason::EmptyRegion => write!(f, "region crops to an empty image"),
            SkipReason::NoLabel => write!(f, "no label for entity"),
            SkipReason::Filesystem(msg) => write!(f, "failed to write image: {}", msg),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<AssemblyError> for SkipReason {
    fn from(e: AssemblyError) -> Self {
        match e {
            AssemblyError::Incomplete { missed, total } => SkipReason::MissingTiles {
                missed: missed.len(),
                total,
            },
            AssemblyError::EmptyTileSet => SkipReason::EmptyTileSet,
            AssemblyError::EmptyRegion => SkipReason::EmptyRegion,
            AssemblyError::Coord(e) => SkipReason::InvalidGeometry(e),
        }
    }
}

//! Geographic entities to sample and the producers that read them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::coord::GeoBox;

/// Key/value tags of an entity (OSM style).
pub type Tags = BTreeMap<String, String>;

/// A feature to sample, such as a runway or a building outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub bbox: GeoBox,
    #[serde(default)]
    pub tags: Tags,
}

impl Entity {
    pub fn new(id: i64, bbox: GeoBox) -> Self {
        Self {
            id,
            bbox,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Errors from reading entities.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads entities from input files.
pub trait EntityProducer: Send + Sync {
    /// True for files this producer can read.
    fn accepts(&self, path: &Path) -> bool;

    /// Reads `input` and keeps the entities whose tags satisfy `predicate`,
    /// in file order.
    fn parse(&self, input: &Path, predicate: &dyn Fn(&Tags) -> bool) -> Result<Vec<Entity>, EntityError>;
}

/// Reads a JSON array of entities:
///
/// ```json
/// [{"id": 42,
///   "bbox": {"min_lat": 10.0, "min_lon": 20.0, "max_lat": 10.001, "max_lon": 20.001},
///   "tags": {"aeroway": "runway", "surface": "asphalt"}}]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityProducer;

impl JsonEntityProducer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityProducer for JsonEntityProducer {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }

    fn parse(&self, input: &Path, predicate: &dyn Fn(&Tags) -> bool) -> Result<Vec<Entity>, EntityError> {
        let content = fs::read_to_string(input).map_err(|source| EntityError::Io {
            path: input.to_path_buf(),
            source,
        })?;
        let entities: Vec<Entity> = serde_json::from_str(&content).map_err(|source| EntityError::Parse {
            path: input.to_path_buf(),
            source,
        })?;

        let total = entities.len();
        let selected: Vec<Entity> = entities.into_iter().filter(|e| predicate(&e.tags)).collect();
        debug!(
            input = %input.display(),
            total,
            selected = selected.len(),
            "Parsed entities"
        );
        Ok(selected)
    }
}

/// Files to read for `input`: the file itself, or every accepted file in a
/// directory sorted by name. `None` when `input` is neither.
pub fn input_files(input: &Path, producer: &dyn EntityProducer) -> io::Result<Option<Vec<PathBuf>>> {
    if input.is_file() {
        return Ok(producer.accepts(input).then(|| vec![input.to_path_buf()]));
    }
    if !input.is_dir() {
        return Ok(None);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && producer.accepts(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(Some(files))
}

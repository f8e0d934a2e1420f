//! Sample collection: entities in, labeled images and a CSV manifest out.
//!
//! - [`EntityProducer`]: reads entities from input files
//! - [`LabelConverter`]: selects entities and derives their labels
//! - [`SampleCollector`]: fetches, assembles and writes one image per entity
//!   and imagery source
//! - [`Manifest`]: the `<dataset_id>.csv` written at the end of a run

mod entity;
mod error;
mod labels;
mod manifest;
mod pipeline;

pub use entity::{input_files, Entity, EntityError, EntityProducer, JsonEntityProducer, Tags};
pub use error::{CollectorError, SkipReason};
pub use labels::{
    BuildingType, BuildingTypeConverter, LabelConverter, LabelKind, RunwaySurfaceConverter,
    SampleRecord,
};
pub use manifest::Manifest;
pub use pipeline::{CollectionReport, EntityStage, SampleCollector, SampleOutcome, SkippedSample};

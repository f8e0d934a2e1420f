//! Label converters: which entities to sample and what to label them.

use std::fmt;
use std::str::FromStr;

use super::entity::{Entity, Tags};

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    /// Row identifier written to the `id` column
    pub id: String,
    pub image_file_name: String,
    /// One value per label column
    pub labels: Vec<String>,
}

impl SampleRecord {
    /// A record identified by its image file name.
    pub fn for_image(image_file_name: impl Into<String>, labels: Vec<String>) -> Self {
        let image_file_name = image_file_name.into();
        Self {
            id: image_file_name.clone(),
            image_file_name,
            labels,
        }
    }
}

/// Derives labels for sampled entities.
pub trait LabelConverter: Send + Sync {
    /// Manifest columns after `id`.
    fn label_columns(&self) -> &[&str];

    /// Entity filter applied while reading input.
    fn is_good_sample(&self, tags: &Tags) -> bool;

    /// The record for an entity whose image is `image_file_name`, or `None`
    /// when the entity has no usable label.
    fn convert(&self, image_file_name: &str, entity: &Entity) -> Option<SampleRecord>;
}

/// Labels runways as hard or soft surfaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunwaySurfaceConverter;

impl RunwaySurfaceConverter {
    pub fn is_hard_surface(surface: &str) -> bool {
        matches!(surface, "asphalt" | "paved" | "metal") || surface.starts_with("concrete")
    }
}

impl LabelConverter for RunwaySurfaceConverter {
    fn label_columns(&self) -> &[&str] {
        &["hard"]
    }

    fn is_good_sample(&self, tags: &Tags) -> bool {
        let is_runway = tags
            .get("aeroway")
            .is_some_and(|v| v.eq_ignore_ascii_case("runway"));
        let has_surface = tags.get("surface").is_some_and(|v| !v.trim().is_empty());
        is_runway && has_surface
    }

    fn convert(&self, image_file_name: &str, entity: &Entity) -> Option<SampleRecord> {
        let surface = entity.tag("surface")?.trim();
        if surface.is_empty() {
            return None;
        }
        let hard = Self::is_hard_surface(surface);
        Some(SampleRecord::for_image(image_file_name, vec![hard.to_string()]))
    }
}

/// Building classes derived from the `building` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingType {
    Residential,
    Commercial,
    Industrial,
    Public,
    Religious,
    Agricultural,
    Garage,
}

impl BuildingType {
    /// Classifies a `building=*` value. Generic values like `yes` have no class.
    pub fn from_tag(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        let building_type = match value.as_str() {
            "house" | "residential" | "apartments" | "detached" | "semidetached_house" | "terrace"
            | "bungalow" | "dormitory" | "cabin" => BuildingType::Residential,
            "commercial" | "retail" | "office" | "supermarket" | "kiosk" | "hotel" => {
                BuildingType::Commercial
            }
            "industrial" | "warehouse" | "factory" | "manufacture" | "hangar" | "storage_tank" => {
                BuildingType::Industrial
            }
            "school" | "university" | "college" | "kindergarten" | "hospital" | "civic" | "public"
            | "government" | "train_station" | "fire_station" => BuildingType::Public,
            "church" | "cathedral" | "chapel" | "mosque" | "temple" | "synagogue" | "shrine"
            | "religious" => BuildingType::Religious,
            "farm" | "barn" | "farm_auxiliary" | "greenhouse" | "stable" | "cowshed" | "sty" => {
                BuildingType::Agricultural
            }
            "garage" | "garages" | "carport" | "parking" => BuildingType::Garage,
            _ => return None,
        };
        Some(building_type)
    }

    pub fn from_tags(tags: &Tags) -> Option<Self> {
        tags.get("building").and_then(|v| Self::from_tag(v))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingType::Residential => "residential",
            BuildingType::Commercial => "commercial",
            BuildingType::Industrial => "industrial",
            BuildingType::Public => "public",
            BuildingType::Religious => "religious",
            BuildingType::Agricultural => "agricultural",
            BuildingType::Garage => "garage",
        }
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels buildings with their [`BuildingType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildingTypeConverter;

impl LabelConverter for BuildingTypeConverter {
    fn label_columns(&self) -> &[&str] {
        &["building_type"]
    }

    fn is_good_sample(&self, tags: &Tags) -> bool {
        BuildingType::from_tags(tags).is_some()
    }

    fn convert(&self, image_file_name: &str, entity: &Entity) -> Option<SampleRecord> {
        let building_type = BuildingType::from_tags(&entity.tags)?;
        Some(SampleRecord::for_image(
            image_file_name,
            vec![building_type.to_string()],
        ))
    }
}

/// Built-in converters selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Runway,
    Building,
}

impl LabelKind {
    pub fn converter(&self) -> Box<dyn LabelConverter> {
        match self {
            LabelKind::Runway => Box::new(RunwaySurfaceConverter),
            LabelKind::Building => Box::new(BuildingTypeConverter),
        }
    }
}

impl FromStr for LabelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "runway" => Ok(LabelKind::Runway),
            "building" => Ok(LabelKind::Building),
            other => Err(format!("unknown label kind '{}' (expected runway or building)", other)),
        }
    }
}

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    geo::{GeoPoint, LAT_METRES_PER_DEGREE, lon_metres_per_degree},
    materials::MaterialType,
    units::{Db, Length, METRES},
    utility::round_hundredths,
};

pub const MIN_FOOTPRINT: Length = Length::from_metres(5.0);
pub const MAX_FOOTPRINT: Length = Length::from_metres(500.0);
pub const MIN_IMPORTED_HEIGHT: Length = Length::from_metres(10.0);
pub const MAX_IMPORTED_HEIGHT: Length = Length::from_metres(300.0);

/// Assumed storey height when a floor count has to be derived from a building's height.
pub const STOREY_HEIGHT: Length = Length::from_metres(3.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingSource {
    Manual,
    Imported,
}

/// Bounding volume of an imported 3D tile set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilesetInfo {
    pub path: String,
    /// `[longitude, latitude, height]`
    pub center: [f64; 3],
    /// `[width, length, height]` in metres
    pub dimensions: [f64; 3],
    pub geometric_error: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("building {id} has a non-finite centre")]
    NonFiniteCentre { id: String },
    #[error("building {id} has invalid dimensions {width} x {length} x {height}")]
    InvalidDimensions {
        id: String,
        width: f64,
        length: f64,
        height: f64,
    },
}

/// A box shaped building. Width runs east-west, length north-south.
///
/// Construction and deserialization both clamp the footprint to
/// [`MIN_FOOTPRINT`]..=[`MAX_FOOTPRINT`] and the losses to be non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BuildingRecord", into = "BuildingRecord")]
pub struct Building {
    pub id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub height: Length,
    pub width: Length,
    pub length: Length,
    pub floors: u32,
    pub wall_loss: Db,
    pub roof_loss: Db,
    pub floor_loss: Db,
    pub material_type: MaterialType,
    /// Degrees clockwise from north. Informational, the obstruction geometry is axis aligned.
    pub rotation: f64,
    pub color: String,
    pub opacity: f64,
    pub source: BuildingSource,
    pub tileset: Option<TilesetInfo>,
}

impl Building {
    pub fn new(
        id: impl Into<String>,
        longitude: f64,
        latitude: f64,
        width: Length,
        length: Length,
        height: Length,
        material_type: MaterialType,
    ) -> Self {
        let id = id.into();
        Building {
            name: id.clone(),
            id,
            longitude,
            latitude,
            height,
            width: clamp_footprint(width),
            length: clamp_footprint(length),
            floors: floors_for_height(height),
            wall_loss: Db::ZERO,
            roof_loss: Db::ZERO,
            floor_loss: Db::ZERO,
            material_type,
            rotation: 0.0,
            color: String::from("#FFFFFF"),
            opacity: 0.8,
            source: BuildingSource::Manual,
            tileset: None,
        }
        .with_material(material_type)
    }

    /// Creates a concrete building filling the bounding volume of a tile set.
    pub fn imported(id: impl Into<String>, name: impl Into<String>, tileset: TilesetInfo) -> Self {
        let [longitude, latitude, _] = tileset.center;
        let [width, length, height] = tileset.dimensions.map(Length::from_metres);
        let height = height.clamp(MIN_IMPORTED_HEIGHT, MAX_IMPORTED_HEIGHT);

        Building {
            name: name.into(),
            source: BuildingSource::Imported,
            tileset: Some(tileset),
            ..Building::new(
                id,
                longitude,
                latitude,
                width,
                length,
                height,
                MaterialType::Concrete,
            )
        }
    }

    /// Switches material and resets the surface losses and colour to its defaults.
    /// An unknown material keeps the current losses.
    pub fn with_material(mut self, material_type: MaterialType) -> Self {
        self.set_material(material_type);
        self
    }

    pub fn set_material(&mut self, material_type: MaterialType) {
        self.material_type = material_type;
        if let Some(material) = material_type.properties() {
            self.wall_loss = material.wall_loss;
            self.roof_loss = material.roof_loss;
            self.floor_loss = material.floor_loss;
            self.color = material.color.to_string();
        }
    }

    pub fn with_losses(mut self, wall: Db, roof: Db, floor: Db) -> Self {
        self.wall_loss = wall.max(Db::ZERO);
        self.roof_loss = roof.max(Db::ZERO);
        self.floor_loss = floor.max(Db::ZERO);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_floors(mut self, floors: u32) -> Self {
        self.floors = floors;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn volume(&self) -> f64 {
        self.width.metres() * self.length.metres() * self.height.metres()
    }

    pub fn min_footprint_side(&self) -> Length {
        self.width.min(self.length)
    }

    /// The box this building occupies, in degrees and metres.
    pub fn footprint(&self) -> Result<Footprint, GeometryError> {
        if !(self.longitude.is_finite() && self.latitude.is_finite()) {
            return Err(GeometryError::NonFiniteCentre {
                id: self.id.clone(),
            });
        }

        let dims = [self.width, self.length, self.height];
        if dims.iter().any(|d| !d.is_finite() || d.metres() <= 0.0) {
            return Err(GeometryError::InvalidDimensions {
                id: self.id.clone(),
                width: self.width.metres(),
                length: self.length.metres(),
                height: self.height.metres(),
            });
        }

        let half_width = (self.width / 2.0).metres() / lon_metres_per_degree(self.latitude);
        let half_length = (self.length / 2.0).metres() / LAT_METRES_PER_DEGREE;

        Ok(Footprint {
            min_lon: self.longitude - half_width,
            max_lon: self.longitude + half_width,
            min_lat: self.latitude - half_length,
            max_lat: self.latitude + half_length,
            height: self.height.metres(),
        })
    }
}

/// Axis aligned extent of a building in geographic coordinates.
/// The base sits on the ellipsoid (height 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub height: f64,
}

impl Footprint {
    /// Bottom ring then top ring, each ordered
    /// south-west, south-east, north-east, north-west.
    pub fn vertices(&self) -> [GeoPoint; 8] {
        let ring = |height| {
            [
                GeoPoint::new(self.min_lon, self.min_lat, height),
                GeoPoint::new(self.max_lon, self.min_lat, height),
                GeoPoint::new(self.max_lon, self.max_lat, height),
                GeoPoint::new(self.min_lon, self.max_lat, height),
            ]
        };
        let [a, b, c, d] = ring(0.0);
        let [e, f, g, h] = ring(self.height);
        [a, b, c, d, e, f, g, h]
    }
}

fn clamp_footprint(side: Length) -> Length {
    side.clamp(MIN_FOOTPRINT, MAX_FOOTPRINT)
}

fn floors_for_height(height: Length) -> u32 {
    (height / STOREY_HEIGHT).floor().max(1.0) as u32
}

/// Serialized form of [`Building`]. Everything passes back through the clamps on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildingRecord {
    id: String,
    #[serde(default)]
    name: String,
    longitude: f64,
    latitude: f64,
    height: Length,
    width: Length,
    length: Length,
    #[serde(default)]
    floors: Option<u32>,
    #[serde(default)]
    wall_loss: Option<Db>,
    #[serde(default)]
    roof_loss: Option<Db>,
    #[serde(default)]
    floor_loss: Option<Db>,
    material_type: MaterialType,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    color: Option<String>,
    #[serde(default = "default_opacity")]
    opacity: f64,
    #[serde(default = "default_source")]
    source_type: BuildingSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tileset_info: Option<TilesetInfo>,
}

fn default_opacity() -> f64 {
    0.8
}

fn default_source() -> BuildingSource {
    BuildingSource::Manual
}

impl From<BuildingRecord> for Building {
    fn from(value: BuildingRecord) -> Self {
        let mut building = Building::new(
            value.id,
            value.longitude,
            value.latitude,
            value.width,
            value.length,
            value.height,
            value.material_type,
        );

        let wall = value.wall_loss.unwrap_or(building.wall_loss);
        let roof = value.roof_loss.unwrap_or(building.roof_loss);
        let floor = value.floor_loss.unwrap_or(building.floor_loss);
        building = building.with_losses(wall, roof, floor);

        if !value.name.is_empty() {
            building.name = value.name;
        }
        if let Some(floors) = value.floors {
            building.floors = floors;
        }
        if let Some(color) = value.color {
            building.color = color;
        }

        Building {
            rotation: value.rotation,
            opacity: value.opacity.clamp(0.0, 1.0),
            source: value.source_type,
            tileset: value.tileset_info,
            ..building
        }
    }
}

impl From<Building> for BuildingRecord {
    fn from(value: Building) -> Self {
        BuildingRecord {
            id: value.id,
            name: value.name,
            longitude: value.longitude,
            latitude: value.latitude,
            height: value.height,
            width: value.width,
            length: value.length,
            floors: Some(value.floors),
            wall_loss: Some(value.wall_loss),
            roof_loss: Some(value.roof_loss),
            floor_loss: Some(value.floor_loss),
            material_type: value.material_type,
            rotation: value.rotation,
            color: Some(value.color),
            opacity: value.opacity,
            source_type: value.source,
            tileset_info: value.tileset,
        }
    }
}

/// An immutable snapshot of the buildings in a scene.
///
/// Cloning is cheap. A sweep holds its own snapshot so edits made elsewhere
/// never show up half way through.
#[derive(Debug, Clone, Default)]
pub struct BuildingSet {
    buildings: Arc<[Building]>,
}

impl BuildingSet {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self {
            buildings: buildings.into(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Building> {
        self.buildings.iter()
    }

    pub fn as_slice(&self) -> &[Building] {
        &self.buildings
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn total_volume(&self) -> f64 {
        self.buildings.iter().map(Building::volume).sum()
    }

    pub fn count_by_material(&self) -> HashMap<MaterialType, usize> {
        let mut counts = HashMap::new();
        for building in self.buildings.iter() {
            *counts.entry(building.material_type).or_insert(0) += 1;
        }
        counts
    }

    /// Mean of each building's own wall loss, rounded to hundredths.
    pub fn average_wall_loss(&self) -> Db {
        if self.buildings.is_empty() {
            return Db::ZERO;
        }

        let total: Db = self.buildings.iter().map(|b| b.wall_loss).sum();
        (total / self.buildings.len() as f64).map(round_hundredths)
    }

    pub fn from_source(&self, source: BuildingSource) -> impl Iterator<Item = &Building> {
        self.buildings.iter().filter(move |b| b.source == source)
    }
}

impl From<Vec<Building>> for BuildingSet {
    fn from(value: Vec<Building>) -> Self {
        BuildingSet::new(value)
    }
}

impl<'a> IntoIterator for &'a BuildingSet {
    type Item = &'a Building;
    type IntoIter = std::slice::Iter<'a, Building>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Building {
    /// Test and generator convenience: a concrete building with the given footprint in metres.
    pub fn block(id: &str, longitude: f64, latitude: f64, width: f64, length: f64, height: f64) -> Self {
        Building::new(
            id,
            longitude,
            latitude,
            width * METRES,
            length * METRES,
            height * METRES,
            MaterialType::Concrete,
        )
    }
}

//! Building materials and their default attenuation values.

use serde::{Deserialize, Serialize};

use crate::{building::Building, units::Db};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    Concrete,
    Brick,
    Steel,
    Glass,
    Wood,
    /// Anything not recognised when reading a scene. Has no material entry.
    #[serde(other)]
    Unknown,
}

impl MaterialType {
    pub const VALUES: [MaterialType; 5] = [
        MaterialType::Concrete,
        MaterialType::Brick,
        MaterialType::Steel,
        MaterialType::Glass,
        MaterialType::Wood,
    ];

    pub fn properties(self) -> Option<Material> {
        let (wall, roof, floor, color) = match self {
            MaterialType::Concrete => (15.0, 20.0, 5.0, "#8B8B8B"),
            MaterialType::Brick => (12.0, 18.0, 4.0, "#CD853F"),
            MaterialType::Steel => (25.0, 30.0, 8.0, "#708090"),
            MaterialType::Glass => (8.0, 12.0, 3.0, "#87CEEB"),
            MaterialType::Wood => (6.0, 10.0, 2.0, "#DEB887"),
            MaterialType::Unknown => return None,
        };

        Some(Material {
            kind: self,
            wall_loss: Db::from_db(wall),
            roof_loss: Db::from_db(roof),
            floor_loss: Db::from_db(floor),
            color,
        })
    }
}

/// Default attenuation of one surface of each kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub kind: MaterialType,
    pub wall_loss: Db,
    pub roof_loss: Db,
    /// Per floor slab.
    pub floor_loss: Db,
    pub color: &'static str,
}

/// Loss through a building using its own (possibly customised) per-surface values.
pub fn building_loss(building: &Building, walls: u32, floors: u32) -> Db {
    building.wall_loss * walls as f64 + building.floor_loss * floors as f64
}

//! Occlusion oracles the sampler asks "how far until this ray hits something".

use nalgebra::Vector3;
use thiserror::Error;
use tracing::warn;

use crate::{
    building::BuildingSet,
    geo::{GeoPoint, LocalFrame, to_ecef},
    obstruction::geometry::{BoxMesh, Ray},
    units::Length,
};

/// A ray cast from an antenna.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRay {
    pub origin: GeoPoint,
    /// Unit vector in the East-North-Up frame at `origin`.
    pub direction: Vector3<f64>,
    pub max_distance: Length,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OcclusionError {
    #[error("ray from {origin:?} along {direction:?} is not a valid query")]
    InvalidRay {
        origin: GeoPoint,
        direction: Vector3<f64>,
    },
    #[error("occlusion backend failed: {0}")]
    Backend(String),
}

/// Spatial query backend for the sampler.
///
/// Must be safe to call from many threads at once.
pub trait OcclusionOracle: Sync {
    /// Distance to the nearest thing the ray hits, if any.
    fn pick(&self, ray: &ScanRay) -> Result<Option<Length>, OcclusionError>;
}

/// Nothing ever occludes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSky;

impl OcclusionOracle for OpenSky {
    fn pick(&self, _ray: &ScanRay) -> Result<Option<Length>, OcclusionError> {
        Ok(None)
    }
}

/// Building boxes plus an optional flat ground plane.
#[derive(Debug, Clone, Default)]
pub struct BuildingScene {
    meshes: Vec<BoxMesh>,
    ground_height: Option<f64>,
}

impl BuildingScene {
    /// Buildings whose geometry cannot be built are logged and left out.
    pub fn new(buildings: &BuildingSet) -> Self {
        let meshes = buildings
            .iter()
            .filter_map(|building| match building.footprint() {
                Ok(footprint) => Some(BoxMesh::in_ecef(&footprint)),
                Err(err) => {
                    warn!(%err, "leaving building out of occlusion scene");
                    None
                }
            })
            .collect();

        Self {
            meshes,
            ground_height: None,
        }
    }

    /// Adds a ground plane at `height` metres.
    pub fn with_ground(mut self, height: f64) -> Self {
        self.ground_height = Some(height);
        self
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    fn ground_hit(&self, ray: &ScanRay) -> Option<f64> {
        let ground = self.ground_height?;
        if ray.origin.height <= ground {
            return Some(0.0);
        }
        if ray.direction.z >= 0.0 {
            return None;
        }
        Some((ray.origin.height - ground) / -ray.direction.z)
    }
}

impl OcclusionOracle for BuildingScene {
    fn pick(&self, ray: &ScanRay) -> Result<Option<Length>, OcclusionError> {
        let norm = ray.direction.norm();
        if !ray.origin.is_finite() || !norm.is_finite() || norm == 0.0 {
            return Err(OcclusionError::InvalidRay {
                origin: ray.origin,
                direction: ray.direction,
            });
        }

        let direction = ray.direction / norm;
        let frame = LocalFrame::new(ray.origin);
        let ecef_ray = Ray {
            origin: to_ecef(&ray.origin),
            direction: frame.direction_to_ecef(&direction),
            length: ray.max_distance.metres(),
        };

        let buildings = self.meshes.iter().filter_map(|mesh| mesh.nearest_hit(&ecef_ray));
        let ray = ScanRay { direction, ..*ray };

        Ok(buildings
            .chain(self.ground_hit(&ray))
            .min_by(f64::total_cmp)
            .map(Length::from_metres))
    }
}

pub mod generation;

use serde::{Deserialize, Serialize};

use crate::{
    building::{Building, BuildingSet},
    propagation::PropagationEngine,
    raytrace::{RayTracingConfig, occlusion::BuildingScene},
    scene::generation::SceneGenerator,
    station::{Antenna, BaseStation, StationRegistry},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneIdentity {
    Generated {
        generator: SceneGenerator,
        seed: u64,
    },
    /// A hand authored or imported scene
    Custom,
}

impl SceneIdentity {
    /// Rebuilds a generated scene. Custom scenes cannot be rebuilt.
    pub fn create(&self) -> Option<Scene> {
        match self {
            SceneIdentity::Custom => None,
            SceneIdentity::Generated { generator, seed } => {
                let mut output = generator.generate_from_seed(*seed);
                output.identity = self.clone();
                Some(output)
            }
        }
    }
}

/// Everything needed to evaluate coverage: stations with their antennas and the buildings around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    // Regeneration
    pub identity: SceneIdentity,

    // Data values
    pub stations: Vec<BaseStation>,
    pub buildings: Vec<Building>,

    /// Replaces every antenna's own ray tracing settings when set.
    #[serde(default)]
    pub ray_tracing: Option<RayTracingConfig>,
    /// Height of the ground plane for occlusion, in metres.
    #[serde(default)]
    pub ground_height: Option<f64>,
}

impl Scene {
    pub fn custom(stations: Vec<BaseStation>, buildings: Vec<Building>) -> Self {
        Self {
            identity: SceneIdentity::Custom,
            stations,
            buildings,
            ray_tracing: None,
            ground_height: None,
        }
    }

    /// A snapshot of the buildings as they are now.
    pub fn building_set(&self) -> BuildingSet {
        BuildingSet::new(self.buildings.clone())
    }

    pub fn engine(&self) -> PropagationEngine {
        PropagationEngine::with_buildings(self.building_set())
    }

    pub fn occlusion(&self) -> BuildingScene {
        let scene = BuildingScene::new(&self.building_set());
        match self.ground_height {
            Some(height) => scene.with_ground(height),
            None => scene,
        }
    }

    pub fn ray_tracing_for<'a>(&'a self, antenna: &'a Antenna) -> &'a RayTracingConfig {
        self.ray_tracing.as_ref().unwrap_or(&antenna.ray_tracing)
    }

    pub fn antennas(&self) -> impl Iterator<Item = (&BaseStation, &Antenna)> {
        self.stations
            .iter()
            .flat_map(|station| station.antennas.iter().map(move |antenna| (station, antenna)))
    }

    pub fn registry(&self) -> StationRegistry {
        StationRegistry::new(self.stations.clone())
    }
}

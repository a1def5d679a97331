use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    building::{Building, MAX_IMPORTED_HEIGHT},
    geo::GeoPoint,
    materials::MaterialType,
    propagation::models::PropagationModel,
    scene::{Scene, SceneIdentity},
    station::{Antenna, BaseStation},
    units::*,
};

/// Carrier frequencies a generated antenna is picked from, in MHz.
const CARRIERS: [f64; 3] = [1800.0, 2600.0, 3500.0];
const MIN_BUILDING_HEIGHT: Length = Length::from_metres(3.0);
const DOWNTILT: f64 = -3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneGenerator {
    /// City blocks on a regular grid, stations on street corners.
    UrbanGrid {
        /// (longitude, latitude) of the grid centre.
        centre: (f64, f64),
        blocks_per_side: usize,
        /// Distance between neighbouring block centres.
        block_spacing: Length,
        /// Each block centre moves up to this far along each axis.
        jitter: Length,

        buildings: BuildingSizes,
        stations: StationLayout,
    },
    /// Buildings and stations placed uniformly in a square.
    RandomScatter {
        /// (longitude, latitude) of the square centre.
        centre: (f64, f64),
        side_len: Length,
        building_count: usize,

        buildings: BuildingSizes,
        stations: StationLayout,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSizes {
    pub min_side: Length,
    pub max_side: Length,
    pub mean_height: Length,
    pub std_height: Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLayout {
    pub station_count: usize,
    /// Antennas per station, spread evenly in azimuth.
    pub sectors: usize,
    pub min_mast_height: Length,
    pub max_mast_height: Length,
    pub power: Dbm,
    pub gain: Db,
    pub model: PropagationModel,
}

impl Default for BuildingSizes {
    fn default() -> Self {
        Self {
            min_side: 15.0 * METRES,
            max_side: 60.0 * METRES,
            mean_height: 24.0 * METRES,
            std_height: 12.0 * METRES,
        }
    }
}

impl Default for StationLayout {
    fn default() -> Self {
        Self {
            station_count: 4,
            sectors: 3,
            min_mast_height: 20.0 * METRES,
            max_mast_height: 45.0 * METRES,
            power: Dbm::from_dbm(43.0),
            gain: Db::from_db(17.0),
            model: PropagationModel::default(),
        }
    }
}

impl SceneGenerator {
    /// A 6 by 6 block grid with 80 m spacing.
    pub fn urban_grid(centre: (f64, f64)) -> Self {
        SceneGenerator::UrbanGrid {
            centre,
            blocks_per_side: 6,
            block_spacing: 80.0 * METRES,
            jitter: 8.0 * METRES,
            buildings: BuildingSizes::default(),
            stations: StationLayout::default(),
        }
    }

    /// 40 buildings in a 600 m square.
    pub fn random_scatter(centre: (f64, f64)) -> Self {
        SceneGenerator::RandomScatter {
            centre,
            side_len: 600.0 * METRES,
            building_count: 40,
            buildings: BuildingSizes::default(),
            stations: StationLayout::default(),
        }
    }

    pub fn generate_from_seed(&self, seed: u64) -> Scene {
        let rng = ChaCha12Rng::seed_from_u64(seed);
        let mut output = self.generate(rng);
        output.identity = SceneIdentity::Generated {
            generator: self.clone(),
            seed,
        };
        output
    }

    pub fn generate(&self, mut rng: ChaCha12Rng) -> Scene {
        match self {
            SceneGenerator::UrbanGrid {
                centre,
                blocks_per_side,
                block_spacing,
                jitter,
                buildings,
                stations,
            } => {
                let origin = GeoPoint::new(centre.0, centre.1, 0.0);
                let half = *block_spacing * (*blocks_per_side as f64 - 1.0) / 2.0;

                let mut placed = Vec::with_capacity(blocks_per_side * blocks_per_side);
                for row in 0..*blocks_per_side {
                    for col in 0..*blocks_per_side {
                        let east = *block_spacing * col as f64 - half + random_offset(*jitter, &mut rng);
                        let north = *block_spacing * row as f64 - half + random_offset(*jitter, &mut rng);
                        let id = format!("b{}", placed.len());
                        placed.push(buildings.generate(id, origin.offset_by(east, north), &mut rng));
                    }
                }

                // Street corners sit half a block away from block centres.
                let corners = blocks_per_side + 1;
                let stations = (0..stations.station_count)
                    .map(|index| {
                        let row = rng.random_range(0..corners);
                        let col = rng.random_range(0..corners);
                        let east = *block_spacing * col as f64 - half - *block_spacing / 2.0;
                        let north = *block_spacing * row as f64 - half - *block_spacing / 2.0;
                        stations.generate(index, origin.offset_by(east, north), &mut rng)
                    })
                    .collect();

                Scene::custom(stations, placed)
            }
            SceneGenerator::RandomScatter {
                centre,
                side_len,
                building_count,
                buildings,
                stations,
            } => {
                let origin = GeoPoint::new(centre.0, centre.1, 0.0);

                let placed = (0..*building_count)
                    .map(|index| {
                        let position = random_in_square(origin, *side_len, &mut rng);
                        buildings.generate(format!("b{index}"), position, &mut rng)
                    })
                    .collect();

                let stations = (0..stations.station_count)
                    .map(|index| {
                        let position = random_in_square(origin, *side_len, &mut rng);
                        stations.generate(index, position, &mut rng)
                    })
                    .collect();

                Scene::custom(stations, placed)
            }
        }
    }
}

impl BuildingSizes {
    fn generate(&self, id: String, position: GeoPoint, rng: &mut ChaCha12Rng) -> Building {
        let width = random_between(self.min_side, self.max_side, rng);
        let length = random_between(self.min_side, self.max_side, rng);

        let height = match Normal::new(self.mean_height.inner(), self.std_height.inner().abs()) {
            Ok(dist) => Length::from_metres(dist.sample(rng)),
            Err(_) => self.mean_height,
        }
        .clamp(MIN_BUILDING_HEIGHT, MAX_IMPORTED_HEIGHT);

        let material = MaterialType::VALUES[rng.random_range(0..MaterialType::VALUES.len())];

        Building::new(
            id,
            position.longitude,
            position.latitude,
            width,
            length,
            height,
            material,
        )
    }
}

impl StationLayout {
    fn generate(&self, index: usize, position: GeoPoint, rng: &mut ChaCha12Rng) -> BaseStation {
        let id = format!("s{index}");
        let mast = random_between(self.min_mast_height, self.max_mast_height, rng);
        let first_sector = rng.random_range(0.0..TAU).to_degrees();
        let frequency = Frequency::from_MHz(CARRIERS[rng.random_range(0..CARRIERS.len())]);

        let sectors = self.sectors.max(1);
        let antennas = (0..sectors).map(|sector| {
            let azimuth = (first_sector + 360.0 * sector as f64 / sectors as f64).rem_euclid(360.0);
            Antenna::new(format!("{id}-a{sector}"))
                .with_direction(azimuth, DOWNTILT)
                .with_power(self.power, self.gain)
                .with_frequency(frequency)
                .with_model(self.model.clone())
        });
        let antennas: Vec<Antenna> = antennas.collect();

        let mut station = BaseStation::new(id, position.longitude, position.latitude, mast.metres());
        station.antennas = antennas;
        station
    }
}

fn random_offset(max: Length, rng: &mut ChaCha12Rng) -> Length {
    if max.inner() <= 0.0 {
        return Length::default();
    }
    Length::from_metres(rng.random_range(-max.inner()..=max.inner()))
}

fn random_between(min: Length, max: Length, rng: &mut ChaCha12Rng) -> Length {
    if max <= min {
        return min;
    }
    Length::from_metres(rng.random_range(min.inner()..=max.inner()))
}

fn random_in_square(centre: GeoPoint, side_len: Length, rng: &mut ChaCha12Rng) -> GeoPoint {
    let half = side_len / 2.0;
    centre.offset_by(
        rng.random::<f64>() * side_len - half,
        rng.random::<f64>() * side_len - half,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        building::{MAX_FOOTPRINT, MIN_FOOTPRINT},
        propagation::models::AverageWallLoss,
    };

    #[test]
    fn same_seed_same_scene() {
        let generator = SceneGenerator::urban_grid((116.39, 39.9));
        assert_eq!(generator.generate_from_seed(7), generator.generate_from_seed(7));
        assert_ne!(generator.generate_from_seed(7), generator.generate_from_seed(8));
    }

    #[test]
    fn identity_recreates_scene() {
        let generator = SceneGenerator::random_scatter((0.0, 0.0));
        let scene = generator.generate_from_seed(42);

        assert_eq!(scene.identity.create(), Some(scene.clone()));
    }

    #[test]
    fn urban_grid_counts() {
        let scene = SceneGenerator::urban_grid((0.0, 0.0)).generate_from_seed(1);

        assert_eq!(scene.buildings.len(), 36);
        assert_eq!(scene.stations.len(), 4);
        assert!(scene.stations.iter().all(|s| s.antennas.len() == 3));

        let ids: HashSet<&str> = scene.antennas().map(|(_, a)| a.id.as_str()).collect();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn generated_values_in_range() {
        let generator = SceneGenerator::RandomScatter {
            centre: (10.0, 50.0),
            side_len: 1000.0 * METRES,
            building_count: 200,
            buildings: BuildingSizes {
                std_height: 80.0 * METRES,
                ..Default::default()
            },
            stations: StationLayout {
                station_count: 10,
                sectors: 4,
                model: AverageWallLoss {
                    shadow_fading: Db::from_db(6.0),
                }
                .into(),
                ..Default::default()
            },
        };
        let scene = generator.generate_from_seed(3);

        for building in &scene.buildings {
            assert!(building.height >= MIN_BUILDING_HEIGHT && building.height <= MAX_IMPORTED_HEIGHT);
            assert!(building.width >= MIN_FOOTPRINT && building.width <= MAX_FOOTPRINT);
            assert!((building.longitude - 10.0).abs() < 0.01);
            assert!(building.material_type.properties().is_some());
        }
        for (station, antenna) in scene.antennas() {
            assert!((20.0..=45.0).contains(&station.height));
            assert!((0.0..360.0).contains(&antenna.azimuth));
            assert_eq!(antenna.propagation_model.info().kind, "average-wall-loss-model");
        }
    }
}

//! Dense sampling of an antenna's beam for visualisation.
//!
//! The beam cone is swept in azimuth and elevation around boresight. Each ray walks
//! outwards in fixed steps, asking an [`OcclusionOracle`] whether something is in
//! the way. Sample strength uses a fast directional approximation: free space loss
//! plus linear attenuation away from boresight. It is not the full propagation engine.
//!
//! Rays are independent and evaluated in parallel with rayon.

pub mod occlusion;
pub mod sweep;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    geo::{GeoPoint, LocalFrame, enu_direction},
    propagation::models::free_space_path_loss,
    signal::SignalBand,
    station::{Antenna, BaseStation},
    units::{Db, Dbm, Frequency, Length},
    utility::{round_hundredths, symmetric_offsets},
};

use occlusion::{OcclusionOracle, ScanRay};
use sweep::{SweepOutcome, SweepToken};

/// Samples at or below this strength are dropped.
pub const NOISE_FLOOR: Dbm = Dbm::from_dbm(-120.0);

/// Strength recorded for blocked samples.
pub const BLOCKED_STRENGTH: Dbm = Dbm::from_dbm(-150.0);

/// A hit closer than this fraction of the sample distance blocks the sample.
pub const OCCLUSION_TOLERANCE: f64 = 0.95;

/// Used when an antenna has no usable frequency.
pub const FALLBACK_FREQUENCY: Frequency = Frequency::from_MHz(1800.0);

const AZIMUTH_EDGE_LOSS: f64 = 10.0;
const ELEVATION_EDGE_LOSS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RayTracingConfig {
    pub enabled: bool,
    /// Full width of the swept cone in degrees.
    pub azimuth_angle: f64,
    /// Full height of the swept cone in degrees.
    pub elevation_angle: f64,
    /// 1 to 5. Higher is finer in every dimension.
    pub density: u32,
    pub max_range: Length,
    /// Ask the occlusion oracle at all.
    pub show_obstacles: bool,
    /// Keep recording blocked samples up to `max_range` after a ray is blocked.
    pub trace_blocked_segment: bool,
}

impl Default for RayTracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            azimuth_angle: 120.0,
            elevation_angle: 30.0,
            density: 3,
            max_range: Length::from_metres(500.0),
            show_obstacles: true,
            trace_blocked_segment: false,
        }
    }
}

impl RayTracingConfig {
    fn density(&self) -> usize {
        self.density.clamp(1, 5) as usize
    }

    pub fn azimuth_steps(&self) -> usize {
        self.density() * 8
    }

    pub fn elevation_steps(&self) -> usize {
        self.density() * 4
    }

    pub fn distance_steps(&self) -> usize {
        self.density() * 15
    }

    pub fn distance_step(&self) -> Length {
        self.max_range / self.distance_steps() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayTracingPoint {
    pub position: GeoPoint,
    pub signal_strength: Dbm,
    pub band: SignalBand,
    pub blocked: bool,
    pub distance: Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayTrajectory {
    pub azimuth_offset: f64,
    pub elevation_offset: f64,
    /// Every sample position visited, including ones too weak to keep.
    pub path: Vec<GeoPoint>,
    pub blocked: bool,
    pub signal_points: Vec<RayTracingPoint>,
}

/// Directional approximation of the strength `distance` along a ray offset from
/// boresight, rounded to hundredths.
pub fn fast_rssi(
    antenna: &Antenna,
    config: &RayTracingConfig,
    distance: Length,
    azimuth_offset: f64,
    elevation_offset: f64,
) -> Dbm {
    let frequency = if antenna.frequency.MHz() > 0.0 {
        antenna.frequency
    } else {
        FALLBACK_FREQUENCY
    };

    let off_axis = edge_loss(azimuth_offset, config.azimuth_angle, AZIMUTH_EDGE_LOSS)
        + edge_loss(elevation_offset, config.elevation_angle, ELEVATION_EDGE_LOSS);

    (antenna.power + antenna.gain - free_space_path_loss(distance, frequency) - off_axis)
        .map(round_hundredths)
}

/// Loss reaching `at_edge` dB at half the beam width.
fn edge_loss(offset: f64, width: f64, at_edge: f64) -> Db {
    if width <= 0.0 {
        return Db::ZERO;
    }
    Db::from_db(offset.abs() / (width / 2.0) * at_edge)
}

/// Sweeps antenna beams against an occlusion oracle.
#[derive(Debug, Clone, Default)]
pub struct RaySampler<O> {
    oracle: O,
}

impl<O: OcclusionOracle> RaySampler<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// All trajectories for one antenna, ordered by azimuth offset then elevation offset.
    pub fn sample(
        &self,
        station: &BaseStation,
        antenna: &Antenna,
        config: &RayTracingConfig,
    ) -> Vec<RayTrajectory> {
        self.sample_superseding(station, antenna, config, &SweepToken::detached())
            .completed()
            .unwrap_or_default()
    }

    /// Like [`RaySampler::sample`], but stops scheduling rays once `token` is superseded.
    pub fn sample_superseding(
        &self,
        station: &BaseStation,
        antenna: &Antenna,
        config: &RayTracingConfig,
        token: &SweepToken,
    ) -> SweepOutcome {
        if !config.enabled {
            return SweepOutcome::Completed(Vec::new());
        }

        let frame = LocalFrame::new(station.antenna_position(antenna));
        let elevations: Vec<f64> =
            symmetric_offsets(config.elevation_angle, config.elevation_steps()).collect();
        let offsets: Vec<(f64, f64)> = symmetric_offsets(config.azimuth_angle, config.azimuth_steps())
            .flat_map(|az| elevations.iter().map(move |&el| (az, el)))
            .collect();

        debug!(antenna = %antenna.id, rays = offsets.len(), "sweep");

        let trajectories: Vec<Option<RayTrajectory>> = offsets
            .par_iter()
            .map(|&(az, el)| {
                if token.is_superseded() {
                    return None;
                }
                Some(self.trace_ray(&frame, antenna, config, az, el))
            })
            .collect();

        if token.is_superseded() {
            debug!(antenna = %antenna.id, "sweep superseded, discarding");
            return SweepOutcome::Superseded;
        }

        SweepOutcome::Completed(
            trajectories
                .into_iter()
                .flatten()
                .filter(|t| !t.path.is_empty())
                .collect(),
        )
    }

    /// Walks one ray out from the frame's anchor.
    pub fn trace_ray(
        &self,
        frame: &LocalFrame,
        antenna: &Antenna,
        config: &RayTracingConfig,
        azimuth_offset: f64,
        elevation_offset: f64,
    ) -> RayTrajectory {
        let direction = enu_direction(
            antenna.azimuth + azimuth_offset,
            antenna.elevation + elevation_offset,
        );
        let hit = if config.show_obstacles {
            self.nearest_obstacle(&ScanRay {
                origin: *frame.anchor(),
                direction,
                max_distance: config.max_range,
            })
        } else {
            None
        };

        let mut trajectory = RayTrajectory {
            azimuth_offset,
            elevation_offset,
            path: Vec::new(),
            blocked: false,
            signal_points: Vec::new(),
        };

        let step = config.distance_step();
        for n in 1..=config.distance_steps() {
            let distance = step * n as f64;
            let position = frame.to_geo(&(direction * distance.metres()));
            trajectory.path.push(position);

            if hit.is_some_and(|h| h < distance * OCCLUSION_TOLERANCE) {
                trajectory.blocked = true;
                trajectory.signal_points.push(RayTracingPoint {
                    position,
                    signal_strength: BLOCKED_STRENGTH,
                    band: SignalBand::Blocked,
                    blocked: true,
                    distance,
                });

                if !config.trace_blocked_segment {
                    break;
                }
                continue;
            }

            let strength = fast_rssi(antenna, config, distance, azimuth_offset, elevation_offset);
            if strength > NOISE_FLOOR {
                trajectory.signal_points.push(RayTracingPoint {
                    position,
                    signal_strength: strength,
                    band: SignalBand::from_rssi(strength),
                    blocked: false,
                    distance,
                });
            }
        }

        trajectory
    }

    fn nearest_obstacle(&self, ray: &ScanRay) -> Option<Length> {
        match self.oracle.pick(ray) {
            Ok(hit) => hit,
            Err(err) => {
                warn!(%err, "occlusion query failed, treating ray as clear");
                None
            }
        }
    }
}

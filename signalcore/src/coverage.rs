//! Sector coverage grid of an antenna's beam, evaluated with the full propagation engine.
//!
//! The beam is cut into azimuth slices, elevation slices and distance layers. Each
//! cell is scored by the signal at its centre.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    geo::{GeoPoint, destination},
    propagation::PropagationEngine,
    signal::SignalBand,
    station::{Antenna, BaseStation},
    units::{Dbm, Length},
};

/// Radii of the distance contour arcs.
pub const CONTOUR_DISTANCES: [Length; 4] = [
    Length::from_metres(1000.0),
    Length::from_metres(2000.0),
    Length::from_metres(3000.0),
    Length::from_metres(4000.0),
];
const ARC_SEGMENTS: usize = 20;
const DIRECTION_SEGMENTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeamVisualizationConfig {
    pub enabled: bool,
    /// Degrees.
    pub horizontal_beam_width: f64,
    /// Degrees.
    pub vertical_beam_width: f64,
    pub horizontal_steps: usize,
    pub vertical_steps: usize,
    pub max_distance: Length,
    pub distance_layers: usize,
    /// Rendering only.
    pub transparency: f64,
    pub show_contours: bool,
}

impl Default for BeamVisualizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            horizontal_beam_width: 120.0,
            vertical_beam_width: 30.0,
            horizontal_steps: 12,
            vertical_steps: 30,
            max_distance: Length::from_metres(5000.0),
            distance_layers: 10,
            transparency: 0.6,
            show_contours: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageCell {
    pub horizontal_index: usize,
    pub vertical_index: usize,
    pub layer: usize,
    pub azimuth: (f64, f64),
    pub elevation: (f64, f64),
    pub inner_radius: Length,
    pub outer_radius: Length,
    pub centre: GeoPoint,
    pub rssi: Dbm,
    pub band: SignalBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ContourKind {
    /// Arc across the beam at a fixed distance.
    Distance { radius: Length },
    /// Line out from the antenna at a fixed azimuth.
    Direction { azimuth: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourLine {
    pub kind: ContourKind,
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMap {
    pub station_id: String,
    pub antenna_id: String,
    pub cells: Vec<CoverageCell>,
    pub contours: Vec<ContourLine>,
}

impl CoverageMap {
    pub fn band_counts(&self) -> BTreeMap<SignalBand, usize> {
        let mut counts = BTreeMap::new();
        for cell in &self.cells {
            *counts.entry(cell.band).or_insert(0) += 1;
        }
        counts
    }
}

/// Coverage of one antenna using its own visualisation settings.
/// `None` when visualisation is disabled for the antenna.
pub fn coverage_map(
    engine: &PropagationEngine,
    station: &BaseStation,
    antenna: &Antenna,
) -> Option<CoverageMap> {
    let config = &antenna.visualization;
    if !config.enabled {
        return None;
    }

    let contours = if config.show_contours {
        contour_lines(station, antenna, config)
    } else {
        Vec::new()
    };

    Some(CoverageMap {
        station_id: station.id.clone(),
        antenna_id: antenna.id.clone(),
        cells: sector_grid(engine, station, antenna, config),
        contours,
    })
}

/// Every cell of the beam, ordered by azimuth slice, then elevation slice, then layer.
pub fn sector_grid(
    engine: &PropagationEngine,
    station: &BaseStation,
    antenna: &Antenna,
    config: &BeamVisualizationConfig,
) -> Vec<CoverageCell> {
    let (h_steps, v_steps, layers) = (
        config.horizontal_steps,
        config.vertical_steps,
        config.distance_layers,
    );
    if h_steps == 0 || v_steps == 0 || layers == 0 {
        return Vec::new();
    }

    let origin = station.antenna_position(antenna);
    let az_start = antenna.azimuth - config.horizontal_beam_width / 2.0;
    let el_start = antenna.elevation - config.vertical_beam_width / 2.0;
    let az_step = config.horizontal_beam_width / h_steps as f64;
    let el_step = config.vertical_beam_width / v_steps as f64;

    (0..h_steps * v_steps * layers)
        .into_par_iter()
        .map(|index| {
            let h = index / (v_steps * layers);
            let v = index / layers % v_steps;
            let d = index % layers;

            let azimuth = (az_start + h as f64 * az_step, az_start + (h + 1) as f64 * az_step);
            let elevation = (el_start + v as f64 * el_step, el_start + (v + 1) as f64 * el_step);
            let inner_radius = config.max_distance * d as f64 / layers as f64;
            let outer_radius = config.max_distance * (d + 1) as f64 / layers as f64;

            let centre = destination(
                &origin,
                (inner_radius + outer_radius) / 2.0,
                (azimuth.0 + azimuth.1) / 2.0,
                (elevation.0 + elevation.1) / 2.0,
            );
            let rssi = engine.calculate_signal_strength(station, antenna, &centre).rssi;

            CoverageCell {
                horizontal_index: h,
                vertical_index: v,
                layer: d,
                azimuth,
                elevation,
                inner_radius,
                outer_radius,
                centre,
                rssi,
                band: SignalBand::from_rssi(rssi),
            }
        })
        .collect()
}

/// Distance arcs across the beam at boresight elevation, then direction lines at
/// boresight and a quarter beam width either side.
pub fn contour_lines(
    station: &BaseStation,
    antenna: &Antenna,
    config: &BeamVisualizationConfig,
) -> Vec<ContourLine> {
    let origin = station.antenna_position(antenna);
    let width = config.horizontal_beam_width;

    let arcs = CONTOUR_DISTANCES
        .into_iter()
        .filter(|radius| *radius <= config.max_distance)
        .map(|radius| ContourLine {
            kind: ContourKind::Distance { radius },
            points: (0..=ARC_SEGMENTS)
                .map(|i| {
                    let azimuth = antenna.azimuth - width / 2.0 + width * i as f64 / ARC_SEGMENTS as f64;
                    destination(&origin, radius, azimuth, antenna.elevation)
                })
                .collect(),
        });

    let directions = [
        antenna.azimuth - width / 4.0,
        antenna.azimuth,
        antenna.azimuth + width / 4.0,
    ]
    .into_iter()
    .map(|azimuth| ContourLine {
        kind: ContourKind::Direction { azimuth },
        points: (0..=DIRECTION_SEGMENTS)
            .map(|i| {
                let distance = config.max_distance * (i as f64 / DIRECTION_SEGMENTS as f64);
                destination(&origin, distance, azimuth, antenna.elevation)
            })
            .collect(),
    });

    arcs.chain(directions).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geo::distance_3d, units::METRES};

    fn station() -> BaseStation {
        BaseStation::new("s", 116.39, 39.9, 30.0)
    }

    fn antenna() -> Antenna {
        Antenna::new("a").with_direction(90.0, 0.0)
    }

    fn small() -> BeamVisualizationConfig {
        BeamVisualizationConfig {
            horizontal_steps: 4,
            vertical_steps: 2,
            distance_layers: 3,
            max_distance: 3000.0 * METRES,
            ..Default::default()
        }
    }

    #[test]
    fn grid_layout() {
        let engine = PropagationEngine::default();
        let cells = sector_grid(&engine, &station(), &antenna(), &small());

        assert_eq!(cells.len(), 4 * 2 * 3);

        let first = &cells[0];
        assert_eq!(first.azimuth, (30.0, 60.0));
        assert_eq!(first.elevation, (-15.0, 0.0));
        assert_eq!(first.inner_radius, 0.0 * METRES);
        assert_eq!(first.outer_radius, 1000.0 * METRES);

        let last = &cells[23];
        assert_eq!(
            (last.horizontal_index, last.vertical_index, last.layer),
            (3, 1, 2)
        );
        assert_eq!(last.azimuth, (120.0, 150.0));
        assert_eq!(last.outer_radius, 3000.0 * METRES);
    }

    #[test]
    fn cells_use_full_engine_at_centre() {
        let engine = PropagationEngine::default();
        let (station, antenna) = (station(), antenna());
        let cells = sector_grid(&engine, &station, &antenna, &small());

        for cell in &cells {
            let expected = engine.calculate_signal_strength(&station, &antenna, &cell.centre);
            assert_eq!(cell.rssi, expected.rssi);
            assert_eq!(cell.band, SignalBand::from_rssi(expected.rssi));

            let radius = ((cell.inner_radius + cell.outer_radius) / 2.0).metres();
            let distance = distance_3d(&station.antenna_position(&antenna), &cell.centre).metres();
            assert!((distance - radius).abs() / radius < 0.01, "{distance} vs {radius}");
        }

        // Free space only, so each slice weakens with distance.
        for slice in cells.chunks(3) {
            assert!(slice[0].rssi > slice[1].rssi && slice[1].rssi > slice[2].rssi);
        }
    }

    #[test]
    fn contours_respect_max_distance() {
        let lines = contour_lines(&station(), &antenna(), &BeamVisualizationConfig::default());
        assert_eq!(lines.len(), 4 + 3);
        assert!(lines[..4].iter().all(|l| l.points.len() == 21));
        assert!(lines[4..].iter().all(|l| l.points.len() == 11));
        assert_eq!(lines[4].kind, ContourKind::Direction { azimuth: 60.0 });

        let lines = contour_lines(&station(), &antenna(), &small());
        let arcs = lines
            .iter()
            .filter(|l| matches!(l.kind, ContourKind::Distance { .. }))
            .count();
        assert_eq!(arcs, 3);
    }

    #[test]
    fn arc_points_sit_on_their_radius() {
        let (station, antenna) = (station(), antenna());
        let lines = contour_lines(&station, &antenna, &BeamVisualizationConfig::default());
        let origin = station.antenna_position(&antenna);

        for point in &lines[1].points {
            assert!((distance_3d(&origin, point).metres() - 2000.0).abs() < 1.0);
        }
    }

    #[test]
    fn disabled_or_contourless_maps() {
        let engine = PropagationEngine::default();
        let hidden = antenna().with_visualization(BeamVisualizationConfig {
            enabled: false,
            ..small()
        });
        assert!(coverage_map(&engine, &station(), &hidden).is_none());

        let plain = antenna().with_visualization(BeamVisualizationConfig {
            show_contours: false,
            ..small()
        });
        let map = coverage_map(&engine, &station(), &plain).unwrap();
        assert!(map.contours.is_empty());
        assert_eq!(map.band_counts().values().sum::<usize>(), 24);
    }
}

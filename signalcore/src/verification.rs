//! Properties that should hold for every computed result.
//! Each public function, other than the `verify_*` groups, checks one property and logs the first violation.

use tracing::error;

use crate::{
    obstruction::WallPenetrationResult,
    raytrace::{BLOCKED_STRENGTH, NOISE_FLOOR, RayTrajectory},
    signal::{SignalBand, SignalStrengthResult},
    station::BaseStation,
};

/// Largest gap between a rounded RSSI and the rounded inputs it came from.
const ROUNDING_SLACK: f64 = 0.011;

pub fn verify_signals(results: &[SignalStrengthResult], stations: &[BaseStation]) -> bool {
    sorted_strongest_first(results)
        && one_result_per_antenna(results, stations)
        && rssi_matches_link_budget(results, stations)
        && results
            .iter()
            .filter_map(|r| r.awm.as_ref())
            .all(|awm| walls_are_consistent(&awm.penetration))
}

pub fn verify_trajectories(trajectories: &[RayTrajectory]) -> bool {
    bands_are_consistent(trajectories) && blocked_flags_match_points(trajectories)
}

pub fn sorted_strongest_first(results: &[SignalStrengthResult]) -> bool {
    for pair in results.windows(2) {
        if pair[0].rssi < pair[1].rssi {
            error!(first = ?pair[0], second = ?pair[1], "results out of order");
            return false;
        }
    }
    true
}

/// Every antenna contributes exactly once, co-located or not.
pub fn one_result_per_antenna(results: &[SignalStrengthResult], stations: &[BaseStation]) -> bool {
    let antennas: usize = stations.iter().map(|s| s.antennas.len()).sum();
    if antennas != results.len() {
        error!(antennas, results = results.len(), "result count does not match antenna count");
        return false;
    }
    true
}

/// `rssi = power + gain - path loss` up to the rounding of the reported values.
pub fn rssi_matches_link_budget(results: &[SignalStrengthResult], stations: &[BaseStation]) -> bool {
    for result in results {
        let Some(antenna) = stations
            .iter()
            .find(|s| s.id == result.station_id)
            .and_then(|s| s.antenna(&result.antenna_id))
        else {
            error!(antenna = %result.antenna_id, "result for unknown antenna");
            return false;
        };

        let expected = (antenna.power + antenna.gain - result.path_loss).dbm();
        if (result.rssi.dbm() - expected).abs() > ROUNDING_SLACK {
            error!(?result, expected, "rssi does not match link budget");
            return false;
        }
    }
    true
}

/// Each penetrated building costs at least two walls, and the totals add up.
pub fn walls_are_consistent(result: &WallPenetrationResult) -> bool {
    if let Some(building) = result.penetrated_buildings.iter().find(|b| b.penetration_points < 2) {
        error!(building = %building.building_id, "fewer than two walls penetrated");
        return false;
    }

    let walls: u32 = result.penetrated_buildings.iter().map(|b| b.penetration_points).sum();
    let loss: f64 = result
        .penetrated_buildings
        .iter()
        .map(|b| b.wall_loss.db() * b.penetration_points as f64)
        .sum();

    if walls != result.wall_count || (loss - result.total_wall_loss.db()).abs() > 1e-9 {
        error!(?result, "wall totals do not add up");
        return false;
    }
    true
}

/// Blocked samples carry the sentinel and the blocked band, others are banded by strength.
pub fn bands_are_consistent(trajectories: &[RayTrajectory]) -> bool {
    for point in trajectories.iter().flat_map(|t| &t.signal_points) {
        let consistent = if point.blocked {
            point.band == SignalBand::Blocked && point.signal_strength == BLOCKED_STRENGTH
        } else {
            point.band == SignalBand::from_rssi(point.signal_strength)
                && point.signal_strength > NOISE_FLOOR
        };

        if !consistent {
            error!(?point, "sample band does not match its strength");
            return false;
        }
    }
    true
}

pub fn blocked_flags_match_points(trajectories: &[RayTrajectory]) -> bool {
    for trajectory in trajectories {
        if trajectory.blocked != trajectory.signal_points.iter().any(|p| p.blocked) {
            error!(
                azimuth = trajectory.azimuth_offset,
                elevation = trajectory.elevation_offset,
                "trajectory blocked flag disagrees with its samples"
            );
            return false;
        }
    }
    true
}

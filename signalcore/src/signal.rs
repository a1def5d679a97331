//! Ranking of every antenna's signal at a point, and the shared RSSI colour bands.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    geo::GeoPoint,
    propagation::{PropagationEngine, models::AwmDetails},
    station::BaseStation,
    units::{Db, Dbm, Length},
};

/// Receiver height used when a query point has none.
pub const DEFAULT_TARGET_HEIGHT: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStrengthResult {
    pub station_id: String,
    pub antenna_id: String,
    pub rssi: Dbm,
    pub distance: Length,
    pub path_loss: Db,
    /// Display name of the model that produced the loss.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awm: Option<AwmDetails>,
}

impl SignalStrengthResult {
    pub fn band(&self) -> SignalBand {
        SignalBand::from_rssi(self.rssi)
    }
}

/// Signal from every antenna of every station at `target`, strongest first.
///
/// Each antenna is evaluated independently with the full propagation engine.
/// Antennas with equal RSSI keep station then antenna order.
pub fn best_signal(
    engine: &PropagationEngine,
    stations: &[BaseStation],
    target: &GeoPoint,
) -> Vec<SignalStrengthResult> {
    let mut results: Vec<SignalStrengthResult> = stations
        .par_iter()
        .flat_map_iter(|station| {
            station
                .antennas
                .iter()
                .map(move |antenna| engine.calculate_signal_strength(station, antenna, target))
        })
        .collect();

    results.sort_by(|a, b| b.rssi.dbm().total_cmp(&a.rssi.dbm()));
    results
}

/// Colour classification of a received signal.
///
/// Thresholds are strict: exactly -60 dBm is [`SignalBand::Good`], not strong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalBand {
    Strong,
    Good,
    Medium,
    Weak,
    VeryWeak,
    Blocked,
}

impl SignalBand {
    pub const VALUES: [SignalBand; 6] = [
        SignalBand::Strong,
        SignalBand::Good,
        SignalBand::Medium,
        SignalBand::Weak,
        SignalBand::VeryWeak,
        SignalBand::Blocked,
    ];

    pub fn from_rssi(rssi: Dbm) -> Self {
        match rssi.dbm() {
            x if x > -60.0 => SignalBand::Strong,
            x if x > -70.0 => SignalBand::Good,
            x if x > -80.0 => SignalBand::Medium,
            x if x > -100.0 => SignalBand::Weak,
            _ => SignalBand::VeryWeak,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SignalBand::Strong => "#00FF00",
            SignalBand::Good => "#ADFF2F",
            SignalBand::Medium => "#FFFF00",
            SignalBand::Weak => "#FFA500",
            SignalBand::VeryWeak => "#FF0000",
            SignalBand::Blocked => "#808080",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalBand::Strong => "strong",
            SignalBand::Good => "good",
            SignalBand::Medium => "medium",
            SignalBand::Weak => "weak",
            SignalBand::VeryWeak => "very-weak",
            SignalBand::Blocked => "blocked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        propagation::models::{Cost231Hata, FreeSpace},
        station::Antenna,
    };

    #[test]
    fn band_boundaries_are_exact() {
        let cases = [
            (-59.99, SignalBand::Strong),
            (-60.0, SignalBand::Good),
            (-69.99, SignalBand::Good),
            (-70.0, SignalBand::Medium),
            (-80.0, SignalBand::Weak),
            (-99.99, SignalBand::Weak),
            (-100.0, SignalBand::VeryWeak),
            (-150.0, SignalBand::VeryWeak),
        ];

        for (rssi, band) in cases {
            assert_eq!(SignalBand::from_rssi(Dbm::from_dbm(rssi)), band, "{rssi}");
        }
    }

    #[test]
    fn every_band_has_its_own_colour() {
        let mut colours: Vec<&str> = SignalBand::VALUES.iter().map(|b| b.color()).collect();
        colours.sort();
        colours.dedup();
        assert_eq!(colours.len(), SignalBand::VALUES.len());
    }

    #[test]
    fn results_are_strongest_first() {
        let stations = vec![
            BaseStation::new("far", 0.0, 0.02, 30.0).with_antenna(Antenna::new("far-a")),
            BaseStation::new("near", 0.0, 0.005, 30.0)
                .with_antenna(Antenna::new("near-a"))
                .with_antenna(Antenna::new("near-hata").with_model(Cost231Hata::default())),
            BaseStation::new("empty", 0.0, 0.0, 30.0),
        ];
        let target = GeoPoint::new(0.0, 0.01, DEFAULT_TARGET_HEIGHT);

        let results = best_signal(&PropagationEngine::default(), &stations, &target);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].antenna_id, "near-a");
        assert!(results.windows(2).all(|w| w[0].rssi >= w[1].rssi));
    }

    #[test]
    fn co_located_antennas_are_not_merged() {
        let station = BaseStation::new("s", 0.0, 0.0, 30.0)
            .with_antenna(Antenna::new("a").with_model(FreeSpace))
            .with_antenna(Antenna::new("b").with_model(FreeSpace));
        let target = GeoPoint::new(0.0, 0.01, DEFAULT_TARGET_HEIGHT);

        let results = best_signal(&PropagationEngine::default(), &[station], &target);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rssi, results[1].rssi);
        assert_eq!(results[0].antenna_id, "a");
        assert_eq!(results[1].antenna_id, "b");
    }
}

//! Path loss and received signal strength between an antenna and a point.

pub mod models;

use tracing::trace;

use crate::{
    building::BuildingSet,
    geo::{GeoPoint, distance_3d},
    obstruction::{WallPenetrationDetector, WallPenetrationResult},
    signal::SignalStrengthResult,
    station::{Antenna, BaseStation},
    units::{Db, Dbm, Frequency, Length},
    utility::round_hundredths,
};

use models::{PathLoss, PropagationModel};

/// A single transmitter to receiver path.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub transmitter: GeoPoint,
    pub receiver: GeoPoint,
    /// Straight line distance between the two ends.
    pub distance: Length,
    pub frequency: Frequency,
}

impl Link {
    pub fn new(transmitter: GeoPoint, receiver: GeoPoint, frequency: Frequency) -> Self {
        Self {
            distance: distance_3d(&transmitter, &receiver),
            transmitter,
            receiver,
            frequency,
        }
    }
}

/// Evaluates propagation models against a fixed snapshot of buildings.
#[derive(Debug, Clone, Default)]
pub struct PropagationEngine {
    detector: WallPenetrationDetector,
    buildings: BuildingSet,
}

impl PropagationEngine {
    pub fn new(detector: WallPenetrationDetector, buildings: BuildingSet) -> Self {
        Self { detector, buildings }
    }

    pub fn with_buildings(buildings: impl Into<BuildingSet>) -> Self {
        Self {
            detector: WallPenetrationDetector::default(),
            buildings: buildings.into(),
        }
    }

    pub fn buildings(&self) -> &BuildingSet {
        &self.buildings
    }

    pub fn detector(&self) -> &WallPenetrationDetector {
        &self.detector
    }

    pub fn detect_walls(&self, start: &GeoPoint, end: &GeoPoint) -> WallPenetrationResult {
        self.detector.detect(start, end, self.buildings.as_slice())
    }

    pub fn compute_path_loss(&self, model: &PropagationModel, link: &Link) -> PathLoss {
        model.path_loss(self, link)
    }

    /// Received power at `target` from one antenna, using the antenna's own model.
    ///
    /// `rssi = power + gain - path loss`, with rssi, distance and path loss
    /// rounded to hundredths after the calculation.
    pub fn calculate_signal_strength(
        &self,
        station: &BaseStation,
        antenna: &Antenna,
        target: &GeoPoint,
    ) -> SignalStrengthResult {
        let link = Link::new(station.antenna_position(antenna), *target, antenna.frequency);
        let path_loss = self.compute_path_loss(&antenna.propagation_model, &link);
        let rssi = received_power(antenna.power, antenna.gain, path_loss.loss);

        trace!(
            antenna = %antenna.id,
            distance = link.distance.metres(),
            loss = path_loss.loss.db(),
            "signal strength"
        );

        SignalStrengthResult {
            station_id: station.id.clone(),
            antenna_id: antenna.id.clone(),
            rssi: rssi.map(round_hundredths),
            distance: link.distance.map(round_hundredths),
            path_loss: path_loss.loss.map(round_hundredths),
            model: antenna.propagation_model.info().name.to_string(),
            awm: path_loss.awm,
        }
    }
}

pub fn received_power(power: Dbm, gain: Db, loss: Db) -> Dbm {
    power + gain - loss
}

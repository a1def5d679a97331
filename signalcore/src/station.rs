use serde::{Deserialize, Serialize};

use crate::{
    coverage::BeamVisualizationConfig,
    geo::GeoPoint,
    propagation::models::PropagationModel,
    raytrace::RayTracingConfig,
    units::{Db, Dbm, Frequency, Length},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Height of the station site in metres.
    pub height: f64,
    #[serde(default)]
    pub antennas: Vec<Antenna>,
}

impl BaseStation {
    pub fn new(id: impl Into<String>, longitude: f64, latitude: f64, height: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            longitude,
            latitude,
            height,
            antennas: Vec::new(),
        }
    }

    pub fn with_antenna(mut self, antenna: Antenna) -> Self {
        self.antennas.push(antenna);
        self
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude, self.height)
    }

    /// Where an antenna on this station radiates from: the station position
    /// raised by the antenna's mount height.
    pub fn antenna_position(&self, antenna: &Antenna) -> GeoPoint {
        GeoPoint::new(
            self.longitude,
            self.latitude,
            self.height + antenna.height.metres(),
        )
    }

    pub fn antenna(&self, id: &str) -> Option<&Antenna> {
        self.antennas.iter().find(|a| a.id == id)
    }

    pub fn antenna_ids(&self) -> impl Iterator<Item = &str> {
        self.antennas.iter().map(|a| a.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Antenna {
    pub id: String,
    /// Boresight direction in degrees clockwise from north.
    pub azimuth: f64,
    /// Boresight tilt in degrees above the horizon.
    pub elevation: f64,
    /// Mount height above the station.
    pub height: Length,
    pub power: Dbm,
    pub gain: Db,
    pub frequency: Frequency,
    #[serde(default)]
    pub propagation_model: PropagationModel,
    #[serde(default)]
    pub visualization: BeamVisualizationConfig,
    #[serde(default)]
    pub ray_tracing: RayTracingConfig,
}

impl Antenna {
    /// A 20 dBm, 15 dBi, 1800 MHz antenna 5 m above the station pointing north.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            azimuth: 0.0,
            elevation: 0.0,
            height: Length::from_metres(5.0),
            power: Dbm::from_dbm(20.0),
            gain: Db::from_db(15.0),
            frequency: Frequency::from_MHz(1800.0),
            propagation_model: PropagationModel::default(),
            visualization: BeamVisualizationConfig::default(),
            ray_tracing: RayTracingConfig::default(),
        }
    }

    pub fn with_direction(mut self, azimuth: f64, elevation: f64) -> Self {
        self.azimuth = azimuth;
        self.elevation = elevation;
        self
    }

    pub fn with_height(mut self, height: Length) -> Self {
        self.height = height;
        self
    }

    pub fn with_power(mut self, power: Dbm, gain: Db) -> Self {
        self.power = power;
        self.gain = gain;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_model(mut self, model: impl Into<PropagationModel>) -> Self {
        self.propagation_model = model.into();
        self
    }

    pub fn with_ray_tracing(mut self, config: RayTracingConfig) -> Self {
        self.ray_tracing = config;
        self
    }

    pub fn with_visualization(mut self, config: BeamVisualizationConfig) -> Self {
        self.visualization = config;
        self
    }
}

/// The stations of a scene. Stations own their antennas, so removing a station
/// removes its antennas too.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: Vec<BaseStation>,
}

impl StationRegistry {
    pub fn new(stations: Vec<BaseStation>) -> Self {
        Self { stations }
    }

    pub fn stations(&self) -> &[BaseStation] {
        &self.stations
    }

    pub fn into_stations(self) -> Vec<BaseStation> {
        self.stations
    }

    pub fn station(&self, id: &str) -> Option<&BaseStation> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn station_mut(&mut self, id: &str) -> Option<&mut BaseStation> {
        self.stations.iter_mut().find(|s| s.id == id)
    }

    /// Finds an antenna anywhere in the registry along with its station.
    pub fn find_antenna(&self, antenna_id: &str) -> Option<(&BaseStation, &Antenna)> {
        self.stations
            .iter()
            .find_map(|s| s.antenna(antenna_id).map(|a| (s, a)))
    }

    pub fn total_antennas(&self) -> usize {
        self.stations.iter().map(|s| s.antennas.len()).sum()
    }

    /// Adds a station, replacing any existing station with the same id.
    /// Returns the replaced station.
    pub fn add_station(&mut self, station: BaseStation) -> Option<BaseStation> {
        match self.stations.iter().position(|s| s.id == station.id) {
            Some(index) => Some(std::mem::replace(&mut self.stations[index], station)),
            None => {
                self.stations.push(station);
                None
            }
        }
    }

    /// Removes a station and, with it, all of its antennas. Callers should drop
    /// any state held for [`BaseStation::antenna_ids`] of the returned station.
    pub fn remove_station(&mut self, id: &str) -> Option<BaseStation> {
        let index = self.stations.iter().position(|s| s.id == id)?;
        Some(self.stations.remove(index))
    }

    /// Returns false if the station does not exist.
    pub fn add_antenna(&mut self, station_id: &str, antenna: Antenna) -> bool {
        match self.station_mut(station_id) {
            Some(station) => {
                station.antennas.push(antenna);
                true
            }
            None => false,
        }
    }

    pub fn remove_antenna(&mut self, station_id: &str, antenna_id: &str) -> Option<Antenna> {
        let station = self.station_mut(station_id)?;
        let index = station.antennas.iter().position(|a| a.id == antenna_id)?;
        Some(station.antennas.remove(index))
    }

    pub fn clear(&mut self) -> Vec<BaseStation> {
        std::mem::take(&mut self.stations)
    }
}

impl From<Vec<BaseStation>> for StationRegistry {
    fn from(value: Vec<BaseStation>) -> Self {
        StationRegistry::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StationRegistry {
        StationRegistry::new(vec![
            BaseStation::new("s1", 0.0, 0.0, 30.0)
                .with_antenna(Antenna::new("a1"))
                .with_antenna(Antenna::new("a2").with_direction(120.0, 0.0)),
            BaseStation::new("s2", 0.01, 0.0, 25.0).with_antenna(Antenna::new("b1")),
        ])
    }

    #[test]
    fn antenna_position_adds_mount_height() {
        let station = BaseStation::new("s", 116.4, 39.9, 30.0);
        let antenna = Antenna::new("a").with_height(Length::from_metres(5.0));

        assert_eq!(station.antenna_position(&antenna), GeoPoint::new(116.4, 39.9, 35.0));
    }

    #[test]
    fn removing_station_cascades() {
        let mut stations = registry();
        let removed = stations.remove_station("s1").unwrap();

        assert_eq!(removed.antenna_ids().collect::<Vec<_>>(), ["a1", "a2"]);
        assert_eq!(stations.total_antennas(), 1);
        assert!(stations.find_antenna("a1").is_none());
        assert!(stations.remove_station("s1").is_none());
    }

    #[test]
    fn antenna_management() {
        let mut stations = registry();

        assert!(stations.add_antenna("s2", Antenna::new("b2")));
        assert!(!stations.add_antenna("missing", Antenna::new("x")));
        assert_eq!(stations.find_antenna("b2").map(|(s, _)| s.id.as_str()), Some("s2"));

        let removed = stations.remove_antenna("s1", "a2").unwrap();
        assert_eq!(removed.azimuth, 120.0);
        assert!(stations.remove_antenna("s1", "a2").is_none());
        assert_eq!(stations.total_antennas(), 3);
    }

    #[test]
    fn adding_same_id_replaces() {
        let mut stations = registry();
        let replaced = stations.add_station(BaseStation::new("s2", 1.0, 1.0, 10.0));

        assert_eq!(replaced.map(|s| s.antennas.len()), Some(1));
        assert_eq!(stations.stations().len(), 2);
        assert_eq!(stations.station("s2").map(|s| s.height), Some(10.0));
    }

    #[test]
    fn antenna_json_uses_model_config() {
        let json = r#"{
            "id": "a",
            "azimuth": 45,
            "elevation": -2,
            "height": 5,
            "power": 43,
            "gain": 17,
            "frequency": 2600,
            "propagationModel": {"type": "itu-indoor", "parameters": {"floors": 2}}
        }"#;

        let antenna: Antenna = serde_json::from_str(json).unwrap();
        assert_eq!(antenna.propagation_model.info().kind, "itu-indoor");
        assert_eq!(antenna.power, Dbm::from_dbm(43.0));
        assert_eq!(antenna.ray_tracing, RayTracingConfig::default());
    }
}

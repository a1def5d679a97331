use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    obstruction::WallPenetrationResult,
    units::{Db, Frequency, Length},
};

use super::{Link, PropagationEngine};

/// Per floor attenuation of the indoor model.
const ITU_FLOOR_LOSS: Db = Db::from_db(15.0);

/// Valid frequency band of COST-231-Hata, in MHz.
pub const HATA_BAND: (f64, f64) = (1500.0, 2000.0);

/// Standard free space path loss with distance in km and frequency in MHz.
/// <https://en.wikipedia.org/wiki/Free-space_path_loss>
///
/// Degenerate inputs (non-positive distance or frequency) give zero loss.
pub fn free_space_path_loss(distance: Length, frequency: Frequency) -> Db {
    if distance.metres() <= 0.0 || frequency.MHz() <= 0.0 {
        return Db::ZERO;
    }

    Db::from_db(20.0 * distance.km().log10() + 20.0 * frequency.MHz().log10() + 32.45)
}

/// COST-231 extension of the Hata model for urban macro cells.
///
/// * `base_height` - absolute height of the transmitting antenna.
/// * `mobile_height` - height of the receiver.
///
/// Outside 1500-2000 MHz, below 1 m, or with non-positive antenna heights this
/// falls back to free space. The result is never lower than free space loss.
pub fn cost231_hata_path_loss(
    distance: Length,
    frequency: Frequency,
    base_height: Length,
    mobile_height: Length,
    city: CityType,
) -> Db {
    let free_space = free_space_path_loss(distance, frequency);
    let f = frequency.MHz();

    if distance.metres() < 1.0
        || f < HATA_BAND.0
        || f > HATA_BAND.1
        || base_height.metres() <= 0.0
        || mobile_height.metres() <= 0.0
    {
        return free_space;
    }

    let hb = base_height.metres();
    let hm = mobile_height.metres();

    let mobile_correction = match city {
        CityType::Large => 3.2 * (11.75 * hm).log10().powi(2) - 4.97,
        CityType::MediumSmall => (1.1 * f.log10() - 0.7) * hm - (1.56 * f.log10() - 0.8),
    };

    // The trailing 3 dB is the metropolitan centre correction.
    let loss = 46.3 + 33.9 * f.log10() - 13.82 * hb.log10() - mobile_correction
        + (44.9 - 6.55 * hb.log10()) * distance.km().log10()
        + 3.0;

    Db::from_db(loss).max(free_space)
}

pub fn itu_indoor_path_loss(distance: Length, frequency: Frequency, wall_loss: Db, floors: u32) -> Db {
    free_space_path_loss(distance, frequency) + wall_loss + ITU_FLOOR_LOSS * floors as f64
}

/// Components of an average wall loss calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AwmBreakdown {
    pub free_space_loss: Db,
    pub wall_loss: Db,
    pub shadow_fading: Db,
    pub total: Db,
}

/// `PL = free space + W_avg * N_walls + shadow fading`
pub fn average_wall_loss_path_loss(
    distance: Length,
    frequency: Frequency,
    walls: &WallPenetrationResult,
    shadow_fading: Db,
) -> AwmBreakdown {
    let free_space_loss = free_space_path_loss(distance, frequency);
    let wall_loss = walls.average_wall_loss * walls.wall_count as f64;

    AwmBreakdown {
        free_space_loss,
        wall_loss,
        shadow_fading,
        total: free_space_loss + wall_loss + shadow_fading,
    }
}

/// Loss of a link along with any model specific detail.
#[derive(Debug, Clone, PartialEq)]
pub struct PathLoss {
    pub loss: Db,
    pub awm: Option<AwmDetails>,
}

impl From<Db> for PathLoss {
    fn from(loss: Db) -> Self {
        PathLoss { loss, awm: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwmDetails {
    pub penetration: WallPenetrationResult,
    pub breakdown: AwmBreakdown,
}

macro_rules! propagation_model {
    ($($variant:ident),+) => {

        /// The propagation model an antenna uses.
        ///
        /// Serialized in the loosely typed `{ "type": ..., "parameters": {...} }`
        /// form. Unknown types load as [`FreeSpace`].
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(from = "PropagationModelConfig", into = "PropagationModelConfig")]
        pub enum PropagationModel {
            $(
                $variant($variant),
            )*
        }

        impl PropagationModel {
            pub fn path_loss(&self, engine: &PropagationEngine, link: &Link) -> PathLoss {
                match self {
                    $(
                        PropagationModel::$variant(inner) => inner.path_loss(engine, link),
                    )*
                }
            }

            pub fn info(&self) -> ModelInfo {
                match self {
                    $(
                        PropagationModel::$variant(_) => $variant::INFO,
                    )*
                }
            }

            /// Every model with its default parameters.
            pub fn catalog() -> Vec<PropagationModel> {
                vec![$($variant::default().into(),)*]
            }
        }

        $(
        impl From<$variant> for PropagationModel {
            fn from(value: $variant) -> Self {
                PropagationModel::$variant(value)
            }
        }
        )*
    };
}

propagation_model!(FreeSpace, Cost231Hata, ItuIndoor, AverageWallLoss);

/// Descriptive text for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

trait ImplPropagationModel {
    const INFO: ModelInfo;

    fn path_loss(&self, engine: &PropagationEngine, link: &Link) -> PathLoss;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeSpace;
impl ImplPropagationModel for FreeSpace {
    const INFO: ModelInfo = ModelInfo {
        kind: "free-space",
        name: "Free-Space",
        description: "Ideal line of sight propagation. PL = 20log10(d) + 20log10(f) + 32.45",
    };

    fn path_loss(&self, _engine: &PropagationEngine, link: &Link) -> PathLoss {
        free_space_path_loss(link.distance, link.frequency).into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityType {
    #[default]
    Large,
    MediumSmall,
}

/// Not used by the loss formula. Carried so scenes keep what they were authored with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Urban,
    Suburban,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost231Hata {
    pub city_type: CityType,
    pub terrain_type: TerrainType,
}
impl ImplPropagationModel for Cost231Hata {
    const INFO: ModelInfo = ModelInfo {
        kind: "cost-231-hata",
        name: "COST-231-Hata",
        description: "Empirical urban and suburban macro cell model for 1500-2000 MHz",
    };

    fn path_loss(&self, _engine: &PropagationEngine, link: &Link) -> PathLoss {
        cost231_hata_path_loss(
            link.distance,
            link.frequency,
            Length::from_metres(link.transmitter.height),
            Length::from_metres(link.receiver.height),
            self.city_type,
        )
        .into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItuIndoor {
    pub floors: u32,
    pub wall_loss: Db,
}
impl Default for ItuIndoor {
    fn default() -> Self {
        Self {
            floors: 1,
            wall_loss: Db::from_db(12.0),
        }
    }
}
impl ImplPropagationModel for ItuIndoor {
    const INFO: ModelInfo = ModelInfo {
        kind: "itu-indoor",
        name: "ITU Indoor",
        description: "Free space plus fixed wall loss and 15 dB per floor",
    };

    fn path_loss(&self, _engine: &PropagationEngine, link: &Link) -> PathLoss {
        itu_indoor_path_loss(link.distance, link.frequency, self.wall_loss, self.floors).into()
    }
}

/// Bounds and default of a user adjustable margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginConfig {
    pub min: Db,
    pub max: Db,
    pub default: Db,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageWallLoss {
    pub shadow_fading: Db,
}

impl AverageWallLoss {
    pub const SHADOW_FADING: MarginConfig = MarginConfig {
        min: Db::ZERO,
        max: Db::from_db(15.0),
        default: Db::ZERO,
    };
}

impl Default for AverageWallLoss {
    fn default() -> Self {
        Self {
            shadow_fading: Self::SHADOW_FADING.default,
        }
    }
}
impl ImplPropagationModel for AverageWallLoss {
    const INFO: ModelInfo = ModelInfo {
        kind: "average-wall-loss-model",
        name: "Average Wall Loss",
        description: "PL = free space + W_avg x N_walls + shadow fading, walls found along the direct path",
    };

    fn path_loss(&self, engine: &PropagationEngine, link: &Link) -> PathLoss {
        let penetration = engine.detect_walls(&link.transmitter, &link.receiver);
        let breakdown =
            average_wall_loss_path_loss(link.distance, link.frequency, &penetration, self.shadow_fading);

        PathLoss {
            loss: breakdown.total,
            awm: Some(AwmDetails {
                penetration,
                breakdown,
            }),
        }
    }
}

/// Model selection as authored in a scene. Parameters that do not apply to
/// the selected type are ignored, missing ones take the model defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationModelConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: ModelParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    /// 1 for a large city, anything else for medium and small cities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_type: Option<i64>,
    /// 1 for urban, anything else for suburban.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_fading: Option<f64>,
}

impl From<PropagationModelConfig> for PropagationModel {
    fn from(config: PropagationModelConfig) -> Self {
        let params = config.parameters;
        match config.kind.as_str() {
            kind if kind == FreeSpace::INFO.kind => FreeSpace.into(),
            kind if kind == Cost231Hata::INFO.kind => Cost231Hata {
                city_type: match params.city_type {
                    None | Some(1) => CityType::Large,
                    Some(_) => CityType::MediumSmall,
                },
                terrain_type: match params.terrain_type {
                    None | Some(1) => TerrainType::Urban,
                    Some(_) => TerrainType::Suburban,
                },
            }
            .into(),
            kind if kind == ItuIndoor::INFO.kind => {
                let defaults = ItuIndoor::default();
                ItuIndoor {
                    floors: params.floors.unwrap_or(defaults.floors),
                    wall_loss: params.wall_loss.map(Db::from_db).unwrap_or(defaults.wall_loss),
                }
                .into()
            }
            kind if kind == AverageWallLoss::INFO.kind => AverageWallLoss {
                shadow_fading: params
                    .shadow_fading
                    .map(Db::from_db)
                    .unwrap_or(AverageWallLoss::SHADOW_FADING.default),
            }
            .into(),
            unknown => {
                warn!(model = unknown, "unknown propagation model, using free space");
                FreeSpace.into()
            }
        }
    }
}

impl From<PropagationModel> for PropagationModelConfig {
    fn from(model: PropagationModel) -> Self {
        let parameters = match &model {
            PropagationModel::FreeSpace(_) => ModelParameters::default(),
            PropagationModel::Cost231Hata(inner) => ModelParameters {
                city_type: Some((inner.city_type == CityType::Large) as i64),
                terrain_type: Some((inner.terrain_type == TerrainType::Urban) as i64),
                ..Default::default()
            },
            PropagationModel::ItuIndoor(inner) => ModelParameters {
                floors: Some(inner.floors),
                wall_loss: Some(inner.wall_loss.db()),
                ..Default::default()
            },
            PropagationModel::AverageWallLoss(inner) => ModelParameters {
                shadow_fading: Some(inner.shadow_fading.db()),
                ..Default::default()
            },
        };

        PropagationModelConfig {
            kind: model.info().kind.to_string(),
            parameters,
        }
    }
}

impl Default for PropagationModel {
    fn default() -> Self {
        FreeSpace.into()
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_close, units::METRES};

    use super::*;

    fn mhz(f: f64) -> Frequency {
        Frequency::from_MHz(f)
    }

    #[test]
    fn free_space_reference_value() {
        // 20log10(1.111) + 20log10(1800) + 32.45
        let loss = free_space_path_loss(1111.0 * METRES, mhz(1800.0));
        assert_close(loss.db(), 98.469_731);
    }

    #[test]
    fn free_space_degenerate_inputs() {
        assert_eq!(free_space_path_loss(0.0 * METRES, mhz(1800.0)), Db::ZERO);
        assert_eq!(free_space_path_loss(-5.0 * METRES, mhz(1800.0)), Db::ZERO);
        assert_eq!(free_space_path_loss(100.0 * METRES, mhz(0.0)), Db::ZERO);
    }

    #[test]
    fn free_space_is_monotonic() {
        let distances = [1.0, 10.0, 55.5, 300.0, 1000.0, 25_000.0];
        let frequencies = [100.0, 700.0, 1800.0, 3500.0, 28_000.0];

        for f in frequencies {
            for pair in distances.windows(2) {
                assert!(
                    free_space_path_loss(pair[0] * METRES, mhz(f)) < free_space_path_loss(pair[1] * METRES, mhz(f))
                );
            }
        }
        for d in distances {
            for pair in frequencies.windows(2) {
                assert!(
                    free_space_path_loss(d * METRES, mhz(pair[0])) < free_space_path_loss(d * METRES, mhz(pair[1]))
                );
            }
        }
    }

    #[test]
    fn hata_never_below_free_space() {
        for d in [1.0, 5.0, 50.0, 500.0, 2000.0, 20_000.0] {
            for f in [1500.0, 1750.0, 2000.0] {
                for hb in [1.0, 15.0, 35.0, 200.0] {
                    for hm in [0.5, 1.5, 10.0] {
                        for city in [CityType::Large, CityType::MediumSmall] {
                            let hata = cost231_hata_path_loss(d * METRES, mhz(f), hb * METRES, hm * METRES, city);
                            assert!(hata >= free_space_path_loss(d * METRES, mhz(f)));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn hata_reference_value() {
        // 1 km, 1800 MHz, hb 35 m, hm 1.5 m, large city
        let loss = cost231_hata_path_loss(1000.0 * METRES, mhz(1800.0), 35.0 * METRES, 1.5 * METRES, CityType::Large);

        let ahm = 3.2 * (11.75f64 * 1.5).log10().powi(2) - 4.97;
        let expected = 46.3 + 33.9 * 1800f64.log10() - 13.82 * 35f64.log10() - ahm + 3.0;
        assert_close(loss.db(), expected);
    }

    #[test]
    fn hata_out_of_band_is_free_space() {
        let d = 800.0 * METRES;
        for f in [900.0, 2100.0, 3500.0] {
            assert_eq!(
                cost231_hata_path_loss(d, mhz(f), 35.0 * METRES, 1.5 * METRES, CityType::Large),
                free_space_path_loss(d, mhz(f))
            );
        }
        assert_eq!(
            cost231_hata_path_loss(0.5 * METRES, mhz(1800.0), 35.0 * METRES, 1.5 * METRES, CityType::Large),
            free_space_path_loss(0.5 * METRES, mhz(1800.0))
        );
        assert_eq!(
            cost231_hata_path_loss(d, mhz(1800.0), 0.0 * METRES, 1.5 * METRES, CityType::Large),
            free_space_path_loss(d, mhz(1800.0))
        );
    }

    #[test]
    fn itu_indoor_adds_walls_and_floors() {
        let d = 50.0 * METRES;
        let f = mhz(2400.0);
        let loss = itu_indoor_path_loss(d, f, Db::from_db(12.0), 3);
        assert_close(loss.db(), free_space_path_loss(d, f).db() + 12.0 + 45.0);
    }

    #[test]
    fn awm_without_walls_is_free_space_plus_fading() {
        let d = 420.0 * METRES;
        let f = mhz(3500.0);
        let walls = WallPenetrationResult::unobstructed(
            crate::geo::GeoPoint::new(0.0, 0.0, 0.0),
            crate::geo::GeoPoint::new(0.0, 0.0, 0.0),
        );

        let breakdown = average_wall_loss_path_loss(d, f, &walls, Db::from_db(6.0));
        assert_eq!(breakdown.total, free_space_path_loss(d, f) + Db::from_db(6.0));
        assert_eq!(breakdown.wall_loss, Db::ZERO);
    }

    #[test]
    fn config_resolution() {
        let json = r#"[
            {"type": "cost-231-hata", "parameters": {"cityType": 0}},
            {"type": "itu-indoor", "parameters": {"floors": 3}},
            {"type": "average-wall-loss-model", "parameters": {"shadowFading": 4.5}},
            {"type": "ray-tracing", "parameters": {"maxReflections": 3}}
        ]"#;

        let models: Vec<PropagationModel> = serde_json::from_str(json).unwrap();

        assert_eq!(
            models[0],
            Cost231Hata {
                city_type: CityType::MediumSmall,
                terrain_type: TerrainType::Urban
            }
            .into()
        );
        assert_eq!(
            models[1],
            ItuIndoor {
                floors: 3,
                wall_loss: Db::from_db(12.0)
            }
            .into()
        );
        assert_eq!(
            models[2],
            AverageWallLoss {
                shadow_fading: Db::from_db(4.5)
            }
            .into()
        );
        assert_eq!(models[3], FreeSpace.into());
    }

    #[test]
    fn shadow_fading_margin() {
        let margin = AverageWallLoss::SHADOW_FADING;
        assert_eq!((margin.min, margin.max), (Db::ZERO, Db::from_db(15.0)));
        assert!(margin.default >= margin.min && margin.default <= margin.max);
        assert_eq!(AverageWallLoss::default().shadow_fading, margin.default);

        let model: PropagationModel =
            serde_json::from_str(r#"{"type": "average-wall-loss-model"}"#).unwrap();
        assert_eq!(model, AverageWallLoss::default().into());
    }

    #[test]
    fn catalog_kinds() {
        let kinds: Vec<&str> = PropagationModel::catalog().iter().map(|m| m.info().kind).collect();
        assert_eq!(kinds, ["free-space", "cost-231-hata", "itu-indoor", "average-wall-loss-model"]);
    }
}

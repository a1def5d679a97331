use rmp_serde::{decode, encode};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};
use thiserror::Error;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    raytrace::RayTrajectory,
    scene::{Scene, SceneIdentity},
};

#[derive(Debug, Error)]
pub enum SceneFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    RMPWriteError(#[from] encode::Error),
    #[error(transparent)]
    RMPReadError(#[from] decode::Error),
    #[error("a custom scene identity cannot be turned back into a scene")]
    CustomIdentity,
}

/// Reads JSON, falling back to MessagePack when the file is not JSON.
pub fn load_file<T>(path: impl AsRef<Path>) -> Result<T, SceneFileError>
where
    T: DeserializeOwned,
{
    use serde_json::error::Category;

    let path = path.as_ref();
    let file = File::open(path)?;
    let buf_reader = BufReader::new(file);

    let json_result: Result<T, _> = serde_json::from_reader(buf_reader);

    json_result.or_else(|err| match err.classify() {
        Category::Io | Category::Eof => Err(err.into()),
        _ => {
            let file = File::open(path)?;
            let buf_reader = BufReader::new(file);
            let res: Result<T, _> = decode::from_read(buf_reader);
            res.map_err(|x| x.into())
        }
    })
}

/// Loads a scene, or regenerates one from a scene identity file.
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene, SceneFileError> {
    let path = path.as_ref();
    load_file::<Scene>(path).or_else(|err| match load_file::<SceneIdentity>(path) {
        Ok(identity) => identity.create().ok_or(SceneFileError::CustomIdentity),
        Err(_) => Err(err),
    })
}

pub fn write_file<T>(path: impl AsRef<Path>, object: &T, use_rmp: bool) -> Result<(), SceneFileError>
where
    T: Serialize,
{
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);

    if use_rmp {
        encode::write_named(&mut buf, object)?;
    } else {
        serde_json::to_writer_pretty(buf, object)?;
    }

    Ok(())
}

/// Contains enough information to recreate the sweep it describes,
/// unless a custom scene was used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepIdentity {
    pub scene_identity: SceneIdentity,
    pub oracle: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaSweep {
    pub station_id: String,
    pub antenna_id: String,
    pub trajectories: Vec<RayTrajectory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutput {
    // Data values
    pub sweeps: Vec<AntennaSweep>,

    // Regeneration
    pub complete_identity: SweepIdentity,
}

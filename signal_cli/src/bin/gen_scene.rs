use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use rand::Rng;
use signalcore::{
    propagation::models::AverageWallLoss,
    scene::{
        SceneIdentity,
        generation::SceneGenerator,
    },
    scene_file::{self, load_file},
    units::Db,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Scatter buildings at random instead of laying out a block grid
    #[arg(long)]
    scatter: bool,

    /// Give every antenna the average wall loss model
    #[arg(long)]
    awm: bool,

    /// Centre longitude
    #[arg(long, default_value_t = 116.39)]
    lon: f64,

    /// Centre latitude
    #[arg(long, default_value_t = 39.9)]
    lat: f64,

    /// Generate from an identity
    #[arg(long)]
    id: Option<PathBuf>,

    /// Generate as an identity
    #[arg(long)]
    asid: bool,

    /// Use JSON instead of rust messagepack
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed: u64 = args.seed.unwrap_or_else(|| rand::rng().random());
    let output_file = args.output.unwrap_or("scene.scn".into());
    let use_rmp = !args.json;

    let identity = match args.id {
        Some(path) => match load_file::<SceneIdentity>(&path) {
            Ok(identity) => identity,
            Err(e) => {
                eprintln!("<Error> Could not read identity {path:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let centre = (args.lon, args.lat);
            let mut generator = if args.scatter {
                SceneGenerator::random_scatter(centre)
            } else {
                SceneGenerator::urban_grid(centre)
            };

            if args.awm {
                let layout = match &mut generator {
                    SceneGenerator::UrbanGrid { stations, .. } => stations,
                    SceneGenerator::RandomScatter { stations, .. } => stations,
                };
                layout.model = AverageWallLoss {
                    shadow_fading: Db::from_db(6.0),
                }
                .into();
            }

            SceneIdentity::Generated { generator, seed }
        }
    };

    let result = if args.asid {
        scene_file::write_file(&output_file, &identity, use_rmp)
    } else {
        let Some(scene) = identity.create() else {
            eprintln!("<Error> A custom identity does not describe a scene");
            return ExitCode::FAILURE;
        };
        tracing::info!(
            stations = scene.stations.len(),
            buildings = scene.buildings.len(),
            seed,
            "generated scene"
        );
        scene_file::write_file(&output_file, &scene, use_rmp)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("<Error> Could not write {output_file:?}: {e}");
            ExitCode::FAILURE
        }
    }
}

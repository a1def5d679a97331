//! Samples the beam of every antenna in a scene and writes the trajectories out.

use std::{io, path::PathBuf, process::ExitCode, time::Instant};

use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use signalcore::{
    raytrace::{
        RaySampler, RayTrajectory,
        occlusion::{OcclusionOracle, OpenSky},
        sweep::SweepRegistry,
    },
    scene::Scene,
    scene_file::{self, AntennaSweep, SweepIdentity, SweepOutput, load_scene},
    verification::verify_trajectories,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Oracle {
    /// Nothing blocks any ray
    Open,
    /// Rays stop at building boxes and the ground plane
    Buildings,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scene or scene identity file
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// File name for output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only sample these antennas. Samples every antenna if not specified
    #[arg(long)]
    antenna: Option<Vec<String>>,

    #[arg(long, value_enum, default_value_t = Oracle::Buildings)]
    oracle: Oracle,

    /// Show timing information
    #[arg(long)]
    time: bool,

    #[arg(long)]
    verify: bool,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let scene_path = args.scene.unwrap_or("scene.scn".into());
    let output_path = args.output.unwrap_or("sweep_output.json".into());
    let use_rmp = !args.json;

    let scene = match load_scene(&scene_path) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("<Error> Could not read {scene_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(wanted) = &args.antenna {
        for id in wanted {
            if !scene.antennas().any(|(_, a)| &a.id == id) {
                warn!(antenna = %id, "antenna not found in scene");
            }
        }
    }

    let timer = args.time.then(Instant::now);
    let sweeps = match args.oracle {
        Oracle::Open => run_sweeps(&scene, RaySampler::new(OpenSky), args.antenna.as_deref()),
        Oracle::Buildings => run_sweeps(
            &scene,
            RaySampler::new(scene.occlusion()),
            args.antenna.as_deref(),
        ),
    };

    if let Some(timer) = timer {
        let final_time = timer.elapsed().as_secs_f32();
        let rays: usize = sweeps.iter().map(|s| s.trajectories.len()).sum();
        println!(
            "Traced {} antennas ({rays} rays) in {:.4}s ({} rays / s)",
            sweeps.len(),
            final_time,
            rays as f32 / final_time
        );
    }

    if args.verify {
        let all: Vec<RayTrajectory> = sweeps.iter().flat_map(|s| s.trajectories.clone()).collect();
        if !verify_trajectories(&all) {
            eprintln!("<Error> Trajectories failed verification");
            return ExitCode::FAILURE;
        }
    }

    let output = SweepOutput {
        sweeps,
        complete_identity: SweepIdentity {
            scene_identity: scene.identity.clone(),
            oracle: format!("{:?}", args.oracle),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    match scene_file::write_file(&output_path, &output, use_rmp) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("<Error> Could not write {output_path:?}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_sweeps<O: OcclusionOracle>(
    scene: &Scene,
    sampler: RaySampler<O>,
    only: Option<&[String]>,
) -> Vec<AntennaSweep> {
    let registry = SweepRegistry::new();
    let selected: Vec<_> = scene
        .antennas()
        .filter(|(_, antenna)| only.is_none_or(|ids| ids.contains(&antenna.id)))
        .collect();

    selected
        .into_par_iter()
        .filter_map(|(station, antenna)| {
            let key = format!("{}/{}", station.id, antenna.id);
            let token = registry.begin(&key);
            let config = scene.ray_tracing_for(antenna);
            let trajectories = sampler
                .sample_superseding(station, antenna, config, &token)
                .completed()?;
            registry.forget(&key);

            info!(
                antenna = %antenna.id,
                rays = trajectories.len(),
                blocked = trajectories.iter().filter(|t| t.blocked).count(),
                "sampled antenna"
            );

            Some(AntennaSweep {
                station_id: station.id.clone(),
                antenna_id: antenna.id.clone(),
                trajectories,
            })
        })
        .collect()
}

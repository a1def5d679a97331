//! Prints how many coverage cells of each antenna fall in each signal band.

use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use serde::Serialize;
use signalcore::{
    coverage::{CoverageMap, coverage_map},
    scene_file::{load_scene, write_file},
    signal::SignalBand,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scene or scene identity file
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Only map this antenna
    #[arg(long)]
    antenna: Option<String>,

    /// Write the full coverage maps to this file as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    station: &'a str,
    antenna: &'a str,
    band: &'static str,
    color: &'static str,
    cells: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let scene_path = args.scene.unwrap_or("scene.scn".into());

    let scene = match load_scene(&scene_path) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("<Error> Could not read {scene_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let engine = scene.engine();
    let maps: Vec<CoverageMap> = scene
        .antennas()
        .filter(|(_, antenna)| args.antenna.as_ref().is_none_or(|id| id == &antenna.id))
        .filter_map(|(station, antenna)| coverage_map(&engine, station, antenna))
        .collect();

    if maps.is_empty() {
        eprintln!("<Warning> No antenna has coverage visualisation enabled");
    }

    let mut writer = csv::Writer::from_writer(io::stdout());
    for map in &maps {
        let counts = map.band_counts();
        for band in SignalBand::VALUES {
            let row = Row {
                station: &map.station_id,
                antenna: &map.antenna_id,
                band: band.label(),
                color: band.color(),
                cells: counts.get(&band).copied().unwrap_or(0),
            };
            if let Err(e) = writer.serialize(row) {
                eprintln!("<Error> {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    if let Err(e) = writer.flush() {
        eprintln!("<Error> {e}");
        return ExitCode::FAILURE;
    }

    if let Some(path) = args.output {
        if let Err(e) = write_file(&path, &maps, false) {
            eprintln!("<Error> Could not write {path:?}: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

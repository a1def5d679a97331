use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use serde::Serialize;
use signalcore::{
    geo::GeoPoint,
    scene_file::load_scene,
    signal::{DEFAULT_TARGET_HEIGHT, SignalStrengthResult, best_signal},
    verification::verify_signals,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scene or scene identity file
    #[arg(short, long)]
    scene: Option<PathBuf>,

    #[arg(long)]
    lon: f64,

    #[arg(long)]
    lat: f64,

    /// Receiver height above ground in metres
    #[arg(long, default_value_t = DEFAULT_TARGET_HEIGHT)]
    height: f64,

    /// Check the results before printing them
    #[arg(long)]
    verify: bool,
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    station: &'a str,
    antenna: &'a str,
    rssi_dbm: f64,
    distance_m: f64,
    path_loss_db: f64,
    model: &'a str,
    walls: Option<u32>,
    band: &'static str,
}

impl<'a> From<&'a SignalStrengthResult> for Row<'a> {
    fn from(result: &'a SignalStrengthResult) -> Self {
        Self {
            station: &result.station_id,
            antenna: &result.antenna_id,
            rssi_dbm: result.rssi.dbm(),
            distance_m: result.distance.metres(),
            path_loss_db: result.path_loss.db(),
            model: &result.model,
            walls: result.awm.as_ref().map(|awm| awm.penetration.wall_count),
            band: result.band().label(),
        }
    }
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
    let target = GeoPoint::new(args.lon, args.lat, args.height);
    let results = best_signal(&engine, &scene.stations, &target);

    if args.verify && !verify_signals(&results, &scene.stations) {
        eprintln!("<Error> Results failed verification");
        return ExitCode::FAILURE;
    }

    let mut writer = csv::Writer::from_writer(io::stdout());
    for result in &results {
        if let Err(e) = writer.serialize(Row::from(result)) {
            eprintln!("<Error> {e}");
            return ExitCode::FAILURE;
        }
    }

    match writer.flush() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("<Error> {e}");
            ExitCode::FAILURE
        }
    }
}

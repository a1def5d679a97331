//! Radio coverage engine for 5G base station planning.
//!
//! Given stations, antennas and the buildings around them, computes received signal
//! strength at a point ([`propagation::PropagationEngine`]), ranks every antenna at
//! that point ([`signal::best_signal`]) and samples an antenna's beam for
//! visualisation ([`raytrace::RaySampler`]).
//!
//! ## Custom Occlusion Backends
//! The sampler asks an [`raytrace::occlusion::OcclusionOracle`] how far each ray travels
//! before hitting something. Implement it to plug in terrain or any other spatial index.

pub mod building;
pub mod coverage;
pub mod geo;
pub mod materials;
pub mod obstruction;
pub mod propagation;
pub mod raytrace;
pub mod scene;
pub mod scene_file;
pub mod signal;
pub mod station;
pub mod units;
pub mod verification;
mod utility;

pub use utility::round_hundredths;

use std::fmt::Debug;

/// Checks two values are within 0.001% of each other.
#[allow(unused)]
fn assert_close<T>(a: T, b: T)
where
    T: Into<f64> + Copy + Debug,
{
    let float_a: f64 = a.into();
    let float_b: f64 = b.into();

    if float_a == 0. || float_b == 0. {
        assert!(float_a == float_b, "{a:?} and {b:?} are not close.");
        return;
    }

    let percent_diff = (float_a - float_b).abs() / float_a.abs();

    assert!(percent_diff < 0.00001, "{a:?} and {b:?} are not close.");
}

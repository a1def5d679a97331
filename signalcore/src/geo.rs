//! Geodesy helpers.
//!
//! Two families of conversion live here. The spherical ones (haversine distance,
//! destination point, metres-per-degree scale factors) are what the signal
//! calculations use for distance. The ellipsoidal ones ([`to_ecef`], [`LocalFrame`])
//! give straight 3D rays for the obstruction geometry.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::units::Length;

/// Mean earth radius used by every spherical formula in the crate.
pub const EARTH_RADIUS: Length = Length::from_metres(6_371_000.0);

/// Metres covered by one degree of latitude.
pub const LAT_METRES_PER_DEGREE: f64 = 110_540.0;

/// Metres covered by one degree of longitude at the equator.
pub const EQUATOR_LON_METRES_PER_DEGREE: f64 = 111_320.0;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Metres covered by one degree of longitude at the given latitude.
pub fn lon_metres_per_degree(latitude: f64) -> f64 {
    EQUATOR_LON_METRES_PER_DEGREE * latitude.to_radians().cos()
}

/// A geographic position. Longitude and latitude in degrees, height in metres
/// above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite() && self.height.is_finite()
    }

    /// Moves the point by a local east/north offset using the flat
    /// metres-per-degree approximation.
    pub fn offset_by(self, east: Length, north: Length) -> Self {
        let (d_lon, d_lat) = metres_to_degrees(self.latitude, east, north);
        Self {
            longitude: self.longitude + d_lon,
            latitude: self.latitude + d_lat,
            ..self
        }
    }
}

/// Converts an east/north offset in metres to a (longitude, latitude) offset in degrees.
pub fn metres_to_degrees(latitude: f64, east: Length, north: Length) -> (f64, f64) {
    (
        east.metres() / lon_metres_per_degree(latitude),
        north.metres() / LAT_METRES_PER_DEGREE,
    )
}

/// Great-circle distance along the surface, ignoring heights.
pub fn horizontal_distance(a: &GeoPoint, b: &GeoPoint) -> Length {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Straight line distance combining the surface distance with the height difference.
pub fn distance_3d(a: &GeoPoint, b: &GeoPoint) -> Length {
    let horizontal = horizontal_distance(a, b).metres();
    let vertical = b.height - a.height;
    Length::from_metres((horizontal * horizontal + vertical * vertical).sqrt())
}

/// Initial bearing from `a` towards `b` in degrees, clockwise from north in `[0, 360)`.
pub fn initial_bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Point reached by travelling `distance` from `origin` along a direction given as
/// azimuth (clockwise from north) and elevation, both in degrees.
///
/// The horizontal component follows the sphere, the vertical component is added to the height.
pub fn destination(origin: &GeoPoint, distance: Length, azimuth: f64, elevation: f64) -> GeoPoint {
    let elevation = elevation.to_radians();
    let horizontal = distance.metres() * elevation.cos();
    let vertical = distance.metres() * elevation.sin();

    let angular = horizontal / EARTH_RADIUS.inner();
    let bearing = azimuth.to_radians();
    let lat = origin.latitude.to_radians();
    let lon = origin.longitude.to_radians();

    let dest_lat = (lat.sin() * angular.cos() + lat.cos() * angular.sin() * bearing.cos()).asin();
    let dest_lon = lon
        + (bearing.sin() * angular.sin() * lat.cos())
            .atan2(angular.cos() - lat.sin() * dest_lat.sin());

    GeoPoint {
        longitude: dest_lon.to_degrees(),
        latitude: dest_lat.to_degrees(),
        height: origin.height + vertical,
    }
}

/// Unit vector for a direction given as azimuth (clockwise from north) and
/// elevation in degrees, expressed as (east, north, up).
pub fn enu_direction(azimuth: f64, elevation: f64) -> Vector3<f64> {
    let (az, el) = (azimuth.to_radians(), elevation.to_radians());
    Vector3::new(az.sin() * el.cos(), az.cos() * el.cos(), el.sin())
}

/// WGS84 geodetic position to earth-centred earth-fixed coordinates in metres.
pub fn to_ecef(point: &GeoPoint) -> Vector3<f64> {
    let lat = point.latitude.to_radians();
    let lon = point.longitude.to_radians();
    let n = WGS84_A / (1.0 - WGS84_E2 * lat.sin().powi(2)).sqrt();

    Vector3::new(
        (n + point.height) * lat.cos() * lon.cos(),
        (n + point.height) * lat.cos() * lon.sin(),
        (n * (1.0 - WGS84_E2) + point.height) * lat.sin(),
    )
}

/// Inverse of [`to_ecef`].
pub fn from_ecef(ecef: &Vector3<f64>) -> GeoPoint {
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let lon = ecef.y.atan2(ecef.x);

    let mut lat = ecef.z.atan2(p * (1.0 - WGS84_E2));
    let mut height = 0.0;
    for _ in 0..8 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        height = p * lat.cos() + ecef.z * sin_lat - WGS84_A * (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        lat = ecef.z.atan2(p * (1.0 - WGS84_E2 * n / (n + height)));
    }

    GeoPoint {
        longitude: lon.to_degrees(),
        latitude: lat.to_degrees(),
        height,
    }
}

/// A local East-North-Up cartesian frame anchored at a geographic point.
#[derive(Debug, Clone)]
pub struct LocalFrame {
    anchor: GeoPoint,
    origin: Vector3<f64>,
    // Rows are the east, north and up axes in ECEF.
    rotation: Matrix3<f64>,
}

impl LocalFrame {
    pub fn new(anchor: GeoPoint) -> Self {
        let lat = anchor.latitude.to_radians();
        let lon = anchor.longitude.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let rotation = Matrix3::new(
            -sin_lon,
            cos_lon,
            0.0,
            -sin_lat * cos_lon,
            -sin_lat * sin_lon,
            cos_lat,
            cos_lat * cos_lon,
            cos_lat * sin_lon,
            sin_lat,
        );

        Self {
            anchor,
            origin: to_ecef(&anchor),
            rotation,
        }
    }

    pub fn anchor(&self) -> &GeoPoint {
        &self.anchor
    }

    pub fn to_local(&self, point: &GeoPoint) -> Vector3<f64> {
        self.ecef_to_local(&to_ecef(point))
    }

    pub fn ecef_to_local(&self, ecef: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * (ecef - self.origin)
    }

    pub fn to_geo(&self, local: &Vector3<f64>) -> GeoPoint {
        from_ecef(&self.local_to_ecef(local))
    }

    pub fn local_to_ecef(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * local + self.origin
    }

    /// Rotates a local direction into ECEF without translating it.
    pub fn direction_to_ecef(&self, direction: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * direction
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_close;

    use super::*;

    #[test]
    fn haversine_hundredth_degree() {
        let a = GeoPoint::new(0.0, 0.0, 0.0);
        let b = GeoPoint::new(0.0, 0.01, 0.0);

        // R * 0.01 degrees in radians
        assert_close(horizontal_distance(&a, &b).metres(), 1111.950_797);
    }

    #[test]
    fn distance_3d_includes_height() {
        let a = GeoPoint::new(10.0, 45.0, 35.0);
        let b = GeoPoint::new(10.0, 45.0, 5.0);

        assert_close(distance_3d(&a, &b).metres(), 30.0);
    }

    #[test]
    fn bearings() {
        let origin = GeoPoint::new(0.0, 0.0, 0.0);
        assert_eq!(initial_bearing(&origin, &GeoPoint::new(0.0, 1.0, 0.0)), 0.0);
        assert_close(initial_bearing(&origin, &GeoPoint::new(1.0, 0.0, 0.0)), 90.0);
        assert_close(initial_bearing(&origin, &GeoPoint::new(0.0, -1.0, 0.0)), 180.0);
        assert_close(initial_bearing(&origin, &GeoPoint::new(-1.0, 0.0, 0.0)), 270.0);
    }

    #[test]
    fn destination_travels_requested_distance() {
        let origin = GeoPoint::new(116.39, 39.9, 30.0);
        let dest = destination(&origin, Length::from_metres(2000.0), 45.0, 0.0);

        assert_close(horizontal_distance(&origin, &dest).metres(), 2000.0);
        assert_close(initial_bearing(&origin, &dest), 45.0);
        assert_eq!(dest.height, 30.0);
    }

    #[test]
    fn destination_splits_elevation() {
        let origin = GeoPoint::new(0.0, 0.0, 0.0);
        let dest = destination(&origin, Length::from_metres(1000.0), 0.0, 30.0);

        assert_close(dest.height, 500.0);
        assert_close(horizontal_distance(&origin, &dest).metres(), 1000.0 * 30f64.to_radians().cos());
    }

    #[test]
    fn offsets_use_flat_scale_factors() {
        let origin = GeoPoint::new(0.0, 60.0, 0.0);
        let moved = origin.offset_by(Length::from_metres(55_660.0), Length::from_metres(110_540.0));

        assert_close(moved.latitude, 61.0);
        assert_close(moved.longitude, 1.0);
    }

    #[test]
    fn ecef_conversion_is_invertible() {
        let point = GeoPoint::new(-122.4194, 37.7749, 152.0);
        let back = from_ecef(&to_ecef(&point));

        assert!((back.longitude - point.longitude).abs() < 1e-9);
        assert!((back.latitude - point.latitude).abs() < 1e-9);
        assert!((back.height - point.height).abs() < 1e-4);
    }

    #[test]
    fn local_frame_axes() {
        let anchor = GeoPoint::new(2.35, 48.85, 0.0);
        let frame = LocalFrame::new(anchor);

        let up = frame.to_local(&anchor.with_height(100.0));
        assert!(up.x.abs() < 1e-6 && up.y.abs() < 1e-6);
        assert_close(up.z, 100.0);

        let east = frame.to_local(&anchor.offset_by(Length::from_metres(100.0), Length::from_metres(0.0)));
        assert!(east.x > 99.0 && east.x < 101.0);
        assert!(east.y.abs() < 0.1);

        let back = frame.to_geo(&east);
        assert!((back.longitude - anchor.longitude - 100.0 / lon_metres_per_degree(48.85)).abs() < 1e-9);
    }

    #[test]
    fn enu_direction_boresight() {
        let north = enu_direction(0.0, 0.0);
        assert_close(north.y, 1.0);

        let east_up = enu_direction(90.0, 90.0);
        assert_close(east_up.z, 1.0);
    }
}

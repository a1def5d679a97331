//! Wall penetration detection between two points.
//!
//! Each building is tested with up to three methods, first success wins:
//!
//! 1. The 12 triangles of the building box. Entry and exit are the nearest and
//!    furthest hits within the ray.
//! 2. A slab test against the axis aligned bounds of the box in the ray's local
//!    frame. Catches rays that start or end inside the building.
//! 3. A coarse planar projection: if the latitude, longitude and height ranges
//!    of the ray and the building all overlap, entry and exit are placed at fixed
//!    fractions of the ray. This is a known approximation with no accuracy bound.

pub mod geometry;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    building::{Building, Footprint, GeometryError},
    geo::{GeoPoint, LocalFrame},
    units::{Db, Length},
};

use geometry::{BoxMesh, Ray};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Assumed spacing of interior partitions when a ray runs further through a
    /// building than its narrowest side.
    pub interior_wall_spacing: Length,
    /// Fraction of the ray where a planar fallback hit enters the building.
    pub planar_entry: f64,
    /// Fraction of the ray where a planar fallback hit leaves the building.
    pub planar_exit: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            interior_wall_spacing: Length::from_metres(8.0),
            planar_entry: 0.3,
            planar_exit: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionMethod {
    Triangles,
    Slab,
    Planar,
}

/// Where a ray passes through one building, in the ray's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub entry: Vector3<f64>,
    pub exit: Vector3<f64>,
    pub penetration: Length,
    pub method: IntersectionMethod,
}

#[derive(Debug, Clone)]
pub struct BuildingIntersection<'a> {
    pub building: &'a Building,
    pub intersection: Intersection,
    /// Distance from the ray start to the entry point.
    pub entry_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenetratedBuilding {
    pub building_id: String,
    pub penetration_points: u32,
    /// Loss of a single wall of this building's material.
    pub wall_loss: Db,
    pub method: IntersectionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallPenetrationResult {
    pub wall_count: u32,
    pub average_wall_loss: Db,
    pub total_wall_loss: Db,
    pub penetrated_buildings: Vec<PenetratedBuilding>,
    /// Start, then entry and exit of each penetrated building in order, then end.
    pub ray_path: Vec<GeoPoint>,
}

impl WallPenetrationResult {
    pub fn unobstructed(start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            wall_count: 0,
            average_wall_loss: Db::ZERO,
            total_wall_loss: Db::ZERO,
            penetrated_buildings: Vec::new(),
            ray_path: vec![start, end],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WallPenetrationDetector {
    pub settings: DetectorSettings,
}

impl WallPenetrationDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    pub fn detect(&self, start: &GeoPoint, end: &GeoPoint, buildings: &[Building]) -> WallPenetrationResult {
        let frame = LocalFrame::new(*start);
        let Some(ray) = Ray::between(Vector3::zeros(), frame.to_local(end)) else {
            trace!("zero length ray, nothing to penetrate");
            return WallPenetrationResult::unobstructed(*start, *end);
        };

        let intersections = self.find_intersections(&frame, &ray, start, end, buildings);
        self.summarise(&intersections, &frame, start, end)
    }

    /// Every building the ray passes through, nearest entry first.
    /// Buildings whose geometry cannot be built are logged and skipped.
    pub fn find_intersections<'a>(
        &self,
        frame: &LocalFrame,
        ray: &Ray,
        start: &GeoPoint,
        end: &GeoPoint,
        buildings: &'a [Building],
    ) -> Vec<BuildingIntersection<'a>> {
        let mut found: Vec<BuildingIntersection> = buildings
            .iter()
            .filter_map(|building| {
                match self.intersect(frame, ray, start, end, building) {
                    Ok(hit) => hit.map(|intersection| BuildingIntersection {
                        building,
                        entry_distance: (intersection.entry - ray.origin).norm(),
                        intersection,
                    }),
                    Err(err) => {
                        warn!(%err, "skipping building with unusable geometry");
                        None
                    }
                }
            })
            .collect();

        found.sort_by(|a, b| a.entry_distance.total_cmp(&b.entry_distance));
        found
    }

    fn intersect(
        &self,
        frame: &LocalFrame,
        ray: &Ray,
        start: &GeoPoint,
        end: &GeoPoint,
        building: &Building,
    ) -> Result<Option<Intersection>, GeometryError> {
        let footprint = building.footprint()?;
        let mesh = BoxMesh::in_frame(&footprint, frame);

        let hit = triangle_intersection(ray, &mesh)
            .or_else(|| slab_intersection(ray, &mesh))
            .or_else(|| self.planar_intersection(ray, start, end, building, &footprint));

        trace!(building = %building.id, method = ?hit.as_ref().map(|h| h.method), "building tested");
        Ok(hit)
    }

    fn planar_intersection(
        &self,
        ray: &Ray,
        start: &GeoPoint,
        end: &GeoPoint,
        building: &Building,
        footprint: &Footprint,
    ) -> Option<Intersection> {
        let overlaps = |a0: f64, a1: f64, b_min: f64, b_max: f64| a0.max(a1) >= b_min && a0.min(a1) <= b_max;

        let lat = overlaps(start.latitude, end.latitude, footprint.min_lat, footprint.max_lat);
        let lon = overlaps(start.longitude, end.longitude, footprint.min_lon, footprint.max_lon);
        let height = overlaps(start.height, end.height, 0.0, footprint.height);

        if !(lat && lon && height) {
            return None;
        }

        let penetration = Length::from_metres(ray.length / 3.0).min(building.min_footprint_side());

        Some(Intersection {
            entry: ray.at(ray.length * self.settings.planar_entry),
            exit: ray.at(ray.length * self.settings.planar_exit),
            penetration,
            method: IntersectionMethod::Planar,
        })
    }

    /// Walls crossed inside one building: the entry and exit walls, plus interior
    /// partitions when the path is longer than the building's narrowest side.
    pub fn wall_count(&self, penetration: Length, building: &Building) -> u32 {
        if penetration <= building.min_footprint_side() {
            return 2;
        }

        2 + (penetration / self.settings.interior_wall_spacing).floor() as u32
    }

    fn summarise(
        &self,
        intersections: &[BuildingIntersection],
        frame: &LocalFrame,
        start: &GeoPoint,
        end: &GeoPoint,
    ) -> WallPenetrationResult {
        let mut result = WallPenetrationResult::unobstructed(*start, *end);
        result.ray_path.pop();

        for hit in intersections {
            let Some(material) = hit.building.material_type.properties() else {
                debug!(building = %hit.building.id, "no material, ignoring");
                continue;
            };

            let walls = self.wall_count(hit.intersection.penetration, hit.building);
            let building_loss = material.wall_loss * walls as f64;

            debug!(
                building = %hit.building.id,
                penetration = %hit.intersection.penetration,
                walls,
                loss = %building_loss,
                "building penetrated"
            );

            result.wall_count += walls;
            result.total_wall_loss = result.total_wall_loss + building_loss;
            result.penetrated_buildings.push(PenetratedBuilding {
                building_id: hit.building.id.clone(),
                penetration_points: walls,
                wall_loss: material.wall_loss,
                method: hit.intersection.method,
            });
            result.ray_path.push(frame.to_geo(&hit.intersection.entry));
            result.ray_path.push(frame.to_geo(&hit.intersection.exit));
        }

        result.ray_path.push(*end);

        if result.wall_count > 0 {
            result.average_wall_loss = result.total_wall_loss / result.wall_count as f64;
        }

        result
    }
}

fn triangle_intersection(ray: &Ray, mesh: &BoxMesh) -> Option<Intersection> {
    let (near, far) = mesh
        .hit_distances(ray)
        .fold(None, |acc: Option<(f64, f64)>, t| match acc {
            None => Some((t, t)),
            Some((near, far)) => Some((near.min(t), far.max(t))),
        })?;

    Some(Intersection {
        entry: ray.at(near),
        exit: ray.at(far),
        penetration: Length::from_metres(far - near),
        method: IntersectionMethod::Triangles,
    })
}

fn slab_intersection(ray: &Ray, mesh: &BoxMesh) -> Option<Intersection> {
    let (start, stop) = mesh.bounds().slab(ray, ray.length)?;

    Some(Intersection {
        entry: ray.at(start),
        exit: ray.at(stop),
        penetration: Length::from_metres(stop - start),
        method: IntersectionMethod::Slab,
    })
}

#[cfg(test)]
mod tests {
    use crate::{assert_close, materials::MaterialType, units::METRES};

    use super::*;

    const LAT_DEG_PER_METRE: f64 = 1.0 / crate::geo::LAT_METRES_PER_DEGREE;

    fn lon_deg(metres: f64) -> f64 {
        metres / crate::geo::lon_metres_per_degree(0.0)
    }

    #[test]
    fn no_buildings_no_loss() {
        let detector = WallPenetrationDetector::default();
        let start = GeoPoint::new(0.0, 0.0, 35.0);
        let end = GeoPoint::new(0.0, 0.01, 1.5);

        let result = detector.detect(&start, &end, &[]);

        assert_eq!(result.wall_count, 0);
        assert_eq!(result.total_wall_loss, Db::ZERO);
        assert_eq!(result.average_wall_loss, Db::ZERO);
        assert_eq!(result.ray_path, vec![start, end]);
    }

    #[test]
    fn straddling_concrete_building_costs_two_walls() {
        // 30 m wide (east-west), 60 m long, ray runs east-west through its middle.
        let building = Building::block("c", 0.0, 0.0, 30.0, 60.0, 40.0);
        let start = GeoPoint::new(lon_deg(-100.0), 0.0, 10.0);
        let end = GeoPoint::new(lon_deg(100.0), 0.0, 10.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[building]);

        assert_eq!(result.wall_count, 2);
        assert_eq!(result.total_wall_loss, Db::from_db(30.0));
        assert_eq!(result.average_wall_loss, Db::from_db(15.0));
        assert_eq!(result.penetrated_buildings[0].method, IntersectionMethod::Triangles);
        assert_eq!(result.ray_path.len(), 4);
    }

    #[test]
    fn rotation_does_not_change_detection() {
        let building = Building::block("c", 0.0, 0.0, 30.0, 60.0, 40.0);
        let rotated = building.clone().with_rotation(45.0);
        let start = GeoPoint::new(lon_deg(-100.0), 0.0, 10.0);
        let end = GeoPoint::new(lon_deg(100.0), 0.0, 10.0);
        let detector = WallPenetrationDetector::default();

        assert_eq!(
            detector.detect(&start, &end, &[building]),
            detector.detect(&start, &end, &[rotated])
        );
    }

    #[test]
    fn long_path_adds_interior_walls() {
        // Ray runs 200 m along the length of a 20 m wide building.
        let building = Building::block("long", 0.0, 0.0, 20.0, 200.0, 40.0);
        let start = GeoPoint::new(0.0, -150.0 * LAT_DEG_PER_METRE, 10.0);
        let end = GeoPoint::new(0.0, 150.0 * LAT_DEG_PER_METRE, 10.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[building]);

        // 2 + floor(~200 / 8)
        assert_eq!(result.wall_count, 27);
        assert_eq!(result.total_wall_loss, Db::from_db(15.0 * 27.0));
    }

    #[test]
    fn ray_inside_building_uses_slab() {
        let building = Building::block("hall", 0.0, 0.0, 100.0, 100.0, 50.0);
        let start = GeoPoint::new(0.0, 0.0, 10.0);
        let end = GeoPoint::new(lon_deg(30.0), 0.0, 10.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[building]);

        assert_eq!(result.penetrated_buildings.len(), 1);
        assert_eq!(result.penetrated_buildings[0].method, IntersectionMethod::Slab);
        assert_eq!(result.wall_count, 2);
    }

    #[test]
    fn overlapping_extents_fall_back_to_planar() {
        // The ray's bounding rectangle covers the building but the line passes north-west of it.
        let building = Building::block("corner", 0.0, 0.0, 20.0, 20.0, 20.0);
        let start = GeoPoint::new(-0.001, 0.0, 10.0);
        let end = GeoPoint::new(0.0, 0.001, 10.0);

        let detector = WallPenetrationDetector::default();
        let result = detector.detect(&start, &end, &[building]);

        assert_eq!(result.penetrated_buildings.len(), 1);
        assert_eq!(result.penetrated_buildings[0].method, IntersectionMethod::Planar);
        assert_eq!(result.wall_count, 2);
    }

    #[test]
    fn ray_above_building_misses() {
        let building = Building::block("low", 0.0, 0.0, 30.0, 30.0, 15.0);
        let start = GeoPoint::new(lon_deg(-100.0), 0.0, 40.0);
        let end = GeoPoint::new(lon_deg(100.0), 0.0, 40.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[building]);
        assert_eq!(result.wall_count, 0);
    }

    #[test]
    fn results_are_ordered_by_entry() {
        let far = Building::block("far", lon_deg(60.0), 0.0, 20.0, 20.0, 30.0)
            .with_material(MaterialType::Glass);
        let near = Building::block("near", lon_deg(-60.0), 0.0, 20.0, 20.0, 30.0);
        let start = GeoPoint::new(lon_deg(-100.0), 0.0, 10.0);
        let end = GeoPoint::new(lon_deg(100.0), 0.0, 10.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[far, near]);

        let order: Vec<&str> = result
            .penetrated_buildings
            .iter()
            .map(|b| b.building_id.as_str())
            .collect();
        assert_eq!(order, ["near", "far"]);
        assert_eq!(result.wall_count, 4);
        assert_eq!(result.total_wall_loss, Db::from_db(46.0));
        assert_close(result.average_wall_loss.db(), 11.5);
    }

    #[test]
    fn unknown_material_and_broken_geometry_are_skipped() {
        let mut unknown = Building::block("u", 0.0, 0.0, 30.0, 30.0, 40.0);
        unknown.material_type = MaterialType::Unknown;
        let mut broken = Building::block("b", 0.0, 0.0, 30.0, 30.0, 40.0);
        broken.width = f64::NAN * METRES;

        let start = GeoPoint::new(lon_deg(-100.0), 0.0, 10.0);
        let end = GeoPoint::new(lon_deg(100.0), 0.0, 10.0);

        let result = WallPenetrationDetector::default().detect(&start, &end, &[unknown, broken]);

        assert_eq!(result.wall_count, 0);
        assert_eq!(result.ray_path.len(), 2);
    }

    #[test]
    fn wall_count_boundaries() {
        let detector = WallPenetrationDetector::default();
        let building = Building::block("w", 0.0, 0.0, 20.0, 40.0, 10.0);

        assert_eq!(detector.wall_count(20.0 * METRES, &building), 2);
        assert_eq!(detector.wall_count(20.5 * METRES, &building), 4);
        assert_eq!(detector.wall_count(39.0 * METRES, &building), 6);
    }
}

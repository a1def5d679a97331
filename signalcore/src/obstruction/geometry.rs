//! Ray primitives shared by the obstruction detector and the building occlusion scene.

use nalgebra::Vector3;

use crate::{
    building::Footprint,
    geo::{LocalFrame, to_ecef},
};

/// Directions closer to zero than this along an axis are treated as parallel to it.
const PARALLEL_EPSILON: f64 = 1e-10;

/// Triangles of a box as vertex indices into [`Footprint::vertices`] order.
/// Two per face: south, east, north, west, bottom, top.
pub const BOX_FACES: [[usize; 3]; 12] = [
    [0, 1, 5],
    [0, 5, 4],
    [1, 2, 6],
    [1, 6, 5],
    [2, 3, 7],
    [2, 7, 6],
    [3, 0, 4],
    [3, 4, 7],
    [0, 3, 2],
    [0, 2, 1],
    [4, 5, 6],
    [4, 6, 7],
];

/// A finite ray. `direction` is unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub length: f64,
}

impl Ray {
    /// Returns `None` when the two points coincide.
    pub fn between(start: Vector3<f64>, end: Vector3<f64>) -> Option<Self> {
        let delta = end - start;
        let length = delta.norm();
        (length > 0.0 && length.is_finite()).then(|| Ray {
            origin: start,
            direction: delta / length,
            length,
        })
    }

    pub fn at(&self, distance: f64) -> Vector3<f64> {
        self.origin + self.direction * distance
    }
}

/// Möller–Trumbore ray/triangle intersection without back-face culling.
///
/// Returns the distance along the ray, only for hits in front of the origin.
pub fn ray_triangle(
    ray: &Ray,
    v0: &Vector3<f64>,
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let p = ray.direction.cross(&edge2);
    let det = edge1.dot(&p);

    if det.abs() < f64::EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - v0;
    let u = tvec.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = tvec.cross(&edge1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&q) * inv_det;
    (t >= 0.0).then_some(t)
}

/// The eight corners of a building box in some cartesian frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxMesh {
    pub vertices: [Vector3<f64>; 8],
}

impl BoxMesh {
    pub fn in_frame(footprint: &Footprint, frame: &LocalFrame) -> Self {
        BoxMesh {
            vertices: footprint.vertices().map(|v| frame.to_local(&v)),
        }
    }

    pub fn in_ecef(footprint: &Footprint) -> Self {
        BoxMesh {
            vertices: footprint.vertices().map(|v| to_ecef(&v)),
        }
    }

    pub fn triangles(&self) -> impl Iterator<Item = [&Vector3<f64>; 3]> + '_ {
        BOX_FACES.iter().map(|[a, b, c]| {
            [&self.vertices[*a], &self.vertices[*b], &self.vertices[*c]]
        })
    }

    /// Distances along the ray of every triangle hit no further than the ray length.
    pub fn hit_distances<'a>(&'a self, ray: &'a Ray) -> impl Iterator<Item = f64> + 'a {
        self.triangles()
            .filter_map(|[v0, v1, v2]| ray_triangle(ray, v0, v1, v2))
            .filter(|t| *t <= ray.length)
    }

    /// Nearest hit along an unbounded ray.
    pub fn nearest_hit(&self, ray: &Ray) -> Option<f64> {
        self.triangles()
            .filter_map(|[v0, v1, v2]| ray_triangle(ray, v0, v1, v2))
            .min_by(f64::total_cmp)
    }

    pub fn bounds(&self) -> Aabb {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for vertex in &self.vertices[1..] {
            min = min.inf(vertex);
            max = max.sup(vertex);
        }
        Aabb { min, max }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Aabb {
    /// Slab test clamped to `[0, max_distance]`. Returns the entry and exit distances.
    pub fn slab(&self, ray: &Ray, max_distance: f64) -> Option<(f64, f64)> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_distance;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (low, high) = (self.min[axis], self.max[axis]);

            if direction.abs() < PARALLEL_EPSILON {
                if origin < low || origin > high {
                    return None;
                }
                continue;
            }

            let t1 = (low - origin) / direction;
            let t2 = (high - origin) / direction;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));

            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 || t_min > max_distance {
            return None;
        }

        let start = t_min.max(0.0);
        let stop = t_max.min(max_distance);
        (start < stop).then_some((start, stop))
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_close;

    use super::*;

    fn unit_cube() -> BoxMesh {
        let v = |x, y, z| Vector3::new(x, y, z);
        BoxMesh {
            vertices: [
                v(0.0, 0.0, 0.0),
                v(1.0, 0.0, 0.0),
                v(1.0, 1.0, 0.0),
                v(0.0, 1.0, 0.0),
                v(0.0, 0.0, 1.0),
                v(1.0, 0.0, 1.0),
                v(1.0, 1.0, 1.0),
                v(0.0, 1.0, 1.0),
            ],
        }
    }

    #[test]
    fn triangle_hit_from_either_side() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 0.0, 0.0);
        let c = Vector3::new(0.0, 2.0, 0.0);

        let down = Ray::between(Vector3::new(0.5, 0.5, 3.0), Vector3::new(0.5, 0.5, -3.0)).unwrap();
        let up = Ray::between(Vector3::new(0.5, 0.5, -3.0), Vector3::new(0.5, 0.5, 3.0)).unwrap();

        assert_close(ray_triangle(&down, &a, &b, &c).unwrap(), 3.0);
        assert_close(ray_triangle(&up, &a, &b, &c).unwrap(), 3.0);
    }

    #[test]
    fn triangle_behind_origin_is_ignored() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 0.0, 0.0);
        let c = Vector3::new(0.0, 2.0, 0.0);
        let away = Ray::between(Vector3::new(0.5, 0.5, 1.0), Vector3::new(0.5, 0.5, 2.0)).unwrap();

        assert_eq!(ray_triangle(&away, &a, &b, &c), None);
    }

    #[test]
    fn cube_entry_and_exit() {
        let cube = unit_cube();
        let ray = Ray::between(Vector3::new(-1.0, 0.3, 0.6), Vector3::new(3.0, 0.3, 0.6)).unwrap();

        let hits: Vec<f64> = cube.hit_distances(&ray).collect();
        let entry = hits.iter().copied().fold(f64::INFINITY, f64::min);
        let exit = hits.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        assert_close(entry, 1.0);
        assert_close(exit, 2.0);
        assert_close(cube.nearest_hit(&ray).unwrap(), 1.0);
    }

    #[test]
    fn short_ray_stops_before_cube() {
        let cube = unit_cube();
        let ray = Ray::between(Vector3::new(-1.0, 0.5, 0.5), Vector3::new(-0.5, 0.5, 0.5)).unwrap();

        assert_eq!(cube.hit_distances(&ray).count(), 0);
        assert_eq!(cube.bounds().slab(&ray, ray.length), None);
    }

    #[test]
    fn slab_clamps_to_ray() {
        let bounds = unit_cube().bounds();
        let inside = Ray::between(Vector3::new(0.5, 0.5, 0.5), Vector3::new(0.5, 0.5, 0.7)).unwrap();

        let (start, stop) = bounds.slab(&inside, inside.length).unwrap();
        assert_eq!(start, 0.0);
        assert_close(stop, 0.2);
    }

    #[test]
    fn slab_parallel_outside() {
        let bounds = unit_cube().bounds();
        let ray = Ray::between(Vector3::new(-1.0, 2.0, 0.5), Vector3::new(3.0, 2.0, 0.5)).unwrap();

        assert_eq!(bounds.slab(&ray, ray.length), None);
    }

    #[test]
    fn degenerate_ray() {
        let p = Vector3::new(1.0, 1.0, 1.0);
        assert!(Ray::between(p, p).is_none());
    }
}

use super::{heading_vector, rot90, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used for orientation and degeneracy tests.
const EPSILON: f64 = 1e-9;

/// The number of sides used to approximate a disc as a polygon.
const DISC_SEGMENTS: usize = 16;

/// A simple polygon in the plane, stored as an open ring of vertices.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    points: Vec<Point2d>,
}

/// A disc in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Disc {
    pub centre: Point2d,
    pub radius: f64,
}

impl Polygon {
    /// Creates a polygon from its vertices. A closing vertex equal to the first is dropped.
    pub fn new(mut points: Vec<Point2d>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self { points }
    }

    /// Creates a rectangle centred on `centre`, whose length runs along the heading `yaw` (degrees).
    pub fn rectangle(centre: Point2d, yaw: f64, length: f64, width: f64) -> Self {
        let long = 0.5 * length * heading_vector(yaw);
        let lat = 0.5 * width * rot90(heading_vector(yaw));
        Self {
            points: vec![
                centre - long - lat,
                centre + long - lat,
                centre + long + lat,
                centre - long + lat,
            ],
        }
    }

    /// The vertices of the polygon.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// Whether the polygon encloses no area.
    pub fn is_empty(&self) -> bool {
        self.points.len() < 3 || self.area() < EPSILON
    }

    /// Iterates over the edges of the polygon.
    pub fn edges(&self) -> impl Iterator<Item = (Point2d, Point2d)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// The signed area, positive when the vertices wind anti-clockwise.
    pub fn signed_area(&self) -> f64 {
        0.5 * self.edges().map(|(a, b)| a.x * b.y - b.x * a.y).sum::<f64>()
    }

    /// The area of the polygon.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// The area-weighted centroid. Degenerate polygons fall back to the mean of their vertices.
    pub fn centroid(&self) -> Point2d {
        let area = self.signed_area();
        if area.abs() < EPSILON {
            return self.vertex_mean();
        }
        let (cx, cy) = self.edges().fold((0.0, 0.0), |(cx, cy), (a, b)| {
            let cross = a.x * b.y - b.x * a.y;
            (cx + (a.x + b.x) * cross, cy + (a.y + b.y) * cross)
        });
        Point2d::new(cx / (6.0 * area), cy / (6.0 * area))
    }

    fn vertex_mean(&self) -> Point2d {
        if self.points.is_empty() {
            return Point2d::origin();
        }
        let sum = self
            .points
            .iter()
            .fold(Vector2d::zero(), |acc, p| acc + p.to_vec());
        Point2d::from_vec(sum / self.points.len() as f64)
    }

    /// The axis aligned bounds of the polygon, as x and y intervals.
    pub fn bounds(&self) -> [Interval<f64>; 2] {
        let mut bounds = [
            Interval::new(f64::INFINITY, f64::NEG_INFINITY),
            Interval::new(f64::INFINITY, f64::NEG_INFINITY),
        ];
        for p in &self.points {
            bounds[0] = Interval::new(bounds[0].min.min(p.x), bounds[0].max.max(p.x));
            bounds[1] = Interval::new(bounds[1].min.min(p.y), bounds[1].max.max(p.y));
        }
        bounds
    }

    /// Whether the point lies inside or on the boundary of the polygon.
    pub fn contains(&self, point: Point2d) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        if self
            .edges()
            .any(|(a, b)| point_segment_distance(point, a, b) < EPSILON)
        {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if point.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Whether the two polygons share at least one point.
    pub fn intersects(&self, other: &Polygon) -> bool {
        if self.points.is_empty() || other.points.is_empty() {
            return false;
        }
        let [ax, ay] = self.bounds();
        let [bx, by] = other.bounds();
        if ax.clearance_with(&bx) > EPSILON || ay.clearance_with(&by) > EPSILON {
            return false;
        }
        self.edges()
            .any(|(a, b)| other.edges().any(|(c, d)| segments_intersect(a, b, c, d)))
            || other.contains(self.points[0])
            || self.contains(other.points[0])
    }

    /// The distance from the polygon to a point; zero if the point is inside.
    pub fn distance_to_point(&self, point: Point2d) -> f64 {
        if self.points.is_empty() {
            return f64::INFINITY;
        }
        if self.contains(point) {
            return 0.0;
        }
        self.edges()
            .map(|(a, b)| point_segment_distance(point, a, b))
            .fold(f64::INFINITY, f64::min)
    }

    /// The distance between two polygons; zero if they intersect.
    pub fn distance(&self, other: &Polygon) -> f64 {
        if self.points.is_empty() || other.points.is_empty() {
            return f64::INFINITY;
        }
        if self.intersects(other) {
            return 0.0;
        }
        let one_way = |from: &Polygon, to: &Polygon| {
            from.points
                .iter()
                .flat_map(|p| to.edges().map(move |(a, b)| point_segment_distance(*p, a, b)))
                .fold(f64::INFINITY, f64::min)
        };
        f64::min(one_way(self, other), one_way(other, self))
    }

    /// Returns a copy rotated anti-clockwise by `angle` degrees about `pivot`.
    pub fn rotated(&self, angle: f64, pivot: Point2d) -> Polygon {
        let (sin, cos) = angle.to_radians().sin_cos();
        let points = self
            .points
            .iter()
            .map(|p| {
                let v = p - pivot;
                pivot + Vector2d::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
            })
            .collect();
        Polygon { points }
    }

    /// Returns a copy translated by `offset`.
    pub fn translated(&self, offset: Vector2d) -> Polygon {
        Polygon {
            points: self.points.iter().map(|p| p + offset).collect(),
        }
    }

    /// Clips this polygon against a convex polygon, returning the overlapping region.
    ///
    /// `convex` must be convex; `self` may be any simple polygon.
    pub fn clip(&self, convex: &Polygon) -> Polygon {
        if convex.points.len() < 3 {
            return Polygon::default();
        }
        let mut clip_points = convex.points.clone();
        if convex.signed_area() < 0.0 {
            clip_points.reverse();
        }
        let clip_ring = Polygon {
            points: clip_points,
        };

        let mut output = self.points.clone();
        for (a, b) in clip_ring.edges() {
            if output.is_empty() {
                break;
            }
            let edge = b - a;
            let inside = |p: Point2d| edge.perp_dot(p - a) >= -EPSILON;
            let input = std::mem::take(&mut output);
            for i in 0..input.len() {
                let current = input[i];
                let prev = input[(i + input.len() - 1) % input.len()];
                match (inside(prev), inside(current)) {
                    (true, true) => output.push(current),
                    (true, false) => output.extend(line_intersection(prev, current, a, b)),
                    (false, true) => {
                        output.extend(line_intersection(prev, current, a, b));
                        output.push(current);
                    }
                    (false, false) => {}
                }
            }
        }
        Polygon { points: output }
    }

    /// The area of the region shared with a convex polygon.
    pub fn overlap_area(&self, convex: &Polygon) -> f64 {
        self.clip(convex).area()
    }

    /// The parameters `t >= 0` at which the ray `origin + t * dir` crosses the polygon boundary, ascending.
    pub fn ray_crossings(&self, origin: Point2d, dir: Vector2d) -> Vec<f64> {
        let mut ts = self
            .edges()
            .filter_map(|(a, b)| {
                let edge = b - a;
                let denom = dir.perp_dot(edge);
                if denom.abs() < EPSILON {
                    return None;
                }
                let offset = a - origin;
                let t = offset.perp_dot(edge) / denom;
                let u = offset.perp_dot(dir) / denom;
                (t >= 0.0 && (-EPSILON..=1.0 + EPSILON).contains(&u)).then_some(t)
            })
            .collect::<Vec<_>>();
        ts.sort_by(f64::total_cmp);
        ts
    }

    /// The point at which the segment from `from` to `to` first crosses the polygon boundary.
    pub fn first_crossing(&self, from: Point2d, to: Point2d) -> Option<Point2d> {
        let dir = to - from;
        self.ray_crossings(from, dir)
            .into_iter()
            .find(|t| *t <= 1.0)
            .map(|t| from + t * dir)
    }
}

impl Disc {
    /// Creates a new disc.
    pub const fn new(centre: Point2d, radius: f64) -> Self {
        Self { centre, radius }
    }

    /// Approximates the disc by a regular polygon.
    pub fn polygon(&self) -> Polygon {
        let points = (0..DISC_SEGMENTS)
            .map(|i| {
                let angle = 360.0 * i as f64 / DISC_SEGMENTS as f64;
                self.centre + self.radius * heading_vector(angle)
            })
            .collect();
        Polygon { points }
    }

    /// Whether the disc shares at least one point with the polygon.
    pub fn intersects(&self, polygon: &Polygon) -> bool {
        polygon.distance_to_point(self.centre) <= self.radius
    }
}

/// The distance from `p` to the segment `a`-`b`.
pub fn point_segment_distance(p: Point2d, a: Point2d, b: Point2d) -> f64 {
    let ab = b - a;
    let len2 = ab.magnitude2();
    if len2 < EPSILON * EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + t * ab)
}

/// Whether the closed segments `a`-`b` and `c`-`d` share a point.
fn segments_intersect(a: Point2d, b: Point2d, c: Point2d, d: Point2d) -> bool {
    let orient = |p: Point2d, q: Point2d, r: Point2d| {
        let o = (q - p).perp_dot(r - p);
        if o.abs() < EPSILON {
            0
        } else {
            o.signum() as i8
        }
    };
    let on_segment = |p: Point2d, q: Point2d, r: Point2d| {
        r.x >= p.x.min(q.x) - EPSILON
            && r.x <= p.x.max(q.x) + EPSILON
            && r.y >= p.y.min(q.y) - EPSILON
            && r.y <= p.y.max(q.y) + EPSILON
    };
    let (o1, o2, o3, o4) = (orient(a, b, c), orient(a, b, d), orient(c, d, a), orient(c, d, b));
    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(a, b, c))
        || (o2 == 0 && on_segment(a, b, d))
        || (o3 == 0 && on_segment(c, d, a))
        || (o4 == 0 && on_segment(c, d, b))
}

/// The intersection of the segment `p`-`q` with the infinite line through `a` and `b`.
fn line_intersection(p: Point2d, q: Point2d, a: Point2d, b: Point2d) -> Option<Point2d> {
    let pq = q - p;
    let ab = b - a;
    let denom = pq.perp_dot(ab);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = (a - p).perp_dot(ab) / denom;
    Some(p + t * pq)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn square(x: f64, y: f64, size: f64) -> Polygon {
        Polygon::new(vec![
            Point2d::new(x, y),
            Point2d::new(x + size, y),
            Point2d::new(x + size, y + size),
            Point2d::new(x, y + size),
        ])
    }

    #[test]
    fn area_and_centroid() {
        let sq = square(1.0, 2.0, 2.0);
        assert_approx_eq!(sq.area(), 4.0);
        assert_approx_eq!(sq.centroid().x, 2.0);
        assert_approx_eq!(sq.centroid().y, 3.0);

        let rect = Polygon::rectangle(Point2d::new(5.0, 5.0), 90.0, 4.0, 2.0);
        assert_approx_eq!(rect.area(), 8.0);
        assert!(rect.contains(Point2d::new(5.0, 6.9)));
        assert!(!rect.contains(Point2d::new(6.5, 5.0)));
    }

    #[test]
    fn clipping_non_convex() {
        // An L-shaped subject clipped by a square covering its corner
        let l_shape = Polygon::new(vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(4.0, 0.0),
            Point2d::new(4.0, 1.0),
            Point2d::new(1.0, 1.0),
            Point2d::new(1.0, 4.0),
            Point2d::new(0.0, 4.0),
        ]);
        let window = square(-1.0, -1.0, 3.0);
        assert_approx_eq!(l_shape.overlap_area(&window), 3.0);
        assert_approx_eq!(l_shape.overlap_area(&square(10.0, 10.0, 1.0)), 0.0);
    }

    #[test]
    fn distances() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(3.0, 0.0, 1.0);
        assert_approx_eq!(a.distance(&b), 2.0);
        assert_eq!(a.distance(&square(0.5, 0.5, 1.0)), 0.0);
        assert!(a.intersects(&square(1.0, 0.0, 1.0)));
        assert_approx_eq!(a.distance_to_point(Point2d::new(0.5, 3.0)), 2.0);
    }

    #[test]
    fn rotation_and_rays() {
        let rect = Polygon::rectangle(Point2d::new(0.0, 0.0), 0.0, 4.0, 2.0);
        let rotated = rect.rotated(90.0, Point2d::new(0.0, 0.0));
        assert!(rotated.contains(Point2d::new(0.0, 1.9)));
        assert!(!rotated.contains(Point2d::new(1.9, 0.0)));

        let crossings = square(2.0, -1.0, 2.0).ray_crossings(Point2d::new(0.0, 0.0), Vector2d::unit_x());
        assert_eq!(crossings.len(), 2);
        assert_approx_eq!(crossings[0], 2.0);
        assert_approx_eq!(crossings[1], 4.0);
    }

    #[test]
    fn disc_probe() {
        let disc = Disc::new(Point2d::new(0.0, 0.0), 1.0);
        assert!(disc.intersects(&square(0.5, 0.0, 1.0)));
        assert!(!disc.intersects(&square(1.5, 0.0, 1.0)));
        assert_approx_eq!(disc.polygon().area(), std::f64::consts::PI, 0.2);
    }
}

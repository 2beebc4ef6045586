use super::polygon::point_segment_distance;
use super::{rot90, Point2d, Polygon, Vector2d};
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A piecewise linear curve parameterised by arc length.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polyline {
    points: Vec<Point2d>,
    /// The arc length at each point.
    lengths: Vec<f64>,
}

impl Polyline {
    /// Creates a polyline through the given points. Repeated points are dropped.
    pub fn new(points: &[Point2d]) -> Self {
        let mut deduped: Vec<Point2d> = Vec::with_capacity(points.len());
        for p in points {
            if deduped.last().map_or(true, |last| last.distance2(*p) > 1e-12) {
                deduped.push(*p);
            }
        }
        let mut lengths = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        for (i, p) in deduped.iter().enumerate() {
            if i > 0 {
                total += deduped[i - 1].distance(*p);
            }
            lengths.push(total);
        }
        Self {
            points: deduped,
            lengths,
        }
    }

    /// The points of the polyline.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// The length of the polyline.
    pub fn length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// The index of the segment containing arc length `s`.
    fn segment_at(&self, s: f64) -> usize {
        let n = self.points.len();
        if n < 2 {
            return 0;
        }
        self.lengths[1..n - 1]
            .iter()
            .position(|len| s < *len)
            .unwrap_or(n - 2)
    }

    /// The unit tangent of segment `idx`.
    fn segment_tangent(&self, idx: usize) -> Vector2d {
        match (self.points.get(idx), self.points.get(idx + 1)) {
            (Some(a), Some(b)) => (b - a).normalize(),
            _ => Vector2d::unit_x(),
        }
    }

    /// Samples the polyline at arc length `s`, clamped to its extent.
    /// Returns the point and the unit tangent.
    pub fn sample(&self, s: f64) -> (Point2d, Vector2d) {
        if self.points.len() < 2 {
            let p = self.points.first().copied().unwrap_or_else(Point2d::origin);
            return (p, Vector2d::unit_x());
        }
        let s = s.clamp(0.0, self.length());
        let idx = self.segment_at(s);
        let tan = self.segment_tangent(idx);
        (self.points[idx] + (s - self.lengths[idx]) * tan, tan)
    }

    /// Finds the arc length of the point on the polyline nearest to `point`.
    pub fn project(&self, point: Point2d) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let mut best = (f64::INFINITY, 0.0);
        for idx in 0..self.points.len() - 1 {
            let (a, b) = (self.points[idx], self.points[idx + 1]);
            let dist = point_segment_distance(point, a, b);
            if dist < best.0 {
                let tan = self.segment_tangent(idx);
                let along = (point - a).dot(tan).clamp(0.0, a.distance(b));
                best = (dist, self.lengths[idx] + along);
            }
        }
        best.1
    }

    /// The unit normal used to offset the polyline at vertex `idx`.
    fn vertex_normal(&self, idx: usize) -> Vector2d {
        let last = self.points.len() - 2;
        let tan = match idx {
            0 => self.segment_tangent(0),
            i if i > last => self.segment_tangent(last),
            i => (self.segment_tangent(i - 1) + self.segment_tangent(i)).normalize(),
        };
        rot90(tan)
    }

    /// Builds the polygon covering the part of the curve between arc lengths `from` and `to`,
    /// extending `width / 2` to either side.
    pub fn strip(&self, from: f64, to: f64, width: f64) -> Polygon {
        if self.points.len() < 2 {
            return Polygon::default();
        }
        let (from, to) = (
            from.clamp(0.0, self.length()),
            to.clamp(0.0, self.length()),
        );
        let (from, to) = (from.min(to), from.max(to));

        let mut samples = vec![(self.sample(from).0, rot90(self.sample(from).1))];
        for idx in 1..self.points.len() - 1 {
            let s = self.lengths[idx];
            if s > from && s < to {
                samples.push((self.points[idx], self.vertex_normal(idx)));
            }
        }
        let end = self.sample(to);
        // Sampling at the very end yields the last segment's tangent
        samples.push((end.0, rot90(end.1)));

        let half = 0.5 * width;
        let left = samples.iter().map(|(p, n)| p + half * n);
        let right = samples.iter().rev().map(|(p, n)| p - half * n);
        Polygon::new(left.chain(right).collect())
    }
}

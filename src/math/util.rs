use super::{Point2d, Vector2d};

/// Rotates a vector 90 degrees anti-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // `rem_euclid` can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// The signed difference `a - b` between two headings, in `(-180, 180]` degrees.
pub fn heading_difference(a: f64, b: f64) -> f64 {
    let diff = wrap_degrees(a - b);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// A unit vector pointing along the given heading in degrees
/// (0° is the positive x-axis, angles increase anti-clockwise).
pub fn heading_vector(yaw: f64) -> Vector2d {
    let rad = yaw.to_radians();
    Vector2d::new(rad.cos(), rad.sin())
}

/// The bearing from `from` to `to` in degrees, in `[0, 360)`.
pub fn bearing(from: Point2d, to: Point2d) -> f64 {
    let v = to - from;
    wrap_degrees(v.y.atan2(v.x).to_degrees())
}

/// The unsigned angle between a heading and the bearing to `point`, in `[0, 180]` degrees.
pub fn angle_to_point(origin: Point2d, yaw: f64, point: Point2d) -> f64 {
    heading_difference(bearing(origin, point), yaw).abs()
}

/// Whether `point` lies strictly to the right of the directed line through `origin` along `yaw`.
pub fn is_right_of(origin: Point2d, yaw: f64, point: Point2d) -> bool {
    heading_vector(yaw).perp_dot(point - origin) < 0.0
}

/// Whether `point` lies within a field of view of `fov` degrees centred on
/// the heading `yaw` as seen from `origin`. A field of view of 180° is the half-plane ahead.
pub fn in_front_of(point: Point2d, origin: Point2d, yaw: f64, fov: f64) -> bool {
    if point == origin {
        return false;
    }
    angle_to_point(origin, yaw, point) < 0.5 * fov
}

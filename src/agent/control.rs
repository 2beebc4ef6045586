//! Control laws turning a target into commands, and the kinematic integrator.

use crate::capability::Capabilities;
use crate::math::{
    angle_to_point, heading_vector, is_right_of, wrap_degrees, Point2d, Polygon,
};
use crate::scene::Agent;
use cgmath::prelude::*;
use log::trace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this speed in m/s an agent is considered stationary.
pub const RELEVANT_LOWEST_SPEED: f64 = 0.01;

/// Substituted for a zero or unknown distance to the target, in m.
const MIN_TARGET_DISTANCE: f64 = 0.001;

/// Below this speed in m/s the yaw rate is scaled down linearly.
const LOW_TURNING_SPEED: f64 = 0.85;

/// Headings closer than this to the target bearing, in degrees, are not corrected.
const MIN_TURN_ANGLE: f64 = 0.5;

/// The steering pivot lies this fraction of the body length behind its centre.
const PIVOT_OFFSET: f64 = 0.4;

/// How far ahead the default target lies, in m.
pub(crate) const DEFAULT_LOOKAHEAD: f64 = 10.0;

/// The tuning of an agent's steering.
///
/// The required angular rate is mapped onto a fraction of the maximum yaw rate by a logistic
/// curve `max(floor, 1 / (1 + exp(-steepness * (rate - midpoint))))`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SteeringProfile {
    pub steepness: f64,
    /// The required angular rate in degrees/s at which half the maximum yaw rate is used.
    pub midpoint: f64,
    /// The smallest fraction of the maximum yaw rate used for any turn.
    pub floor: f64,
    /// Turns are not initiated towards targets further away than this, in m.
    pub max_turn_distance: f64,
    /// Whether to turn towards targets at any distance, except while turning into another lane.
    pub turn_immediately: bool,
}

/// Where an agent is heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub point: Point2d,
    /// The distance to the point, if already known.
    pub distance: Option<f64>,
}

impl SteeringProfile {
    /// The profile used by default.
    pub const fn generic() -> Self {
        Self {
            steepness: 0.1,
            midpoint: 30.0,
            floor: 0.1,
            max_turn_distance: 12.0,
            turn_immediately: false,
        }
    }

    /// Drivers at T-junctions, which turn earlier.
    pub const fn t_crossing_driver() -> Self {
        Self {
            midpoint: 23.0,
            max_turn_distance: 14.5,
            ..Self::generic()
        }
    }

    /// Drivers at crossroads, where lanes can be long and turning into them should start at once.
    pub const fn x_crossing_driver() -> Self {
        Self {
            midpoint: 20.0,
            max_turn_distance: 17.0,
            turn_immediately: true,
            ..Self::generic()
        }
    }

    pub const fn cyclist() -> Self {
        Self {
            steepness: 0.15,
            midpoint: 10.0,
            floor: 0.2,
            ..Self::generic()
        }
    }

    pub const fn pedestrian() -> Self {
        Self {
            max_turn_distance: 100.0,
            ..Self::generic()
        }
    }

    /// The fraction of the maximum yaw rate to use for a required angular rate in degrees/s.
    pub fn smoothing(&self, rate: f64) -> f64 {
        let logistic = 1.0 / (1.0 + (-self.steepness * (rate - self.midpoint)).exp());
        logistic.max(self.floor)
    }
}

impl Default for SteeringProfile {
    fn default() -> Self {
        Self::generic()
    }
}

impl Target {
    pub fn new(point: Point2d, distance: f64) -> Self {
        Self {
            point,
            distance: Some(distance),
        }
    }

    /// A target whose distance is derived from the body when needed.
    pub fn at(point: Point2d) -> Self {
        Self {
            point,
            distance: None,
        }
    }
}

/// The target used by agents without a model of their own: straight ahead along the current heading.
pub fn default_target(body: &Agent) -> Target {
    let centre = body.centroid();
    Target::new(centre + DEFAULT_LOOKAHEAD * heading_vector(body.yaw()), DEFAULT_LOOKAHEAD)
}

/// The distance from where the line of sight to `target` leaves the body, to `target`.
fn line_of_sight_distance(body: &Agent, target: Point2d) -> f64 {
    let centre = body.centroid();
    if !body.has_body() {
        return centre.distance(target);
    }
    body.footprint()
        .first_crossing(centre, target)
        .map_or(0.0, |exit| exit.distance(target))
}

/// Computes the acceleration needed to reach `target_speed` by the time the target is reached.
///
/// With no target speed, the agent brakes towards a stop at the target.
pub fn acceleration(
    speed: f64,
    caps: &Capabilities,
    body: &Agent,
    target: &Target,
    target_speed: Option<f64>,
) -> f64 {
    let distance = target
        .distance
        .unwrap_or_else(|| line_of_sight_distance(body, target.point));
    let distance = if distance > 0.0 && distance.is_finite() {
        distance
    } else {
        MIN_TARGET_DISTANCE
    };

    let mut acc = match target_speed {
        None => -speed * speed / distance,
        Some(target_speed) => {
            let dv = target_speed - speed;
            let acc = dv.signum() * dv * dv / distance;
            acc.clamp(caps.max_deceleration.min(0.0), caps.max_acceleration.max(0.0))
        }
    };
    if acc > 0.0 && speed >= caps.max_speed {
        acc = 0.0;
    }
    trace!("acceleration {acc:.3} to cover {distance:.3} m (speed {speed:.3}, target {target_speed:?})");
    acc
}

/// Computes the yaw rate needed to steer the body towards the target point.
///
/// Returns `None` while the agent is stationary, leaving its previous yaw rate in place.
/// `turning` is whether the agent is turning into another lane.
pub fn yaw_rate(
    speed: f64,
    yaw: f64,
    caps: &Capabilities,
    profile: &SteeringProfile,
    body: &Agent,
    target: Point2d,
    turning: bool,
) -> Option<f64> {
    if speed <= RELEVANT_LOWEST_SPEED {
        return None;
    }
    let centre = body.centroid();
    let alpha = angle_to_point(centre, yaw, target);
    if alpha <= MIN_TURN_ANGLE || alpha >= 180.0 - MIN_TURN_ANGLE {
        return Some(0.0);
    }
    let sign = if is_right_of(centre, yaw, target) {
        -1.0
    } else {
        1.0
    };
    let distance = match body.distance_to_point(target) {
        d if d > 0.0 => d,
        _ => MIN_TARGET_DISTANCE,
    };
    let ignore_distance = profile.turn_immediately && !turning;
    if !ignore_distance && distance > profile.max_turn_distance {
        trace!("target {distance:.2} m away is too far to start turning");
        return Some(0.0);
    }

    let time_to_target = distance / speed;
    let mut rate = sign * caps.max_yaw_rate * profile.smoothing(alpha / time_to_target);
    if speed < LOW_TURNING_SPEED {
        rate *= speed / LOW_TURNING_SPEED;
    }
    trace!("yaw rate {rate:.3} of {} towards {alpha:.1} deg", caps.max_yaw_rate);
    Some(rate)
}

/// The control inputs and previous state used to integrate an agent over one tick.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Kinematics {
    pub yaw: f64,
    pub speed: f64,
    pub acceleration: f64,
    pub yaw_rate: f64,
}

/// Integrates speed, then yaw, then position of `next` over `dt`, starting from `prev`.
///
/// `pivot_body` is the body whose centroid and length define the steering pivot.
pub(crate) fn integrate(
    next: &mut Agent,
    prev: Kinematics,
    prev_footprint: &Polygon,
    pivot_body: &Agent,
    dt: f64,
) {
    next.acceleration = prev.acceleration;
    next.yaw_rate = prev.yaw_rate;

    next.speed = (prev.speed + next.acceleration * dt).max(0.0);
    if next.speed < RELEVANT_LOWEST_SPEED {
        // An agent pulling away keeps its crawl so it can build speed next tick
        if next.acceleration <= 0.0 {
            next.speed = 0.0;
        }
        next.acceleration = 0.0;
        next.yaw_rate = 0.0;
    }

    next.yaw = if next.speed > RELEVANT_LOWEST_SPEED {
        wrap_degrees(prev.yaw + next.yaw_rate * dt)
    } else {
        wrap_degrees(prev.yaw)
    };

    if next.speed > RELEVANT_LOWEST_SPEED && !prev_footprint.points().is_empty() {
        let behind = -PIVOT_OFFSET * pivot_body.length() * heading_vector(prev.yaw);
        let pivot = pivot_body.centroid() + behind;
        let offset = next.speed * dt * heading_vector(next.yaw);
        next.footprint = prev_footprint
            .rotated(next.yaw - prev.yaw, pivot)
            .translated(offset);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::Model;
    use crate::capability::TypeTag;
    use crate::scene::{AgentAttributes, Scene};
    use crate::scenery::Scenery;
    use assert_approx_eq::assert_approx_eq;
    use std::rc::Rc;

    fn car_caps() -> Capabilities {
        Capabilities {
            max_speed: 14.0,
            max_acceleration: 3.0,
            max_deceleration: -8.0,
            max_yaw_rate: 40.0,
        }
    }

    fn car(speed: f64) -> (Scene, Agent) {
        let mut scene = Scene::new(Rc::new(Scenery::new()));
        let id = scene
            .add_agent(&AgentAttributes {
                name: "car",
                tags: &[TypeTag::PassengerCar],
                position: Some(Point2d::new(0.0, 0.0)),
                length: 4.0,
                width: 2.0,
                speed,
                model: Model::Vehicle,
                ..Default::default()
            })
            .unwrap();
        let agent = scene.agent(id).unwrap().clone();
        (scene, agent)
    }

    #[test]
    fn smoothing_curves() {
        let generic = SteeringProfile::generic();
        assert_approx_eq!(generic.smoothing(30.0), 0.5);
        assert_approx_eq!(generic.smoothing(-100.0), 0.1);
        let cyclist = SteeringProfile::cyclist();
        assert_approx_eq!(cyclist.smoothing(10.0), 0.5);
        assert_approx_eq!(cyclist.smoothing(-100.0), 0.2);
    }

    #[test]
    fn accelerate_towards_target_speed() {
        let (_, body) = car(2.0);
        let target = Target::new(Point2d::new(12.0, 0.0), 10.0);
        // (4 - 2)^2 / 10
        assert_approx_eq!(acceleration(2.0, &car_caps(), &body, &target, Some(4.0)), 0.4);
        // Clamped to the maximum acceleration
        assert_approx_eq!(acceleration(2.0, &car_caps(), &body, &target, Some(14.0)), 3.0);
        // Braking is clamped to the maximum deceleration
        let near = Target::new(Point2d::new(3.0, 0.0), 1.0);
        assert_approx_eq!(acceleration(10.0, &car_caps(), &body, &near, Some(0.0)), -8.0);
        // No target speed brakes without a bound
        assert_approx_eq!(acceleration(10.0, &car_caps(), &body, &near, None), -100.0);
        // No acceleration beyond the maximum speed
        assert_approx_eq!(acceleration(15.0, &car_caps(), &body, &target, Some(20.0)), 0.0);
    }

    #[test]
    fn line_of_sight_from_body_edge() {
        let (_, body) = car(2.0);
        let target = Target::at(Point2d::new(12.0, 0.0));
        // The body's front edge is at x = 2, leaving 10 m
        assert_approx_eq!(acceleration(2.0, &car_caps(), &body, &target, Some(4.0)), 0.4);
    }

    #[test]
    fn steering() {
        let (_, body) = car(5.0);
        let caps = car_caps();
        let profile = SteeringProfile::generic();
        assert_eq!(yaw_rate(0.0, 0.0, &caps, &profile, &body, Point2d::new(5.0, 5.0), false), None);
        assert_eq!(
            yaw_rate(5.0, 0.0, &caps, &profile, &body, Point2d::new(10.0, 0.0), false),
            Some(0.0)
        );
        let left = yaw_rate(5.0, 0.0, &caps, &profile, &body, Point2d::new(6.0, 4.0), false).unwrap();
        let right = yaw_rate(5.0, 0.0, &caps, &profile, &body, Point2d::new(6.0, -4.0), false).unwrap();
        assert!(left > 0.0 && left <= caps.max_yaw_rate);
        assert_approx_eq!(left, -right);
        // Too far away to start turning
        assert_eq!(
            yaw_rate(5.0, 0.0, &caps, &profile, &body, Point2d::new(30.0, 20.0), false),
            Some(0.0)
        );
        let eager = SteeringProfile::x_crossing_driver();
        assert!(yaw_rate(5.0, 0.0, &caps, &eager, &body, Point2d::new(30.0, 20.0), false).unwrap() > 0.0);
        assert_eq!(
            yaw_rate(5.0, 0.0, &caps, &eager, &body, Point2d::new(30.0, 20.0), true),
            Some(0.0)
        );
    }

    #[test]
    fn integration_moves_body() {
        let (_, prev) = car(10.0);
        let mut next = prev.clone();
        let kin = Kinematics {
            yaw: 0.0,
            speed: 10.0,
            acceleration: 1.0,
            yaw_rate: 0.0,
        };
        integrate(&mut next, kin, prev.footprint(), &prev, 0.5);
        assert_approx_eq!(next.speed(), 10.5);
        assert_approx_eq!(next.centroid().x, 5.25);
        assert_approx_eq!(next.yaw(), 0.0);
    }

    #[test]
    fn integration_rests() {
        let (_, prev) = car(0.5);
        let mut next = prev.clone();
        let kin = Kinematics {
            yaw: 359.0,
            speed: 0.5,
            acceleration: -8.0,
            yaw_rate: 10.0,
        };
        integrate(&mut next, kin, prev.footprint(), &prev, 0.1);
        assert_eq!(next.speed(), 0.0);
        assert_eq!(next.acceleration(), 0.0);
        assert_eq!(next.yaw_rate(), 0.0);
        assert_approx_eq!(next.yaw(), 359.0);
        assert_approx_eq!(next.centroid().x, 0.0);

        let mut turning = prev.clone();
        let kin = Kinematics {
            yaw: 359.0,
            speed: 5.0,
            acceleration: 0.0,
            yaw_rate: 20.0,
        };
        integrate(&mut turning, kin, prev.footprint(), &prev, 0.1);
        assert_approx_eq!(turning.yaw(), 1.0);
    }

    #[test]
    fn integration_pulls_away_from_rest() {
        let (_, prev) = car(0.0);
        let mut next = prev.clone();
        let kin = Kinematics {
            yaw: 0.0,
            speed: 0.0,
            acceleration: 0.1,
            yaw_rate: 5.0,
        };
        integrate(&mut next, kin, prev.footprint(), &prev, 0.05);
        assert_approx_eq!(next.speed(), 0.005);
        assert_eq!(next.acceleration(), 0.0);
        assert_eq!(next.yaw_rate(), 0.0);
        assert_approx_eq!(next.centroid().x, 0.0);
    }
}

//! Pedestrians: walkway following, road crossing and yielding.

use super::control::{default_target, SteeringProfile, Target};
use super::scratch::AgentView;
use super::Decision;
use crate::capability::{TypeTag, TypeTags};
use crate::conflict::ConflictCandidate;
use crate::debug::debug_crossing;
use crate::math::{heading_vector, Disc, Point2d, Vector2d};
use crate::random::RandomSource;
use crate::scenery::{Lane, LaneKind};
use crate::LaneId;
use cgmath::prelude::*;
use itertools::Itertools;
use log::{debug, trace};
use smallvec::smallvec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The bearing, relative to the heading, from which the search for a crossing target starts.
const CROSSING_BASE_ANGLE: f64 = 80.0;

/// The step and limit of the crossing target search, in degrees.
const CROSSING_SWEEP_STEP: usize = 10;
const CROSSING_SWEEP_LIMIT: usize = 90;

/// The tuning of a pedestrian.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PedestrianParams {
    /// How far ahead on the walkway the target lies, in m.
    pub walkway_waypoint: f64,
    /// Driveable lanes closer than this, in m, may be crossed.
    pub road_proximity: f64,
    /// The radius of the area on the far side of a road which ends a crossing, in m.
    pub crossing_target_radius: f64,
    /// The unit in which the end of a walkway is measured, in m.
    pub end_of_walkway_unit: f64,
    /// How many units from the end of a walkway the pedestrian stops.
    pub end_of_walkway_probe: f64,
    /// The standard deviation of the noise added to targets, in m.
    pub jitter: f64,
    /// Within this distance of a pedestrian crossing, in m, the end of a walkway is not a reason to stop.
    pub crossing_proximity: f64,
    /// Conflicts whose combined times to reach exceed this, in s, are ignored.
    pub yield_horizon: f64,
    /// The longest post-encroachment time still worth yielding for, in s.
    pub max_pet: f64,
    /// The probability per tick of deciding to cross the road.
    pub crossing_probability: f64,
    /// Walkways smaller than this, in m<sup>2</sup>, are not walked along.
    pub min_walkway_area: f64,
    /// Agents of these types are yielded for when arriving within the maximum PET either side.
    pub yield_for: TypeTags,
    /// Agents of these types are yielded for while they stand still.
    pub yield_for_stationary: TypeTags,
}

/// What a pedestrian is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WalkingMode {
    UnrestrictedWalking,
    WalkwayWalking,
    CrossingRoad,
    Stopping,
}

/// How a pedestrian chooses its speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PedestrianSpeedMode {
    Unrestricted,
    Stopping,
    Yielding,
}

/// A pedestrian's behaviour model and its state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PedestrianModel {
    params: PedestrianParams,
    steering: SteeringProfile,
    walking_mode: WalkingMode,
    speed_mode: PedestrianSpeedMode,
    /// The area on the far side of the road being crossed to.
    crossing_target: Option<Disc>,
    /// Where to stop at the end of the walkway.
    end_of_walkway: Option<Point2d>,
    /// The walkway most recently walked along.
    last_walkway: Option<LaneId>,
    /// The conflict point being yielded for in the current tick.
    yield_point: Option<Point2d>,
}

impl Default for PedestrianParams {
    fn default() -> Self {
        Self {
            walkway_waypoint: 4.0,
            road_proximity: 2.0,
            crossing_target_radius: 0.5,
            end_of_walkway_unit: 1.0,
            end_of_walkway_probe: 3.0,
            jitter: 0.1,
            crossing_proximity: 5.0,
            yield_horizon: 10.0,
            max_pet: 4.0,
            crossing_probability: 7e-3,
            min_walkway_area: 8.0,
            yield_for: smallvec![TypeTag::Pedestrian, TypeTag::Bicycle, TypeTag::Obstacle],
            yield_for_stationary: smallvec![TypeTag::Vehicle],
        }
    }
}

impl PedestrianModel {
    pub fn new(params: PedestrianParams) -> Self {
        Self {
            params,
            steering: SteeringProfile::pedestrian(),
            walking_mode: WalkingMode::UnrestrictedWalking,
            speed_mode: PedestrianSpeedMode::Unrestricted,
            crossing_target: None,
            end_of_walkway: None,
            last_walkway: None,
            yield_point: None,
        }
    }

    pub fn params(&self) -> &PedestrianParams {
        &self.params
    }

    pub fn walking_mode(&self) -> WalkingMode {
        self.walking_mode
    }

    pub fn speed_mode(&self) -> PedestrianSpeedMode {
        self.speed_mode
    }

    /// Gets the area being crossed to.
    pub fn crossing_target(&self) -> Option<&Disc> {
        self.crossing_target.as_ref()
    }

    /// Gets the point to stop at near the end of the walkway.
    pub fn end_of_walkway(&self) -> Option<Point2d> {
        self.end_of_walkway
    }

    /// Gets the walkway most recently walked along.
    pub fn last_walkway(&self) -> Option<LaneId> {
        self.last_walkway
    }

    /// Gets the conflict point yielded for in the last update.
    pub fn yield_point(&self) -> Option<Point2d> {
        self.yield_point
    }
}

impl Default for PedestrianModel {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// Decides the next state, target and target speed of a pedestrian.
pub(crate) fn plan(
    view: &AgentView,
    model: &PedestrianModel,
    rng: &mut dyn RandomSource,
) -> Decision<PedestrianModel> {
    let params = &model.params;
    let name = view.agent.name();
    let mut next = model.clone();
    next.speed_mode = PedestrianSpeedMode::Unrestricted;

    let crossing = match (model.walking_mode, model.crossing_target) {
        (WalkingMode::CrossingRoad, Some(target)) if !target.intersects(view.footprint()) => {
            Some(target)
        }
        (WalkingMode::CrossingRoad, None) => crossing_target(view, params),
        _ => None,
    };

    if let Some(target) = crossing {
        trace!("{name}: still crossing the road");
        next.walking_mode = WalkingMode::CrossingRoad;
        next.crossing_target = Some(target);
    } else if let Some(target) = start_crossing(view, model, rng) {
        debug!("{name}: deciding to cross the road");
        next.walking_mode = WalkingMode::CrossingRoad;
        next.crossing_target = Some(target);
    } else {
        next.crossing_target = None;
        match walkway(view) {
            Some(walkway)
                if !close_to_pedestrian_crossing(view, params)
                    && reached_end_of_walkway(view, params, walkway) =>
            {
                debug!("{name}: stopping at the end of {}", walkway.name());
                next.walking_mode = WalkingMode::Stopping;
                next.speed_mode = PedestrianSpeedMode::Stopping;
                if next.end_of_walkway.is_none() {
                    next.end_of_walkway = Some(end_of_walkway_target(view, params, walkway, rng));
                }
            }
            Some(walkway) if walkway.area() > params.min_walkway_area => {
                trace!("{name}: following {}", walkway.name());
                next.walking_mode = WalkingMode::WalkwayWalking;
                next.last_walkway = Some(walkway.id());
            }
            _ => {
                trace!("{name}: walking freely");
                next.walking_mode = WalkingMode::UnrestrictedWalking;
            }
        }
    }
    if next.walking_mode != WalkingMode::Stopping {
        next.end_of_walkway = None;
    }

    next.yield_point = yield_conflict(view, params).map(|conflict| conflict.point);
    if next.yield_point.is_some() {
        next.speed_mode = PedestrianSpeedMode::Yielding;
    }

    let target = target(view, &next, rng);
    let target_speed = match next.speed_mode {
        PedestrianSpeedMode::Stopping | PedestrianSpeedMode::Yielding => 0.0,
        PedestrianSpeedMode::Unrestricted => view.caps.max_speed,
    };

    Decision {
        target,
        target_speed: Some(target_speed),
        turning: false,
        turn_signal: None,
        steering: model.steering,
        state: next,
    }
}

/// Decides whether to start crossing the road, and if so where to.
fn start_crossing(
    view: &AgentView,
    model: &PedestrianModel,
    rng: &mut dyn RandomSource,
) -> Option<Disc> {
    let params = &model.params;
    let close_to_road = view
        .scenery()
        .lanes_of_kind(LaneKind::Driveable)
        .any(|lane| view.distance_to(lane.polygon()) < params.road_proximity);
    if !close_to_road || !rng.bernoulli(params.crossing_probability) {
        return None;
    }
    if matches!(
        model.walking_mode,
        WalkingMode::UnrestrictedWalking | WalkingMode::Stopping
    ) {
        return None;
    }
    crossing_target(view, params)
}

/// The first road touching the pedestrian.
fn road<'a>(view: &AgentView<'a>) -> Option<&'a crate::scenery::Road> {
    let scenery = view.scenery();
    view.road
        .get_or_init(|| scenery.road_intersecting(view.footprint()).map(|road| road.id()))
        .and_then(|id| scenery.road(id))
}

/// The first walkway touching the pedestrian.
fn walkway<'a>(view: &AgentView<'a>) -> Option<&'a Lane> {
    let scenery = view.scenery();
    view.walkway
        .get_or_init(|| {
            scenery
                .lanes_of_kind(LaneKind::Walkway)
                .find(|lane| lane.polygon().intersects(view.footprint()))
                .map(Lane::id)
        })
        .and_then(|id| scenery.lane(id))
}

/// The walkway of the current road furthest from the pedestrian.
fn far_walkway<'a>(view: &AgentView<'a>) -> Option<&'a Lane> {
    let scenery = view.scenery();
    road(view)?
        .lanes()
        .iter()
        .filter_map(|id| scenery.lane(*id))
        .filter(|lane| {
            lane.kind() == LaneKind::Walkway && !lane.polygon().intersects(view.footprint())
        })
        .map(|lane| (lane, view.distance_to(lane.polygon())))
        .fold(None, |best: Option<(&Lane, f64)>, (lane, distance)| match best {
            Some((_, best_distance)) if best_distance >= distance => best,
            _ => Some((lane, distance)),
        })
        .map(|(lane, _)| lane)
}

/// Finds a target on the far side of the road by sweeping rays either side of the heading.
fn crossing_target(view: &AgentView, params: &PedestrianParams) -> Option<Disc> {
    let walkway = far_walkway(view)?;
    let centre = view.centroid();
    let yaw = view.yaw();
    for offset in (0..CROSSING_SWEEP_LIMIT).step_by(CROSSING_SWEEP_STEP) {
        let offset = offset as f64;
        for bearing in [yaw + CROSSING_BASE_ANGLE + offset, yaw - CROSSING_BASE_ANGLE - offset] {
            let dir = heading_vector(bearing);
            let hits = walkway.polygon().ray_crossings(centre, dir);
            if let (Some(first), Some(last)) = (hits.first(), hits.last()) {
                let point = centre + 0.5 * (first + last) * dir;
                debug!("{}: crossing to {:?} on {}", view.agent.name(), point, walkway.name());
                let target = Disc::new(point, params.crossing_target_radius);
                debug_crossing(view.agent.name(), &target);
                return Some(target);
            }
        }
    }
    debug!("{}: crossing to the centre of {}", view.agent.name(), walkway.name());
    Some(Disc::new(walkway.centroid(), 0.0))
}

fn close_to_pedestrian_crossing(view: &AgentView, params: &PedestrianParams) -> bool {
    view.scenery()
        .lanes_of_kind(LaneKind::PedestrianCrossing)
        .any(|lane| view.distance_to(lane.polygon()) <= params.crossing_proximity)
}

fn reached_end_of_walkway(view: &AgentView, params: &PedestrianParams, walkway: &Lane) -> bool {
    let length = params.end_of_walkway_unit * params.end_of_walkway_probe;
    let end = walkway.end_region(view.centroid(), view.yaw(), length);
    view.footprint().intersects(&end)
}

/// A point near the end of the walkway where the pedestrian does not overlap anyone else,
/// moving back from the end until one is found.
fn end_of_walkway_target(
    view: &AgentView,
    params: &PedestrianParams,
    walkway: &Lane,
    rng: &mut dyn RandomSource,
) -> Point2d {
    let centre = view.centroid();
    let unit = params.end_of_walkway_unit.max(0.1);
    let mut length = unit;
    loop {
        let end = walkway.end_region(centre, view.yaw(), length).centroid();
        let target = jitter(end, params.jitter, rng);
        if is_free(view, target) || length >= walkway.length() {
            return target;
        }
        trace!("{}: {:?} is occupied, moving back", view.agent.name(), target);
        length += unit;
    }
}

/// Whether the body, moved to `point`, would not overlap any other agent.
fn is_free(view: &AgentView, point: Point2d) -> bool {
    let moved = view.footprint().translated(point - view.centroid());
    view.scene
        .iter_agents()
        .filter(|other| !view.is_self(other.id()) && other.has_body())
        .all(|other| !other.footprint().intersects(&moved))
}

/// The nearest conflict the pedestrian should yield for, if any.
fn yield_conflict(view: &AgentView, params: &PedestrianParams) -> Option<ConflictCandidate> {
    let types = view.scenery().types();
    view.conflicts(params.yield_horizon)
        .iter()
        .sorted_by(|a, b| {
            view.distance_to_point(a.point)
                .total_cmp(&view.distance_to_point(b.point))
        })
        .find(|conflict| {
            let Some(other) = view.scene.agent(conflict.other) else {
                return false;
            };
            let pet = conflict.pet();
            conflict.total_time() <= params.yield_horizon
                && ((!view.is_a(other, TypeTag::Pedestrian)
                    && (0.0..=params.max_pet).contains(&pet))
                    || (types.is_any(other.tags(), &params.yield_for_stationary)
                        && other.speed() == 0.0)
                    || (types.is_any(other.tags(), &params.yield_for)
                        && pet.abs() <= params.max_pet))
        })
        .copied()
}

/// The target for the walking mode, with the distance shortened when yielding.
fn target(view: &AgentView, state: &PedestrianModel, rng: &mut dyn RandomSource) -> Target {
    let params = &state.params;
    let mut target = match state.walking_mode {
        WalkingMode::UnrestrictedWalking => {
            let target = match closest_walkable_walkway(view, state) {
                Some(walkway) => Target::at(walking_back_target(view, walkway)),
                None => default_target(view.body),
            };
            Target {
                point: jitter(target.point, params.jitter, rng),
                ..target
            }
        }
        WalkingMode::WalkwayWalking => {
            let point = match walkway(view) {
                Some(walkway) => walkway.point_ahead(view.centroid(), view.yaw(), params.walkway_waypoint),
                None => default_target(view.body).point,
            };
            Target::at(jitter(point, params.jitter, rng))
        }
        WalkingMode::Stopping => Target::at(state.end_of_walkway.unwrap_or_else(|| view.centroid())),
        WalkingMode::CrossingRoad => Target::at(
            state
                .crossing_target
                .map_or_else(|| view.centroid(), |disc| disc.centre),
        ),
    };

    let mut distance = target
        .distance
        .unwrap_or_else(|| view.distance_to_point(target.point));
    if let (PedestrianSpeedMode::Yielding, Some(point)) = (state.speed_mode, state.yield_point) {
        distance = distance.min(view.distance_to_point(point));
    }
    target.distance = Some(distance);
    target
}

/// The nearest walkway large enough to walk along, other than the one last walked along.
fn closest_walkable_walkway<'a>(view: &AgentView<'a>, state: &PedestrianModel) -> Option<&'a Lane> {
    view.scenery()
        .lanes_of_kind(LaneKind::Walkway)
        .filter(|lane| Some(lane.id()) != state.last_walkway && lane.area() >= state.params.min_walkway_area)
        .map(|lane| (lane, view.distance_to(lane.polygon())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(lane, _)| lane)
}

/// The middle of the walkway edge between its two vertices nearest to the pedestrian.
fn walking_back_target(view: &AgentView, walkway: &Lane) -> Point2d {
    let nearest = walkway
        .polygon()
        .points()
        .iter()
        .sorted_by(|a, b| {
            view.distance_to_point(**a)
                .total_cmp(&view.distance_to_point(**b))
        })
        .take(2)
        .collect::<Vec<_>>();
    match nearest[..] {
        [a, b] => a.midpoint(*b),
        [a] => *a,
        _ => walkway.centroid(),
    }
}

/// Adds independent Gaussian noise to both coordinates of a point.
fn jitter(point: Point2d, std_dev: f64, rng: &mut dyn RandomSource) -> Point2d {
    let dx = rng.gaussian(std_dev);
    let dy = rng.gaussian(std_dev);
    point + Vector2d::new(dx, dy)
}

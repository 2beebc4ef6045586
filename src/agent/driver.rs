//! Lane navigation, car following and yielding for vehicle operators.

use super::control::{SteeringProfile, Target};
use super::scratch::AgentView;
use super::{Decision, TurnSignal};
use crate::conflict::ConflictCandidate;
use crate::debug::debug_yield;
use crate::error::{SimError, SimResult};
use crate::math::{heading_difference, heading_vector, in_front_of, Point2d};
use crate::random::RandomSource;
use crate::scene::Agent;
use crate::scenery::Lane;
use crate::{AgentId, LaneId};
use cgmath::prelude::*;
use itertools::Itertools;
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A turn is complete once this fraction of the body overlaps the next lane.
const TURN_COMPLETE_OVERLAP: f64 = 0.4;

/// Lanes up to this area in m<sup>2</sup> may be left at any time.
const SMALL_LANE_AREA: f64 = 6.0;

/// The length of the end of a lane with successors that counts as its end, in m.
const END_OF_LANE_LENGTH: f64 = 0.3;

/// Bodies up to this length in m look for the end of the lane from further back.
const SHORT_BODY_LENGTH: f64 = 1.5;

/// The fraction of a candidate's area which must lie on the lane for it to be followed.
const LEAD_LANE_OVERLAP: f64 = 0.5;

/// The largest heading difference to a lead vehicle, in degrees.
const LEAD_HEADING_TOLERANCE: f64 = 70.0;

/// The minimum search distance for a lead vehicle, in m.
const MIN_LEAD_DISTANCE: f64 = 2.0;

/// The gap left before a conflict point when yielding, in m.
const YIELD_GAP: f64 = 3.5;

/// The minimum gap to a lead vehicle, in m.
const MIN_HEADWAY: f64 = 0.5;

/// The speed reduction when following too closely.
const CLOSE_FOLLOWING_FACTOR: f64 = 0.75;

/// The tuning of a driver.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverParams {
    /// The desired speed in m/s.
    pub default_speed: f64,
    /// The speed limit near junctions in m/s.
    pub crossing_speed: f64,
    /// The desired speed while turning into another lane, in m/s.
    pub turning_speed: f64,
    /// Junctions closer than this, in m, limit the speed.
    pub junction_relevance: f64,
    /// How far ahead on the lane the target lies, in m.
    pub lane_waypoint: f64,
    /// How far ahead the target lies when off any lane, in m.
    pub roaming_waypoint: f64,
    /// The radius of the probe locating the target in the next lane, in m.
    pub turning_waypoint: f64,
    /// Conflicts whose combined times to reach exceed this, in s, are ignored.
    pub yield_horizon: f64,
    /// The longest post-encroachment time still worth yielding for, in s.
    pub max_pet: f64,
    /// Following closer than this time headway, in s, reduces the speed.
    pub max_thw: f64,
    /// How far ahead to look for a lead vehicle, in s at the current speed.
    pub lead_horizon: f64,
    /// The probability of not signalling when turning.
    pub no_signal_probability: f64,
}

/// What a driver is doing on the lane graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DrivingMode {
    LaneFollowing,
    Turning,
    DeadEnd,
    Roaming,
    /// The state before the first update.
    Undefined,
}

/// How a driver chooses its speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DriverSpeedMode {
    Unrestricted,
    Turning,
    Following,
    Yielding,
    Stopping,
    Undefined,
}

/// A driver's behaviour model and its state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverModel {
    params: DriverParams,
    steering: SteeringProfile,
    driving_mode: DrivingMode,
    speed_mode: DriverSpeedMode,
    /// The lane chosen to turn into.
    next_lane: Option<LaneId>,
    /// The conflict being yielded for, kept while the feed still predicts it.
    conflict: Option<ConflictCandidate>,
}

/// How a kind of driver finds its way along lanes.
pub(crate) trait LaneNavigator {
    /// Finds the lane the body is on.
    fn current_lane(&self, view: &AgentView) -> Option<LaneId> {
        largest_overlap(view, Lane::is_driveable)
    }

    /// Whether the body is about to leave `lane` at its end.
    fn approaches_end_of_lane(&self, view: &AgentView, lane: &Lane) -> bool {
        approaches_end_of_lane(view, lane)
    }

    /// Chooses the lane to turn into at the end of `lane`.
    fn next_lane(
        &self,
        view: &AgentView,
        model: &DriverModel,
        lane: &Lane,
        rng: &mut dyn RandomSource,
    ) -> Option<LaneId> {
        choose_successor(view, model, lane, rng)
    }

    /// The target while following `lane`.
    fn lane_target(&self, view: &AgentView, params: &DriverParams, lane: &Lane) -> Point2d {
        lane.point_ahead(view.centroid(), view.yaw(), params.lane_waypoint)
    }

    /// The target at the end of a lane with nowhere to go.
    fn dead_end_target(&self, view: &AgentView, lane: &Lane) -> Point2d {
        lane.end_edge_midpoint(view.centroid(), view.yaw())
    }

    /// An additional limit on the target speed.
    fn speed_cap(&self, _view: &AgentView) -> Option<f64> {
        None
    }
}

/// Navigation for motor vehicles, restricted to driveable lanes.
pub(crate) struct MotoristNavigator;

impl LaneNavigator for MotoristNavigator {}

impl DriverParams {
    /// The tuning of car drivers.
    pub const fn motorist() -> Self {
        Self {
            default_speed: 10.0,
            crossing_speed: 1.5,
            turning_speed: 1.25,
            junction_relevance: 15.0,
            lane_waypoint: 4.0,
            roaming_waypoint: 5.0,
            turning_waypoint: 0.1,
            yield_horizon: 15.0,
            max_pet: 6.0,
            max_thw: 2.0,
            lead_horizon: 10.0,
            no_signal_probability: 0.97,
        }
    }

    /// The tuning of cyclists.
    pub const fn cyclist() -> Self {
        Self {
            default_speed: 4.5,
            crossing_speed: 3.5,
            junction_relevance: 12.0,
            max_pet: 3.0,
            turning_waypoint: 0.4,
            lane_waypoint: 8.0,
            ..Self::motorist()
        }
    }
}

impl Default for DriverParams {
    fn default() -> Self {
        Self::motorist()
    }
}

impl DriverModel {
    /// Creates a driver model in its initial state.
    pub fn new(params: DriverParams, steering: SteeringProfile) -> Self {
        Self {
            params,
            steering,
            driving_mode: DrivingMode::Undefined,
            speed_mode: DriverSpeedMode::Undefined,
            next_lane: None,
            conflict: None,
        }
    }

    /// A car driver with the generic steering.
    pub fn motorist() -> Self {
        Self::new(DriverParams::motorist(), SteeringProfile::generic())
    }

    /// A car driver tuned for T-junctions.
    pub fn t_crossing() -> Self {
        Self::new(DriverParams::motorist(), SteeringProfile::t_crossing_driver())
    }

    /// A car driver tuned for crossroads.
    pub fn x_crossing() -> Self {
        Self::new(DriverParams::motorist(), SteeringProfile::x_crossing_driver())
    }

    pub fn params(&self) -> &DriverParams {
        &self.params
    }

    pub fn steering(&self) -> &SteeringProfile {
        &self.steering
    }

    pub fn driving_mode(&self) -> DrivingMode {
        self.driving_mode
    }

    pub fn speed_mode(&self) -> DriverSpeedMode {
        self.speed_mode
    }

    /// Gets the lane chosen to turn into.
    pub fn next_lane(&self) -> Option<LaneId> {
        self.next_lane
    }

    /// Gets the conflict being yielded for.
    pub fn conflict(&self) -> Option<&ConflictCandidate> {
        self.conflict.as_ref()
    }
}

impl Default for DriverModel {
    fn default() -> Self {
        Self::motorist()
    }
}

/// The lane with the largest overlap with the body among those accepted by `filter`.
/// Equal overlaps are resolved in favour of the smaller lane.
pub(crate) fn largest_overlap(view: &AgentView, filter: impl Fn(&Lane) -> bool) -> Option<LaneId> {
    let footprint = view.footprint();
    let mut best: Option<(&Lane, f64)> = None;
    for lane in view.scenery().iter_lanes().filter(|lane| filter(lane)) {
        let overlap = lane.overlap_with(footprint);
        if overlap <= 0.0 {
            continue;
        }
        best = match best {
            Some((best_lane, best_overlap)) if overlap < best_overlap - 1e-9 => {
                Some((best_lane, best_overlap))
            }
            Some((best_lane, best_overlap))
                if overlap <= best_overlap + 1e-9 && best_lane.area() <= lane.area() =>
            {
                Some((best_lane, best_overlap))
            }
            _ => Some((lane, overlap)),
        };
    }
    best.map(|(lane, _)| lane.id())
}

/// Whether the body touches the end region of `lane` while leaving it.
pub(crate) fn approaches_end_of_lane(view: &AgentView, lane: &Lane) -> bool {
    let footprint = view.footprint();
    let yaw = view.yaw();
    let body_length = view.body.length();
    let has_successors = !lane.successors().is_empty();

    // Look from the rear of the vehicle, and further back still for short ones
    let mut reference = view.centroid();
    if view.agent.drives().is_some() {
        let back = -heading_vector(yaw);
        reference = reference + (0.5 * body_length - 0.5 * END_OF_LANE_LENGTH).max(0.0) * back;
        if body_length <= SHORT_BODY_LENGTH {
            reference = reference + SHORT_BODY_LENGTH * back;
        }
    }

    let length = if !has_successors || body_length <= SHORT_BODY_LENGTH {
        f64::max(1.0, body_length * 0.75 * view.speed())
    } else {
        END_OF_LANE_LENGTH
    };
    let at_end = footprint.intersects(&lane.end_region(reference, yaw, length));

    let area = footprint.area();
    let leaving = if has_successors && lane.area() > SMALL_LANE_AREA && area > 0.0 {
        lane.overlap_with(footprint) / area < 0.5
    } else {
        true
    };
    at_end && leaving
}

/// Picks a successor of `lane` at random, unless one has been chosen already.
pub(crate) fn choose_successor(
    view: &AgentView,
    model: &DriverModel,
    lane: &Lane,
    rng: &mut dyn RandomSource,
) -> Option<LaneId> {
    if model.next_lane.is_some() {
        return model.next_lane;
    }
    let scenery = view.scenery();
    let successors = lane
        .successors()
        .iter()
        .filter_map(|id| scenery.lane(*id))
        .sorted_by(|a, b| a.name().cmp(b.name()))
        .collect::<Vec<_>>();
    if successors.is_empty() {
        return None;
    }
    Some(successors[rng.choose_index(successors.len())].id())
}

/// Decides the next state, target and target speed of a driver.
pub(crate) fn plan(
    view: &AgentView,
    model: &DriverModel,
    nav: &dyn LaneNavigator,
    rng: &mut dyn RandomSource,
) -> SimResult<Decision<DriverModel>> {
    let scenery = view.scenery();
    let params = &model.params;
    let cur_lane_id = *view.current_lane.get_or_init(|| nav.current_lane(view));
    let cur_lane = cur_lane_id.and_then(|id| scenery.lane(id));
    let mut next = model.clone();

    // Driving mode
    let mut entered_turn = false;
    match (model.driving_mode, model.next_lane.and_then(|id| scenery.lane(id))) {
        (DrivingMode::Turning, Some(next_lane)) => {
            let area = view.footprint().area();
            let overlap = next_lane.overlap_with(view.footprint());
            if area > 0.0 && overlap / area > TURN_COMPLETE_OVERLAP {
                debug!("{}: finished turning into {}", view.agent.name(), next_lane.name());
                next.next_lane = None;
                next.driving_mode = DrivingMode::LaneFollowing;
            } else {
                next.driving_mode = DrivingMode::Turning;
            }
        }
        _ => match cur_lane {
            None => {
                next.next_lane = None;
                next.driving_mode = DrivingMode::Roaming;
            }
            Some(lane)
                if matches!(
                    model.driving_mode,
                    DrivingMode::LaneFollowing | DrivingMode::DeadEnd
                ) =>
            {
                next.next_lane = None;
                if nav.approaches_end_of_lane(view, lane) {
                    match nav.next_lane(view, &next, lane, rng) {
                        Some(next_lane) => {
                            debug!("{}: turning from {} into {:?}", view.agent.name(), lane.name(), next_lane);
                            next.next_lane = Some(next_lane);
                            next.driving_mode = DrivingMode::Turning;
                            entered_turn = true;
                        }
                        None => {
                            debug!("{}: reached dead end of {}", view.agent.name(), lane.name());
                            next.driving_mode = DrivingMode::DeadEnd;
                        }
                    }
                } else {
                    next.driving_mode = DrivingMode::LaneFollowing;
                }
            }
            Some(_) => {
                next.next_lane = None;
                next.driving_mode = DrivingMode::LaneFollowing;
            }
        },
    }

    // Speed mode
    next.conflict = retained_conflict(view, model);
    if let Some(conflict) = &next.conflict {
        debug!(
            "{}: yielding to {:?} with PET {:.2} s in {:.2} s",
            view.agent.name(),
            conflict.other,
            conflict.pet(),
            conflict.time_self
        );
    }
    let lead = *view.lead.get_or_init(|| find_lead(view, params, cur_lane));
    let stopping = next.driving_mode == DrivingMode::DeadEnd || !view.on_infrastructure();
    next.speed_mode = if lead.is_some() {
        DriverSpeedMode::Following
    } else if next.conflict.is_some() {
        DriverSpeedMode::Yielding
    } else if stopping {
        DriverSpeedMode::Stopping
    } else if next.driving_mode == DrivingMode::Turning {
        DriverSpeedMode::Turning
    } else {
        DriverSpeedMode::Unrestricted
    };

    let target = target(view, nav, &next, cur_lane, lead)?;
    let target_speed = target_speed(view, nav, &next, lead)?;

    let turn_signal = if entered_turn {
        turn_signal(params, cur_lane, next.next_lane, rng)
    } else if next.driving_mode == DrivingMode::Turning {
        view.agent.turn_signal()
    } else {
        None
    };

    Ok(Decision {
        target,
        target_speed: Some(target_speed),
        turning: model.driving_mode == DrivingMode::Turning,
        turn_signal,
        steering: model.steering,
        state: next,
    })
}

/// Keeps the previous conflict while the feed still predicts one with the same agent,
/// otherwise looks for the soonest conflict worth yielding for.
fn retained_conflict(view: &AgentView, model: &DriverModel) -> Option<ConflictCandidate> {
    let params = &model.params;
    let candidates = view.conflicts(params.yield_horizon);
    if let Some(conflict) = model.conflict {
        if candidates.iter().any(|c| c.other == conflict.other) {
            return Some(conflict);
        }
    }

    let centre = view.centroid();
    let mut best: Option<ConflictCandidate> = None;
    for candidate in candidates {
        let pet = candidate.pet();
        if candidate.total_time() <= params.yield_horizon
            && (0.0..=params.max_pet).contains(&pet)
            && best.map_or(true, |b| candidate.total_time() < b.total_time())
            && in_front_of(candidate.point, centre, view.yaw(), 180.0)
        {
            best = Some(*candidate);
        }
    }
    best
}

/// Finds the nearest agent ahead on the current lane, heading the same way.
fn find_lead(view: &AgentView, params: &DriverParams, lane: Option<&Lane>) -> Option<AgentId> {
    let lane = lane?;
    let footprint = view.footprint();
    let centre = view.centroid();
    let range = f64::max(MIN_LEAD_DISTANCE, params.lead_horizon * view.speed());
    let mut lead: Option<(AgentId, f64)> = None;
    for other in view.scene.iter_agents() {
        if view.is_self(other.id()) || !other.has_body() {
            continue;
        }
        let area = other.footprint().area();
        if area <= 0.0 || lane.overlap_with(other.footprint()) / area <= LEAD_LANE_OVERLAP {
            continue;
        }
        if !in_front_of(other.centroid(), centre, view.yaw(), 180.0)
            || heading_difference(view.yaw(), other.yaw()).abs() >= LEAD_HEADING_TOLERANCE
        {
            continue;
        }
        let distance = footprint.distance(other.footprint());
        if distance < range && lead.map_or(true, |(_, d)| distance < d) {
            lead = Some((other.id(), distance));
        }
    }
    lead.map(|(id, _)| id)
}

/// Resolves the target point for the driving mode, then shortens it for yielding or following.
fn target(
    view: &AgentView,
    nav: &dyn LaneNavigator,
    state: &DriverModel,
    cur_lane: Option<&Lane>,
    lead: Option<AgentId>,
) -> SimResult<Target> {
    let params = &state.params;
    let centre = view.centroid();
    let roaming = || centre + params.roaming_waypoint * heading_vector(view.yaw());

    let mut point = if !view.on_infrastructure() {
        centre
    } else {
        match state.driving_mode {
            DrivingMode::LaneFollowing => match cur_lane {
                Some(lane) => nav.lane_target(view, params, lane),
                None => roaming(),
            },
            DrivingMode::Turning => match state.next_lane.and_then(|id| view.scenery().lane(id)) {
                Some(lane) => lane.entry_point(view.footprint(), params.turning_waypoint),
                None => roaming(),
            },
            DrivingMode::DeadEnd => match cur_lane {
                Some(lane) => nav.dead_end_target(view, lane),
                None => centre,
            },
            DrivingMode::Roaming => roaming(),
            DrivingMode::Undefined => return Err(SimError::UndefinedDrivingMode(view.id)),
        }
    };
    let mut distance = view.distance_to_point(point);

    match (state.speed_mode, &state.conflict, lead.and_then(|id| view.scene.agent(id))) {
        (DriverSpeedMode::Yielding, Some(conflict), _) => {
            let yield_point = yield_point(view, conflict, point);
            debug_yield(view.agent.name(), yield_point);
            distance = distance.min(view.distance_to_point(yield_point));
        }
        (DriverSpeedMode::Following, _, Some(lead)) => {
            let follow = follow_point(view, params, lead);
            let follow_distance = view.distance_to_point(follow);
            if follow_distance < distance {
                point = follow;
                distance = follow_distance;
            }
        }
        _ => {}
    }

    Ok(Target::new(point, distance))
}

/// A point on the way to `target`, leaving a gap before the conflict point.
fn yield_point(view: &AgentView, conflict: &ConflictCandidate, target: Point2d) -> Point2d {
    let centre = view.centroid();
    let dist = view.distance_to_point(conflict.point);
    let gap = if dist < YIELD_GAP { 0.4 * dist } else { YIELD_GAP };
    let radius = dist - gap;
    let to_target = target - centre;
    let reach = to_target.magnitude();
    if radius < 0.0 || radius > reach || reach < 1e-9 {
        return target;
    }
    let size = view.body.length().max(view.body.width());
    if size > 0.0 && radius < 0.75 * size {
        debug!("{}: conflict too close, stopping at once", view.agent.name());
        return centre;
    }
    centre + radius * to_target.normalize()
}

/// A point behind the lead vehicle at the minimum headway.
fn follow_point(view: &AgentView, params: &DriverParams, lead: &Agent) -> Point2d {
    let lead_centre = lead.centroid();
    let centre = view.centroid();
    let lead_edge = lead
        .footprint()
        .first_crossing(lead_centre, centre)
        .unwrap_or(lead_centre);
    let own_edge = view
        .footprint()
        .first_crossing(centre, lead_centre)
        .unwrap_or(centre);
    let gap = lead_edge.distance(own_edge);
    let headway = f64::max(MIN_HEADWAY, params.max_thw * view.speed());
    let frac = if headway < gap { headway / gap } else { 1.0 };
    lead_edge + frac * (own_edge - lead_edge)
}

fn target_speed(
    view: &AgentView,
    nav: &dyn LaneNavigator,
    state: &DriverModel,
    lead: Option<AgentId>,
) -> SimResult<f64> {
    let params = &state.params;
    let default_speed = |turning: bool| {
        let speed = if turning {
            params.turning_speed
        } else {
            view.caps.max_speed
        };
        speed.min(params.default_speed)
    };

    let mut speed = match state.speed_mode {
        DriverSpeedMode::Unrestricted => default_speed(false),
        DriverSpeedMode::Turning => default_speed(true),
        DriverSpeedMode::Following => match lead.and_then(|id| view.scene.agent(id)) {
            Some(lead) => {
                let own = view.speed();
                if lead.speed() > 0.0
                    && own > 0.0
                    && view.footprint().distance(lead.footprint()) / own < params.max_thw
                {
                    lead.speed() * CLOSE_FOLLOWING_FACTOR
                } else {
                    lead.speed()
                }
            }
            None => default_speed(false),
        },
        DriverSpeedMode::Yielding | DriverSpeedMode::Stopping => 0.0,
        DriverSpeedMode::Undefined => return Err(SimError::UndefinedSpeedMode(view.id)),
    };

    if close_to_junction(view, params) {
        speed = speed.min(params.crossing_speed);
    }
    if let Some(cap) = nav.speed_cap(view) {
        speed = speed.min(cap);
    }
    Ok(speed)
}

/// Whether a junction lies ahead within the relevance distance.
fn close_to_junction(view: &AgentView, params: &DriverParams) -> bool {
    let centre = view.centroid();
    view.scenery().iter_junctions().any(|junction| {
        view.distance_to(junction.polygon()) < params.junction_relevance
            && in_front_of(junction.polygon().centroid(), centre, view.yaw(), 180.0)
    })
}

/// Decides which signal to give when starting to turn from `from` into `to`.
fn turn_signal(
    params: &DriverParams,
    from: Option<&Lane>,
    to: Option<LaneId>,
    rng: &mut dyn RandomSource,
) -> Option<TurnSignal> {
    if rng.uniform() < params.no_signal_probability {
        return Some(TurnSignal::Off);
    }
    let (from, to) = (from?, to?);
    if from.is_right_of(to) {
        Some(TurnSignal::Left)
    } else if from.is_left_of(to) {
        Some(TurnSignal::Right)
    } else {
        Some(TurnSignal::Off)
    }
}

//! Cyclists: drivers which may also ride over pedestrian crossings, walkways and other ways.

use super::control::SteeringProfile;
use super::driver::{self, DriverModel, DriverParams, LaneNavigator};
use super::scratch::AgentView;
use crate::math::{in_front_of, Point2d};
use crate::random::RandomSource;
use crate::scenery::{Lane, LaneKind};
use crate::LaneId;
use itertools::Itertools;
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The length of the end region used as a cyclist's dead-end target, in m.
const DEAD_END_LENGTH: f64 = 0.3;

/// The tuning specific to cyclists.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CyclistParams {
    /// The speed limit while on a pedestrian crossing, in m/s.
    pub pedestrian_crossing_speed: f64,
    /// Pedestrian crossings closer than this, in m, are turned onto.
    pub pedestrian_crossing_proximity: f64,
    /// Walkways closer than this, in m, may be turned onto at the end of a lane.
    pub walkway_proximity: f64,
    /// The field of view in which walkways are considered, in degrees.
    pub walkway_fov: f64,
}

/// A cyclist's behaviour model and its state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CyclistModel {
    driver: DriverModel,
    params: CyclistParams,
}

/// Navigation over every lane a bicycle may use.
pub(crate) struct CyclistNavigator<'a> {
    pub params: &'a CyclistParams,
}

impl Default for CyclistParams {
    fn default() -> Self {
        Self {
            pedestrian_crossing_speed: 2.0,
            pedestrian_crossing_proximity: 1.8,
            walkway_proximity: 5.0,
            walkway_fov: 60.0,
        }
    }
}

impl CyclistModel {
    pub fn new(driver: DriverModel, params: CyclistParams) -> Self {
        Self { driver, params }
    }

    /// Gets the underlying driver model and its state.
    pub fn driver(&self) -> &DriverModel {
        &self.driver
    }

    pub fn params(&self) -> &CyclistParams {
        &self.params
    }

    pub(crate) fn with_driver(&self, driver: DriverModel) -> Self {
        Self {
            driver,
            params: self.params,
        }
    }
}

impl Default for CyclistModel {
    fn default() -> Self {
        Self::new(
            DriverModel::new(DriverParams::cyclist(), SteeringProfile::cyclist()),
            CyclistParams::default(),
        )
    }
}

impl CyclistNavigator<'_> {
    /// Pedestrian crossings just ahead which the body is not yet on, nearest first.
    fn close_pedestrian_crossings<'v>(&self, view: &AgentView<'v>) -> Vec<&'v Lane> {
        let centre = view.centroid();
        view.scenery()
            .lanes_of_kind(LaneKind::PedestrianCrossing)
            .map(|lane| (lane, view.distance_to(lane.polygon())))
            .filter(|(lane, distance)| {
                *distance > 0.0
                    && *distance <= self.params.pedestrian_crossing_proximity
                    && in_front_of(lane.centroid(), centre, view.yaw(), 180.0)
            })
            .sorted_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(lane, _)| lane)
            .collect()
    }

    /// Walkways ahead worth switching to at the end of `lane`, nearest first.
    fn close_walkways<'v>(&self, view: &AgentView<'v>, lane: &Lane) -> Vec<&'v Lane> {
        if !driver::approaches_end_of_lane(view, lane) {
            return vec![];
        }
        let centre = view.centroid();
        view.scenery()
            .lanes_of_kind(LaneKind::Walkway)
            .filter(|walkway| walkway.id() != lane.id())
            .map(|walkway| (walkway, view.distance_to(walkway.polygon())))
            .filter(|(walkway, distance)| {
                *distance <= self.params.walkway_proximity
                    && in_front_of(walkway.centroid(), centre, view.yaw(), self.params.walkway_fov)
            })
            .sorted_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(walkway, _)| walkway)
            .collect()
    }
}

impl LaneNavigator for CyclistNavigator<'_> {
    fn current_lane(&self, view: &AgentView) -> Option<LaneId> {
        driver::largest_overlap(view, |lane| lane.kind() != LaneKind::NonDriveable)
    }

    fn approaches_end_of_lane(&self, view: &AgentView, lane: &Lane) -> bool {
        !self.close_pedestrian_crossings(view).is_empty() || driver::approaches_end_of_lane(view, lane)
    }

    fn next_lane(
        &self,
        view: &AgentView,
        model: &DriverModel,
        lane: &Lane,
        rng: &mut dyn RandomSource,
    ) -> Option<LaneId> {
        if model.next_lane().is_none() {
            if let Some(crossing) = self.close_pedestrian_crossings(view).first() {
                debug!("{}: heading for pedestrian crossing {}", view.agent.name(), crossing.name());
                return Some(crossing.id());
            }
            if let Some(walkway) = self.close_walkways(view, lane).first() {
                debug!("{}: heading for walkway {}", view.agent.name(), walkway.name());
                return Some(walkway.id());
            }
        }
        driver::choose_successor(view, model, lane, rng)
    }

    fn dead_end_target(&self, view: &AgentView, lane: &Lane) -> Point2d {
        lane.end_region(view.centroid(), view.yaw(), DEAD_END_LENGTH)
            .centroid()
    }

    fn speed_cap(&self, view: &AgentView) -> Option<f64> {
        view.scenery()
            .lanes_of_kind(LaneKind::PedestrianCrossing)
            .any(|lane| lane.polygon().intersects(view.footprint()))
            .then_some(self.params.pedestrian_crossing_speed)
    }
}

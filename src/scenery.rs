//! The static road layout agents move over.

use crate::capability::TypeLattice;
use crate::error::{SimError, SimResult};
use crate::math::{heading_vector, Disc, Point2d, Polygon, Polyline};
use crate::{JunctionId, LaneId, RoadId};
use cgmath::prelude::*;
use slotmap::SlotMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How far inside a lane's entry edge the entry point is placed, in m.
const ENTRY_NUDGE: f64 = 0.5;

/// The kind of surface a lane represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneKind {
    /// A lane for motor traffic.
    Driveable,
    /// A lane that cannot be driven on, such as a hatched area or a verge.
    NonDriveable,
    /// A footway next to a road.
    Walkway,
    /// A marked crossing for pedestrians.
    PedestrianCrossing,
    /// A generic path, such as a cycle track.
    Way,
}

/// A single lane of the scenery.
#[derive(Clone, Debug)]
pub struct Lane {
    id: LaneId,
    /// A stable textual identifier, used to order lanes reproducibly.
    name: String,
    kind: LaneKind,
    /// The centre line, running from the start of the lane to its end.
    centre: Polyline,
    /// The width of the lane in m.
    width: f64,
    /// The lane's surface, derived from the centre line and width.
    polygon: Polygon,
    /// The lanes which follow this one.
    successors: Vec<LaneId>,
    /// The lanes which lead into this one.
    predecessors: Vec<LaneId>,
    /// The lanes this lane lies to the left of.
    left_of: Vec<LaneId>,
    /// The lanes this lane lies to the right of.
    right_of: Vec<LaneId>,
    /// The road the lane belongs to.
    road: Option<RoadId>,
}

/// The attributes of a lane.
pub struct LaneAttributes<'a> {
    /// A stable textual identifier.
    pub name: &'a str,
    /// The kind of lane.
    pub kind: LaneKind,
    /// The points of the centre line, from the start of the lane to its end.
    pub centre: &'a [Point2d],
    /// The width of the lane in m.
    pub width: f64,
}

/// A road, consisting of a set of lanes side by side.
#[derive(Clone, Debug)]
pub struct Road {
    id: RoadId,
    lanes: Vec<LaneId>,
}

/// The area of an intersection.
#[derive(Clone, Debug)]
pub struct Junction {
    id: JunctionId,
    polygon: Polygon,
}

/// The static layout of a scenario: its lanes, roads and junctions,
/// and the type lattice used to resolve agent capabilities.
#[derive(Clone, Debug, Default)]
pub struct Scenery {
    lanes: SlotMap<LaneId, Lane>,
    roads: SlotMap<RoadId, Road>,
    junctions: SlotMap<JunctionId, Junction>,
    types: TypeLattice,
}

impl Lane {
    fn new(id: LaneId, attribs: &LaneAttributes) -> Self {
        let centre = Polyline::new(attribs.centre);
        let polygon = centre.strip(0.0, centre.length(), attribs.width);
        Self {
            id,
            name: attribs.name.to_owned(),
            kind: attribs.kind,
            centre,
            width: attribs.width,
            polygon,
            successors: vec![],
            predecessors: vec![],
            left_of: vec![],
            right_of: vec![],
            road: None,
        }
    }

    /// Gets the lane ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the lane's textual identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LaneKind {
        self.kind
    }

    /// Whether motor vehicles may use the lane.
    pub fn is_driveable(&self) -> bool {
        self.kind == LaneKind::Driveable
    }

    /// Gets the centre line of the lane.
    pub fn centre(&self) -> &Polyline {
        &self.centre
    }

    /// Gets the lane's surface.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.centre.length()
    }

    /// Gets the width of the lane in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Gets the area of the lane in m<sup>2</sup>.
    pub fn area(&self) -> f64 {
        self.polygon.area()
    }

    pub fn centroid(&self) -> Point2d {
        self.polygon.centroid()
    }

    /// Gets the lanes which follow this one.
    pub fn successors(&self) -> &[LaneId] {
        &self.successors
    }

    /// Gets the lanes which lead into this one.
    pub fn predecessors(&self) -> &[LaneId] {
        &self.predecessors
    }

    /// Whether this lane lies immediately to the left of `other`.
    pub fn is_left_of(&self, other: LaneId) -> bool {
        self.left_of.contains(&other)
    }

    /// Whether this lane lies immediately to the right of `other`.
    pub fn is_right_of(&self, other: LaneId) -> bool {
        self.right_of.contains(&other)
    }

    /// Gets the road the lane belongs to.
    pub fn road(&self) -> Option<RoadId> {
        self.road
    }

    /// The area shared by the lane and a convex footprint.
    pub fn overlap_with(&self, footprint: &Polygon) -> f64 {
        self.polygon.overlap_area(footprint)
    }

    /// The direction of travel along the centre line for something at `origin` heading along `yaw`:
    /// `1.0` when heading towards the end of the lane, `-1.0` when heading towards its start.
    pub fn travel_direction(&self, origin: Point2d, yaw: f64) -> f64 {
        let (_, tan) = self.centre.sample(self.centre.project(origin));
        if tan.dot(heading_vector(yaw)) >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// A point on the centre line `distance` ahead of `origin`, in the direction given by `yaw`.
    /// Clamped to the ends of the lane.
    pub fn point_ahead(&self, origin: Point2d, yaw: f64, distance: f64) -> Point2d {
        let pos = self.centre.project(origin);
        let dir = self.travel_direction(origin, yaw);
        self.centre.sample(pos + dir * distance).0
    }

    /// The last `length` metres of the lane in the direction of travel.
    pub fn end_region(&self, origin: Point2d, yaw: f64, length: f64) -> Polygon {
        let total = self.length();
        if self.travel_direction(origin, yaw) > 0.0 {
            self.centre.strip(total - length, total, self.width)
        } else {
            self.centre.strip(0.0, length, self.width)
        }
    }

    /// The midpoint of the lane's terminal edge in the direction of travel.
    pub fn end_edge_midpoint(&self, origin: Point2d, yaw: f64) -> Point2d {
        if self.travel_direction(origin, yaw) > 0.0 {
            self.centre.sample(self.length()).0
        } else {
            self.centre.sample(0.0).0
        }
    }

    /// A point just inside the end of the lane nearest to `footprint`.
    ///
    /// The midpoint of the nearer edge is nudged into the lane, then a disc of radius `probe`
    /// around it is intersected with the lane. Falls back to the edge midpoint
    /// if the probe does not overlap the lane.
    pub fn entry_point(&self, footprint: &Polygon, probe: f64) -> Point2d {
        let total = self.length();
        let start = self.centre.sample(0.0).0;
        let end = self.centre.sample(total).0;
        let nudge = ENTRY_NUDGE.min(0.5 * total);
        let (edge, inside) = if footprint.distance_to_point(start) <= footprint.distance_to_point(end)
        {
            (start, self.centre.sample(nudge).0)
        } else {
            (end, self.centre.sample(total - nudge).0)
        };
        let overlap = self.polygon.clip(&Disc::new(inside, probe).polygon());
        if overlap.is_empty() {
            edge
        } else {
            overlap.centroid()
        }
    }
}

impl Road {
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// Gets the lanes of the road.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }
}

impl Junction {
    pub fn id(&self) -> JunctionId {
        self.id
    }

    /// Gets the area of the junction.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }
}

impl Scenery {
    /// Creates an empty scenery using the default type lattice.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates an empty scenery using the given type lattice.
    pub fn with_types(types: TypeLattice) -> Self {
        Self {
            types,
            ..Default::default()
        }
    }

    /// Gets the type lattice.
    pub fn types(&self) -> &TypeLattice {
        &self.types
    }

    /// Adds a lane to the scenery.
    pub fn add_lane(&mut self, attributes: &LaneAttributes) -> LaneId {
        self.lanes.insert_with_key(|id| Lane::new(id, attributes))
    }

    /// Specifies that the end of the `from` lane connects to the start of the `to` lane.
    pub fn add_lane_connection(&mut self, from: LaneId, to: LaneId) -> SimResult<()> {
        self.check_lane(from)?;
        self.check_lane(to)?;
        self.lanes[from].successors.push(to);
        self.lanes[to].predecessors.push(from);
        Ok(())
    }

    /// Specifies that `left` lies immediately to the left of `right`.
    pub fn add_lane_adjacency(&mut self, left: LaneId, right: LaneId) -> SimResult<()> {
        self.check_lane(left)?;
        self.check_lane(right)?;
        self.lanes[left].left_of.push(right);
        self.lanes[right].right_of.push(left);
        Ok(())
    }

    /// Groups the given lanes into a road.
    pub fn add_road(&mut self, lanes: &[LaneId]) -> SimResult<RoadId> {
        for lane in lanes {
            self.check_lane(*lane)?;
        }
        let road_id = self.roads.insert_with_key(|id| Road {
            id,
            lanes: lanes.to_vec(),
        });
        for lane in lanes {
            self.lanes[*lane].road = Some(road_id);
        }
        Ok(road_id)
    }

    /// Adds a junction area to the scenery.
    pub fn add_junction(&mut self, polygon: Polygon) -> JunctionId {
        self.junctions
            .insert_with_key(|id| Junction { id, polygon })
    }

    fn check_lane(&self, id: LaneId) -> SimResult<()> {
        if self.lanes.contains_key(id) {
            Ok(())
        } else {
            Err(SimError::UnknownLane(id))
        }
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    /// Returns an iterator over all the lanes.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// Returns an iterator over the lanes of the given kind.
    pub fn lanes_of_kind(&self, kind: LaneKind) -> impl Iterator<Item = &Lane> {
        self.lanes.values().filter(move |lane| lane.kind == kind)
    }

    /// Returns an iterator over all the roads.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// Returns an iterator over all the junctions.
    pub fn iter_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    /// Whether the footprint touches any lane or junction.
    pub fn intersects_infrastructure(&self, footprint: &Polygon) -> bool {
        self.lanes.values().any(|lane| lane.polygon.intersects(footprint))
            || self
                .junctions
                .values()
                .any(|junction| junction.polygon.intersects(footprint))
    }

    /// The first road with a lane touching the footprint.
    pub fn road_intersecting(&self, footprint: &Polygon) -> Option<&Road> {
        self.iter_roads().find(|road| {
            road.lanes
                .iter()
                .any(|lane| self.lanes[*lane].polygon.intersects(footprint))
        })
    }
}

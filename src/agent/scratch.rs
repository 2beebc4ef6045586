use crate::capability::{Capabilities, TypeTag};
use crate::conflict::{ConflictCandidate, ConflictFeed, CONFLICT_STEP};
use crate::error::{SimError, SimResult};
use crate::math::{Point2d, Polygon};
use crate::scene::{Agent, Scene};
use crate::scenery::Scenery;
use crate::{AgentId, LaneId, RoadId};
use once_cell::unsync::OnceCell;

/// An agent as seen from the previous scene while its next state is decided.
///
/// Lookups which are expensive or needed several times are memoized here.
/// A view lives for a single agent's update within a single tick.
pub(crate) struct AgentView<'a> {
    pub scene: &'a Scene,
    pub id: AgentId,
    pub agent: &'a Agent,
    /// The vehicle the agent drives, or the agent itself.
    pub body: &'a Agent,
    pub caps: Capabilities,
    feed: &'a dyn ConflictFeed,
    conflicts: OnceCell<Vec<ConflictCandidate>>,
    on_infrastructure: OnceCell<bool>,
    pub current_lane: OnceCell<Option<LaneId>>,
    pub lead: OnceCell<Option<AgentId>>,
    pub walkway: OnceCell<Option<LaneId>>,
    pub road: OnceCell<Option<RoadId>>,
}

impl<'a> AgentView<'a> {
    pub fn new(scene: &'a Scene, id: AgentId, feed: &'a dyn ConflictFeed) -> SimResult<Self> {
        let agent = scene.agent(id).ok_or(SimError::UnknownAgent(id))?;
        let body = scene.body(id).ok_or(SimError::UnknownAgent(id))?;
        let caps = scene
            .capabilities(id)
            .ok_or(SimError::UnknownAgent(id))?;
        Ok(Self {
            scene,
            id,
            agent,
            body,
            caps,
            feed,
            conflicts: OnceCell::new(),
            on_infrastructure: OnceCell::new(),
            current_lane: OnceCell::new(),
            lead: OnceCell::new(),
            walkway: OnceCell::new(),
            road: OnceCell::new(),
        })
    }

    pub fn scenery(&self) -> &'a Scenery {
        self.scene.scenery()
    }

    pub fn footprint(&self) -> &'a Polygon {
        self.body.footprint()
    }

    pub fn centroid(&self) -> Point2d {
        self.body.centroid()
    }

    pub fn yaw(&self) -> f64 {
        self.agent.yaw()
    }

    pub fn speed(&self) -> f64 {
        self.agent.speed()
    }

    /// Whether the agent is the body in question, or drives it.
    pub fn is_self(&self, other: AgentId) -> bool {
        other == self.id || other == self.body.id()
    }

    pub fn is_a(&self, agent: &Agent, tag: TypeTag) -> bool {
        self.scene.is_a(agent, tag)
    }

    /// The conflicts predicted for the agent. Only the first horizon requested is queried.
    pub fn conflicts(&self, horizon: f64) -> &[ConflictCandidate] {
        self.conflicts.get_or_init(|| {
            self.feed
                .conflicts_for(self.scene, self.id, horizon, CONFLICT_STEP)
        })
    }

    /// Whether the body touches any lane or junction.
    pub fn on_infrastructure(&self) -> bool {
        *self
            .on_infrastructure
            .get_or_init(|| self.scenery().intersects_infrastructure(self.footprint()))
    }

    /// The distance from the body to a point.
    pub fn distance_to_point(&self, point: Point2d) -> f64 {
        self.body.distance_to_point(point)
    }

    /// The distance from the body to a polygon.
    pub fn distance_to(&self, polygon: &Polygon) -> f64 {
        if self.body.has_body() {
            self.footprint().distance(polygon)
        } else {
            polygon.distance_to_point(self.centroid())
        }
    }
}

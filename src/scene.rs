//! Per-tick snapshots of the agents in a scenario.

use crate::agent::{Model, TurnSignal};
use crate::capability::{Capabilities, TypeTag, TypeTags};
use crate::error::{SimError, SimResult};
use crate::math::{Point2d, Polygon};
use crate::scenery::Scenery;
use crate::AgentId;
use slotmap::{SecondaryMap, SlotMap};
use std::rc::Rc;

/// A road user or object taking part in the simulation.
#[derive(Clone, Debug)]
pub struct Agent {
    pub(crate) id: AgentId,
    name: String,
    tags: TypeTags,
    /// The area the agent occupies. Empty for agents that only drive another.
    pub(crate) footprint: Polygon,
    /// Length in m.
    length: f64,
    /// Width in m.
    width: f64,
    /// Heading in degrees, in `[0, 360)`.
    pub(crate) yaw: f64,
    /// Speed in m/s, never negative.
    pub(crate) speed: f64,
    /// Acceleration in m/s<sup>2</sup>.
    pub(crate) acceleration: f64,
    /// Yaw rate in degrees/s.
    pub(crate) yaw_rate: f64,
    /// The vehicle this agent drives.
    pub(crate) drives: Option<AgentId>,
    /// The turn signal currently asserted.
    pub(crate) turn_signal: Option<TurnSignal>,
    pub(crate) model: Model,
}

/// The attributes of an agent.
#[derive(Clone, Debug)]
pub struct AgentAttributes<'a> {
    pub name: &'a str,
    /// The agent's types, which determine its capabilities.
    pub tags: &'a [TypeTag],
    /// The centre of the agent's footprint, or `None` for an agent without a body of its own.
    pub position: Option<Point2d>,
    /// Heading in degrees.
    pub yaw: f64,
    /// Length in m.
    pub length: f64,
    /// Width in m.
    pub width: f64,
    /// Initial speed in m/s.
    pub speed: f64,
    /// The vehicle the agent drives. Must already be part of the scene.
    pub drives: Option<AgentId>,
    pub model: Model,
}

/// The state of every agent at one point in time.
#[derive(Clone, Debug)]
pub struct Scene {
    scenery: Rc<Scenery>,
    agents: SlotMap<AgentId, Agent>,
    /// The simulation time in s.
    time: f64,
}

/// Associates each agent of a scene with its counterpart in the following scene.
#[derive(Clone, Debug, Default)]
pub struct TickMapping(SecondaryMap<AgentId, AgentId>);

impl Agent {
    /// Gets the agent ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the agent's type tags.
    pub fn tags(&self) -> &[TypeTag] {
        &self.tags
    }

    /// Gets the area the agent occupies.
    pub fn footprint(&self) -> &Polygon {
        &self.footprint
    }

    /// Whether the agent occupies any space of its own.
    pub fn has_body(&self) -> bool {
        !self.footprint.points().is_empty()
    }

    /// Gets the centre of the agent's footprint.
    pub fn centroid(&self) -> Point2d {
        self.footprint.centroid()
    }

    /// Gets the length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Gets the width in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Gets the heading in degrees.
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Gets the speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Gets the acceleration in m/s<sup>2</sup>.
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// Gets the yaw rate in degrees/s.
    pub fn yaw_rate(&self) -> f64 {
        self.yaw_rate
    }

    /// Gets the vehicle the agent drives.
    pub fn drives(&self) -> Option<AgentId> {
        self.drives
    }

    /// Gets the asserted turn signal, if any.
    pub fn turn_signal(&self) -> Option<TurnSignal> {
        self.turn_signal
    }

    /// Gets the agent's behaviour model and its current state.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The distance from the agent's footprint to a point.
    pub fn distance_to_point(&self, point: Point2d) -> f64 {
        if self.has_body() {
            self.footprint.distance_to_point(point)
        } else {
            cgmath::MetricSpace::distance(self.centroid(), point)
        }
    }
}

impl Default for AgentAttributes<'_> {
    fn default() -> Self {
        Self {
            name: "",
            tags: &[],
            position: None,
            yaw: 0.0,
            length: 0.0,
            width: 0.0,
            speed: 0.0,
            drives: None,
            model: Model::Entity,
        }
    }
}

impl Scene {
    /// Creates a scene with no agents at time zero.
    pub fn new(scenery: Rc<Scenery>) -> Self {
        Self {
            scenery,
            agents: SlotMap::with_key(),
            time: 0.0,
        }
    }

    /// Gets the scenery.
    pub fn scenery(&self) -> &Scenery {
        &self.scenery
    }

    /// Gets the simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Adds an agent to the scene.
    ///
    /// An agent driving a vehicle takes on the vehicle's heading and speed.
    pub fn add_agent(&mut self, attributes: &AgentAttributes) -> SimResult<AgentId> {
        let (yaw, speed) = match attributes.drives {
            Some(vehicle_id) => {
                let vehicle = self
                    .agents
                    .get(vehicle_id)
                    .ok_or(SimError::UnknownAgent(vehicle_id))?;
                (vehicle.yaw, vehicle.speed)
            }
            None => (attributes.yaw, attributes.speed),
        };
        let footprint = attributes
            .position
            .map(|centre| Polygon::rectangle(centre, yaw, attributes.length, attributes.width))
            .unwrap_or_default();
        Ok(self.agents.insert_with_key(|id| Agent {
            id,
            name: attributes.name.to_owned(),
            tags: attributes.tags.iter().copied().collect(),
            footprint,
            length: attributes.length,
            width: attributes.width,
            yaw: crate::math::wrap_degrees(yaw),
            speed: speed.max(0.0),
            acceleration: 0.0,
            yaw_rate: 0.0,
            drives: attributes.drives,
            turn_signal: None,
            model: attributes.model.clone(),
        }))
    }

    /// Gets a reference to the agent with the given ID.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub(crate) fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Returns an iterator over all the agents.
    pub fn iter_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Gets the agent whose footprint represents `id` in the world:
    /// the vehicle it drives, or otherwise the agent itself.
    pub fn body(&self, id: AgentId) -> Option<&Agent> {
        let agent = self.agents.get(id)?;
        agent
            .drives
            .and_then(|vehicle| self.agents.get(vehicle))
            .or(Some(agent))
    }

    /// Resolves the kinematic limits of an agent.
    pub fn capabilities(&self, id: AgentId) -> Option<Capabilities> {
        let agent = self.agents.get(id)?;
        let vehicle_tags = agent
            .drives
            .and_then(|vehicle| self.agents.get(vehicle))
            .map(|vehicle| vehicle.tags());
        Some(self.scenery.types().resolve(agent.tags(), vehicle_tags))
    }

    /// Whether the agent is (transitively) of type `tag`.
    pub fn is_a(&self, agent: &Agent, tag: TypeTag) -> bool {
        self.scenery.types().is_a(agent.tags(), tag)
    }

    /// Creates the scene `dt` seconds later, with every agent carried over unchanged,
    /// along with the mapping from this scene's agents to their counterparts.
    pub fn successor(&self, dt: f64) -> (Scene, TickMapping) {
        let next = Scene {
            scenery: self.scenery.clone(),
            agents: self.agents.clone(),
            time: self.time + dt,
        };
        let mut mapping = TickMapping::new();
        for id in self.agents.keys() {
            mapping.insert(id, id);
        }
        (next, mapping)
    }
}

impl TickMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Default::default()
    }

    /// Maps an agent of the previous scene to one in the next scene.
    pub fn insert(&mut self, prev: AgentId, next: AgentId) {
        self.0.insert(prev, next);
    }

    /// Gets the counterpart of an agent of the previous scene.
    pub fn get(&self, prev: AgentId) -> SimResult<AgentId> {
        self.0.get(prev).copied().ok_or(SimError::UnmappedAgent(prev))
    }
}

//! Predicted conflicts between agents' future paths.

use crate::math::Point2d;
use crate::scene::Scene;
use crate::AgentId;
use slotmap::SecondaryMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The sampling step used when querying a [ConflictFeed], in s.
pub const CONFLICT_STEP: f64 = 0.25;

/// A predicted intersection between an agent's path and another agent's path.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConflictCandidate {
    /// The other agent.
    pub other: AgentId,
    /// The time until the agent reaches the conflict point, in s.
    pub time_self: f64,
    /// The time until the other agent reaches the conflict point, in s.
    pub time_other: f64,
    /// Where the paths intersect.
    pub point: Point2d,
}

impl ConflictCandidate {
    /// The post-encroachment time: how long after the other agent this agent arrives.
    pub fn pet(&self) -> f64 {
        self.time_self - self.time_other
    }

    /// The sum of both agents' times to reach the conflict point.
    pub fn total_time(&self) -> f64 {
        self.time_self + self.time_other
    }
}

/// Predicts conflicts between an agent's projected path and those of other agents.
pub trait ConflictFeed {
    /// Gets the conflicts predicted for `agent` within `horizon` seconds, sampling its path every `step` seconds.
    /// The order of the candidates is not significant.
    fn conflicts_for(
        &self,
        scene: &Scene,
        agent: AgentId,
        horizon: f64,
        step: f64,
    ) -> Vec<ConflictCandidate>;
}

impl<F> ConflictFeed for F
where
    F: Fn(&Scene, AgentId, f64, f64) -> Vec<ConflictCandidate>,
{
    fn conflicts_for(
        &self,
        scene: &Scene,
        agent: AgentId,
        horizon: f64,
        step: f64,
    ) -> Vec<ConflictCandidate> {
        self(scene, agent, horizon, step)
    }
}

/// A feed which never predicts any conflicts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConflicts;

impl ConflictFeed for NoConflicts {
    fn conflicts_for(&self, _: &Scene, _: AgentId, _: f64, _: f64) -> Vec<ConflictCandidate> {
        vec![]
    }
}

/// A feed which replays conflicts computed ahead of time, regardless of the scene.
#[derive(Clone, Debug, Default)]
pub struct RecordedConflicts {
    conflicts: SecondaryMap<AgentId, Vec<ConflictCandidate>>,
}

impl RecordedConflicts {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a conflict for the given agent.
    pub fn record(&mut self, agent: AgentId, conflict: ConflictCandidate) {
        match self.conflicts.get_mut(agent) {
            Some(conflicts) => conflicts.push(conflict),
            None => {
                self.conflicts.insert(agent, vec![conflict]);
            }
        }
    }

    /// Forgets all conflicts of the given agent.
    pub fn clear(&mut self, agent: AgentId) {
        self.conflicts.remove(agent);
    }
}

impl ConflictFeed for RecordedConflicts {
    fn conflicts_for(&self, _: &Scene, agent: AgentId, horizon: f64, _: f64) -> Vec<ConflictCandidate> {
        self.conflicts
            .get(agent)
            .map(|conflicts| {
                conflicts
                    .iter()
                    .filter(|c| c.time_self <= horizon)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

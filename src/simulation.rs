use crate::agent::simulate;
use crate::conflict::{ConflictFeed, NoConflicts};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::error::SimResult;
use crate::random::SeededRandom;
use crate::scene::{Agent, AgentAttributes, Scene};
use crate::AgentId;
use log::debug;

/// A scenario simulation, advancing a scene one tick at a time.
pub struct Simulation {
    /// The scene at the current time.
    scene: Scene,
    /// The source of every random draw made by the agents.
    rng: SeededRandom,
    /// Predicts the conflicts between agents.
    conflicts: Box<dyn ConflictFeed>,
    /// The current frame of simulation.
    frame: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation starting from `scene`, with no conflict predictions.
    ///
    /// Two simulations created from the same scene and seed produce the same scenes.
    pub fn new(scene: Scene, seed: u64) -> Self {
        Self {
            scene,
            rng: SeededRandom::new(seed),
            conflicts: Box::new(NoConflicts),
            frame: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Sets the feed used to predict conflicts between agents.
    pub fn set_conflict_feed(&mut self, feed: impl ConflictFeed + 'static) {
        self.conflicts = Box::new(feed);
    }

    /// Adds an agent to the current scene.
    pub fn add_agent(&mut self, attributes: &AgentAttributes) -> SimResult<AgentId> {
        self.scene.add_agent(attributes)
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Agents which drive another are updated first, so the vehicles they drive move
    /// with the controls handed to them in the same tick.
    /// On error the current scene is left as it was.
    pub fn step(&mut self, dt: f64) -> SimResult<()> {
        let result = self.successor(dt);

        // Whatever a failed step recorded must not spill into the next frame
        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame(self.frame + 1);
        }

        self.scene = result?;
        self.frame += 1;
        debug!("frame {} at {:.2} s", self.frame, self.scene.time());
        Ok(())
    }

    /// Computes the scene `dt` seconds on from the current one.
    fn successor(&mut self, dt: f64) -> SimResult<Scene> {
        let (mut next, mapping) = self.scene.successor(dt);
        let (drivers, others): (Vec<_>, Vec<_>) = self
            .scene
            .iter_agents()
            .partition(|agent| agent.drives().is_some());

        for agent in drivers.into_iter().chain(others) {
            simulate(
                &self.scene,
                &mut next,
                &mapping,
                agent.id(),
                dt,
                self.conflicts.as_ref(),
                &mut self.rng,
            )?;
        }
        Ok(next)
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets the scene at the current time.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Returns an iterator over all the agents in the current scene.
    pub fn iter_agents(&self) -> impl Iterator<Item = &Agent> {
        self.scene.iter_agents()
    }

    /// Gets a reference to the agent with the given ID.
    pub fn get_agent(&self, agent_id: AgentId) -> Option<&Agent> {
        self.scene.agent(agent_id)
    }

    /// Gets what the agents decided during the last step, including one that failed.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }
}

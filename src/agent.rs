//! Behaviour models and the per-tick update of a single agent.

use crate::conflict::ConflictFeed;
use crate::debug::debug_decision;
use crate::error::{SimError, SimResult};
use crate::random::RandomSource;
use crate::scene::{Scene, TickMapping};
use crate::AgentId;
pub use control::{
    acceleration, default_target, yaw_rate, SteeringProfile, Target, RELEVANT_LOWEST_SPEED,
};
use control::{integrate, Kinematics};
pub use cyclist::{CyclistModel, CyclistParams};
use cyclist::CyclistNavigator;
use driver::MotoristNavigator;
pub use driver::{DriverModel, DriverParams, DriverSpeedMode, DrivingMode};
use log::trace;
pub use pedestrian::{PedestrianModel, PedestrianParams, PedestrianSpeedMode, WalkingMode};
use scratch::AgentView;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod control;
mod cyclist;
mod driver;
mod pedestrian;
mod scratch;

/// The signal an agent gives of its intention to turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TurnSignal {
    Off,
    Left,
    Right,
}

/// How an agent decides what to do, along with the state of that decision process.
#[derive(Clone, Debug, Default)]
pub enum Model {
    /// Heads straight on at its maximum speed.
    #[default]
    Entity,
    /// Has no will of its own and moves as its driver commands.
    Vehicle,
    Driver(DriverModel),
    Cyclist(CyclistModel),
    Pedestrian(PedestrianModel),
}

/// The outcome of planning one agent's update.
#[derive(Clone, Debug)]
pub(crate) struct Decision<M> {
    /// The next state of the model.
    pub state: M,
    pub target: Target,
    /// The speed to reach by the target, or `None` to stop there.
    pub target_speed: Option<f64>,
    /// Whether the agent is turning into another lane.
    pub turning: bool,
    pub turn_signal: Option<TurnSignal>,
    pub steering: SteeringProfile,
}

impl<M> Decision<M> {
    fn map_state<N>(self, f: impl FnOnce(M) -> N) -> Decision<N> {
        Decision {
            state: f(self.state),
            target: self.target,
            target_speed: self.target_speed,
            turning: self.turning,
            turn_signal: self.turn_signal,
            steering: self.steering,
        }
    }
}

/// Plans the update of agent `id` from the previous scene.
fn plan(
    view: &AgentView,
    rng: &mut dyn RandomSource,
) -> SimResult<Option<Decision<Model>>> {
    let decision = match view.agent.model() {
        Model::Entity => Decision {
            state: Model::Entity,
            target: default_target(view.body),
            target_speed: Some(view.caps.max_speed),
            turning: false,
            turn_signal: None,
            steering: SteeringProfile::generic(),
        },
        Model::Vehicle => return Ok(None),
        Model::Driver(model) => {
            driver::plan(view, model, &MotoristNavigator, rng)?.map_state(Model::Driver)
        }
        Model::Cyclist(model) => {
            let nav = CyclistNavigator {
                params: model.params(),
            };
            driver::plan(view, model.driver(), &nav, rng)?
                .map_state(|driver| Model::Cyclist(model.with_driver(driver)))
        }
        Model::Pedestrian(model) => pedestrian::plan(view, model, rng).map_state(Model::Pedestrian),
    };
    Ok(Some(decision))
}

/// Updates the counterpart in `next` of agent `id` of `prev`, advancing it by `dt` seconds.
///
/// The agent decides on its next state from `prev` alone, and its new acceleration and yaw rate
/// are handed on to the vehicle it drives. Control values an agent does not set, such as those of
/// a vehicle or the yaw rate of a stationary agent, are left as they are in `next`. Drivers must
/// therefore be updated before the vehicles they drive.
pub fn simulate(
    prev: &Scene,
    next: &mut Scene,
    mapping: &TickMapping,
    id: AgentId,
    dt: f64,
    feed: &dyn ConflictFeed,
    rng: &mut dyn RandomSource,
) -> SimResult<()> {
    let view = AgentView::new(prev, id, feed)?;
    let decision = plan(&view, rng)?;
    if let Some(decision) = &decision {
        debug_decision(
            view.agent.name(),
            &decision.state,
            view.centroid(),
            decision.target.point,
            decision.target_speed,
        );
    }

    let (acc, rate) = match &decision {
        Some(decision) => (
            Some(acceleration(
                view.speed(),
                &view.caps,
                view.body,
                &decision.target,
                decision.target_speed,
            )),
            yaw_rate(
                view.speed(),
                view.yaw(),
                &view.caps,
                &decision.steering,
                view.body,
                decision.target.point,
                decision.turning,
            ),
        ),
        None => (None, None),
    };

    let next_id = mapping.get(id)?;
    let agent = next
        .agent_mut(next_id)
        .ok_or(SimError::UnknownAgent(next_id))?;
    if let Some(decision) = decision {
        agent.model = decision.state;
        agent.turn_signal = decision.turn_signal;
    }
    let acceleration = acc.unwrap_or(agent.acceleration);
    let yaw_rate = rate.unwrap_or(agent.yaw_rate);
    let turn_signal = agent.turn_signal;
    trace!(
        "{}: acceleration {acceleration:.3}, yaw rate {yaw_rate:.3}",
        view.agent.name()
    );

    let kinematics = Kinematics {
        yaw: view.agent.yaw(),
        speed: view.agent.speed(),
        acceleration,
        yaw_rate,
    };
    integrate(agent, kinematics, view.agent.footprint(), view.body, dt);

    if let Some(vehicle) = view.agent.drives() {
        let vehicle_id = mapping.get(vehicle)?;
        let vehicle = next
            .agent_mut(vehicle_id)
            .ok_or(SimError::UnknownAgent(vehicle_id))?;
        vehicle.acceleration = acceleration;
        vehicle.yaw_rate = yaw_rate;
        vehicle.turn_signal = turn_signal;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capability::TypeTag;
    use crate::conflict::NoConflicts;
    use crate::math::Point2d;
    use crate::random::SeededRandom;
    use crate::scene::AgentAttributes;
    use crate::scenery::Scenery;
    use assert_approx_eq::assert_approx_eq;
    use std::rc::Rc;

    fn step(scene: &Scene, order: &[AgentId], rng: &mut SeededRandom) -> Scene {
        let (mut next, mapping) = scene.successor(0.1);
        for id in order {
            simulate(scene, &mut next, &mapping, *id, 0.1, &NoConflicts, rng).unwrap();
        }
        next
    }

    #[test]
    fn entity_heads_straight_on() {
        let mut scene = Scene::new(Rc::new(Scenery::new()));
        let id = scene
            .add_agent(&AgentAttributes {
                name: "car",
                tags: &[TypeTag::PassengerCar],
                position: Some(Point2d::new(0.0, 0.0)),
                yaw: 90.0,
                length: 4.0,
                width: 2.0,
                speed: 5.0,
                ..Default::default()
            })
            .unwrap();
        let mut rng = SeededRandom::new(1);
        let next = step(&scene, &[id], &mut rng);
        let agent = next.agent(id).unwrap();
        assert!(agent.acceleration() > 0.0);
        assert_approx_eq!(agent.yaw_rate(), 0.0);
        assert_approx_eq!(agent.yaw(), 90.0);
        assert!(agent.speed() > 5.0);
        assert_approx_eq!(agent.centroid().x, 0.0);
        assert!(agent.centroid().y > 0.0);
    }

    #[test]
    fn vehicle_keeps_its_controls() {
        let mut scene = Scene::new(Rc::new(Scenery::new()));
        let id = scene
            .add_agent(&AgentAttributes {
                name: "car",
                tags: &[TypeTag::PassengerCar],
                position: Some(Point2d::new(0.0, 0.0)),
                length: 4.0,
                width: 2.0,
                speed: 5.0,
                model: Model::Vehicle,
                ..Default::default()
            })
            .unwrap();
        scene.agent_mut(id).unwrap().acceleration = -1.0;
        let mut rng = SeededRandom::new(1);
        let next = step(&scene, &[id], &mut rng);
        let agent = next.agent(id).unwrap();
        assert_approx_eq!(agent.acceleration(), -1.0);
        assert_approx_eq!(agent.speed(), 4.9);
        assert_approx_eq!(agent.centroid().x, 0.49);
    }

    #[test]
    fn driver_moves_its_vehicle() {
        let mut scene = Scene::new(Rc::new(Scenery::new()));
        let car = scene
            .add_agent(&AgentAttributes {
                name: "car",
                tags: &[TypeTag::PassengerCar],
                position: Some(Point2d::new(0.0, 0.0)),
                length: 4.0,
                width: 2.0,
                speed: 5.0,
                model: Model::Vehicle,
                ..Default::default()
            })
            .unwrap();
        let driver = scene
            .add_agent(&AgentAttributes {
                name: "driver",
                tags: &[TypeTag::HumanDriver],
                drives: Some(car),
                model: Model::Entity,
                ..Default::default()
            })
            .unwrap();
        let mut rng = SeededRandom::new(1);
        let next = step(&scene, &[driver, car], &mut rng);
        let driver = next.agent(driver).unwrap();
        let car = next.agent(car).unwrap();
        assert!(car.acceleration() > 0.0);
        assert_approx_eq!(car.acceleration(), driver.acceleration());
        assert_approx_eq!(car.speed(), driver.speed());
        assert!(car.centroid().x > 0.0);
        assert!(!driver.has_body());
    }
}

//! Helpers shared by the scenario tests.

#![allow(dead_code)]

use traffic_scenario::agent::{simulate, DriverModel};
use traffic_scenario::math::Point2d;
use traffic_scenario::{
    AgentAttributes, AgentId, LaneAttributes, LaneId, LaneKind, Model, NoConflicts,
    RandomSource, Scene, Scenery, TypeTag,
};

/// A random source whose uniform draws are fixed by the test.
/// Gaussian draws are always zero and choices always pick the first item.
pub struct ScriptedRandom {
    pub uniform: f64,
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.uniform
    }

    fn gaussian(&mut self, _std_dev: f64) -> f64 {
        0.0
    }

    fn choose_index(&mut self, _len: usize) -> usize {
        0
    }
}

/// Adds a straight lane from `from` to `to`.
pub fn straight_lane(
    scenery: &mut Scenery,
    name: &str,
    kind: LaneKind,
    from: (f64, f64),
    to: (f64, f64),
    width: f64,
) -> LaneId {
    scenery.add_lane(&LaneAttributes {
        name,
        kind,
        centre: &[Point2d::new(from.0, from.1), Point2d::new(to.0, to.1)],
        width,
    })
}

/// Adds a passenger car along with the driver of it, returning the IDs of both.
pub fn add_car(
    scene: &mut Scene,
    name: &str,
    position: (f64, f64),
    yaw: f64,
    speed: f64,
) -> (AgentId, AgentId) {
    let car = scene
        .add_agent(&AgentAttributes {
            name,
            tags: &[TypeTag::PassengerCar],
            position: Some(Point2d::new(position.0, position.1)),
            yaw,
            length: 4.0,
            width: 2.0,
            speed,
            model: Model::Vehicle,
            ..Default::default()
        })
        .unwrap();
    let driver = scene
        .add_agent(&AgentAttributes {
            name: &format!("{name} driver"),
            tags: &[TypeTag::HumanDriver],
            drives: Some(car),
            model: Model::Driver(DriverModel::motorist()),
            ..Default::default()
        })
        .unwrap();
    (car, driver)
}

/// Gets the driver model of an agent.
pub fn driver_model(scene: &Scene, id: AgentId) -> &DriverModel {
    match scene.agent(id).unwrap().model() {
        Model::Driver(model) => model,
        model => panic!("not a driver: {model:?}"),
    }
}

/// Advances every agent of the scene by `dt`, drivers first, drawing from `rng`.
pub fn step_all(scene: &Scene, dt: f64, rng: &mut ScriptedRandom) -> Scene {
    let (mut next, mapping) = scene.successor(dt);
    let (drivers, others): (Vec<_>, Vec<_>) =
        scene.iter_agents().partition(|agent| agent.drives().is_some());
    for agent in drivers.into_iter().chain(others) {
        simulate(scene, &mut next, &mapping, agent.id(), dt, &NoConflicts, rng).unwrap();
    }
    next
}

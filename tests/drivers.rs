//! Scenarios involving drivers of passenger cars.

mod common;

use assert_approx_eq::assert_approx_eq;
use common::{add_car, driver_model, step_all, straight_lane, ScriptedRandom};
use std::rc::Rc;
use traffic_scenario::agent::{DriverSpeedMode, DrivingMode, RELEVANT_LOWEST_SPEED};
use traffic_scenario::math::{Point2d, Polygon};
use traffic_scenario::{
    AgentAttributes, ConflictCandidate, LaneKind, Model, RecordedConflicts, Scene, Scenery,
    Simulation, TurnSignal, TypeTag,
};

/// Test that speed and yaw stay in range, and that a stationary agent has no controls applied.
#[test]
fn kinematic_invariants() {
    let mut scenery = Scenery::new();
    straight_lane(&mut scenery, "lane", LaneKind::Driveable, (0.0, 0.0), (60.0, 0.0), 3.5);
    let mut scene = Scene::new(Rc::new(scenery));
    add_car(&mut scene, "car", (10.0, 0.0), 0.0, 5.0);
    add_car(&mut scene, "parked", (40.0, 20.0), 135.0, 2.0);
    scene
        .add_agent(&AgentAttributes {
            name: "walker",
            tags: &[TypeTag::Pedestrian],
            position: Some(Point2d::new(5.0, 5.0)),
            yaw: 350.0,
            length: 0.5,
            width: 0.5,
            ..Default::default()
        })
        .unwrap();

    let mut sim = Simulation::new(scene, 7);
    for _ in 0..300 {
        sim.step(0.1).unwrap();
        for agent in sim.iter_agents() {
            assert!(agent.speed() >= 0.0);
            assert!((0.0..360.0).contains(&agent.yaw()));
            if agent.speed() < RELEVANT_LOWEST_SPEED {
                assert_eq!(agent.acceleration(), 0.0);
                assert_eq!(agent.yaw_rate(), 0.0);
            }
        }
    }
    assert_eq!(sim.frame(), 300);
}

/// Test that a driver comes to a stop at the end of a lane with no successors.
#[test]
fn dead_end_comes_to_rest() {
    let mut scenery = Scenery::new();
    straight_lane(&mut scenery, "lane", LaneKind::Driveable, (0.0, 0.0), (30.0, 0.0), 3.5);
    let mut scene = Scene::new(Rc::new(scenery));
    let (car, driver) = add_car(&mut scene, "car", (5.0, 0.0), 0.0, 5.0);

    let mut sim = Simulation::new(scene, 1);
    let mut stopped_at = None;
    for tick in 0..1000 {
        sim.step(0.1).unwrap();
        if sim.get_agent(car).unwrap().speed() == 0.0 {
            stopped_at = Some(tick);
            break;
        }
    }
    assert!(stopped_at.is_some());

    // Once at rest it stays there
    let position = sim.get_agent(car).unwrap().centroid();
    for _ in 0..50 {
        sim.step(0.1).unwrap();
        let model = driver_model(sim.scene(), driver);
        assert_eq!(model.driving_mode(), DrivingMode::DeadEnd);
        assert_eq!(model.speed_mode(), DriverSpeedMode::Stopping);
        let car = sim.get_agent(car).unwrap();
        assert_eq!(car.speed(), 0.0);
        assert_eq!(car.centroid(), position);
    }
    assert!(position.x + 2.0 <= 30.0);
}

/// Test that of two drivers heading for the same point, only the one arriving later yields.
#[test]
fn later_arrival_yields() {
    let mut scenery = Scenery::new();
    straight_lane(&mut scenery, "east", LaneKind::Driveable, (-40.0, 0.0), (40.0, 0.0), 3.5);
    straight_lane(&mut scenery, "north", LaneKind::Driveable, (20.0, -40.0), (20.0, 40.0), 3.5);
    let mut scene = Scene::new(Rc::new(scenery));
    let (car_a, driver_a) = add_car(&mut scene, "a", (0.0, 0.0), 0.0, 5.0);
    let (car_b, driver_b) = add_car(&mut scene, "b", (20.0, -20.0), 90.0, 5.0);

    let point = Point2d::new(20.0, 0.0);
    let mut feed = RecordedConflicts::new();
    feed.record(
        driver_a,
        ConflictCandidate {
            other: car_b,
            time_self: 2.0,
            time_other: 4.0,
            point,
        },
    );
    feed.record(
        driver_b,
        ConflictCandidate {
            other: car_a,
            time_self: 4.0,
            time_other: 2.0,
            point,
        },
    );

    let mut sim = Simulation::new(scene, 3);
    sim.set_conflict_feed(feed);
    let mut prev_speed = 5.0;
    for _ in 0..10 {
        sim.step(0.1).unwrap();
        let a = driver_model(sim.scene(), driver_a);
        let b = driver_model(sim.scene(), driver_b);
        assert_ne!(a.speed_mode(), DriverSpeedMode::Yielding);
        assert!(a.conflict().is_none());
        assert_eq!(b.speed_mode(), DriverSpeedMode::Yielding);
        assert_eq!(b.conflict().map(|c| c.other), Some(car_a));

        let b_car = sim.get_agent(car_b).unwrap();
        assert!(b_car.acceleration() < 0.0);
        assert!(b_car.speed() < prev_speed);
        prev_speed = b_car.speed();
        assert!(sim.get_agent(car_a).unwrap().acceleration() > 0.0);
    }
}

/// Test that a driver turns onto the successor of its lane and signals towards the lane on its left.
#[test]
fn turns_onto_successor() {
    let mut scenery = Scenery::new();
    let a = straight_lane(&mut scenery, "a", LaneKind::Driveable, (0.0, 0.0), (20.0, 0.0), 3.5);
    let b = straight_lane(&mut scenery, "b", LaneKind::Driveable, (26.0, 0.0), (46.0, 20.0), 3.5);
    scenery.add_lane_connection(a, b).unwrap();
    scenery.add_lane_adjacency(b, a).unwrap();
    scenery.add_junction(Polygon::rectangle(Point2d::new(23.0, 0.0), 0.0, 10.0, 8.0));
    let mut scene = Scene::new(Rc::new(scenery));
    let (car, driver) = add_car(&mut scene, "car", (10.0, 0.0), 0.0, 5.0);

    // Every draw is above the chance of giving no signal
    let mut rng = ScriptedRandom { uniform: 0.99 };
    let mut turning = 0;
    let mut finished = false;
    for _ in 0..400 {
        scene = step_all(&scene, 0.1, &mut rng);
        let model = driver_model(&scene, driver);
        let signal = scene.agent(car).unwrap().turn_signal();
        assert_eq!(scene.agent(driver).unwrap().turn_signal(), signal);
        match model.driving_mode() {
            DrivingMode::Turning => {
                assert_eq!(model.next_lane(), Some(b));
                assert_eq!(model.speed_mode(), DriverSpeedMode::Turning);
                assert_eq!(signal, Some(TurnSignal::Left));
                turning += 1;
            }
            DrivingMode::LaneFollowing if turning > 0 => {
                assert_eq!(model.next_lane(), None);
                assert_eq!(signal, None);
                finished = true;
                break;
            }
            mode => {
                assert_eq!(mode, DrivingMode::LaneFollowing);
                assert_eq!(signal, None);
            }
        }
    }
    assert!(turning > 0);
    assert!(finished);

    // More than 40% of the car is on the new lane
    let footprint = scene.agent(car).unwrap().footprint();
    let overlap = scene.scenery().lane(b).unwrap().overlap_with(footprint);
    assert!(overlap / footprint.area() > 0.4);
}

/// Test that a driver keeps yielding while the same agent is predicted, even once the
/// predicted times no longer call for it, and stops as soon as that agent is gone.
#[test]
fn keeps_yielding_to_same_agent() {
    let mut scenery = Scenery::new();
    straight_lane(&mut scenery, "east", LaneKind::Driveable, (-40.0, 0.0), (40.0, 0.0), 3.5);
    straight_lane(&mut scenery, "north", LaneKind::Driveable, (20.0, -40.0), (20.0, 40.0), 3.5);
    let mut scene = Scene::new(Rc::new(scenery));
    let (car_a, _) = add_car(&mut scene, "a", (0.0, 0.0), 0.0, 5.0);
    let (_, driver_b) = add_car(&mut scene, "b", (20.0, -20.0), 90.0, 5.0);

    let point = Point2d::new(20.0, 0.0);
    let first = ConflictCandidate {
        other: car_a,
        time_self: 4.0,
        time_other: 2.0,
        point,
    };
    // Arriving first by a wide margin, which on its own is not worth yielding for
    let later = ConflictCandidate {
        other: car_a,
        time_self: 1.0,
        time_other: 6.0,
        point,
    };
    let feed = |candidate: Option<ConflictCandidate>| {
        let mut feed = RecordedConflicts::new();
        if let Some(candidate) = candidate {
            feed.record(driver_b, candidate);
        }
        feed
    };

    let mut sim = Simulation::new(scene.clone(), 3);
    sim.set_conflict_feed(feed(Some(first)));
    sim.step(0.1).unwrap();
    assert_eq!(driver_model(sim.scene(), driver_b).conflict(), Some(&first));

    sim.set_conflict_feed(feed(Some(later)));
    for _ in 0..3 {
        sim.step(0.1).unwrap();
        let b = driver_model(sim.scene(), driver_b);
        assert_eq!(b.speed_mode(), DriverSpeedMode::Yielding);
        assert_eq!(b.conflict(), Some(&first));
    }

    sim.set_conflict_feed(feed(None));
    sim.step(0.1).unwrap();
    let b = driver_model(sim.scene(), driver_b);
    assert!(b.conflict().is_none());
    assert_eq!(b.speed_mode(), DriverSpeedMode::Unrestricted);

    // Without a conflict already held, the later prediction is not yielded for
    let mut fresh = Simulation::new(scene, 3);
    fresh.set_conflict_feed(feed(Some(later)));
    fresh.step(0.1).unwrap();
    assert!(driver_model(fresh.scene(), driver_b).conflict().is_none());
}

/// Test that a driver brakes as hard as it can when the conflict point is just ahead.
#[test]
fn brakes_hard_close_to_conflict() {
    let yield_at = |point: Point2d| {
        let mut scenery = Scenery::new();
        straight_lane(&mut scenery, "north", LaneKind::Driveable, (20.0, -40.0), (20.0, 40.0), 3.5);
        let mut scene = Scene::new(Rc::new(scenery));
        let other = scene
            .add_agent(&AgentAttributes {
                name: "other",
                tags: &[TypeTag::PassengerCar],
                position: Some(Point2d::new(0.0, 0.0)),
                length: 4.0,
                width: 2.0,
                model: Model::Vehicle,
                ..Default::default()
            })
            .unwrap();
        let (car, driver) = add_car(&mut scene, "car", (20.0, -20.0), 90.0, 1.0);
        let mut feed = RecordedConflicts::new();
        feed.record(
            driver,
            ConflictCandidate {
                other,
                time_self: 4.0,
                time_other: 2.0,
                point,
            },
        );
        let mut sim = Simulation::new(scene, 1);
        sim.set_conflict_feed(feed);
        sim.step(0.1).unwrap();
        assert_eq!(
            driver_model(sim.scene(), driver).speed_mode(),
            DriverSpeedMode::Yielding
        );
        sim.get_agent(car).unwrap().acceleration()
    };

    // 2 m beyond the front leaves less room than the car is long
    assert_eq!(yield_at(Point2d::new(20.0, -16.0)), -8.0);
    // Far away, the car eases towards its usual target 2 m ahead
    assert_approx_eq!(yield_at(Point2d::new(20.0, 10.0)), -0.5);
}

/// Test that a driver behind a slower vehicle never speeds up while faster than it.
#[test]
fn follows_slower_lead() {
    let mut scenery = Scenery::new();
    straight_lane(&mut scenery, "lane", LaneKind::Driveable, (0.0, 0.0), (200.0, 0.0), 3.5);
    let mut scene = Scene::new(Rc::new(scenery));
    let (follower, driver) = add_car(&mut scene, "follower", (10.0, 0.0), 0.0, 8.0);
    let lead = scene
        .add_agent(&AgentAttributes {
            name: "lead",
            tags: &[TypeTag::PassengerCar],
            position: Some(Point2d::new(30.0, 0.0)),
            length: 4.0,
            width: 2.0,
            speed: 3.0,
            model: Model::Vehicle,
            ..Default::default()
        })
        .unwrap();

    let mut sim = Simulation::new(scene, 5);
    for _ in 0..100 {
        let speed = sim.get_agent(follower).unwrap().speed();
        let lead_speed = sim.get_agent(lead).unwrap().speed();
        sim.step(0.1).unwrap();
        if speed > lead_speed + 1e-9 {
            assert_eq!(
                driver_model(sim.scene(), driver).speed_mode(),
                DriverSpeedMode::Following
            );
            assert!(sim.get_agent(follower).unwrap().acceleration() <= 0.0);
        }
        let gap = sim
            .get_agent(follower)
            .unwrap()
            .footprint()
            .distance(sim.get_agent(lead).unwrap().footprint());
        assert!(gap > 0.0);
    }
}

/// Test that a driver off the road brakes at its maximum deceleration down to exactly zero.
#[test]
fn stops_off_road() {
    let mut scene = Scene::new(Rc::new(Scenery::new()));
    let (car, driver) = add_car(&mut scene, "car", (0.0, 0.0), 0.0, 10.0);

    let mut sim = Simulation::new(scene, 9);
    let mut ticks = 0;
    while sim.get_agent(car).unwrap().speed() > 0.0 {
        sim.step(0.1).unwrap();
        ticks += 1;
        assert!(ticks <= 20);
        let car = sim.get_agent(car).unwrap();
        assert!(car.speed() >= 0.0);
        if car.speed() > 0.0 {
            assert!(car.acceleration() < 0.0);
            assert!(car.acceleration() >= -8.0);
        }
        assert_eq!(
            driver_model(sim.scene(), driver).speed_mode(),
            DriverSpeedMode::Stopping
        );
    }
    let car = sim.get_agent(car).unwrap();
    assert_eq!(car.speed(), 0.0);
    assert_eq!(car.acceleration(), 0.0);
    assert_eq!(car.yaw_rate(), 0.0);
}

/// Test that the same seed reproduces the same scenario.
#[test]
fn same_seed_same_scenes() {
    let build = || {
        let mut scenery = Scenery::new();
        let a = straight_lane(&mut scenery, "a", LaneKind::Driveable, (0.0, 0.0), (20.0, 0.0), 3.5);
        let b = straight_lane(&mut scenery, "b", LaneKind::Driveable, (20.0, 0.0), (40.0, 10.0), 3.5);
        let c = straight_lane(&mut scenery, "c", LaneKind::Driveable, (20.0, 0.0), (40.0, -10.0), 3.5);
        scenery.add_lane_connection(a, b).unwrap();
        scenery.add_lane_connection(a, c).unwrap();
        let mut scene = Scene::new(Rc::new(scenery));
        add_car(&mut scene, "one", (4.0, 0.0), 0.0, 4.0);
        add_car(&mut scene, "two", (-6.0, 0.0), 0.0, 6.0);
        Simulation::new(scene, 42)
    };

    let mut first = build();
    let mut second = build();
    for _ in 0..150 {
        first.step(0.1).unwrap();
        second.step(0.1).unwrap();
        for (a, b) in first.iter_agents().zip(second.iter_agents()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.footprint(), b.footprint());
            assert_eq!(a.speed(), b.speed());
            assert_eq!(a.yaw(), b.yaw());
            assert_eq!(a.turn_signal(), b.turn_signal());
        }
    }
}

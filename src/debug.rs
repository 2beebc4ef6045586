//! Per-frame record of what each agent decided, for inspecting a run.

use crate::agent::Model;
use crate::math::{Disc, Point2d};
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[cfg(feature = "debug")]
fn push(entry: serde_json::Value) {
    DEBUG_FRAME.with(|frame| frame.borrow_mut().push(entry))
}

/// The modes an agent's model is in, most significant first.
#[cfg(feature = "debug")]
fn modes(model: &Model) -> Vec<String> {
    match model {
        Model::Entity => vec![],
        Model::Vehicle => vec![],
        Model::Driver(driver) => vec![
            format!("{:?}", driver.driving_mode()),
            format!("{:?}", driver.speed_mode()),
        ],
        Model::Cyclist(cyclist) => vec![
            format!("{:?}", cyclist.driver().driving_mode()),
            format!("{:?}", cyclist.driver().speed_mode()),
        ],
        Model::Pedestrian(pedestrian) => vec![
            format!("{:?}", pedestrian.walking_mode()),
            format!("{:?}", pedestrian.speed_mode()),
        ],
    }
}

/// Records an agent's new modes along with the target it steers for.
#[allow(unused)]
pub fn debug_decision(
    name: &str,
    model: &Model,
    from: Point2d,
    target: Point2d,
    target_speed: Option<f64>,
) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "decision",
        "name": name,
        "modes": modes(model),
        "from": [from.x, from.y],
        "target": [target.x, target.y],
        "target_speed": target_speed,
    }))
}

/// Records the point a driver holds back from while yielding.
#[allow(unused)]
pub fn debug_yield(name: &str, point: Point2d) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "yield",
        "name": name,
        "point": [point.x, point.y],
    }))
}

/// Records the area a pedestrian is crossing the road to.
#[allow(unused)]
pub fn debug_crossing(name: &str, target: &Disc) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "crossing",
        "name": name,
        "centre": [target.centre.x, target.centre.y],
        "radius": target.radius,
    }))
}

/// Drains everything recorded since the last call, labelled with the frame it belongs to.
#[cfg(feature = "debug")]
pub fn take_debug_frame(frame: usize) -> serde_json::Value {
    let entries = DEBUG_FRAME.with(|entries| entries.take());
    json!({ "frame": frame, "entries": entries })
}

#[cfg(all(test, feature = "debug"))]
mod test {
    use super::*;
    use crate::agent::PedestrianModel;

    #[test]
    fn frame_drains_entries() {
        let model = Model::Pedestrian(PedestrianModel::default());
        let origin = Point2d::new(0.0, 0.0);
        debug_decision("walker", &model, origin, Point2d::new(1.0, 0.0), Some(1.4));
        debug_crossing("walker", &Disc::new(Point2d::new(0.0, 6.0), 0.5));

        let frame = take_debug_frame(3);
        assert_eq!(frame["frame"], 3);
        assert_eq!(frame["entries"][0]["type"], "decision");
        assert_eq!(
            frame["entries"][0]["modes"],
            json!(["UnrestrictedWalking", "Unrestricted"])
        );
        assert_eq!(frame["entries"][1]["type"], "crossing");
        assert_eq!(frame["entries"][1]["radius"], 0.5);

        assert_eq!(take_debug_frame(4)["entries"], json!([]));
    }
}

//! Capability bounds resolved from an agent's type tags.

use smallvec::SmallVec;
use std::collections::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A label describing what kind of entity an agent is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeTag {
    DynamicalObject,
    Human,
    Pedestrian,
    Driver,
    HumanDriver,
    AutomatedDrivingFunction,
    Bicyclist,
    Vehicle,
    PassengerCar,
    Truck,
    Bicycle,
    /// A static or slow obstacle placed on the road, such as road works equipment.
    Obstacle,
}

/// A set of type tags.
pub type TypeTags = SmallVec<[TypeTag; 4]>;

/// One of the kinematic limits of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    MaxSpeed,
    MaxAcceleration,
    MaxDeceleration,
    MaxYawRate,
}

/// Capability values declared on a single type tag. Undeclared values are inherited.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeclaredCapabilities {
    /// Maximum speed in m/s.
    pub max_speed: Option<f64>,
    /// Maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: Option<f64>,
    /// Maximum deceleration, a negative number in m/s<sup>2</sup>.
    pub max_deceleration: Option<f64>,
    /// Maximum yaw rate in degrees/s.
    pub max_yaw_rate: Option<f64>,
}

/// The resolved kinematic limits of an agent. Unresolvable limits are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Capabilities {
    pub max_speed: f64,
    pub max_acceleration: f64,
    pub max_deceleration: f64,
    pub max_yaw_rate: f64,
}

/// The type hierarchy of agents, and the capabilities declared on each type.
#[derive(Clone, Debug)]
pub struct TypeLattice {
    parents: HashMap<TypeTag, TypeTags>,
    declared: HashMap<TypeTag, DeclaredCapabilities>,
}

impl Capability {
    fn declared(self, caps: &DeclaredCapabilities) -> Option<f64> {
        match self {
            Capability::MaxSpeed => caps.max_speed,
            Capability::MaxAcceleration => caps.max_acceleration,
            Capability::MaxDeceleration => caps.max_deceleration,
            Capability::MaxYawRate => caps.max_yaw_rate,
        }
    }

    /// Combines the declared values into the governing one:
    /// the lowest deceleration, and the highest of everything else.
    fn combine(self, values: impl Iterator<Item = f64>) -> Option<f64> {
        match self {
            Capability::MaxDeceleration => values.reduce(f64::min),
            _ => values.reduce(f64::max),
        }
    }
}

impl TypeLattice {
    /// Creates a lattice with no types.
    pub fn empty() -> Self {
        Self {
            parents: HashMap::new(),
            declared: HashMap::new(),
        }
    }

    /// Records that `tag` is a kind of `parent`.
    pub fn add_parent(&mut self, tag: TypeTag, parent: TypeTag) -> &mut Self {
        let parents = self.parents.entry(tag).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        self
    }

    /// Declares capability values on a type.
    pub fn declare(&mut self, tag: TypeTag, caps: DeclaredCapabilities) -> &mut Self {
        self.declared.insert(tag, caps);
        self
    }

    /// The given tags together with all of their ancestors, in breadth-first order.
    pub fn ancestors(&self, tags: &[TypeTag]) -> TypeTags {
        let mut out: TypeTags = SmallVec::new();
        let mut idx = 0;
        out.extend(tags.iter().copied());
        while idx < out.len() {
            if let Some(parents) = self.parents.get(&out[idx]) {
                for parent in parents {
                    if !out.contains(parent) {
                        out.push(*parent);
                    }
                }
            }
            idx += 1;
        }
        out
    }

    /// Whether an entity with the given tags is (transitively) of type `tag`.
    pub fn is_a(&self, tags: &[TypeTag], tag: TypeTag) -> bool {
        self.ancestors(tags).contains(&tag)
    }

    /// Whether an entity with the given tags is of any of the types in `of`.
    pub fn is_any(&self, tags: &[TypeTag], of: &[TypeTag]) -> bool {
        self.ancestors(tags).iter().any(|tag| of.contains(tag))
    }

    fn combined(&self, tags: &[TypeTag], cap: Capability) -> Option<f64> {
        cap.combine(
            tags.iter()
                .filter_map(|tag| self.declared.get(tag))
                .filter_map(|caps| cap.declared(caps)),
        )
    }

    /// Resolves a single capability: values declared directly on the agent's tags win,
    /// then values inherited through its ancestors, then those of the vehicle it drives.
    pub fn resolve_one(
        &self,
        tags: &[TypeTag],
        vehicle_tags: Option<&[TypeTag]>,
        cap: Capability,
    ) -> f64 {
        self.combined(tags, cap)
            .or_else(|| self.combined(&self.ancestors(tags), cap))
            .or_else(|| vehicle_tags.and_then(|tags| self.combined(&self.ancestors(tags), cap)))
            .unwrap_or(0.0)
    }

    /// Resolves all capabilities of an agent.
    pub fn resolve(&self, tags: &[TypeTag], vehicle_tags: Option<&[TypeTag]>) -> Capabilities {
        let get = |cap| self.resolve_one(tags, vehicle_tags, cap);
        Capabilities {
            max_speed: get(Capability::MaxSpeed),
            max_acceleration: get(Capability::MaxAcceleration),
            max_deceleration: get(Capability::MaxDeceleration),
            max_yaw_rate: get(Capability::MaxYawRate),
        }
    }
}

impl Default for TypeLattice {
    /// The standard road user hierarchy. Drivers declare nothing themselves,
    /// so their limits come from the vehicle they drive.
    fn default() -> Self {
        use TypeTag::*;
        let mut lattice = Self::empty();
        lattice
            .add_parent(Human, DynamicalObject)
            .add_parent(Pedestrian, Human)
            .add_parent(Driver, DynamicalObject)
            .add_parent(HumanDriver, Driver)
            .add_parent(HumanDriver, Human)
            .add_parent(AutomatedDrivingFunction, Driver)
            .add_parent(Bicyclist, HumanDriver)
            .add_parent(Vehicle, DynamicalObject)
            .add_parent(PassengerCar, Vehicle)
            .add_parent(Truck, Vehicle)
            .add_parent(Bicycle, Vehicle)
            .add_parent(Obstacle, DynamicalObject);
        lattice
            .declare(
                Pedestrian,
                DeclaredCapabilities {
                    max_speed: Some(1.4),
                    max_acceleration: Some(1.0),
                    max_deceleration: Some(-2.0),
                    max_yaw_rate: Some(120.0),
                },
            )
            .declare(
                PassengerCar,
                DeclaredCapabilities {
                    max_speed: Some(14.0),
                    max_acceleration: Some(3.0),
                    max_deceleration: Some(-8.0),
                    max_yaw_rate: Some(40.0),
                },
            )
            .declare(
                Truck,
                DeclaredCapabilities {
                    max_speed: Some(11.0),
                    max_acceleration: Some(1.5),
                    max_deceleration: Some(-6.0),
                    max_yaw_rate: Some(25.0),
                },
            )
            .declare(
                Bicycle,
                DeclaredCapabilities {
                    max_speed: Some(7.0),
                    max_acceleration: Some(1.5),
                    max_deceleration: Some(-4.0),
                    max_yaw_rate: Some(60.0),
                },
            );
        lattice
    }
}

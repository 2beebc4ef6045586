pub use agent::{Model, TurnSignal};
pub use capability::{Capabilities, Capability, DeclaredCapabilities, TypeLattice, TypeTag};
pub use cgmath;
pub use conflict::{ConflictCandidate, ConflictFeed, NoConflicts, RecordedConflicts, CONFLICT_STEP};
pub use error::{SimError, SimResult};
pub use random::{RandomSource, SeededRandom};
pub use scene::{Agent, AgentAttributes, Scene, TickMapping};
pub use scenery::{Junction, Lane, LaneAttributes, LaneKind, Road, Scenery};
pub use simulation::Simulation;
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use util::Interval;

pub mod agent;
mod capability;
mod conflict;
mod debug;
mod error;
pub mod math;
mod random;
mod scene;
mod scenery;
mod simulation;
mod util;

new_key_type! {
    /// Unique ID of an [Agent].
    pub struct AgentId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Junction].
    pub struct JunctionId;
}

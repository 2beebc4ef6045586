//! Simulation error type.

use crate::{AgentId, LaneId};
use thiserror::Error;

/// Errors raised while simulating a tick.
///
/// Reaching an undefined mode signals a defect in a state machine and aborts
/// the run; it is never silently defaulted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("agent {0:?} is in an undefined driving mode")]
    UndefinedDrivingMode(AgentId),

    #[error("agent {0:?} is in an undefined speed mode")]
    UndefinedSpeedMode(AgentId),

    #[error("agent {0:?} does not exist in the scene")]
    UnknownAgent(AgentId),

    #[error("agent {0:?} has no counterpart in the next scene")]
    UnmappedAgent(AgentId),

    #[error("lane {0:?} does not exist in the scenery")]
    UnknownLane(LaneId),
}

/// Shorthand result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

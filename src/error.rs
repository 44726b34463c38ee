//! Errors raised by event scheduling and simulation execution.

use thiserror::Error;

use crate::component::Id;
use crate::event::EventId;

pub use crate::expr::{EvalError, SyntaxError};
pub use crate::par::{ParError, ParErrorKind};

/// Errors raised by the future event set and by scheduling calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// Extraction from an empty future event set.
    #[error("Future event set is empty")]
    Empty,

    /// Attempt to schedule an event before the current simulation time.
    #[error("Cannot schedule event {event} at time {time} which is before the current time {now}")]
    Causality {
        /// Event being scheduled.
        event: EventId,
        /// Requested due time.
        time: f64,
        /// Current simulation time.
        now: f64,
    },

    /// Due time is NaN or infinite.
    #[error("Invalid due time {time} for event {event}")]
    InvalidTime {
        /// Event being scheduled.
        event: EventId,
        /// Requested due time.
        time: f64,
    },

    /// Event with the same id is already pending.
    #[error("Event {event} is already in the future event set")]
    AlreadyPending {
        /// Event being scheduled.
        event: EventId,
    },
}

/// Errors propagated by the simulation driver to its caller.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Event handler of a component failed.
    #[error("Handler of component {component_name} ({component}) failed on event {event} at time {time}: {source}")]
    Handler {
        /// Event which was being processed.
        event: EventId,
        /// Simulation time of the failure.
        time: f64,
        /// Destination component.
        component: Id,
        /// Name of destination component.
        component_name: String,
        /// Error returned by the handler.
        #[source]
        source: anyhow::Error,
    },
}

impl SimulationError {
    /// Returns the identifier of the failing event.
    pub fn event(&self) -> EventId {
        match self {
            SimulationError::Handler { event, .. } => *event,
        }
    }
}

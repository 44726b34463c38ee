//! Event handling.

use crate::event::Event;

/// Result returned by event handlers.
///
/// An error returned by a handler stops the simulation step and is propagated to the caller of the driver as
/// [`SimulationError::Handler`](crate::error::SimulationError::Handler).
pub type HandlerResult = anyhow::Result<()>;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    ///
    /// This is the main entry point for all incoming events. This method is called by the simulation driver to
    /// deliver an event addressed to the component. The implementation typically matches the event payload type
    /// with [`cast!`](crate::cast) and calls the corresponding handling logic.
    fn on(&mut self, event: Event) -> HandlerResult;
}

/// Enables the use of pattern matching syntax for processing different types of events by downcasting the event
/// payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Each arm evaluates to `()`, so handlers use `?` inside the arms and return `Ok(())` after the macro. Events
/// with a payload type not listed in the arms are logged with
/// [`log_unhandled_event`](crate::log::log_unhandled_event).
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use evsim::{cast, Event, EventHandler, HandlerResult, Simulation, SimulationContext};
///
/// #[derive(Clone, Serialize)]
/// pub struct SomeEvent {
///     some_field: u32,
/// }
///
/// #[derive(Clone, Serialize)]
/// pub struct AnotherEvent {
///     another_field: f64,
/// }
///
/// pub struct Component {
///     ctx: SimulationContext,
/// }
///
/// impl EventHandler for Component {
///     fn on(&mut self, event: Event) -> HandlerResult {
///         cast!(match event.data {
///             SomeEvent { some_field } => {
///                 assert_eq!(some_field, 16);
///             }
///             AnotherEvent { another_field } => {
///                 assert_eq!(another_field, 1.6);
///             }
///         });
///         Ok(())
///     }
/// }
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => $result:expr $(,)?)+ } ) => {
        match $event.data {
            $(
                data if data.is::<$type>() => {
                    if let Ok(__value) = data.downcast::<$type>() {
                        let $type { $($tt)* } = *__value;
                        $result;
                    }
                }
            )+
            _ => $crate::log::log_unhandled_event($event)
        }
    }
}

/// Defines which pending events are cancelled when a component handler is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCancellationPolicy {
    /// Cancel events addressed to the component.
    Incoming,
    /// Cancel events emitted by the component.
    Outgoing,
    /// Cancel both incoming and outgoing events.
    All,
    /// Keep all pending events.
    None,
}

impl EventCancellationPolicy {
    pub(crate) fn matches(&self, event: &Event, id: crate::component::Id) -> bool {
        match self {
            EventCancellationPolicy::Incoming => event.dst == id,
            EventCancellationPolicy::Outgoing => event.src == id,
            EventCancellationPolicy::All => event.src == id || event.dst == id,
            EventCancellationPolicy::None => false,
        }
    }
}

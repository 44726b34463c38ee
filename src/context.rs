//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::error::ScheduleError;
use crate::event::{Event, EventData, EventId};
use crate::log::log_debug_event;
use crate::state::SimulationState;

/// A facade for accessing the simulation state and producing events from simulation components.
#[derive(Clone)]
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        sim_state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
            names,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Returns a handle for drawing numbers from the simulation-wide random number generator.
    ///
    /// The handle is used by parameter sets to evaluate random functions such as `uniform(a, b)`.
    pub fn random_source(&self) -> RandomSource {
        RandomSource {
            sim_state: self.sim_state.clone(),
        }
    }

    /// Returns the identifier of event which is currently processed, if any.
    ///
    /// Events emitted while processing an event record it as their cause.
    pub fn current_event(&self) -> Option<EventId> {
        self.sim_state.borrow().current_event()
    }

    /// Creates new event with specified payload, destination and delay, returns event id.
    ///
    /// # Panics
    ///
    /// Panics if the delay is negative or the resulting time is not finite.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use evsim::Simulation;
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp1_ctx = sim.create_context("comp1");
    /// let comp2_ctx = sim.create_context("comp2");
    /// let event1 = comp1_ctx.emit(SomeEvent{}, comp2_ctx.id(), 1.0);
    /// let event2 = comp2_ctx.emit(SomeEvent{}, comp1_ctx.id(), 1.0);
    /// assert_eq!(event1, 0);
    /// assert_eq!(event2, 1);
    /// ```
    pub fn emit<T>(&self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.emit_with_priority(data, dst, delay, 0)
    }

    /// Creates new event with specified payload, destination, delay and priority, returns event id.
    ///
    /// At equal time, events with lower priority value are processed first.
    ///
    /// # Panics
    ///
    /// Panics if the delay is negative or the resulting time is not finite.
    pub fn emit_with_priority<T>(&self, data: T, dst: Id, delay: f64, priority: i32) -> EventId
    where
        T: EventData,
    {
        self.sim_state
            .borrow_mut()
            .add_event(data, self.id, dst, delay, priority)
            .unwrap_or_else(|err| panic!("{}", err))
    }

    /// Creates new immediate (zero-delay) event with specified payload and destination, returns event id.
    pub fn emit_now<T>(&self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.emit(data, dst, 0.)
    }

    /// Creates new event for itself with specified payload and delay, returns event id.
    pub fn emit_self<T>(&self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, delay)
    }

    /// Creates new immediate event for itself with specified payload, returns event id.
    pub fn emit_self_now<T>(&self, data: T) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, 0.)
    }

    /// Creates new event with specified payload, source, destination and delay, returns event id.
    ///
    /// This is an extended version of [`emit`](Self::emit) for special cases when the event should be emitted on
    /// behalf of another component.
    pub fn emit_as<T>(&self, data: T, src: Id, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state
            .borrow_mut()
            .add_event(data, src, dst, delay, 0)
            .unwrap_or_else(|err| panic!("{}", err))
    }

    /// Cancels the specified event.
    ///
    /// Cancelling an event which was already processed or cancelled does nothing.
    pub fn cancel_event(&self, id: EventId) {
        if let Some(event) = self.sim_state.borrow_mut().cancel_event(id) {
            log_debug_event(&event, "cancelled");
        }
    }

    /// Cancels pending events that satisfy the given predicate function.
    pub fn cancel_events<F>(&self, pred: F)
    where
        F: FnMut(&Event) -> bool,
    {
        for event in self.sim_state.borrow_mut().cancel_events(pred) {
            log_debug_event(&event, "cancelled");
        }
    }

    /// Moves a pending event to a new delay (relative to the current time) and priority.
    ///
    /// The event is ordered after all events already scheduled with the same time and priority. Returns `false`
    /// if the event is no longer pending.
    pub fn reschedule_event(&self, id: EventId, delay: f64, priority: i32) -> Result<bool, ScheduleError> {
        let mut state = self.sim_state.borrow_mut();
        let moved = state.reschedule_event(id, delay, priority)?;
        if let Some(event) = state.get_event(id) {
            log_debug_event(event, "rescheduled");
        }
        Ok(moved)
    }

    /// Puts a previously delivered event back into the future event set after the given delay.
    ///
    /// The event keeps its identifier and payload, receives a new priority and insertion sequence, and records
    /// the currently processed event as its cause. Fails with [`ScheduleError::Causality`] for a negative delay
    /// and with [`ScheduleError::AlreadyPending`] if an event with the same id is still pending.
    pub fn reschedule_extracted(&self, event: Event, delay: f64, priority: i32) -> Result<(), ScheduleError> {
        self.sim_state
            .borrow_mut()
            .reinsert_event(event, delay, priority)
            .map(|_| ())
    }

    /// Returns true if the specified event is still pending.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.sim_state.borrow().is_pending(id)
    }

    /// Requests the simulation driver to stop before processing the next event.
    pub fn halt(&self) {
        self.sim_state.borrow_mut().request_halt();
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }
}

/// Shared handle to the simulation-wide random number generator.
#[derive(Clone)]
pub struct RandomSource {
    sim_state: Rc<RefCell<SimulationState>>,
}

impl RandomSource {
    /// Returns a random float in the range _[0, 1)_.
    pub fn next_f64(&self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }
}

//! Simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rustc_hash::FxHashMap;

use crate::component::Id;
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::event::{Event, EventId};
use crate::handler::{EventCancellationPolicy, EventHandler};
use crate::log::{log_debug_event, log_dispatch, log_undelivered_event};
use crate::state::{SimulationState, EPSILON};

/// Reason why [`Simulation::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// There are no pending events.
    NoEvents,
    /// The next pending event is after the configured end time.
    EndTimeReached,
    /// The configured number of processed events was reached.
    EventLimitReached,
    /// A halt was requested by a component or by the caller.
    Halted,
}

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The simulation driver repeatedly extracts the next event from the future event set, advances the simulation
/// clock to the event time and dispatches the event to the handler of its destination component. Handlers run to
/// completion before the next event is selected.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: FxHashMap<String, Id>,
    names: Rc<RefCell<Vec<String>>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
    end_time: Option<f64>,
    event_limit: Option<u64>,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            name_to_id: FxHashMap::default(),
            names: Rc::new(RefCell::new(Vec::new())),
            handlers: Vec::new(),
            end_time: None,
            event_limit: None,
        }
    }

    /// Creates a new simulation using the seed and the stopping conditions from the configuration.
    pub fn with_config(config: &SimulationConfig) -> Self {
        let mut sim = Self::new(config.seed);
        sim.end_time = config.end_time;
        sim.event_limit = config.event_limit;
        sim
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.name_to_id.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.borrow_mut().push(name.to_owned());
        self.handlers.push(None);
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// # Panics
    ///
    /// Panics if there is no component with such name.
    pub fn lookup_id(&self, name: &str) -> Id {
        *self
            .name_to_id
            .get(name)
            .unwrap_or_else(|| panic!("Component {} is not found", name))
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    /// Creates a new simulation context with specified name.
    ///
    /// The context is bound to a component with this name, which is registered if needed.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let id = self.register(name);
        SimulationContext::new(id, name, self.sim_state.clone(), self.names.clone())
    }

    /// Registers the event handler implementation for component with specified name, returns the component id.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for this component.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        let slot = &mut self.handlers[id as usize];
        assert!(slot.is_none(), "Handler for component {} is already registered", name.as_ref());
        *slot = Some(handler);
        id
    }

    /// Removes the event handler of component with specified name and cancels its events according to the policy.
    pub fn remove_handler<S>(&mut self, name: S, cancel_policy: EventCancellationPolicy)
    where
        S: AsRef<str>,
    {
        let id = self.lookup_id(name.as_ref());
        self.handlers[id as usize] = None;
        self.cancel_events(|e| cancel_policy.matches(e, id));
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Returns the number of events delivered so far.
    pub fn processed_count(&self) -> u64 {
        self.sim_state.borrow().processed_count()
    }

    /// Returns the number of pending events.
    pub fn pending_events(&self) -> usize {
        self.sim_state.borrow().pending_events()
    }

    /// Returns the time of the next pending event.
    pub fn next_event_time(&self) -> Option<f64> {
        self.sim_state.borrow().peek_event().map(|e| e.time)
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Cancels pending events that satisfy the given predicate function.
    pub fn cancel_events<F>(&mut self, pred: F)
    where
        F: FnMut(&Event) -> bool,
    {
        for event in self.sim_state.borrow_mut().cancel_events(pred) {
            log_debug_event(&event, "cancelled");
        }
    }

    /// Cancels the specified event. Does nothing if the event is not pending.
    pub fn cancel_event(&mut self, id: EventId) {
        if let Some(event) = self.sim_state.borrow_mut().cancel_event(id) {
            log_debug_event(&event, "cancelled");
        }
    }

    /// Returns a copy of pending events in the order they will be processed.
    pub fn dump_events(&self) -> Vec<Event> {
        self.sim_state.borrow().dump_events()
    }

    /// Requests to stop before processing the next event.
    pub fn halt(&mut self) {
        self.sim_state.borrow_mut().request_halt();
    }

    /// Performs a single step through the simulation.
    ///
    /// Takes the next pending event, advances the simulation time to the event time and dispatches the event to
    /// the handler of its destination component. Returns `Ok(true)` if an event was processed and `Ok(false)` if
    /// there are no pending events. A failure of the handler is returned as [`SimulationError::Handler`].
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        // The state borrow must be released before the handler runs, since handlers emit events through it.
        let next = self.sim_state.borrow_mut().next_event();
        let Some(event) = next else {
            return Ok(false);
        };
        log_dispatch(&event);
        let result = self.dispatch(event);
        self.sim_state.borrow_mut().finish_event();
        result.map(|_| true)
    }

    fn dispatch(&self, event: Event) -> Result<(), SimulationError> {
        let dst = event.dst;
        match self.handlers.get(dst as usize).and_then(|h| h.clone()) {
            Some(handler) => {
                let (id, time) = (event.id, event.time);
                handler
                    .borrow_mut()
                    .on(event)
                    .map_err(|source| SimulationError::Handler {
                        event: id,
                        time,
                        component: dst,
                        component_name: self.lookup_name(dst),
                        source,
                    })
            }
            None => {
                log_undelivered_event(event);
                Ok(())
            }
        }
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, SimulationError> {
        for _ in 0..step_count {
            if !self.step()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) -> Result<(), SimulationError> {
        while self.step()? {}
        Ok(())
    }

    /// Steps through the simulation with duration limit.
    ///
    /// Processes events with time up to the current time plus the duration, then sets the simulation time to the
    /// end of the interval. Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, SimulationError> {
        let end_time = self.time() + duration;
        self.step_until_time(end_time)
    }

    /// Steps through the simulation until the specified time.
    ///
    /// Processes events with time up to the specified time, then sets the simulation time to it. Returns
    /// `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn step_until_time(&mut self, time: f64) -> Result<bool, SimulationError> {
        let mut result = true;
        loop {
            match self.next_event_time() {
                Some(next) if next <= time + EPSILON => {
                    self.step()?;
                }
                Some(_) => break,
                None => {
                    result = false;
                    break;
                }
            }
        }
        let mut state = self.sim_state.borrow_mut();
        if state.time() < time {
            state.set_time(time);
        }
        Ok(result)
    }

    /// Runs the simulation until one of the termination conditions holds.
    ///
    /// The conditions are checked before each extraction: a halt request, the configured event limit, the
    /// configured end time (the next event is after it) and an empty future event set.
    pub fn run(&mut self) -> Result<RunOutcome, SimulationError> {
        loop {
            if self.sim_state.borrow_mut().take_halt_request() {
                return Ok(RunOutcome::Halted);
            }
            if let Some(limit) = self.event_limit {
                if self.processed_count() >= limit {
                    return Ok(RunOutcome::EventLimitReached);
                }
            }
            match (self.next_event_time(), self.end_time) {
                (None, _) => return Ok(RunOutcome::NoEvents),
                (Some(next), Some(end_time)) if next > end_time => {
                    let mut state = self.sim_state.borrow_mut();
                    if state.time() < end_time {
                        state.set_time(end_time);
                    }
                    return Ok(RunOutcome::EndTimeReached);
                }
                _ => {
                    self.step()?;
                }
            }
        }
    }
}

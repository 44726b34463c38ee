use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::component::Id;
use crate::error::ScheduleError;
use crate::event::{Event, EventData, EventId};
use crate::fes::FutureEventSet;

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

pub struct SimulationState {
    clock: f64,
    rand: Pcg64,
    events: FutureEventSet,
    event_count: u64,
    processed_count: u64,
    current_event: Option<EventId>,
    halt_requested: bool,
}

impl SimulationState {
    pub fn new(seed: u64) -> Self {
        Self {
            clock: 0.0,
            rand: Pcg64::seed_from_u64(seed),
            events: FutureEventSet::new(),
            event_count: 0,
            processed_count: 0,
            current_event: None,
            halt_requested: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn set_time(&mut self, time: f64) {
        self.clock = time;
    }

    pub fn rand(&mut self) -> f64 {
        self.rand.gen_range(0.0..1.0)
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    pub fn add_event<T>(&mut self, data: T, src: Id, dst: Id, delay: f64, priority: i32) -> Result<EventId, ScheduleError>
    where
        T: EventData,
    {
        let id = self.event_count;
        let time = self.clock + delay;
        if delay < 0. {
            return Err(ScheduleError::Causality {
                event: id,
                time,
                now: self.clock,
            });
        }
        let event = Event {
            id,
            time,
            priority,
            seq: 0,
            src,
            dst,
            cause: self.current_event,
            data: Box::new(data),
        };
        self.events.insert(event)?;
        self.event_count += 1;
        Ok(id)
    }

    pub fn reinsert_event(&mut self, mut event: Event, delay: f64, priority: i32) -> Result<u64, ScheduleError> {
        let time = self.clock + delay;
        if delay < 0. {
            return Err(ScheduleError::Causality {
                event: event.id,
                time,
                now: self.clock,
            });
        }
        event.time = time;
        event.priority = priority;
        event.cause = self.current_event;
        self.events.insert(event)
    }

    pub fn reschedule_event(&mut self, id: EventId, delay: f64, priority: i32) -> Result<bool, ScheduleError> {
        self.events.reschedule(id, self.clock + delay, priority, self.clock)
    }

    pub fn next_event(&mut self) -> Option<Event> {
        let event = self.events.pop().ok()?;
        self.clock = event.time;
        self.current_event = Some(event.id);
        self.processed_count += 1;
        Some(event)
    }

    pub fn finish_event(&mut self) {
        self.current_event = None;
    }

    pub fn current_event(&self) -> Option<EventId> {
        self.current_event
    }

    pub fn peek_event(&self) -> Option<&Event> {
        self.events.peek()
    }

    pub fn get_event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.events.contains(id)
    }

    pub fn cancel_event(&mut self, id: EventId) -> Option<Event> {
        self.events.remove(id)
    }

    pub fn cancel_events<F>(&mut self, pred: F) -> Vec<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        self.events.remove_where(pred)
    }

    pub fn dump_events(&self) -> Vec<Event> {
        self.events.sorted().into_iter().cloned().collect()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    pub fn request_halt(&mut self) {
        self.halt_requested = true;
    }

    pub fn take_halt_request(&mut self) -> bool {
        std::mem::take(&mut self.halt_requested)
    }
}

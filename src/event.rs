//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::{clone_trait_object, DynClone};
use serde::ser::Serialize;

use crate::component::Id;

/// Event identifier.
pub type EventId = u64;

/// Trait that should be implemented by event payload.
///
/// It is automatically implemented for any type that is `Clone + Serialize + 'static`, so there is no need to
/// implement it manually.
pub trait EventData: Downcast + DynClone + erased_serde::Serialize {}

impl_downcast!(EventData);

clone_trait_object!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + DynClone + 'static> EventData for T {}

/// Ordering key of a pending event.
///
/// Events are ordered by time, then by priority (lower value first), then by insertion sequence, so that events
/// with equal time and priority are delivered in the order they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventKey {
    /// Time at which the event is due.
    pub time: f64,
    /// Event priority, lower value is delivered first at equal time.
    pub priority: i32,
    /// Insertion sequence number assigned by the future event set.
    pub seq: u64,
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Representation of event.
#[derive(Clone)]
pub struct Event {
    /// Unique event identifier.
    ///
    /// Each event emitted within a simulation is assigned a unique identifier. Events are numbered sequentially
    /// starting from 0. The identifier survives re-insertion of the event into the future event set.
    pub id: EventId,
    /// Time of event occurrence.
    pub time: f64,
    /// Event priority. At equal time, events with lower priority value are processed first.
    pub priority: i32,
    /// Insertion sequence number, assigned anew on each insertion into the future event set.
    pub seq: u64,
    /// Identifier of event source.
    pub src: Id,
    /// Identifier of event destination.
    pub dst: Id,
    /// Event that was being processed when this event was emitted, if any.
    pub cause: Option<EventId>,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Event {
    /// Returns the ordering key of the event.
    pub fn key(&self) -> EventKey {
        EventKey {
            time: self.time,
            priority: self.priority,
            seq: self.seq,
        }
    }

    /// Returns the name of the payload type.
    pub fn data_type(&self) -> &str {
        serde_type_name::type_name(&self.data).unwrap_or("unknown")
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("time", &self.time)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("cause", &self.cause)
            .field("data", &self.data_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_orders_by_time_priority_then_sequence() {
        let a = EventKey { time: 1.0, priority: 5, seq: 9 };
        let b = EventKey { time: 2.0, priority: 0, seq: 0 };
        let c = EventKey { time: 1.0, priority: 0, seq: 10 };
        let d = EventKey { time: 1.0, priority: 0, seq: 11 };
        let mut keys = vec![a, b, c, d];
        keys.sort();
        assert_eq!(keys, vec![c, d, a, b]);
    }
}

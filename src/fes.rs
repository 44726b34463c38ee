//! Future event set.

use rustc_hash::FxHashMap;

use crate::error::ScheduleError;
use crate::event::{Event, EventId, EventKey};

/// Ordered collection of pending events.
///
/// Implemented as a binary min-heap over [`EventKey`] with an index from event id to heap slot, which gives
/// O(log n) insertion, extraction, removal and key update, and O(1) access to the next event.
///
/// Every insertion assigns the event a fresh sequence number from a counter that is never reset, so the order of
/// events with equal time and priority is the order of their insertion.
#[derive(Default)]
pub struct FutureEventSet {
    heap: Vec<Event>,
    positions: FxHashMap<EventId, usize>,
    next_seq: u64,
}

impl FutureEventSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if there are no pending events.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns true if the event with given id is pending.
    pub fn contains(&self, id: EventId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Returns the pending event with given id.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.positions.get(&id).map(|&pos| &self.heap[pos])
    }

    /// Inserts an event, assigning it the next insertion sequence number which is returned.
    ///
    /// Fails if the event time is NaN or infinite, or if an event with the same id is already pending.
    pub fn insert(&mut self, mut event: Event) -> Result<u64, ScheduleError> {
        if !event.time.is_finite() {
            return Err(ScheduleError::InvalidTime {
                event: event.id,
                time: event.time,
            });
        }
        if self.positions.contains_key(&event.id) {
            return Err(ScheduleError::AlreadyPending { event: event.id });
        }
        let seq = self.take_seq();
        event.seq = seq;
        let pos = self.heap.len();
        self.positions.insert(event.id, pos);
        self.heap.push(event);
        self.sift_up(pos);
        Ok(seq)
    }

    /// Returns the next event without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.heap.first()
    }

    /// Returns the key of the next event.
    pub fn peek_key(&self) -> Option<EventKey> {
        self.heap.first().map(Event::key)
    }

    /// Removes and returns the next event.
    pub fn pop(&mut self) -> Result<Event, ScheduleError> {
        if self.heap.is_empty() {
            return Err(ScheduleError::Empty);
        }
        Ok(self.remove_at(0))
    }

    /// Removes the pending event with given id.
    ///
    /// Returns `None` if the event is not pending, i.e. it was never inserted, was already extracted or removed.
    pub fn remove(&mut self, id: EventId) -> Option<Event> {
        let pos = *self.positions.get(&id)?;
        Some(self.remove_at(pos))
    }

    /// Moves the pending event with given id to a new time and priority.
    ///
    /// The event gets a fresh insertion sequence number, as if it was removed and inserted again. Returns `false`
    /// if the event is not pending. Fails if `time` is before `now` or is not finite.
    pub fn reschedule(&mut self, id: EventId, time: f64, priority: i32, now: f64) -> Result<bool, ScheduleError> {
        if !time.is_finite() {
            return Err(ScheduleError::InvalidTime { event: id, time });
        }
        if time < now {
            return Err(ScheduleError::Causality { event: id, time, now });
        }
        let Some(&pos) = self.positions.get(&id) else {
            return Ok(false);
        };
        let seq = self.take_seq();
        let event = &mut self.heap[pos];
        event.time = time;
        event.priority = priority;
        event.seq = seq;
        let pos = self.sift_up(pos);
        self.sift_down(pos);
        Ok(true)
    }

    /// Removes all pending events matching the predicate and returns them in key order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        let (mut removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.heap).into_iter().partition(|e| pred(e));
        self.heap = kept;
        self.rebuild();
        removed.sort_by_key(Event::key);
        removed
    }

    /// Returns an iterator over pending events in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.heap.iter()
    }

    /// Returns pending events in the order they would be extracted.
    pub fn sorted(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.heap.iter().collect();
        events.sort_by_key(|e| e.key());
        events
    }

    /// Removes all pending events. The sequence counter is preserved.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.heap[a].key() < self.heap[b].key()
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].id, a);
        self.positions.insert(self.heap[b].id, b);
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) { right } else { left };
            if !self.less(child, pos) {
                break;
            }
            self.swap(child, pos);
            pos = child;
        }
        pos
    }

    fn remove_at(&mut self, pos: usize) -> Event {
        let event = self.heap.swap_remove(pos);
        self.positions.remove(&event.id);
        if pos < self.heap.len() {
            self.positions.insert(self.heap[pos].id, pos);
            let pos = self.sift_up(pos);
            self.sift_down(pos);
        }
        event
    }

    fn rebuild(&mut self) {
        self.positions.clear();
        for (pos, event) in self.heap.iter().enumerate() {
            self.positions.insert(event.id, pos);
        }
        for pos in (0..self.heap.len() / 2).rev() {
            self.sift_down(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: EventId, time: f64, priority: i32) -> Event {
        Event {
            id,
            time,
            priority,
            seq: 0,
            src: 0,
            dst: 0,
            cause: None,
            data: Box::new(()),
        }
    }

    fn assert_heap(fes: &FutureEventSet) {
        for (pos, e) in fes.heap.iter().enumerate() {
            assert_eq!(fes.positions[&e.id], pos);
            if pos > 0 {
                assert!(fes.heap[(pos - 1) / 2].key() < e.key());
            }
        }
        assert_eq!(fes.positions.len(), fes.heap.len());
    }

    fn drain(fes: &mut FutureEventSet) -> Vec<EventId> {
        let mut ids = Vec::new();
        while let Ok(e) = fes.pop() {
            ids.push(e.id);
        }
        ids
    }

    #[test]
    fn pop_respects_time_then_priority_then_fifo() {
        let mut fes = FutureEventSet::new();
        fes.insert(event(0, 5.0, 0)).unwrap();
        fes.insert(event(1, 3.0, 0)).unwrap();
        fes.insert(event(2, 3.0, 1)).unwrap();
        fes.insert(event(3, 7.0, 0)).unwrap();
        fes.insert(event(4, 3.0, 0)).unwrap();
        assert_heap(&fes);
        assert_eq!(drain(&mut fes), vec![1, 4, 2, 0, 3]);
    }

    #[test]
    fn pop_on_empty_set_fails() {
        let mut fes = FutureEventSet::new();
        assert_eq!(fes.pop().unwrap_err(), ScheduleError::Empty);
        assert!(fes.peek().is_none());
    }

    #[test]
    fn remove_keeps_heap_consistent() {
        let mut fes = FutureEventSet::new();
        for id in 0..32 {
            fes.insert(event(id, ((id * 7) % 11) as f64, (id % 3) as i32)).unwrap();
        }
        for id in (0..32).step_by(3) {
            assert_eq!(fes.remove(id).map(|e| e.id), Some(id));
            assert_heap(&fes);
        }
        assert!(fes.remove(0).is_none());
        assert!(fes.remove(1000).is_none());
        let ids = drain(&mut fes);
        assert_eq!(ids.len(), 32 - 11);
    }

    #[test]
    fn reschedule_moves_event_and_assigns_fresh_sequence() {
        let mut fes = FutureEventSet::new();
        fes.insert(event(0, 1.0, 0)).unwrap();
        fes.insert(event(1, 2.0, 0)).unwrap();
        fes.insert(event(2, 2.0, 0)).unwrap();
        assert!(fes.reschedule(0, 2.0, 0, 0.5).unwrap());
        assert_heap(&fes);
        assert_eq!(drain(&mut fes), vec![1, 2, 0]);
    }

    #[test]
    fn reschedule_into_past_fails() {
        let mut fes = FutureEventSet::new();
        fes.insert(event(0, 10.0, 0)).unwrap();
        let err = fes.reschedule(0, 4.0, 0, 5.0).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::Causality {
                event: 0,
                time: 4.0,
                now: 5.0
            }
        );
        assert_eq!(fes.peek_key().map(|k| k.time), Some(10.0));
        assert!(!fes.reschedule(7, 6.0, 0, 5.0).unwrap());
    }

    #[test]
    fn insert_rejects_nan_time() {
        let mut fes = FutureEventSet::new();
        assert!(matches!(
            fes.insert(event(0, f64::NAN, 0)),
            Err(ScheduleError::InvalidTime { event: 0, .. })
        ));
        assert!(fes.is_empty());
    }

    #[test]
    fn insert_rejects_pending_id() {
        let mut fes = FutureEventSet::new();
        fes.insert(event(3, 1.0, 0)).unwrap();
        assert_eq!(
            fes.insert(event(3, 2.0, 0)).unwrap_err(),
            ScheduleError::AlreadyPending { event: 3 }
        );
        assert_eq!(fes.len(), 1);
        assert_eq!(fes.peek_key().map(|k| k.time), Some(1.0));
    }

    #[test]
    fn remove_where_rebuilds_index() {
        let mut fes = FutureEventSet::new();
        for id in 0..10 {
            fes.insert(event(id, (10 - id) as f64, 0)).unwrap();
        }
        let removed = fes.remove_where(|e| e.id % 2 == 0);
        assert_eq!(removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![8, 6, 4, 2, 0]);
        assert_heap(&fes);
        assert_eq!(drain(&mut fes), vec![9, 7, 5, 3, 1]);
    }
}

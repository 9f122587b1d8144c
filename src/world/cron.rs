use crate::world::position::Coords;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Pending auto-close for an opened door.
#[derive(Clone, Copy, Debug)]
struct DoorEntry {
    coords: Coords,
    deadline_ms: u64,
}

/// Min-heap by deadline (earliest first)
impl Ord for DoorEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so compare reversed
        other
            .deadline_ms
            .cmp(&self.deadline_ms)
            .then_with(|| self.coords.cmp(&other.coords))
    }
}

impl PartialOrd for DoorEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DoorEntry {
    fn eq(&self, other: &Self) -> bool {
        self.coords == other.coords && self.deadline_ms == other.deadline_ms
    }
}

impl Eq for DoorEntry {}

/// Auto-close scheduler for opened doors. One live deadline per door;
/// re-opening supersedes the old entry, closing by hand cancels it.
/// Stale heap entries are skipped lazily against the coord index.
#[derive(Debug, Default)]
pub struct DoorTimers {
    heap: BinaryHeap<DoorEntry>,
    index: HashMap<Coords, u64>,
}

impl DoorTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules (or reschedules) the door at `coords` to close at
    /// `now_ms + delay_ms`.
    pub fn set(&mut self, coords: Coords, delay_ms: u64, now_ms: u64) {
        let deadline_ms = now_ms + delay_ms;
        self.index.insert(coords, deadline_ms);
        self.heap.push(DoorEntry {
            coords,
            deadline_ms,
        });
    }

    /// Pops the next door whose deadline has passed, if any.
    pub fn pop_ready(&mut self, now_ms: u64) -> Option<Coords> {
        loop {
            let entry = *self.heap.peek()?;
            match self.index.get(&entry.coords) {
                Some(&deadline) if deadline == entry.deadline_ms => {
                    if entry.deadline_ms <= now_ms {
                        self.heap.pop();
                        self.index.remove(&entry.coords);
                        return Some(entry.coords);
                    }
                    return None;
                }
                _ => {
                    // Superseded or canceled entry
                    self.heap.pop();
                }
            }
        }
    }

    /// Cancels the pending close for `coords`. Returns whether one was
    /// pending.
    pub fn stop(&mut self, coords: Coords) -> bool {
        self.index.remove(&coords).is_some()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_timers_basic_operations() {
        let mut timers = DoorTimers::new();
        let now = 10_000;

        let a = Coords::new(3, 4);
        let b = Coords::new(7, 2);

        timers.set(a, 3000, now); // ready at 13000
        timers.set(b, 1000, now); // ready at 11000

        assert_eq!(timers.len(), 2);
        assert_eq!(timers.pop_ready(10_999), None);
        assert_eq!(timers.pop_ready(11_000), Some(b));
        assert_eq!(timers.pop_ready(11_000), None);
        assert_eq!(timers.pop_ready(13_000), Some(a));
        assert!(timers.is_empty());
    }

    #[test]
    fn door_timers_stop_cancels() {
        let mut timers = DoorTimers::new();
        let door = Coords::new(5, 5);

        timers.set(door, 3000, 0);
        assert!(timers.stop(door));
        assert!(!timers.stop(door));
        assert_eq!(timers.pop_ready(10_000), None);
        assert!(timers.is_empty());
    }

    #[test]
    fn door_timers_reset_supersedes() {
        let mut timers = DoorTimers::new();
        let door = Coords::new(5, 5);

        timers.set(door, 3000, 0);
        timers.set(door, 3000, 2000); // re-opened, now closes at 5000

        assert_eq!(timers.pop_ready(3000), None);
        assert_eq!(timers.pop_ready(5000), Some(door));
        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn door_timers_multiple_same_deadline() {
        let mut timers = DoorTimers::new();
        timers.set(Coords::new(1, 1), 500, 0);
        timers.set(Coords::new(2, 2), 500, 0);
        timers.set(Coords::new(3, 3), 500, 0);

        let mut closed = Vec::new();
        while let Some(coords) = timers.pop_ready(500) {
            closed.push(coords);
        }
        assert_eq!(closed.len(), 3);
        assert!(closed.contains(&Coords::new(1, 1)));
        assert!(closed.contains(&Coords::new(2, 2)));
        assert!(closed.contains(&Coords::new(3, 3)));
    }
}

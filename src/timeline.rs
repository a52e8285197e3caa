//! Deadline-ordered cue list and the clock that drives it.

use std::cell::Cell;
use std::time::Instant;

/// Handle for one scheduled cue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Monotonic milliseconds since some fixed origin
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock, origin at construction
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and benches
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Debug)]
struct Cue<T> {
    id: TimerId,
    deadline: u64,
    payload: T,
}

/// Pending cues, kept sorted by (deadline, insertion order)
#[derive(Debug)]
pub struct Timeline<T> {
    cues: Vec<Cue<T>>,
    next_id: u64,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self {
            cues: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline_ms: u64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        // Equal deadlines keep insertion order
        let at = self.cues.partition_point(|c| c.deadline <= deadline_ms);
        self.cues.insert(
            at,
            Cue {
                id,
                deadline: deadline_ms,
                payload,
            },
        );
        id
    }

    /// Drop one cue; false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.cues.iter().position(|c| c.id == id) {
            Some(pos) => {
                self.cues.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.cues.len();
        self.cues.clear();
        n
    }

    /// Remove and return every cue due at `now_ms`, earliest first
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<T> {
        let due = self.cues.partition_point(|c| c.deadline <= now_ms);
        self.cues.drain(..due).map(|c| c.payload).collect()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.cues.first().map(|c| c.deadline)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut timeline = Timeline::new();
        timeline.schedule(300, "c");
        timeline.schedule(100, "a");
        timeline.schedule(200, "b");
        timeline.schedule(100, "a2");
        assert_eq!(timeline.next_deadline(), Some(100));
        assert_eq!(timeline.pop_due(150), vec!["a", "a2"]);
        assert_eq!(timeline.pop_due(1000), vec!["b", "c"]);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_cancel_single_and_all() {
        let mut timeline = Timeline::new();
        let a = timeline.schedule(10, 1);
        timeline.schedule(20, 2);
        assert!(timeline.cancel(a));
        assert!(!timeline.cancel(a));
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.cancel_all(), 1);
        assert!(timeline.pop_due(u64::MAX).is_empty());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(5);
        clock.advance(10);
        assert_eq!(clock.now_ms(), 15);
        clock.set(2);
        assert_eq!(clock.now_ms(), 2);
    }
}

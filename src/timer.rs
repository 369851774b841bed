//! Generation-tagged timer queue backing the idle monitor.
//!
//! Every entry remembers the generation it was armed under. `cancel_all` bumps
//! the generation, so an entry that survives in the heap can never fire once
//! its generation is gone.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Variants are ordered by precedence at equal deadlines: a countdown tick
/// lands before the logout it coincides with, and both before a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    Tick,
    Logout,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub deadline: Duration,
    pub kind: TimerKind,
    generation: u64,
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.kind.cmp(&other.kind))
            .then(self.generation.cmp(&other.generation))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Timer>>,
    generation: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn generation(&self) -> u64 {
        self.generation
    }

    pub fn arm(&mut self, kind: TimerKind, deadline: Duration) {
        self.heap.push(Reverse(Timer {
            deadline,
            kind,
            generation: self.generation,
        }));
    }

    /// Invalidate everything armed so far
    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.heap.clear();
    }

    /// Earliest live deadline
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(t)| t.deadline)
    }

    /// Pop the earliest live timer if its deadline is at or before `now`
    pub fn pop_due(&mut self, now: Duration) -> Option<Timer> {
        self.pop_if(|deadline| deadline <= now)
    }

    /// Pop the earliest live timer if its deadline is strictly before `at`
    pub fn pop_before(&mut self, at: Duration) -> Option<Timer> {
        self.pop_if(|deadline| deadline < at)
    }

    #[cfg(test)]
    fn is_empty(&mut self) -> bool {
        self.discard_stale();
        self.heap.is_empty()
    }

    #[cfg(test)]
    fn len(&mut self) -> usize {
        self.discard_stale();
        self.heap.len()
    }

    fn pop_if(&mut self, due: impl Fn(Duration) -> bool) -> Option<Timer> {
        self.discard_stale();
        match self.heap.peek() {
            Some(Reverse(t)) if due(t.deadline) => self.heap.pop().map(|Reverse(t)| t),
            _ => None,
        }
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(t)) = self.heap.peek() {
            if t.generation == self.generation {
                break;
            }
            self.heap.pop();
        }
    }
}

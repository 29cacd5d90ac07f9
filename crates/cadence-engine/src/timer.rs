//! Deferred actions for one-shot sounds.
//!
//! A min-heap of `(deadline, seq, action)` drained by the tick loop. Actions
//! never run inside the call that scheduled them, and entries with equal
//! deadlines fire in scheduling order. Dropping the queue drops pending
//! actions without running them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cadence_common::HandleId;

/// Completion callback for a sound.
pub type SoundCallback = Box<dyn FnOnce()>;

/// Work to perform when a timer expires.
pub enum TimerAction {
    /// Destroy a one-shot playback handle.
    DestroyHandle(HandleId),
    /// Run a completion callback.
    Invoke(SoundCallback),
}

impl std::fmt::Debug for TimerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DestroyHandle(h) => f.debug_tuple("DestroyHandle").field(h).finish(),
            Self::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

#[derive(Debug)]
struct Entry {
    deadline: f64,
    seq: u64,
    action: TimerAction,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the BinaryHeap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .total_cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Queue of deferred actions keyed by deadline.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl TimerQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` at `deadline` (seconds on the manager clock).
    pub fn schedule(&mut self, deadline: f64, action: TimerAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline,
            seq,
            action,
        });
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<TimerAction> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.action);
            }
        }
        due
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every pending action without running it.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> TimerAction) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        let make = move |n: u32| {
            let log = Rc::clone(&log2);
            TimerAction::Invoke(Box::new(move || log.borrow_mut().push(n)))
        };
        (log, make)
    }

    fn run(actions: Vec<TimerAction>) {
        for action in actions {
            if let TimerAction::Invoke(cb) = action {
                cb();
            }
        }
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let (log, make) = recorder();
        let mut queue = TimerQueue::new();
        queue.schedule(3.0, make(3));
        queue.schedule(1.0, make(1));
        queue.schedule(2.0, make(2));

        run(queue.drain_due(2.5));
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_equal_deadlines_keep_schedule_order() {
        let (log, make) = recorder();
        let mut queue = TimerQueue::new();
        for n in 0..5 {
            queue.schedule(1.0, make(n));
        }
        run(queue.drain_due(1.0));
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_nothing_due_before_deadline() {
        let (log, make) = recorder();
        let mut queue = TimerQueue::new();
        queue.schedule(0.5, make(1));
        assert!(queue.drain_due(0.49).is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_clear_drops_without_running() {
        let (log, make) = recorder();
        let mut queue = TimerQueue::new();
        queue.schedule(0.1, make(1));
        queue.schedule(0.2, TimerAction::DestroyHandle(HandleId::new(0, 0)));
        queue.clear();
        assert!(queue.is_empty());
        run(queue.drain_due(10.0));
        assert!(log.borrow().is_empty());
    }
}

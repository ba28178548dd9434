//! Virtual timer wheel for the lab runtime.
//!
//! Timers live on virtual ticks (nanoseconds of virtual time), never on the
//! wall clock:
//!
//! - Same tick → same timers expire
//! - Expiration order is deterministic: deadline first, then insertion order
//! - Cancellation is lazy; a cancelled timer is skipped when it surfaces
//!
//! # Example
//!
//! ```ignore
//! use pledge::lab::VirtualTimerWheel;
//!
//! let mut wheel = VirtualTimerWheel::new();
//! wheel.insert(100, Box::new(|| println!("second")));
//! wheel.insert(50, Box::new(|| println!("first")));
//!
//! while let Some(timer) = wheel.pop_due(150) {
//!     (timer.callback)();
//! }
//! assert_eq!(wheel.current_tick(), 150);
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

/// Work to run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

struct VirtualTimer {
    deadline: u64,
    /// Insertion order; breaks ties between equal deadlines.
    timer_id: u64,
    callback: TimerCallback,
}

impl Eq for VirtualTimer {}

impl PartialEq for VirtualTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.timer_id == other.timer_id
    }
}

impl Ord for VirtualTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest deadline first, then lowest timer_id
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.timer_id.cmp(&self.timer_id))
    }
}

impl PartialOrd for VirtualTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle for cancelling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    timer_id: u64,
    deadline: u64,
}

impl TimerHandle {
    /// Returns the timer ID.
    #[must_use]
    pub const fn timer_id(&self) -> u64 {
        self.timer_id
    }

    /// Returns the deadline tick.
    #[must_use]
    pub const fn deadline(&self) -> u64 {
        self.deadline
    }
}

/// A timer whose deadline was reached.
pub struct ExpiredTimer {
    /// Timer ID.
    pub timer_id: u64,
    /// Deadline tick.
    pub deadline: u64,
    /// The work to run.
    pub callback: TimerCallback,
}

impl fmt::Debug for ExpiredTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiredTimer")
            .field("timer_id", &self.timer_id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Min-heap of virtual timers.
pub struct VirtualTimerWheel {
    heap: BinaryHeap<VirtualTimer>,
    current_tick: u64,
    next_timer_id: u64,
    cancelled: HashSet<u64>,
}

impl Default for VirtualTimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTimerWheel {
    /// Creates a wheel at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            current_tick: 0,
            next_timer_id: 0,
            cancelled: HashSet::new(),
        }
    }

    /// Current virtual time in ticks.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Number of timers that will still fire.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|t| !self.cancelled.contains(&t.timer_id))
            .count()
    }

    /// Returns true if no timer will fire.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedules `callback` at `deadline`. A deadline in the past fires on
    /// the next advance.
    pub fn insert(&mut self, deadline: u64, callback: TimerCallback) -> TimerHandle {
        let timer_id = self.next_timer_id;
        self.next_timer_id += 1;
        self.heap.push(VirtualTimer {
            deadline,
            timer_id,
            callback,
        });
        TimerHandle { timer_id, deadline }
    }

    /// Cancels a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let live = self.heap.iter().any(|t| t.timer_id == handle.timer_id);
        live && self.cancelled.insert(handle.timer_id)
    }

    /// Deadline of the next live timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap
            .iter()
            .filter(|t| !self.cancelled.contains(&t.timer_id))
            .map(|t| t.deadline)
            .min()
    }

    /// Pops the next live timer due at or before `target`, moving the clock
    /// to its deadline. When nothing is due, moves the clock to `target` and
    /// returns `None`. The clock never moves backwards.
    pub fn pop_due(&mut self, target: u64) -> Option<ExpiredTimer> {
        loop {
            let due = self.heap.peek().is_some_and(|t| t.deadline <= target);
            if !due {
                self.current_tick = self.current_tick.max(target);
                return None;
            }
            let timer = self.heap.pop()?;
            if self.cancelled.remove(&timer.timer_id) {
                continue;
            }
            self.current_tick = self.current_tick.max(timer.deadline);
            return Some(ExpiredTimer {
                timer_id: timer.timer_id,
                deadline: timer.deadline,
                callback: timer.callback,
            });
        }
    }

    /// Drops every timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }
}

impl fmt::Debug for VirtualTimerWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTimerWheel")
            .field("current_tick", &self.current_tick)
            .field("pending", &self.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

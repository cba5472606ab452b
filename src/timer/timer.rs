//! Clock and one-shot timer abstractions.
//!
//! Components never touch wall-clock time or spawn sleeps themselves; they get
//! a [`Clock`] and a [`Scheduler`]. At runtime those are [`TokioClock`] and
//! [`TokioScheduler`]; the manual pair drives the same code from a simulated
//! clock.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

pub trait Clock {
    fn now(&self) -> Instant;
}

pub trait Scheduler {
    /// Arms a one-shot timer that fires once after `delay`.
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Disarms a timer. Cancelling a fired or unknown timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Reads `tokio::time`, so it follows a paused runtime clock in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Fired timer ids, in firing order.
pub type FiredTimers = mpsc::UnboundedReceiver<TimerId>;

/// Each timer is a spawned sleep that reports its id on [`FiredTimers`].
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: u64,
    pending: HashMap<TimerId, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
}

impl TokioScheduler {
    pub fn new() -> (Self, FiredTimers) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_id: 0,
            pending: HashMap::new(),
            fired_tx,
        };
        (scheduler, fired_rx)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.pending.retain(|_, handle| !handle.is_finished());

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(id);
        });
        self.pending.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.pending.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Debug, Default)]
struct ManualTimers {
    next_id: u64,
    deadlines: BTreeMap<TimerId, Instant>,
}

/// Records deadlines against a [`ManualClock`]; [`ManualScheduler::take_due`]
/// hands back whatever has expired. Clones share the same timer table.
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    timers: Rc<RefCell<ManualTimers>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            timers: Rc::new(RefCell::new(ManualTimers::default())),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.timers.borrow().deadlines.len()
    }

    /// Removes and returns the timers whose deadline has passed, oldest first.
    pub fn take_due(&self) -> Vec<TimerId> {
        let now = self.clock.now();
        let mut timers = self.timers.borrow_mut();
        let mut due: Vec<(Instant, TimerId)> = timers
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort();
        for (_, id) in &due {
            timers.deadlines.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let mut timers = self.timers.borrow_mut();
        let id = TimerId(timers.next_id);
        timers.next_id += 1;
        timers.deadlines.insert(id, self.clock.now() + delay);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.borrow_mut().deadlines.remove(&id);
    }
}

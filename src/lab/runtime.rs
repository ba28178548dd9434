//! Lab runtime: an engine driven by virtual time.
//!
//! The lab runtime supplies the timer primitive the engine itself does not
//! have:
//! - Virtual time (controlled advancement, no sleeping)
//! - Deterministic timer order (deadline, then registration order)
//! - A full engine drain after every timer, so each timer callback observes
//!   the consequences of the previous one

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::virtual_time_wheel::{TimerHandle, VirtualTimerWheel};
use crate::error::Error;
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::tracing_compat::{trace, warn};
use crate::types::{Outcome, Value};

/// Upper bound on timers fired by one `run_until_quiescent` call.
const QUIESCENCE_TIMER_LIMIT: usize = 1_000_000;

fn ticks(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Deterministic driver for an [`Engine`].
///
/// Clones share the engine and the timer wheel, so timers may be scheduled
/// from inside promise handlers.
#[derive(Clone, Debug)]
pub struct LabRuntime {
    engine: Engine,
    wheel: Arc<Mutex<VirtualTimerWheel>>,
}

impl LabRuntime {
    /// Creates a lab runtime at virtual time zero.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            wheel: Arc::new(Mutex::new(VirtualTimerWheel::new())),
        }
    }

    /// The driven engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.wheel.lock().current_tick())
    }

    /// Number of timers that have not fired yet.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.wheel.lock().len()
    }

    /// Runs `callback` once virtual time has advanced by `after`.
    pub fn after<F>(&self, after: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let mut wheel = self.wheel.lock();
        let deadline = wheel.current_tick().saturating_add(ticks(after));
        wheel.insert(deadline, Box::new(callback))
    }

    /// Cancels a timer. Returns false if it already fired.
    pub fn cancel_timer(&self, handle: TimerHandle) -> bool {
        self.wheel.lock().cancel(handle)
    }

    /// A promise resolved with `value` after `after` of virtual time.
    /// Promise and thenable values are followed once the timer fires.
    pub fn delay(&self, value: impl Into<Value>, after: Duration) -> Promise {
        let deferred = self.engine.defer();
        let resolver = deferred.resolver.clone();
        let value = value.into();
        self.after(after, move || resolver.resolve(value));
        deferred.promise
    }

    /// Follows `promise`, but rejects with an `ErrorKind::Timeout` error if
    /// it has not settled within `after`. On timeout a cancellable source is
    /// cancelled with the same error. The result keeps the source's receiver.
    pub fn timeout(&self, promise: &Promise, after: Duration) -> Promise {
        let out = promise.then(|_, value| Ok(value));
        let target = Arc::clone(&out.shared);
        let source = promise.clone();
        let handle = self.after(after, move || {
            if !target.is_pending() {
                return;
            }
            let reason: Value = Error::timeout(after).into();
            trace!(promise = ?target.id, after = ?after, "timeout fired");
            target.settle(Outcome::Rejected(reason.clone()));
            source.cancel(Some(reason));
        });
        let wheel = Arc::clone(&self.wheel);
        promise.shared.listen(move |_| {
            wheel.lock().cancel(handle);
        });
        out
    }

    /// Drains the engine. Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        self.engine.run_until_idle()
    }

    /// Advances virtual time by `by`, firing due timers one at a time and
    /// draining the engine after each. Returns the number of timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.wheel.lock().current_tick().saturating_add(ticks(by));
        self.advance_to(target)
    }

    fn advance_to(&self, target: u64) -> usize {
        self.engine.run_until_idle();
        let mut fired = 0;
        loop {
            let timer = self.wheel.lock().pop_due(target);
            let Some(timer) = timer else {
                break;
            };
            trace!(timer = timer.timer_id, deadline = timer.deadline, "timer fired");
            self.engine.enqueue(timer.callback);
            self.engine.run_until_idle();
            fired += 1;
        }
        fired
    }

    /// Fires timers and drains until nothing is left to do. Returns the
    /// number of timers fired.
    pub fn run_until_quiescent(&self) -> usize {
        let mut fired = 0;
        loop {
            self.engine.run_until_idle();
            let next = self.wheel.lock().next_deadline();
            let Some(deadline) = next else {
                break;
            };
            fired += self.advance_to(deadline);
            if fired >= QUIESCENCE_TIMER_LIMIT {
                warn!(fired, "timer limit reached before quiescence");
                break;
            }
        }
        fired
    }
}

//! Tick sources: the periodic event that drives responders.
//!
//! A [`TickSource`] calls every registered callback once per discrete time
//! step, synchronously, on its own thread. Callback errors are collected by
//! the source; that is the error boundary for everything a responder does
//! during a tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::error::{ResponderError, TickError};

/// Marker passed to callbacks on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Tick number, starting at 1.
    pub sequence: u64,
}

/// Handle identifying a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Callback invoked on every tick.
pub type TickCallback = Rc<dyn Fn(TickEvent) -> Result<(), ResponderError>>;

/// Host-provided periodic event source.
pub trait TickSource {
    /// Start calling `callback` on every tick.
    fn register(&self, callback: TickCallback) -> CallbackId;

    /// Stop calling the callback. Returns `false` if it was not registered.
    fn unregister(&self, id: CallbackId) -> bool;
}

/// Tick source fired explicitly by its owner.
///
/// Each [`fire`](Self::fire) invokes a snapshot of the callbacks registered
/// at that moment, in registration order, so callbacks may register or
/// unregister others (or themselves) while a tick is running.
#[derive(Default)]
pub struct ManualTicker {
    callbacks: RefCell<Vec<(CallbackId, TickCallback)>>,
    next_id: Cell<u64>,
    sequence: Cell<u64>,
}

impl ManualTicker {
    /// Ticker with no callbacks that has not ticked yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick.
    ///
    /// Every callback runs even if an earlier one fails; all failures are
    /// returned together.
    pub fn fire(&self) -> Result<(), TickError> {
        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);

        let snapshot: Vec<TickCallback> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        let event = TickEvent { sequence };
        let failures: Vec<ResponderError> = snapshot
            .iter()
            .filter_map(|callback| callback(event).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            tracing::warn!(sequence, failed = failures.len(), "tick callbacks failed");
            Err(TickError { sequence, failures })
        }
    }

    /// Run `count` ticks, stopping at the first tick that reports failures.
    pub fn fire_n(&self, count: u64) -> Result<(), TickError> {
        for _ in 0..count {
            self.fire()?;
        }
        Ok(())
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.sequence.get()
    }

    /// Number of registered callbacks.
    pub fn registered(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl TickSource for ManualTicker {
    fn register(&self, callback: TickCallback) -> CallbackId {
        let id = CallbackId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.callbacks.borrow_mut().push((id, callback));
        id
    }

    fn unregister(&self, id: CallbackId) -> bool {
        // Dropped after the borrow ends: a callback's captures may unregister
        // from this ticker when they go away.
        let removed = {
            let mut callbacks = self.callbacks.borrow_mut();
            callbacks
                .iter()
                .position(|(registered, _)| *registered == id)
                .map(|index| callbacks.remove(index))
        };
        removed.is_some()
    }
}

/// Fire `ticker` once per `period`, `ticks` times, on the current tokio runtime.
///
/// The first tick fires immediately. Late ticks are delayed rather than
/// bunched up, so a slow handler stretches the cadence instead of causing a
/// burst. A zero period fires back to back, yielding between ticks.
/// Returns the first tick error.
pub async fn drive(ticker: &ManualTicker, period: Duration, ticks: u64) -> Result<(), TickError> {
    if period.is_zero() {
        for _ in 0..ticks {
            ticker.fire()?;
            tokio::task::yield_now().await;
        }
        return Ok(());
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for _ in 0..ticks {
        interval.tick().await;
        ticker.fire()?;
    }
    Ok(())
}

//! Work item types: the units of deferred execution.
//!
//! A [`Work`] is created once and may be submitted many times; the engine
//! never consumes it. Its life cycle is idle -> pending (linked into exactly
//! one per-CPU FIFO) -> running -> idle, tracked by a single atomic flags word
//! so the pending test-and-set and the release are one indivisible step.
//!
//! A [`DelayedWork`] pairs a `Work` with a one-shot timer slot. While
//! scheduled, exactly one of {timer armed, work pending on a queue} holds;
//! the timer callback clears its slot before handing the work to the queue.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use crate::timer::TimerKey;
use crate::workqueue::CpuQueue;

/// Work is linked into a queue (or about to run) and must not be re-queued.
const WORK_PENDING: u8 = 1 << 0;
/// The drain loop must not clear the pending bit before invoking; the work
/// function (or its enclosing structure's cleanup) calls [`Work::release`].
const WORK_NO_AUTOREL: u8 = 1 << 1;

/// A unit of deferred work.
///
/// The callback runs on a worker thread of whichever queue the item was
/// submitted to. It may freely re-submit its own item: the engine releases
/// the pending bit before invoking (unless the item was created with
/// [`Work::new_manual_release`]).
pub struct Work {
    /// The function to execute. `Fn`, not `FnOnce`: items are reusable.
    func: Box<dyn Fn() + Send + Sync + 'static>,
    /// WORK_* bits, read and written as one unit.
    flags: AtomicU8,
    /// Queue this item is currently linked into. Identity only: compared,
    /// never used to keep the queue alive. Stale once the item has run.
    owner: spin::Mutex<Weak<CpuQueue>>,
    /// Debug name for this work item.
    name: &'static str,
}

impl Work {
    /// Create a new work item with the given function and debug name.
    pub fn new<F>(func: F, name: &'static str) -> Arc<Work>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Work {
            func: Box::new(func),
            flags: AtomicU8::new(0),
            owner: spin::Mutex::new(Weak::new()),
            name,
        })
    }

    /// Like [`Work::new`], but the engine performs no implicit release: the
    /// item stays pending across invocation until [`Work::release`] is
    /// called. For items embedded in larger structures that own cleanup.
    pub fn new_manual_release<F>(func: F, name: &'static str) -> Arc<Work>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Work {
            func: Box::new(func),
            flags: AtomicU8::new(WORK_NO_AUTOREL),
            owner: spin::Mutex::new(Weak::new()),
            name,
        })
    }

    /// Debug name of this work item.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the item is queued (or armed via a delayed timer) and not yet
    /// released for re-submission.
    pub fn is_pending(&self) -> bool {
        self.flags.load(Ordering::Acquire) & WORK_PENDING != 0
    }

    /// Clear the pending bit, making the item submittable again. The drain
    /// loop calls this right before invoking auto-release items; manual-
    /// release items call it themselves.
    pub fn release(&self) {
        self.flags.fetch_and(!WORK_PENDING, Ordering::AcqRel);
    }

    /// Transition idle -> pending. Returns false if already pending.
    pub(crate) fn test_and_set_pending(&self) -> bool {
        self.flags.fetch_or(WORK_PENDING, Ordering::AcqRel) & WORK_PENDING == 0
    }

    pub(crate) fn auto_release(&self) -> bool {
        self.flags.load(Ordering::Acquire) & WORK_NO_AUTOREL == 0
    }

    /// Record the queue that now owns this item. Called under that queue's
    /// lock, before the item is linked into its FIFO, so no thread can see
    /// the item in a list with a stale owner.
    pub(crate) fn set_owner(&self, queue: &Arc<CpuQueue>) {
        *self.owner.lock() = Arc::downgrade(queue);
    }

    /// Queue that last owned this item, if it is still alive.
    pub(crate) fn owner(&self) -> Option<Arc<CpuQueue>> {
        self.owner.lock().upgrade()
    }

    /// Identity check against `queue`, for membership validation under that
    /// queue's lock.
    pub(crate) fn owner_is(&self, queue: &Arc<CpuQueue>) -> bool {
        Weak::ptr_eq(&self.owner.lock(), &Arc::downgrade(queue))
    }

    pub(crate) fn invoke(&self) {
        (self.func)()
    }
}

/// A work item executed after a delay.
///
/// Composition, not inheritance: the inner [`Work`] flows through the exact
/// same queue machinery once the timer fires.
pub struct DelayedWork {
    work: Arc<Work>,
    /// Armed timer, if any. Guards the arm/fire/cancel hand-off.
    timer: spin::Mutex<Option<TimerKey>>,
}

impl DelayedWork {
    /// Create a new delayed work item with the given function and debug name.
    pub fn new<F>(func: F, name: &'static str) -> Arc<DelayedWork>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(DelayedWork {
            work: Work::new(func, name),
            timer: spin::Mutex::new(None),
        })
    }

    /// The underlying work item.
    pub fn work(&self) -> &Arc<Work> {
        &self.work
    }

    /// Whether the delay timer is currently armed (it has neither fired nor
    /// been cancelled).
    pub fn timer_armed(&self) -> bool {
        match *self.timer.lock() {
            Some(key) => crate::timer::is_armed(key),
            None => false,
        }
    }

    /// Run `arm` and publish the resulting key as one step. The timer
    /// callback contends on the same lock, so the key is visible before the
    /// callback can clear it.
    pub(crate) fn arm_with<F>(&self, arm: F)
    where
        F: FnOnce() -> TimerKey,
    {
        let mut slot = self.timer.lock();
        *slot = Some(arm());
    }

    /// Called by the timer callback before the enqueue step.
    pub(crate) fn clear_timer(&self) {
        *self.timer.lock() = None;
    }

    /// Try to disarm the timer. On success the pending bit is cleared and
    /// the item will not run. Returns false if the timer had already fired
    /// (the work is queued or running) or was never armed.
    pub(crate) fn try_disarm(&self) -> bool {
        let mut slot = self.timer.lock();
        match *slot {
            Some(key) if crate::timer::cancel(key) => {
                *slot = None;
                self.work.release();
                true
            }
            _ => false,
        }
    }
}

//! Monotonic time and one-shot timers for delayed work.
//!
//! Two facilities live here:
//!
//! - A boot-anchored monotonic clock ([`get_monotonic_time`], milliseconds).
//! - A timer wheel: one dedicated "ktimerd" thread sleeping until the
//!   earliest armed deadline, then running that timer's callback. Callbacks
//!   are expected to do nothing but hand a work item to its queue; all real
//!   work happens on the queue's own worker thread.
//!
//! Timers are identified by a [`TimerKey`]; cancellation wins only if the
//! entry is still on the wheel, which is exactly the "disarmed before
//! firing" guarantee delayed-work cancellation needs.

use conquer_once::spin::OnceCell;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Instant the timer subsystem came up; anchor for the monotonic clock.
static BOOT_INSTANT: OnceCell<Instant> = OnceCell::uninit();

/// The wheel singleton. Its thread is spawned on first use.
static WHEEL: OnceCell<TimerWheel> = OnceCell::uninit();

type TimerFn = Box<dyn FnOnce() + Send + 'static>;

/// Handle to an armed timer. Identity, not ownership: holding a key does not
/// keep the timer alive, and a key from a fired timer simply fails to cancel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimerKey {
    deadline: Instant,
    id: u64,
}

struct WheelInner {
    /// Armed timers ordered by deadline; the id breaks ties so equal
    /// deadlines never collide.
    armed: BTreeMap<(Instant, u64), TimerFn>,
}

struct TimerWheel {
    inner: Mutex<WheelInner>,
    /// Signalled whenever a timer is armed earlier than the current sleep.
    rearm: Condvar,
}

impl TimerWheel {
    fn new() -> Self {
        TimerWheel {
            inner: Mutex::new(WheelInner {
                armed: BTreeMap::new(),
            }),
            rearm: Condvar::new(),
        }
    }
}

/// Milliseconds since the timer subsystem initialized. Monotonic.
pub fn get_monotonic_time() -> u64 {
    let boot = BOOT_INSTANT.get_or_init(Instant::now);
    boot.elapsed().as_millis() as u64
}

/// Bring up the timer wheel (idempotent). Safe to call from any thread; the
/// wheel thread runs for the life of the process, like the system workqueue.
pub(crate) fn start() {
    BOOT_INSTANT.get_or_init(Instant::now);
    let _ = wheel();
}

fn wheel() -> &'static TimerWheel {
    static SPAWNED: OnceCell<()> = OnceCell::uninit();

    // Initialize the cell first, spawn second: the wheel thread reads the
    // cell, so it must be populated before the thread can observe it.
    let wheel = WHEEL.get_or_init(TimerWheel::new);
    let _ = SPAWNED.try_init_once(|| {
        std::thread::Builder::new()
            .name("ktimerd".into())
            .spawn(wheel_thread)
            .expect("failed to spawn timer wheel thread");
        log::info!("TIMER_INIT: timer wheel online");
    });
    wheel
}

/// Arm a one-shot timer `delay` from now.
pub(crate) fn arm(delay: Duration, callback: TimerFn) -> TimerKey {
    static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

    let key = TimerKey {
        deadline: Instant::now() + delay,
        id: NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed),
    };
    let wheel = wheel();
    let mut inner = wheel.inner.lock().unwrap();
    inner.armed.insert((key.deadline, key.id), callback);
    wheel.rearm.notify_one();
    key
}

/// Disarm `key`. Returns true iff the timer was still on the wheel, i.e.
/// its callback has not run and never will.
pub(crate) fn cancel(key: TimerKey) -> bool {
    let wheel = wheel();
    let mut inner = wheel.inner.lock().unwrap();
    inner.armed.remove(&(key.deadline, key.id)).is_some()
}

/// Whether `key` is still armed.
pub(crate) fn is_armed(key: TimerKey) -> bool {
    let wheel = wheel();
    let inner = wheel.inner.lock().unwrap();
    inner.armed.contains_key(&(key.deadline, key.id))
}

fn wheel_thread() {
    let wheel = WHEEL.get_or_init(TimerWheel::new);
    let mut inner = wheel.inner.lock().unwrap();
    loop {
        // Earliest armed deadline, if any.
        match inner.armed.keys().next().copied() {
            None => {
                inner = wheel.rearm.wait(inner).unwrap();
            }
            Some(key @ (deadline, _)) => {
                let now = Instant::now();
                if deadline <= now {
                    // Remove before invoking: from here on, cancel() reports
                    // "too late" and the callback owns the work item.
                    let callback = inner.armed.remove(&key).unwrap();
                    drop(inner);
                    callback();
                    inner = wheel.inner.lock().unwrap();
                } else {
                    let (guard, _timeout) = wheel
                        .rearm
                        .wait_timeout(inner, deadline - now)
                        .unwrap();
                    inner = guard;
                }
            }
        }
    }
}

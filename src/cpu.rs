//! Logical CPU topology for per-CPU work routing.
//!
//! The engine schedules onto *logical execution contexts*, one worker thread
//! per context. A process owns up to [`MAX_CPUS`] possible CPUs; which of
//! them are online is tracked in a single atomic bitmask. Every thread
//! carries a thread-local binding to the CPU it is considered to be running
//! on (workers bind to their queue's CPU at startup; submitters may bind
//! with [`bind`] to pin their submissions).
//!
//! The online mask is only ever mutated through the hotplug entry points in
//! [`crate::hotplug`]; everything else is a reader.

use core::sync::atomic::{AtomicU32, Ordering};
use std::cell::Cell;

/// Number of possible CPUs. Online CPUs are always a subset of `0..MAX_CPUS`.
pub const MAX_CPUS: usize = 32;

/// Bit `n` set means CPU `n` is online. Zero means the topology is not yet
/// initialized; [`init`] transitions it exactly once.
static ONLINE_MASK: AtomicU32 = AtomicU32::new(0);

thread_local! {
    /// CPU this thread is bound to. Unbound threads submit via CPU 0.
    static CURRENT_CPU: Cell<usize> = const { Cell::new(0) };
}

/// Bring CPUs `0..count` online. First call wins; later calls (including the
/// implicit default from [`crate::init_workqueue`]) are no-ops, so a test or
/// embedder that wants a fixed topology just calls this first.
pub fn init(count: usize) {
    let count = count.clamp(1, MAX_CPUS);
    let mask = if count == 32 { u32::MAX } else { (1u32 << count) - 1 };
    if ONLINE_MASK
        .compare_exchange(0, mask, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        log::info!("CPU_INIT: {} logical CPUs online", count);
    }
}

/// Initialize the topology from the host's parallelism if nobody has yet.
pub(crate) fn ensure_init() {
    if ONLINE_MASK.load(Ordering::SeqCst) == 0 {
        let n = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1);
        init(n);
    }
}

/// CPU the calling thread is bound to.
pub fn current() -> usize {
    CURRENT_CPU.with(|c| c.get())
}

/// Bind the calling thread to `cpu`. Subsequent submissions from this thread
/// route to that CPU's queue on multi-threaded workqueues.
pub fn bind(cpu: usize) {
    assert!(cpu < MAX_CPUS, "cpu {} out of range", cpu);
    CURRENT_CPU.with(|c| c.set(cpu));
}

/// Whether `cpu` is currently online.
pub fn is_online(cpu: usize) -> bool {
    cpu < MAX_CPUS && ONLINE_MASK.load(Ordering::SeqCst) & (1 << cpu) != 0
}

/// Snapshot of the online CPUs, in ascending order.
pub fn online_cpus() -> Vec<usize> {
    let mask = ONLINE_MASK.load(Ordering::SeqCst);
    (0..MAX_CPUS).filter(|&cpu| mask & (1 << cpu) != 0).collect()
}

/// Lowest-numbered online CPU. Used as the re-route target when a
/// submission's CPU went offline under it.
pub fn first_online() -> usize {
    let mask = ONLINE_MASK.load(Ordering::SeqCst);
    if mask == 0 {
        return 0;
    }
    mask.trailing_zeros() as usize
}

pub(crate) fn set_online(cpu: usize) {
    assert!(cpu < MAX_CPUS, "cpu {} out of range", cpu);
    ONLINE_MASK.fetch_or(1 << cpu, Ordering::SeqCst);
}

pub(crate) fn set_offline(cpu: usize) {
    assert!(cpu < MAX_CPUS, "cpu {} out of range", cpu);
    ONLINE_MASK.fetch_and(!(1 << cpu), Ordering::SeqCst);
}

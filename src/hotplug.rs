//! CPU hotplug entry points.
//!
//! The embedder drives these in the usual notifier order:
//!
//! - bring-up: [`cpu_up_prepare`] then [`cpu_online`], or
//!   [`cpu_up_canceled`] if bring-up fails after prepare;
//! - teardown: [`cpu_down_prepare`] then [`cpu_dead`].
//!
//! Each call fans out over the registry of multi-threaded workqueues;
//! single-threaded queues have no per-CPU state and are unaffected.
//!
//! NOTE: hotplug notifications are serialized with respect to each other by
//! the caller (they are notifier callbacks, not a concurrent API). A flush
//! racing `cpu_dead` on the dying CPU's queue is excluded by that same
//! serialization.

use crate::cpu;
use crate::workqueue::{registered_workqueues, WorkqueueError};

/// A CPU is coming up: give every registered workqueue a queue and worker
/// for it before it goes online. On failure the caller is expected to abort
/// the bring-up and invoke [`cpu_up_canceled`].
pub fn cpu_up_prepare(cpu: usize) -> Result<(), WorkqueueError> {
    assert!(cpu < crate::cpu::MAX_CPUS, "cpu {} out of range", cpu);
    for wq in registered_workqueues() {
        wq.attach_cpu(cpu)?;
    }
    Ok(())
}

/// The CPU is online; submissions may route to it from here on.
pub fn cpu_online(cpu: usize) {
    cpu::set_online(cpu);
    log::info!("CPU_ONLINE: cpu {}", cpu);
}

/// Bring-up was aborted after [`cpu_up_prepare`]: stop and drop the workers
/// that prepare created. Their queues are empty (the CPU never went online),
/// so nothing needs re-homing.
pub fn cpu_up_canceled(cpu: usize) {
    for wq in registered_workqueues() {
        wq.detach_cpu(cpu, false);
    }
    log::warn!("CPU_UP_CANCELED: cpu {}", cpu);
}

/// The CPU is about to go away: take it out of the online mask so new
/// submissions re-route to surviving CPUs.
pub fn cpu_down_prepare(cpu: usize) {
    cpu::set_offline(cpu);
    log::info!("CPU_DOWN_PREPARE: cpu {}", cpu);
}

/// The CPU is gone. For every registered workqueue, stop its worker for
/// that CPU and re-home whatever was still queued onto the calling CPU's
/// queue. Re-homing cannot fail: the items are already pending and only
/// their FIFO link moves.
pub fn cpu_dead(cpu: usize) {
    for wq in registered_workqueues() {
        wq.detach_cpu(cpu, true);
    }
    log::info!("CPU_DEAD: cpu {}", cpu);
}

//! Deferred-work execution engine: per-CPU worker queues in the Linux
//! workqueue mold.
//!
//! Callers hand the engine reusable [`Work`] items (a closure plus state
//! bits); each item runs to completion on a worker thread belonging to the
//! queue it was submitted to. Within one per-CPU queue execution is strictly
//! FIFO and sequential, which gives work functions on the same queue
//! implicit mutual exclusion. Across queues there is no ordering at all.
//!
//! # Subsystems
//!
//! - [`work`]: the [`Work`] / [`DelayedWork`] data model.
//! - [`workqueue`]: queues, worker loops, flush, direct execution,
//!   cancellation, and the global system workqueue.
//! - [`cpu`]: logical CPU topology and thread bindings.
//! - [`timer`]: monotonic clock and the timer wheel behind delayed work.
//! - [`hotplug`]: CPU bring-up/teardown entry points, including pending-work
//!   migration off a dead CPU.
//!
//! # Getting started
//!
//! ```rust,ignore
//! workqueue::init_workqueue();
//!
//! let work = workqueue::schedule_work_fn(|| {
//!     log::info!("running deferred");
//! }, "example");
//!
//! workqueue::flush_scheduled_work();
//! ```

pub mod cpu;
pub mod hotplug;
pub mod timer;
pub mod work;
pub mod workqueue;

pub use timer::get_monotonic_time;
pub use work::{DelayedWork, Work};
pub use workqueue::{
    cancel_delayed_work, cancel_rearming_delayed_work, cancel_rearming_delayed_workqueue,
    create_singlethread_workqueue, create_workqueue, flush_scheduled_work, init_workqueue,
    run_scheduled_work, schedule_delayed_work, schedule_delayed_work_on, schedule_on_each_cpu,
    schedule_work, schedule_work_fn, Workqueue, WorkqueueError, WorkqueueFlags,
};

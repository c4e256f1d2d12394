//! Linux-style work queues for deferred execution.
//!
//! A [`Workqueue`] owns one FIFO + worker thread per online CPU (or exactly
//! one in single-threaded mode). Callers submit [`Work`] items; each item
//! runs to completion on its queue's worker thread, in submission order.
//!
//! # Architecture
//!
//! - `CpuQueue`: one CPU's share of a workqueue: a mutex-guarded FIFO,
//!   two sequence counters (inserted / completed), and a worker thread.
//! - [`Workqueue`]: a named collection of `CpuQueue`s plus routing policy.
//! - System workqueue: a global default instance ("events") behind the
//!   [`schedule_work`]-family convenience wrappers.
//!
//! # Flushing
//!
//! [`Workqueue::flush`] waits only for work that was pending when it was
//! called: each queue snapshots its insert counter and sleeps until the
//! completion counter catches up, so a flood of later submissions cannot
//! livelock it. A flush issued from inside a work function drains the
//! worker's own queue inline instead of deadlocking on itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use workqueue::{init_workqueue, schedule_work_fn};
//!
//! init_workqueue();
//! let work = schedule_work_fn(|| {
//!     log::info!("deferred work executing");
//! }, "example_work");
//! workqueue::flush_scheduled_work();
//! ```

use conquer_once::spin::OnceCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crate::cpu::{self, MAX_CPUS};
use crate::timer;
use crate::work::{DelayedWork, Work};

/// Nested drain passes tolerated before the runaway-recursion diagnostic.
const MAX_DRAIN_RECURSION: u32 = 3;

/// CPU slot used by single-threaded workqueues, regardless of the
/// submitter's context.
const SINGLETHREAD_CPU: usize = 0;

#[derive(Debug)]
pub enum WorkqueueError {
    /// A worker thread could not be spawned. Queue creation unwinds
    /// everything built so far before reporting this.
    SpawnFailed,
}

impl fmt::Display for WorkqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkqueueError::SpawnFailed => write!(f, "worker thread spawn failed"),
        }
    }
}

impl std::error::Error for WorkqueueError {}

/// Flags for workqueue creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkqueueFlags {
    /// One worker total instead of one per online CPU. Every submission
    /// routes to the same queue no matter where it comes from.
    pub single_threaded: bool,
    /// Workers participate in a process-wide freeze, when the embedder has
    /// one. Recorded per worker; the freezer itself is outside this crate.
    pub freezeable: bool,
}

/// One CPU's share of a workqueue: FIFO, counters, worker thread.
pub(crate) struct CpuQueue {
    wq_name: &'static str,
    cpu: usize,
    freezeable: bool,
    inner: Mutex<QueueInner>,
    /// Worker wakeup: signalled on insert.
    more_work: Condvar,
    /// Flush wakeup: signalled after every completed item.
    work_done: Condvar,
    should_stop: AtomicBool,
    worker: spin::Mutex<Option<WorkerHandle>>,
}

/// Everything the queue lock protects, as one unit.
struct QueueInner {
    worklist: VecDeque<Arc<Work>>,
    /// Incremented once per successful enqueue.
    insert_sequence: u64,
    /// Incremented once per completed execution. Never exceeds
    /// `insert_sequence`.
    remove_sequence: u64,
    /// Nesting of the drain loop on the worker thread (self-flush reentry).
    run_depth: u32,
}

struct WorkerHandle {
    thread: JoinHandle<()>,
    tid: ThreadId,
}

impl CpuQueue {
    fn new(wq_name: &'static str, cpu: usize, freezeable: bool) -> CpuQueue {
        CpuQueue {
            wq_name,
            cpu,
            freezeable,
            inner: Mutex::new(QueueInner {
                worklist: VecDeque::new(),
                insert_sequence: 0,
                remove_sequence: 0,
                run_depth: 0,
            }),
            more_work: Condvar::new(),
            work_done: Condvar::new(),
            should_stop: AtomicBool::new(false),
            worker: spin::Mutex::new(None),
        }
    }

    /// Whether the calling thread is this queue's worker. Decides between
    /// waiting for a flush and draining inline.
    fn is_worker(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|h| h.tid == thread::current().id())
            .unwrap_or(false)
    }
}

/// Link `work` into `queue`'s FIFO. The owner back-pointer is written under
/// the queue lock before the item becomes visible in the list, so no thread
/// can observe a listed item with a stale owner.
fn insert_work(queue: &Arc<CpuQueue>, work: Arc<Work>, wake: bool) {
    let mut inner = queue.inner.lock().unwrap();
    work.set_owner(queue);
    inner.worklist.push_back(work);
    inner.insert_sequence += 1;
    drop(inner);
    if wake {
        queue.more_work.notify_one();
    }
}

/// Drain `queue`'s FIFO to empty. Runs on the worker thread, and reentrantly
/// on that same thread when a work function flushes its own queue.
fn run_queue(queue: &CpuQueue) {
    let mut inner = queue.inner.lock().unwrap();
    inner.run_depth += 1;
    if inner.run_depth > MAX_DRAIN_RECURSION {
        log::error!(
            "workqueue({}/{}): drain recursion depth {} exceeded, \
             recursive work scheduling is running away",
            queue.wq_name,
            queue.cpu,
            inner.run_depth
        );
    }
    while let Some(work) = inner.worklist.pop_front() {
        // Release before invoking so the function can re-submit its own
        // item. Manual-release items stay pending until they say otherwise.
        if work.auto_release() {
            work.release();
        }
        drop(inner);
        work.invoke();
        inner = queue.inner.lock().unwrap();
        inner.remove_sequence += 1;
        // Wake flush waiters after every single completion, not only when
        // the list empties: a flush target may sit mid-list.
        queue.work_done.notify_all();
    }
    inner.run_depth -= 1;
}

/// Block until everything inserted into `queue` before this call completed.
fn flush_cpu_queue(queue: &Arc<CpuQueue>) {
    if queue.is_worker() {
        // A work function is flushing its own queue. The worker cannot wait
        // for itself to make progress; drain inline instead.
        run_queue(queue);
    } else {
        let mut inner = queue.inner.lock().unwrap();
        let target = inner.insert_sequence;
        while inner.remove_sequence < target {
            inner = queue.work_done.wait(inner).unwrap();
        }
    }
}

/// Ask `queue`'s worker to exit and join it.
fn stop_queue(queue: &Arc<CpuQueue>) {
    {
        // The stop flag is not part of the locked state, so set and signal
        // it under the queue lock anyway: otherwise it could slip between
        // the worker's wakeup check and its wait, and the wakeup is lost.
        let _inner = queue.inner.lock().unwrap();
        queue.should_stop.store(true, Ordering::Release);
        queue.more_work.notify_all();
    }
    let handle = queue.worker.lock().take();
    if let Some(handle) = handle {
        let _ = handle.thread.join();
    }
}

/// Worker thread main loop: sleep until work arrives, drain, repeat.
fn worker_thread(queue: Arc<CpuQueue>) {
    cpu::bind(queue.cpu);
    if queue.freezeable {
        log::debug!("kworker {}/{} is freezeable", queue.wq_name, queue.cpu);
    }
    loop {
        let mut inner = queue.inner.lock().unwrap();
        while inner.worklist.is_empty() && !queue.should_stop.load(Ordering::Acquire) {
            inner = queue.more_work.wait(inner).unwrap();
        }
        drop(inner);
        if queue.should_stop.load(Ordering::Acquire) {
            // Teardown flushes before stopping, so exiting without another
            // drain pass cannot strand work a flush promised.
            break;
        }
        run_queue(&queue);
    }
}

fn spawn_worker(queue: &Arc<CpuQueue>) -> Result<(), WorkqueueError> {
    let thread_name = format!("{}/{}", queue.wq_name, queue.cpu);
    let q = Arc::clone(queue);
    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || worker_thread(q))
        .map_err(|e| {
            log::error!("workqueue({}): failed to spawn worker: {}", thread_name, e);
            WorkqueueError::SpawnFailed
        })?;
    log::info!("KWORKER_SPAWN: {} started", thread_name);
    let tid = handle.thread().id();
    *queue.worker.lock() = Some(WorkerHandle { thread: handle, tid });
    Ok(())
}

// =============================================================================
// Workqueue
// =============================================================================

/// A named collection of per-CPU queues.
pub struct Workqueue {
    name: &'static str,
    flags: WorkqueueFlags,
    /// Per-CPU queue slots, indexed by CPU id. Single-threaded queues use
    /// only [`SINGLETHREAD_CPU`].
    queues: spin::Mutex<Vec<Option<Arc<CpuQueue>>>>,
    destroyed: AtomicBool,
}

impl Workqueue {
    /// Create a workqueue and spawn its workers: one for
    /// [`SINGLETHREAD_CPU`] in single-threaded mode, else one per online
    /// CPU. On spawn failure everything built so far is torn down again and
    /// no partially constructed workqueue is observable.
    pub fn new(name: &'static str, flags: WorkqueueFlags) -> Result<Arc<Workqueue>, WorkqueueError> {
        cpu::ensure_init();
        let wq = Arc::new(Workqueue {
            name,
            flags,
            queues: spin::Mutex::new(vec![None; MAX_CPUS]),
            destroyed: AtomicBool::new(false),
        });
        let targets = if flags.single_threaded {
            vec![SINGLETHREAD_CPU]
        } else {
            cpu::online_cpus()
        };
        for cpu in targets {
            if let Err(e) = wq.attach_cpu(cpu) {
                wq.detach_all();
                return Err(e);
            }
        }
        if !flags.single_threaded {
            register(&wq);
        }
        log::info!(
            "WORKQUEUE_CREATE: '{}' ({})",
            name,
            if flags.single_threaded { "single-threaded" } else { "per-cpu" }
        );
        Ok(wq)
    }

    /// Diagnostic name of this workqueue.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue work for execution on the submitter's current CPU (or the
    /// fixed queue in single-threaded mode). Returns false if the item is
    /// already pending; that is a no-op, not an error.
    ///
    /// Safe to call from inside a running work function, including
    /// re-submitting the function's own item.
    pub fn queue_work(&self, work: Arc<Work>) -> bool {
        if self.destroyed.load(Ordering::SeqCst) {
            log::warn!(
                "workqueue({}): work '{}' submitted after destroy, dropping",
                self.name,
                work.name()
            );
            return false;
        }
        if !work.test_and_set_pending() {
            log::warn!(
                "workqueue({}): work '{}' already pending, rejecting",
                self.name,
                work.name()
            );
            return false;
        }
        let queue = self.queue_for(cpu::current());
        insert_work(&queue, work, true);
        true
    }

    /// Queue work onto an explicit CPU's queue. Used by the per-CPU fan-out
    /// path and hotplug re-homing.
    pub(crate) fn queue_work_on(&self, cpu: usize, work: Arc<Work>) -> bool {
        if self.destroyed.load(Ordering::SeqCst) {
            return false;
        }
        if !work.test_and_set_pending() {
            return false;
        }
        let queue = self.queue_for(cpu);
        insert_work(&queue, work, true);
        true
    }

    /// Queue work to run after `delay`. A zero delay bypasses the timer and
    /// behaves exactly like [`Workqueue::queue_work`]. Returns false if the
    /// item is already scheduled (armed or queued).
    pub fn queue_delayed_work(
        self: &Arc<Self>,
        dwork: &Arc<DelayedWork>,
        delay: Duration,
    ) -> bool {
        if delay.is_zero() {
            return self.queue_work(Arc::clone(dwork.work()));
        }
        if self.destroyed.load(Ordering::SeqCst) {
            log::warn!(
                "workqueue({}): delayed work '{}' submitted after destroy, dropping",
                self.name,
                dwork.work().name()
            );
            return false;
        }
        if !dwork.work().test_and_set_pending() {
            return false;
        }
        let wq = Arc::clone(self);
        let dw = Arc::clone(dwork);
        dwork.arm_with(|| {
            timer::arm(
                delay,
                Box::new(move || {
                    // Only the enqueue mechanics run here: the item is
                    // already pending. Destination is resolved at fire time.
                    dw.clear_timer();
                    wq.enqueue_pending(Arc::clone(dw.work()), None);
                }),
            )
        });
        true
    }

    /// Like [`Workqueue::queue_delayed_work`], but the destination CPU is
    /// chosen by the caller instead of derived from the firing context.
    pub fn queue_delayed_work_on(
        self: &Arc<Self>,
        cpu: usize,
        dwork: &Arc<DelayedWork>,
        delay: Duration,
    ) -> bool {
        assert!(cpu < MAX_CPUS, "cpu {} out of range", cpu);
        if self.destroyed.load(Ordering::SeqCst) {
            log::warn!(
                "workqueue({}): delayed work '{}' submitted after destroy, dropping",
                self.name,
                dwork.work().name()
            );
            return false;
        }
        if !dwork.work().test_and_set_pending() {
            return false;
        }
        if delay.is_zero() {
            self.enqueue_pending(Arc::clone(dwork.work()), Some(cpu));
            return true;
        }
        let wq = Arc::clone(self);
        let dw = Arc::clone(dwork);
        dwork.arm_with(|| {
            timer::arm(
                delay,
                Box::new(move || {
                    dw.clear_timer();
                    wq.enqueue_pending(Arc::clone(dw.work()), Some(cpu));
                }),
            )
        });
        true
    }

    /// Enqueue an item whose pending bit is already set (delayed-timer fire
    /// and hotplug re-homing paths).
    pub(crate) fn enqueue_pending(&self, work: Arc<Work>, target: Option<usize>) {
        // Re-checked via try_queue_for below: a timer can fire while the
        // queue is being torn down, and the wheel thread must not die for it.
        let queue = if self.destroyed.load(Ordering::SeqCst) {
            None
        } else {
            self.try_queue_for(target.unwrap_or_else(cpu::current))
        };
        let Some(queue) = queue else {
            log::warn!(
                "workqueue({}): work '{}' arrived after destroy, dropping",
                self.name,
                work.name()
            );
            work.release();
            return;
        };
        insert_work(&queue, work, true);
    }

    /// Block until every item that was pending on any of this workqueue's
    /// queues at the time of the call has completed. Items submitted after
    /// the call begins are not waited for.
    pub fn flush(&self) {
        if self.destroyed.load(Ordering::SeqCst) {
            panic!("workqueue '{}': flush after destroy", self.name);
        }
        self.flush_queues();
    }

    fn flush_queues(&self) {
        // Snapshot the live queues first: a flush can block a long time and
        // must not hold the slot lock while it waits.
        let queues: Vec<Arc<CpuQueue>> = self.queues.lock().iter().flatten().cloned().collect();
        for queue in queues {
            flush_cpu_queue(&queue);
        }
    }

    /// Flush, stop every worker, and release the per-CPU queues. Calling
    /// destroy twice is a caller logic bug and panics.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            panic!("workqueue '{}': destroy called twice", self.name);
        }
        self.flush_queues();
        if !self.flags.single_threaded {
            unregister(self);
        }
        self.detach_all();
        log::info!("WORKQUEUE_DESTROY: '{}'", self.name);
    }

    /// Resolve the destination queue for a submission aimed at `cpu`.
    fn queue_for(&self, cpu: usize) -> Arc<CpuQueue> {
        self.try_queue_for(cpu)
            .expect("workqueue has no live queues")
    }

    fn try_queue_for(&self, cpu: usize) -> Option<Arc<CpuQueue>> {
        let slots = self.queues.lock();
        if self.flags.single_threaded {
            return slots[SINGLETHREAD_CPU].clone();
        }
        if cpu::is_online(cpu) {
            if let Some(queue) = &slots[cpu] {
                return Some(Arc::clone(queue));
            }
        }
        // The target CPU went away (or this queue has no worker for it yet):
        // re-route to the first live queue.
        if let Some(queue) = &slots[cpu::first_online()] {
            return Some(Arc::clone(queue));
        }
        slots.iter().flatten().next().cloned()
    }

    /// Create and start this workqueue's queue for `cpu`.
    pub(crate) fn attach_cpu(&self, cpu: usize) -> Result<(), WorkqueueError> {
        let queue = Arc::new(CpuQueue::new(self.name, cpu, self.flags.freezeable));
        spawn_worker(&queue)?;
        self.queues.lock()[cpu] = Some(queue);
        Ok(())
    }

    /// Stop and drop this workqueue's queue for `cpu`. With `migrate`, any
    /// still-pending items are re-homed onto the calling CPU's queue after
    /// the worker has stopped.
    pub(crate) fn detach_cpu(&self, cpu: usize, migrate: bool) {
        let queue = self.queues.lock()[cpu].take();
        let Some(queue) = queue else { return };
        stop_queue(&queue);
        if migrate {
            take_over_work(self, &queue);
        }
    }

    fn detach_all(&self) {
        for cpu in 0..MAX_CPUS {
            let queue = self.queues.lock()[cpu].take();
            if let Some(queue) = queue {
                stop_queue(&queue);
            }
        }
    }
}

impl Drop for Workqueue {
    fn drop(&mut self) {
        // Last handle gone without an explicit destroy: clean up the same
        // way, minus the double-destroy misuse check.
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.flush_queues();
            self.detach_all();
        }
    }
}

/// Move everything still queued on a stopped CPU's queue onto the calling
/// CPU's queue. The items stay pending throughout; this step cannot fail.
fn take_over_work(wq: &Workqueue, dead: &Arc<CpuQueue>) {
    let orphans: Vec<Arc<Work>> = dead.inner.lock().unwrap().worklist.drain(..).collect();
    if orphans.is_empty() {
        return;
    }
    log::info!(
        "WORKQUEUE_HOTPLUG: re-homing {} item(s) from {}/{} to cpu {}",
        orphans.len(),
        wq.name,
        dead.cpu,
        cpu::current()
    );
    let dest = wq.queue_for(cpu::current());
    for work in orphans {
        insert_work(&dest, work, false);
    }
    dest.more_work.notify_one();
}

// =============================================================================
// Convenience constructors
// =============================================================================

/// Create a workqueue with one worker per online CPU.
pub fn create_workqueue(name: &'static str) -> Result<Arc<Workqueue>, WorkqueueError> {
    Workqueue::new(name, WorkqueueFlags::default())
}

/// Create a workqueue with exactly one worker, regardless of CPU count.
pub fn create_singlethread_workqueue(name: &'static str) -> Result<Arc<Workqueue>, WorkqueueError> {
    Workqueue::new(
        name,
        WorkqueueFlags {
            single_threaded: true,
            ..WorkqueueFlags::default()
        },
    )
}

// =============================================================================
// Direct execution and delayed-work cancellation
// =============================================================================

/// Run a pending work item synchronously on the calling thread instead of
/// waiting for its worker ("do it now, not later"). Returns true iff the
/// item was still pending and still linked into its queue; in that case it
/// has run exactly once by the time this returns.
pub fn run_scheduled_work(work: &Arc<Work>) -> bool {
    let Some(queue) = work.owner() else {
        return false;
    };
    let mut inner = queue.inner.lock().unwrap();
    if !work.is_pending() || !work.owner_is(&queue) {
        return false;
    }
    let Some(pos) = inner.worklist.iter().position(|w| Arc::ptr_eq(w, work)) else {
        // Pending but not linked here: still armed behind a timer, or the
        // worker already dequeued it.
        return false;
    };
    inner.worklist.remove(pos);
    if work.auto_release() {
        work.release();
    }
    drop(inner);
    work.invoke();
    let mut inner = queue.inner.lock().unwrap();
    inner.remove_sequence += 1;
    queue.work_done.notify_all();
    drop(inner);
    true
}

/// Disarm a delayed work item before its timer fires. Returns true iff the
/// timer was cancelled in time, in which case the work will not run and is
/// submittable again.
pub fn cancel_delayed_work(dwork: &DelayedWork) -> bool {
    dwork.try_disarm()
}

/// Reliably kill a self-rearming delayed work item on `wq`: retry the
/// cancel, flushing the queue whenever the item has already moved from
/// timer to queued-or-running. Termination relies on the work function
/// ceasing to rearm once the caller's stop condition holds (or on the
/// cancel winning a timer window, for items that rearm unconditionally).
pub fn cancel_rearming_delayed_workqueue(wq: &Workqueue, dwork: &DelayedWork) {
    while !cancel_delayed_work(dwork) {
        wq.flush();
        if !dwork.timer_armed() && !dwork.work().is_pending() {
            // Neither armed nor queued after a full flush: it stopped
            // rearming and is dead.
            break;
        }
    }
}

/// [`cancel_rearming_delayed_workqueue`] against the system workqueue.
pub fn cancel_rearming_delayed_work(dwork: &DelayedWork) {
    match system_workqueue() {
        Some(wq) => cancel_rearming_delayed_workqueue(wq, dwork),
        None => log::error!("cancel_rearming_delayed_work: system workqueue not initialized"),
    }
}

// =============================================================================
// Multi-threaded queue registry (hotplug fan-out)
// =============================================================================

/// Every live multi-threaded workqueue. Only the hotplug entry points walk
/// this; it is populated by creation and drained by destroy.
static WORKQUEUES: spin::Mutex<Vec<Arc<Workqueue>>> = spin::Mutex::new(Vec::new());

fn register(wq: &Arc<Workqueue>) {
    WORKQUEUES.lock().push(Arc::clone(wq));
}

fn unregister(wq: &Workqueue) {
    WORKQUEUES
        .lock()
        .retain(|w| !core::ptr::eq(Arc::as_ptr(w), wq as *const Workqueue));
}

/// Snapshot of the registered multi-threaded workqueues.
pub(crate) fn registered_workqueues() -> Vec<Arc<Workqueue>> {
    WORKQUEUES.lock().clone()
}

// =============================================================================
// System workqueue (global default)
// =============================================================================

/// Global default workqueue, created once by [`init_workqueue`] and never
/// torn down.
static SYSTEM_WQ: OnceCell<Arc<Workqueue>> = OnceCell::uninit();

/// Initialize the workqueue subsystem: CPU topology, timer wheel, and the
/// "events" system workqueue. Idempotent; every embedder entry point may
/// call it defensively.
pub fn init_workqueue() {
    cpu::ensure_init();
    timer::start();
    let mut created = false;
    let _ = SYSTEM_WQ.try_init_once(|| {
        created = true;
        Workqueue::new("events", WorkqueueFlags::default())
            .expect("failed to create system workqueue")
    });
    if created {
        log::info!("WORKQUEUE_INIT: system workqueue online");
    }
}

fn system_workqueue() -> Option<&'static Arc<Workqueue>> {
    SYSTEM_WQ.try_get().ok()
}

/// Schedule work on the system workqueue.
///
/// Returns true if the work was queued, false if already pending.
pub fn schedule_work(work: Arc<Work>) -> bool {
    match system_workqueue() {
        Some(wq) => wq.queue_work(work),
        None => {
            log::error!("schedule_work: system workqueue not initialized");
            false
        }
    }
}

/// Create and schedule a work item on the system workqueue in one step.
/// Returns the `Work` handle so the caller can cancel or re-submit later.
pub fn schedule_work_fn<F>(func: F, name: &'static str) -> Arc<Work>
where
    F: Fn() + Send + Sync + 'static,
{
    let work = Work::new(func, name);
    if !schedule_work(Arc::clone(&work)) {
        log::warn!("schedule_work_fn: failed to queue work '{}'", name);
    }
    work
}

/// Schedule delayed work on the system workqueue.
pub fn schedule_delayed_work(dwork: &Arc<DelayedWork>, delay: Duration) -> bool {
    match system_workqueue() {
        Some(wq) => wq.queue_delayed_work(dwork, delay),
        None => {
            log::error!("schedule_delayed_work: system workqueue not initialized");
            false
        }
    }
}

/// Schedule delayed work on the system workqueue, pinned to `cpu`.
pub fn schedule_delayed_work_on(cpu: usize, dwork: &Arc<DelayedWork>, delay: Duration) -> bool {
    match system_workqueue() {
        Some(wq) => wq.queue_delayed_work_on(cpu, dwork, delay),
        None => {
            log::error!("schedule_delayed_work_on: system workqueue not initialized");
            false
        }
    }
}

/// Run `func` once on every online CPU and wait for all of them: a
/// transient work item is queued per CPU, then the system workqueue is
/// flushed. Returns false if the subsystem is not initialized.
pub fn schedule_on_each_cpu<F>(func: F) -> bool
where
    F: Fn() + Send + Sync + 'static,
{
    let Some(wq) = system_workqueue() else {
        log::error!("schedule_on_each_cpu: system workqueue not initialized");
        return false;
    };
    let func = Arc::new(func);
    for cpu in cpu::online_cpus() {
        let f = Arc::clone(&func);
        let work = Work::new(move || f(), "on_each_cpu");
        wq.queue_work_on(cpu, work);
    }
    wq.flush();
    true
}

/// Flush the system workqueue, waiting for all pending work to complete.
pub fn flush_scheduled_work() {
    match system_workqueue() {
        Some(wq) => wq.flush(),
        None => log::error!("flush_scheduled_work: system workqueue not initialized"),
    }
}

//! Workqueue behavior tests: submission, ordering, flush, direct execution.
//!
//! 1. Basic execution completes before flush returns
//! 2. FIFO submission order on a single queue
//! 3. Re-queue rejection while work is pending
//! 4. Self-flush from inside a work function (no deadlock)
//! 5. Nested self-flush past the recursion diagnostic keeps draining
//! 6. Flush does not wait for later submissions (no livelock)
//! 7. Direct synchronous execution of a queued item
//! 8. Manual-release items gate their own re-submission
//! 9. Double destroy is a caller bug

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use workqueue::{create_singlethread_workqueue, run_scheduled_work, DelayedWork, Work, Workqueue};

#[test]
fn basic_execution_completes_before_flush_returns() {
    let wq = create_singlethread_workqueue("t_basic").unwrap();
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);
    let work = Work::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "basic_work",
    );

    assert!(wq.queue_work(work), "fresh work should be accepted");
    wq.flush();
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "work should have executed exactly once"
    );
    wq.destroy();
}

#[test]
fn submission_order_is_execution_order() {
    let wq = create_singlethread_workqueue("t_fifo").unwrap();
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    for id in [1u32, 2, 3] {
        let log = Arc::clone(&order);
        let work = Work::new(
            move || {
                log.lock().unwrap().push(id);
            },
            "fifo_work",
        );
        assert!(wq.queue_work(work));
    }

    wq.flush();
    assert_eq!(
        *order.lock().unwrap(),
        vec![1, 2, 3],
        "items on one queue must run in submission order"
    );
    wq.destroy();
}

#[test]
fn requeue_while_pending_is_rejected() {
    let wq = create_singlethread_workqueue("t_requeue").unwrap();
    let gate = Arc::new(AtomicBool::new(false));
    let counter = Arc::new(AtomicU32::new(0));

    // Park the worker so the counting work stays queued.
    let g = Arc::clone(&gate);
    let blocker = Work::new(
        move || {
            while !g.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
        },
        "gate_work",
    );
    let c = Arc::clone(&counter);
    let work = Work::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "counted_work",
    );

    assert!(wq.queue_work(blocker));
    assert!(wq.queue_work(Arc::clone(&work)));
    assert!(
        !wq.queue_work(Arc::clone(&work)),
        "re-queue should be rejected while work is pending"
    );

    gate.store(true, Ordering::Release);
    wq.flush();
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "rejected re-queue must not cause a second execution"
    );

    // Idle again: re-submission is accepted now.
    assert!(wq.queue_work(work));
    wq.flush();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    wq.destroy();
}

#[test]
fn self_flush_drains_inline_instead_of_deadlocking() {
    let wq = create_singlethread_workqueue("t_selfflush").unwrap();
    let counter = Arc::new(AtomicU32::new(0));

    let c = Arc::clone(&counter);
    let inner_wq = Arc::clone(&wq);
    let work = Work::new(
        move || {
            // Flushing our own queue from a work function must drain inline.
            inner_wq.flush();
            c.fetch_add(1, Ordering::SeqCst);
        },
        "self_flush_work",
    );

    let started = Instant::now();
    assert!(wq.queue_work(work));
    wq.flush();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "self-flush took {:?}, looks like a deadlock",
        started.elapsed()
    );
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    wq.destroy();
}

#[test]
fn nested_self_flush_keeps_executing() {
    // Each level submits the next item and flushes inline, driving the
    // drain loop well past its recursion diagnostic threshold. That is a
    // logged warning, not a failure: every level must still run.
    fn chain(wq: &Arc<Workqueue>, counter: &Arc<AtomicU32>, depth: u32) -> Arc<Work> {
        let wq2 = Arc::clone(wq);
        let c = Arc::clone(counter);
        Work::new(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                if depth > 0 {
                    let next = chain(&wq2, &c, depth - 1);
                    assert!(wq2.queue_work(next));
                    wq2.flush();
                }
            },
            "nested_flush_work",
        )
    }

    let wq = create_singlethread_workqueue("t_nested_flush").unwrap();
    let counter = Arc::new(AtomicU32::new(0));

    let started = Instant::now();
    assert!(wq.queue_work(chain(&wq, &counter, 5)));
    wq.flush();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "nested self-flush took {:?}, looks like a deadlock",
        started.elapsed()
    );
    assert_eq!(
        counter.load(Ordering::SeqCst),
        6,
        "every nesting level must execute, including those past the \
         recursion diagnostic"
    );
    wq.destroy();
}

#[test]
fn flush_ignores_later_submissions() {
    let wq = create_singlethread_workqueue("t_livelock").unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let counter = Arc::new(AtomicU32::new(0));

    // A few slow items so the flood below overlaps the flush window.
    for _ in 0..3 {
        let c = Arc::clone(&counter);
        let work = Work::new(
            move || {
                std::thread::sleep(Duration::from_millis(20));
                c.fetch_add(1, Ordering::SeqCst);
            },
            "slow_work",
        );
        assert!(wq.queue_work(work));
    }

    // Flood the queue from another thread for as long as the flush runs.
    let flood_wq = Arc::clone(&wq);
    let flood_stop = Arc::clone(&stop);
    let flood_counter = Arc::clone(&counter);
    let flooder = std::thread::spawn(move || {
        while !flood_stop.load(Ordering::Acquire) {
            let c = Arc::clone(&flood_counter);
            flood_wq.queue_work(Work::new(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
                "flood_work",
            ));
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let started = Instant::now();
    wq.flush();
    let elapsed = started.elapsed();
    stop.store(true, Ordering::Release);
    flooder.join().unwrap();

    assert!(
        elapsed < Duration::from_secs(5),
        "flush took {:?} under continuous submission, livelock?",
        elapsed
    );
    assert!(
        counter.load(Ordering::SeqCst) >= 3,
        "flush returned before the work pending at call time had finished"
    );
    wq.destroy();
}

#[test]
fn run_scheduled_work_executes_inline() {
    let wq = create_singlethread_workqueue("t_runnow").unwrap();
    let gate = Arc::new(AtomicBool::new(false));
    let counter = Arc::new(AtomicU32::new(0));

    let g = Arc::clone(&gate);
    let blocker = Work::new(
        move || {
            while !g.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
        },
        "gate_work",
    );
    let c = Arc::clone(&counter);
    let work = Work::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "run_now_work",
    );

    assert!(wq.queue_work(blocker));
    assert!(wq.queue_work(Arc::clone(&work)));

    // Still queued behind the blocker: runs right here, on this thread.
    assert!(run_scheduled_work(&work), "item was pending and linked");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(
        !run_scheduled_work(&work),
        "second direct run finds nothing queued"
    );

    gate.store(true, Ordering::Release);
    wq.flush();
    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "directly-run item must not execute a second time from the queue"
    );
    wq.destroy();
}

#[test]
fn manual_release_gates_resubmission() {
    let wq = create_singlethread_workqueue("t_manual").unwrap();
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);
    let work = Work::new_manual_release(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "manual_work",
    );

    assert!(wq.queue_work(Arc::clone(&work)));
    wq.flush();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(
        work.is_pending(),
        "manual-release work stays pending after running"
    );
    assert!(
        !wq.queue_work(Arc::clone(&work)),
        "unreleased item must be rejected"
    );

    work.release();
    assert!(wq.queue_work(Arc::clone(&work)));
    wq.flush();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    work.release();
    wq.destroy();
}

#[test]
fn system_workqueue_wrappers() {
    workqueue::init_workqueue();
    let counter = Arc::new(AtomicU32::new(0));

    let c = Arc::clone(&counter);
    let work = workqueue::schedule_work_fn(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "sys_work",
    );
    workqueue::flush_scheduled_work();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!work.is_pending());

    let c = Arc::clone(&counter);
    let dwork = DelayedWork::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        "sys_delayed",
    );
    assert!(workqueue::schedule_delayed_work(
        &dwork,
        Duration::from_millis(20)
    ));
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
#[should_panic(expected = "destroy called twice")]
fn double_destroy_panics() {
    let wq = create_singlethread_workqueue("t_double_destroy").unwrap();
    wq.destroy();
    wq.destroy();
}

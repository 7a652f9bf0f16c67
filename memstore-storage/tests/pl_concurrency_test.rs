//! PL: Connection pool concurrency scenarios (PL-09, PL-10).
//!
//! The inline `pool::tests` module checks single-threaded invariants. These
//! drive real threads against a one-connection pool to exercise the FIFO
//! waiter queue and the checkout-timeout path under actual contention.

use memstore_core::MemStoreError;
use memstore_storage::Pool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn pl_09_three_waiters_are_served_in_fifo_order() {
    let pool = Pool::open_in_memory(1, Duration::from_secs(30));
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut peak_waiting = 0usize;

    let mut handles = Vec::new();
    for i in 0..3 {
        let pool_for_thread = Arc::clone(&pool);
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            pool_for_thread.with_connection(Duration::from_secs(2), |_conn| {
                thread::sleep(Duration::from_millis(50));
                order.lock().unwrap().push(i);
                Ok(())
            })
            .unwrap();
        }));
        // Stagger dispatch so O1 claims the only connection before O2/O3 enqueue.
        thread::sleep(Duration::from_millis(10));
        peak_waiting = peak_waiting.max(pool.stats().waiting_requests);
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(&*order.lock().unwrap(), &[0, 1, 2]);
    assert!(peak_waiting <= 2, "at most two requests should ever be waiting behind the one in flight");
}

#[test]
fn pl_10_checkout_times_out_while_slow_op_holds_the_only_connection() {
    let pool = Pool::open_in_memory(1, Duration::from_secs(30));
    let pool_for_slow = Arc::clone(&pool);

    let slow = thread::spawn(move || {
        pool_for_slow
            .with_connection(Duration::from_secs(2), |_conn| {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    let result = pool.get_connection(Duration::from_millis(100));
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(MemStoreError::CheckoutTimeout(_))));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(250), "timeout fired late: {elapsed:?}");

    slow.join().unwrap();

    // The pool recovers once the slow op releases — no leaked checkout slot.
    pool.with_connection(Duration::from_secs(1), |_conn| Ok(())).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.active_connections, 0);
    assert_eq!(stats.waiting_requests, 0);
}

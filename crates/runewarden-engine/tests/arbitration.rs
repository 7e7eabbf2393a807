use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use runewarden_engine::{InputArbiter, Priority, SessionId};

#[tokio::test(start_paused = true)]
async fn test_at_most_one_holder() {
    let arbiter = Arc::new(InputArbiter::new(Duration::from_secs(30)));
    let holders = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for i in 0..8u32 {
        let arbiter = arbiter.clone();
        let holders = holders.clone();
        let max_seen = max_seen.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..3 {
                let name = format!("s{}", i);
                let _grant = arbiter.acquire(SessionId(i), &name, Priority::NORMAL).await;
                let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                assert_eq!(arbiter.holder(), Some(SessionId(i)));
                tokio::time::sleep(Duration::from_millis(5)).await;
                holders.fetch_sub(1, Ordering::SeqCst);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(arbiter.holder(), None);
}

#[tokio::test(start_paused = true)]
async fn test_release_grants_highest_priority_waiter() {
    let arbiter = Arc::new(InputArbiter::new(Duration::from_secs(30)));
    let order = Arc::new(Mutex::new(Vec::new()));
    let held = arbiter.acquire(SessionId(1), "holder", Priority::NORMAL).await;

    let mut tasks = Vec::new();
    for (id, priority) in [(2, Priority(10)), (3, Priority::HIGH), (4, Priority::NORMAL), (5, Priority::HIGH)] {
        let arbiter = arbiter.clone();
        let order = order.clone();
        tasks.push(tokio::spawn(async move {
            let _grant = arbiter.acquire(SessionId(id), "waiter", priority).await;
            order.lock().unwrap().push(id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }));
        // Let the waiter register before the next one
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(arbiter.waiting(), 4);

    drop(held);
    // Exactly one waiter is unblocked, the earliest of the highest priority
    assert_eq!(arbiter.holder(), Some(SessionId(3)));
    assert_eq!(arbiter.waiting(), 3);

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![3, 5, 4, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_grant_keeps_waiting() {
    let arbiter = Arc::new(InputArbiter::new(Duration::from_millis(100)));
    let held = arbiter.acquire(SessionId(1), "holder", Priority::NORMAL).await;

    let waiter = {
        let arbiter = arbiter.clone();
        tokio::spawn(async move {
            let grant = arbiter.acquire(SessionId(2), "waiter", Priority::NORMAL).await;
            grant.session()
        })
    };
    // Well past the warn threshold the waiter is still queued
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(arbiter.waiting(), 1);

    drop(held);
    assert_eq!(waiter.await.unwrap(), SessionId(2));
}

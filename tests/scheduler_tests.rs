use std::time::Duration;

use magic_paper::events::ControlEvent;
use magic_paper::scheduler::Scheduler;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn armed_deadline_delivers_a_shuffle() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut scheduler = Scheduler::new(tx);

    scheduler.arm(Duration::from_millis(10));
    assert!(scheduler.is_armed());

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("deadline should fire")
        .expect("channel open");
    assert_eq!(event, ControlEvent::Shuffle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fired_deadline_is_no_longer_armed() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut scheduler = Scheduler::new(tx);

    scheduler.arm(Duration::from_millis(10));
    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("deadline should fire")
        .expect("channel open");
    assert_eq!(event, ControlEvent::Shuffle);

    // The token is released right after the send completes.
    timeout(Duration::from_secs(2), async {
        while scheduler.is_armed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("a fired deadline must stop reporting as armed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rearming_supersedes_the_previous_deadline() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut scheduler = Scheduler::new(tx);

    scheduler.arm(Duration::from_millis(10));
    scheduler.arm(Duration::from_secs(60));

    // The first deadline was invalidated, so nothing arrives.
    assert!(
        timeout(Duration::from_millis(200), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_discards_the_pending_deadline() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut scheduler = Scheduler::new(tx);

    scheduler.arm(Duration::from_millis(10));
    scheduler.cancel();
    assert!(!scheduler.is_armed());

    assert!(
        timeout(Duration::from_millis(200), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_without_pending_deadline_is_a_noop() {
    let (tx, _rx) = mpsc::channel::<ControlEvent>(4);
    let mut scheduler = Scheduler::new(tx);
    scheduler.cancel();
    assert!(!scheduler.is_armed());
}

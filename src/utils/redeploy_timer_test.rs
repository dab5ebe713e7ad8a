use std::time::Duration;

use tokio::sync::mpsc;

use crate::utils::RedeployTimer;

#[tokio::test]
async fn test_timer_starts_disarmed() {
    tokio::time::pause();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let timer = RedeployTimer::new("ds1", tx);

    assert!(!timer.is_armed());
    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_timer_fires_once_after_delay() {
    tokio::time::pause();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut timer = RedeployTimer::new("ds1", tx);

    timer.reset(Duration::from_millis(100));
    assert!(timer.is_armed());

    let name = rx.recv().await.expect("timer should fire");
    assert_eq!(name, "ds1");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_timer_reset_coalesces_bursts() {
    tokio::time::pause();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut timer = RedeployTimer::new("ds1", tx);

    for _ in 0..5 {
        timer.reset(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rx.recv().await.as_deref(), Some("ds1"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_timer_stop_disarms() {
    tokio::time::pause();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut timer = RedeployTimer::new("ds1", tx);

    timer.reset(Duration::from_millis(100));
    assert!(timer.stop());
    assert!(!timer.stop());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
}

//! Waiters driven by the real clock.

use chime::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock::new(Tz::UTC))
}

fn delay_event(clock: &Arc<dyn Clock>, parameter: &str) -> Event {
    Event::new(Some(&EventSpec::new("delay", parameter)), false, clock.clone()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn delay_waiter_fires_on_a_tokio_task() {
    let clock = system_clock();
    let event = delay_event(&clock, "00:00:02");
    let mut waiter = event.waiter(clock.now());
    assert!(waiter.try_fired().is_none());

    let fired = waiter.await;
    assert!(fired.is_some());
}

#[tokio::test]
async fn past_targets_fire_without_waiting() {
    let clock = system_clock();
    let event = Event::new(
        Some(&EventSpec::new("timestamp", "2001-01-01 00:00:00")),
        false,
        clock.clone(),
    )
    .unwrap();
    let before = clock.now();
    let mut waiter = event.waiter(before);
    let fired = waiter.try_fired().expect("fired immediately");
    assert!(fired >= before);
    assert!(event.has_final_event_occurred(before));
}

#[test]
fn blocking_wait_works_outside_a_runtime() {
    let clock = system_clock();
    let event = delay_event(&clock, "00:00:01");
    let asked = clock.now();
    let fired = event.waiter(asked).blocking_wait().expect("fired");
    assert!(fired - asked >= TimeDelta::milliseconds(900));
}

#[test]
fn cancelled_thread_timers_release_their_threads() {
    let clock = SystemClock::new(Tz::UTC);
    let alive = Arc::new(());
    for _ in 0..64 {
        let held = alive.clone();
        let handle = clock.after_func(
            Duration::from_secs(3600),
            Box::new(move |_: DateTime<Utc>| drop(held)),
        );
        handle.cancel();
    }

    // Each timer thread owns a clone until it exits.
    let deadline = Instant::now() + Duration::from_secs(5);
    while Arc::strong_count(&alive) > 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(Arc::strong_count(&alive), 1, "timer threads still running");
}

#[test]
fn dropping_a_thread_timer_handle_leaves_it_armed() {
    let clock = SystemClock::new(Tz::UTC);
    let (tx, rx) = mpsc::channel();
    let handle = clock.after_func(
        Duration::from_millis(50),
        Box::new(move |at: DateTime<Utc>| {
            let _ = tx.send(at);
        }),
    );
    drop(handle);
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
}

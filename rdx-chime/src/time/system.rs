use super::{Clock, TimerCallback, TimerHandle};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::trace;

/// The real wall clock, read in a fixed location.
///
/// Deferred callbacks run on a spawned tokio task when called from inside a
/// runtime, and on a dedicated OS thread otherwise.
#[derive(Debug, Clone)]
pub struct SystemClock {
    location: Tz,
}

impl SystemClock {
    pub fn new(location: Tz) -> Self {
        Self { location }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn location(&self) -> Tz {
        self.location
    }

    fn after_func(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        trace!(?delay, "arming system timer");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback(Utc::now());
                });
                TimerHandle::new(move || task.abort())
            }
            Err(_) => {
                let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
                let deadline = Instant::now() + delay;
                std::thread::spawn(move || match cancel_rx.recv_timeout(delay) {
                    Ok(()) => trace!("system timer cancelled"),
                    Err(RecvTimeoutError::Timeout) => callback(Utc::now()),
                    // The handle was dropped without cancelling: stay armed.
                    Err(RecvTimeoutError::Disconnected) => {
                        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                        callback(Utc::now());
                    }
                });
                TimerHandle::new(move || {
                    let _ = cancel_tx.send(());
                })
            }
        }
    }
}

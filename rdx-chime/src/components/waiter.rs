//! A one-shot notification that an event's moment has arrived.

use crate::time::{Clock, TimerHandle};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Receives exactly one instant: the clock's "now" when the target arrived.
///
/// A `Waiter` can be polled without blocking ([`Waiter::try_fired`]), awaited,
/// or waited on from synchronous code ([`Waiter::blocking_wait`]). Dropping an
/// unfired waiter cancels its timer.
#[derive(Debug)]
pub struct Waiter {
    target: DateTime<Utc>,
    rx: oneshot::Receiver<DateTime<Utc>>,
    timer: Option<TimerHandle>,
}

impl Waiter {
    /// Arms a waiter that fires at `target` according to `clock`.
    ///
    /// Targets at or before the clock's "now" fire on the spot; anything later
    /// goes through [`Clock::after_func`].
    pub fn arm(clock: &dyn Clock, target: DateTime<Utc>) -> Self {
        let (tx, rx) = oneshot::channel();
        let now = clock.now();
        let timer = match (target - now).to_std() {
            Ok(delay) if !delay.is_zero() => {
                trace!(%target, ?delay, "waiter armed");
                Some(clock.after_func(
                    delay,
                    Box::new(move |fired_at: DateTime<Utc>| {
                        // The receiver may be gone; nobody is listening then.
                        let _ = tx.send(fired_at);
                    }),
                ))
            }
            _ => {
                let _ = tx.send(now);
                debug!(%target, %now, "waiter fired event because time already passed");
                None
            }
        };
        Self { target, rx, timer }
    }

    /// The instant this waiter is waiting for.
    pub fn target(&self) -> DateTime<Utc> {
        self.target
    }

    /// The firing instant, if the waiter has fired. Never blocks.
    ///
    /// Returns `Some` at most once.
    pub fn try_fired(&mut self) -> Option<DateTime<Utc>> {
        let fired = self.rx.try_recv().ok();
        if fired.is_some() {
            self.timer = None;
        }
        fired
    }

    /// Blocks the current thread until the waiter fires.
    ///
    /// Returns `None` if the clock dropped the timer without firing it. Must
    /// not be called from inside an async runtime.
    pub fn blocking_wait(mut self) -> Option<DateTime<Utc>> {
        self.timer = None;
        let rx = std::mem::replace(&mut self.rx, oneshot::channel().1);
        rx.blocking_recv().ok()
    }
}

impl Future for Waiter {
    /// `None` if the clock dropped the timer without firing it.
    type Output = Option<DateTime<Utc>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let fired = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(result) => result.ok(),
            Poll::Pending => return Poll::Pending,
        };
        self.timer = None;
        Poll::Ready(fired)
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

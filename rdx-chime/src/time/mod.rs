//! The clock abstraction every event is computed against.
//!
//! A [`Clock`] is the single source of "now", of the location used for
//! calendar arithmetic, and of deferred callbacks. Production code wires a
//! [`SystemClock`]; tests wire a [`MockClock`] that only moves when told to.

mod mock;
mod system;

pub use mock::MockClock;
pub use system::SystemClock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;

/// A deferred callback. It receives the clock's "now" at the moment it fires.
pub type TimerCallback = Box<dyn FnOnce(DateTime<Utc>) + Send + 'static>;

/// Source of time for events.
///
/// Implementations must be safe to share between any number of events and to
/// call from any thread.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The location used to project wall-clock times onto calendar dates.
    fn location(&self) -> Tz;

    /// Schedules `callback` to run once, `delay` from now.
    ///
    /// Every call is an independent timer. The returned handle may be used to
    /// cancel the callback before it fires; dropping it leaves the timer armed.
    fn after_func(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancels a timer created by [`Clock::after_func`].
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TimerHandle {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle for a timer that can no longer be cancelled.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Cancels the timer. A no-op if it has already fired.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

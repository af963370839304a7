//! # Chime
//!
//! "When next?" for declarative time rules, and a one-shot signal when that
//! moment arrives.
//!
//! Chime is the temporal core of a job scheduler. Given a rule and a
//! parameter it builds an [`Event`](events::Event) that can report the next
//! instant the rule refers to relative to any reference instant, say whether
//! it recurs, say whether its one-shot occurrence has already passed, and hand
//! back a [`Waiter`](components::waiter::Waiter) that fires at that instant.
//!
//! ## Core Concepts
//!
//! - **Clock**: the injectable source of "now", of the location used for
//!   calendar arithmetic, and of deferred callbacks. [`SystemClock`](time::SystemClock)
//!   in production, [`MockClock`](time::MockClock) in tests.
//! - **Rules**: `timestamp` (once, at a date and time), `time-of-day` (daily),
//!   `delay` (a fixed offset from when asked), `sunset` and `sunrise` (daily,
//!   at fixed times of 18:00:00 and 06:00:00).
//! - **Close / open**: a close daily event rolls over to tomorrow once today's
//!   time has passed; an open one keeps pointing at today.
//! - **Waiters**: one value per waiter. Recurring events are re-armed by the
//!   owner, who records each firing with `set_last_fired` so a daily event
//!   fires at most once per calendar day.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chime::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(chrono_tz::Tz::UTC));
//!     let spec = EventSpec::new("delay", "00:00:05");
//!     let mut event = Event::new(Some(&spec), false, clock.clone())?;
//!
//!     println!("{}", event.describe_at(clock.now()));
//!     if let Some(fired_at) = event.waiter(clock.now()).await {
//!         event.set_last_fired(fired_at);
//!         println!("fired at {fired_at}");
//!     }
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Chime";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

/// A prelude module for easy importing of the most common Chime types.
pub mod prelude {
    pub use crate::common::{EventRule, EventSpec};
    pub use crate::components::waiter::Waiter;
    pub use crate::config::{ChimeConfig, EventConfig};
    pub use crate::error::{ParameterError, SpecError};
    pub use crate::events::Event;
    pub use crate::time::{Clock, MockClock, SystemClock};
}

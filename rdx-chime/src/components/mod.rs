//! Contains the building blocks events are made of.
//!
//! `trigger` holds the five time rules and how each projects onto a reference
//! instant; `waiter` holds the one-shot notification handed out when an event
//! is armed. The `Event` type in `crate::events` binds the two to a clock.

pub mod trigger;
pub mod waiter;

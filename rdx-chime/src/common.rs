//! Contains common, primitive types shared by the factory, the config layer and
//! the shell.
//!
//! An [`EventSpec`] is the already-structured form of a time rule: a `rule`
//! discriminator plus a `parameter` string whose format depends on the rule.

use crate::error::ParameterError;
use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The wire format of every clock-style parameter (`time-of-day`, `delay`).
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

/// The wire format of a `timestamp` parameter, read in the clock's location.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifies which kind of time rule an event follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRule {
    /// Fires once, at an absolute date and time.
    Timestamp,
    /// Fires every day at a fixed wall-clock time.
    TimeOfDay,
    /// Fires a fixed amount of time after it is asked.
    Delay,
    /// Fires every day at sunset (approximated as 18:00:00).
    Sunset,
    /// Fires every day at sunrise (approximated as 06:00:00).
    Sunrise,
}

impl EventRule {
    pub const ALL: [EventRule; 5] = [
        EventRule::Timestamp,
        EventRule::TimeOfDay,
        EventRule::Delay,
        EventRule::Sunset,
        EventRule::Sunrise,
    ];

    /// The rule name as it appears in a specification.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRule::Timestamp => "timestamp",
            EventRule::TimeOfDay => "time-of-day",
            EventRule::Delay => "delay",
            EventRule::Sunset => "sunset",
            EventRule::Sunrise => "sunrise",
        }
    }
}

impl fmt::Display for EventRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventRule::ALL
            .into_iter()
            .find(|rule| rule.as_str() == s)
            .ok_or_else(|| format!("unknown rule: {s}"))
    }
}

/// A structured time specification, as handed over by whatever parsed the
/// user's input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventSpec {
    /// One of `timestamp`, `time-of-day`, `delay`, `sunset`, `sunrise`.
    pub rule: String,
    /// Rule-dependent value. Ignored by `sunset` and `sunrise`.
    #[serde(default)]
    pub parameter: String,
}

impl EventSpec {
    pub fn new(rule: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            parameter: parameter.into(),
        }
    }
}

impl fmt::Display for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{rule: '{}', parameter: '{}'}}", self.rule, self.parameter)
    }
}

/// Parses an `HH:MM:SS` wall-clock time.
///
/// chrono reads `:60` as a leap second; such values are refused.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime, ParameterError> {
    let time = NaiveTime::parse_from_str(s, CLOCK_FORMAT)?;
    if time.nanosecond() >= 1_000_000_000 {
        return Err(ParameterError::LeapSecond);
    }
    Ok(time)
}

/// Parses a `YYYY-MM-DD HH:MM:SS` local date and time.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ParameterError> {
    let local = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?;
    if local.nanosecond() >= 1_000_000_000 {
        return Err(ParameterError::LeapSecond);
    }
    Ok(local)
}

/// Parses an `HH:MM:SS` value as an offset of hours, minutes and seconds.
pub fn parse_clock_duration(s: &str) -> Result<TimeDelta, ParameterError> {
    parse_clock_time(s).map(clock_offset)
}

/// Reads a wall-clock time as the offset from midnight it encodes.
///
/// Sub-second parts are dropped; the parsers above never produce any.
pub(crate) fn clock_offset(time: NaiveTime) -> TimeDelta {
    TimeDelta::hours(time.hour() as i64)
        + TimeDelta::minutes(time.minute() as i64)
        + TimeDelta::seconds(time.second() as i64)
}

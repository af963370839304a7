//! The [`Event`] type: a parsed time rule bound to a clock.
//!
//! An `Event` answers "when next?" relative to any reference instant, says
//! whether it recurs or has finished for good, and hands out [`Waiter`]s that
//! fire when its moment arrives. Driving events over time (re-arming recurring
//! ones, dropping finished ones) is left to whoever owns them.

use crate::common::{parse_clock_time, parse_timestamp, EventRule, EventSpec};
use crate::components::trigger::{Delay, Occurrence, TimeOfDay, Timestamp, Trigger, SUNRISE, SUNSET};
use crate::components::waiter::Waiter;
use crate::error::{Result, SpecError};
use crate::time::Clock;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A time rule bound to a clock.
pub struct Event {
    trigger: Trigger,
    clock: Arc<dyn Clock>,
    last_fired: Option<DateTime<Utc>>,
}

impl Event {
    /// Builds the event described by `spec`.
    ///
    /// `close_event` only matters for the daily rules (`time-of-day`, `sunset`,
    /// `sunrise`): a close event rolls over to tomorrow once today's time has
    /// passed, an open one does not.
    ///
    /// # Errors
    /// Fails if `spec` is absent, names an unknown rule, or carries a parameter
    /// the rule cannot parse.
    pub fn new(spec: Option<&EventSpec>, close_event: bool, clock: Arc<dyn Clock>) -> Result<Self> {
        let spec = spec.ok_or(SpecError::Missing)?;
        let rule: EventRule = spec.rule.parse().map_err(|_| SpecError::UnknownRule {
            rule: spec.rule.clone(),
            parameter: spec.parameter.clone(),
        })?;
        let bad_parameter = |source| SpecError::BadParameter {
            rule: spec.rule.clone(),
            parameter: spec.parameter.clone(),
            source,
        };

        let trigger = match rule {
            EventRule::Timestamp => {
                let local = parse_timestamp(&spec.parameter).map_err(bad_parameter)?;
                Trigger::Timestamp(Timestamp::in_location(local, clock.location()))
            }
            EventRule::TimeOfDay => {
                let time = parse_clock_time(&spec.parameter).map_err(bad_parameter)?;
                Trigger::TimeOfDay(TimeOfDay::new(time, close_event))
            }
            EventRule::Delay => {
                let raw = parse_clock_time(&spec.parameter).map_err(bad_parameter)?;
                Trigger::Delay(Delay::new(raw))
            }
            EventRule::Sunset => Trigger::Sunset(TimeOfDay::new(SUNSET, close_event)),
            EventRule::Sunrise => Trigger::Sunrise(TimeOfDay::new(SUNRISE, close_event)),
        };

        Ok(Self {
            trigger,
            clock,
            last_fired: None,
        })
    }

    pub fn kind(&self) -> EventRule {
        self.trigger.rule()
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn has_timestamp(&self) -> bool {
        self.trigger.has_timestamp()
    }

    /// The instant this event refers to, relative to `reference`.
    ///
    /// Pure in `reference`: the recorded last firing plays no part here.
    pub fn as_timestamp(&self, reference: DateTime<Utc>) -> DateTime<Utc> {
        self.trigger.as_timestamp(reference, self.clock.location())
    }

    pub fn is_recurring(&self) -> bool {
        self.trigger.is_recurring()
    }

    /// True once the only occurrence of a one-shot event lies at or before
    /// `reference`. Always false for recurring events.
    pub fn has_final_event_occurred(&self, reference: DateTime<Utc>) -> bool {
        self.trigger
            .has_final_event_occurred(reference, self.clock.location())
    }

    /// Whether the occurrence anchored at `occurred_at` lies at or before
    /// `reference`.
    pub fn has_event_occurred(&self, occurred_at: DateTime<Utc>, reference: DateTime<Utc>) -> bool {
        self.as_timestamp(occurred_at) <= reference
    }

    /// Records when the owner last saw this event fire.
    pub fn set_last_fired(&mut self, at: DateTime<Utc>) {
        self.last_fired = Some(at);
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }

    /// Arms a waiter for the occurrence relative to `reference`.
    ///
    /// Daily events fire at most once per calendar day: if the last recorded
    /// firing is on the same local date as the target, the waiter waits for
    /// the next day's occurrence instead.
    pub fn waiter(&self, reference: DateTime<Utc>) -> Waiter {
        let location = self.clock.location();
        let mut target = self.as_timestamp(reference);
        if let (Some(daily), Some(last)) = (self.trigger.daily(), self.last_fired) {
            if last.with_timezone(&location).date_naive()
                == target.with_timezone(&location).date_naive()
            {
                let deferred = daily.day_after(target, location);
                debug!(%last, %target, %deferred, "already fired today, deferring to tomorrow");
                target = deferred;
            }
        }
        Waiter::arm(self.clock.as_ref(), target)
    }

    /// A one-line description of the event relative to `reference`.
    pub fn describe_at(&self, reference: DateTime<Utc>) -> String {
        let location = self.clock.location();
        let target = if self.has_timestamp() {
            self.as_timestamp(reference).to_string()
        } else {
            "none".to_string()
        };
        format!(
            "{}[{}] @ {} -> {} isRecurring={}",
            self.kind(),
            self.trigger.parsed(location),
            reference,
            target,
            self.is_recurring()
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe_at(self.clock.now()))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("trigger", &self.trigger)
            .field("location", &self.clock.location())
            .field("last_fired", &self.last_fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParameterError;
    use crate::time::MockClock;
    use chrono::{TimeDelta, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn build(rule: &str, parameter: &str, close: bool) -> Result<Event> {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new(noon()));
        Event::new(Some(&EventSpec::new(rule, parameter)), close, clock)
    }

    #[test]
    fn factory_builds_every_rule() {
        let cases = [
            ("timestamp", "2026-03-14 18:30:00", EventRule::Timestamp),
            ("time-of-day", "06:00:00", EventRule::TimeOfDay),
            ("delay", "00:00:05", EventRule::Delay),
            ("sunset", "", EventRule::Sunset),
            ("sunrise", "whatever", EventRule::Sunrise),
        ];
        for (rule, parameter, kind) in cases {
            let event = build(rule, parameter, false).unwrap();
            assert_eq!(event.kind(), kind);
            assert!(event.has_timestamp());
            assert_eq!(event.last_fired(), None);
        }
    }

    #[test]
    fn factory_rejects_bad_input() {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new(noon()));
        assert!(matches!(Event::new(None, false, clock), Err(SpecError::Missing)));
        assert!(matches!(
            build("bogus", "06:00:00", false),
            Err(SpecError::UnknownRule { .. })
        ));
        for (rule, parameter) in [
            ("timestamp", "2026-13-01 00:00:00"),
            ("timestamp", "06:00:00"),
            ("time-of-day", "6 o'clock"),
            ("delay", "99:00:00"),
            ("delay", "00:00:60"),
            ("time-of-day", "23:59:60"),
            ("timestamp", "2026-12-31 23:59:60"),
        ] {
            let err = build(rule, parameter, true).unwrap_err();
            assert!(matches!(err, SpecError::BadParameter { .. }), "{rule} {parameter}");
            assert!(err.to_string().contains(parameter));
        }
        assert!(matches!(
            build("delay", "00:00:60", false),
            Err(SpecError::BadParameter { source: ParameterError::LeapSecond, .. })
        ));
    }

    #[test]
    fn sun_events_use_fixed_times() {
        let sunset = build("sunset", "", false).unwrap();
        let sunrise = build("sunrise", "", false).unwrap();
        assert_eq!(
            sunset.as_timestamp(noon()),
            Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
        );
        assert_eq!(
            sunrise.as_timestamp(noon()),
            Utc.with_ymd_and_hms(2026, 3, 14, 6, 0, 0).unwrap()
        );
        let close_sunrise = build("sunrise", "", true).unwrap();
        assert_eq!(
            close_sunrise.as_timestamp(noon()),
            Utc.with_ymd_and_hms(2026, 3, 15, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn timestamp_is_constant_and_one_shot() {
        let event = build("timestamp", "2026-03-14 18:30:00", false).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap();
        for offset in [-400, 0, 5, 100_000] {
            assert_eq!(event.as_timestamp(noon() + TimeDelta::hours(offset)), at);
        }
        assert!(!event.is_recurring());
        assert!(!event.has_final_event_occurred(at - TimeDelta::seconds(1)));
        assert!(event.has_final_event_occurred(at));
    }

    #[test]
    fn describe_mentions_kind_value_and_target() {
        let event = build("time-of-day", "06:00:00", true).unwrap();
        let text = event.describe_at(noon());
        assert!(text.starts_with("time-of-day[06:00:00] @ 2026-03-14 12:00:00 UTC"));
        assert!(text.contains("-> 2026-03-15 06:00:00 UTC"));
        assert!(text.ends_with("isRecurring=true"));
        assert_eq!(event.to_string(), text);
    }

    #[test]
    fn as_timestamp_ignores_last_fired() {
        let mut event = build("time-of-day", "06:00:00", false).unwrap();
        let before = event.as_timestamp(noon());
        event.set_last_fired(noon());
        assert_eq!(event.as_timestamp(noon()), before);
        assert_eq!(event.last_fired(), Some(noon()));
    }
}

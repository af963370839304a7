//! The five time rules, and how each projects onto a reference instant.

use crate::common::{clock_offset, EventRule, CLOCK_FORMAT, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Wall-clock time used for sunset until real solar calculations exist.
pub const SUNSET: NaiveTime = match NaiveTime::from_hms_opt(18, 0, 0) {
    Some(time) => time,
    None => panic!("invalid sunset time"),
};

/// Wall-clock time used for sunrise until real solar calculations exist.
pub const SUNRISE: NaiveTime = match NaiveTime::from_hms_opt(6, 0, 0) {
    Some(time) => time,
    None => panic!("invalid sunrise time"),
};

/// Behaviour shared by every rule. Only `as_timestamp` varies everywhere; the
/// rest are defaults a rule overrides when it differs.
pub trait Occurrence {
    /// Time based rules carry a timestamp.
    fn has_timestamp(&self) -> bool {
        true
    }

    /// The instant this rule refers to, relative to `reference`.
    fn as_timestamp(&self, reference: DateTime<Utc>, location: Tz) -> DateTime<Utc>;

    fn is_recurring(&self) -> bool {
        true
    }

    /// Whether the last occurrence this rule will ever have lies at or before
    /// `reference`. Recurring rules never finish.
    fn has_final_event_occurred(&self, _reference: DateTime<Utc>, _location: Tz) -> bool {
        false
    }
}

/// A single absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    at: DateTime<Utc>,
}

impl Timestamp {
    /// Reads `local` as a wall-clock time in `location`.
    pub fn in_location(local: NaiveDateTime, location: Tz) -> Self {
        Self {
            at: resolve_local(location, local),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl Occurrence for Timestamp {
    fn as_timestamp(&self, _reference: DateTime<Utc>, _location: Tz) -> DateTime<Utc> {
        self.at
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn has_final_event_occurred(&self, reference: DateTime<Utc>, location: Tz) -> bool {
        self.as_timestamp(reference, location) <= reference
    }
}

/// A wall-clock time, every day.
///
/// A close event rolls over to tomorrow once today's time has passed; an open
/// event stays on the reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    time: NaiveTime,
    close_event: bool,
}

impl TimeOfDay {
    pub fn new(time: NaiveTime, close_event: bool) -> Self {
        Self { time, close_event }
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn is_close_event(&self) -> bool {
        self.close_event
    }

    /// This time of day on `date`, in `location`.
    pub fn on_date(&self, date: NaiveDate, location: Tz) -> DateTime<Utc> {
        resolve_local(location, date.and_time(self.time))
    }

    /// The occurrence on the calendar day after the one `at` falls on.
    pub fn day_after(&self, at: DateTime<Utc>, location: Tz) -> DateTime<Utc> {
        let date = at.with_timezone(&location).date_naive();
        match date.succ_opt() {
            Some(next) => self.on_date(next, location),
            None => at + TimeDelta::days(1),
        }
    }
}

impl Occurrence for TimeOfDay {
    fn as_timestamp(&self, reference: DateTime<Utc>, location: Tz) -> DateTime<Utc> {
        let today = reference.with_timezone(&location).date_naive();
        let candidate = self.on_date(today, location);
        if candidate < reference && self.close_event {
            self.day_after(candidate, location)
        } else {
            candidate
        }
    }
}

/// A fixed offset from whenever the rule is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    raw: NaiveTime,
    offset: TimeDelta,
}

impl Delay {
    /// Reads `raw` as hours, minutes and seconds rather than a time of day.
    pub fn new(raw: NaiveTime) -> Self {
        Self {
            raw,
            offset: clock_offset(raw),
        }
    }

    pub fn offset(&self) -> TimeDelta {
        self.offset
    }
}

impl Occurrence for Delay {
    fn as_timestamp(&self, reference: DateTime<Utc>, _location: Tz) -> DateTime<Utc> {
        reference + self.offset
    }
}

/// One parsed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Timestamp(Timestamp),
    TimeOfDay(TimeOfDay),
    Delay(Delay),
    Sunset(TimeOfDay),
    Sunrise(TimeOfDay),
}

impl Trigger {
    pub fn rule(&self) -> EventRule {
        match self {
            Trigger::Timestamp(_) => EventRule::Timestamp,
            Trigger::TimeOfDay(_) => EventRule::TimeOfDay,
            Trigger::Delay(_) => EventRule::Delay,
            Trigger::Sunset(_) => EventRule::Sunset,
            Trigger::Sunrise(_) => EventRule::Sunrise,
        }
    }

    /// The time-of-day payload of rules that happen once per calendar day.
    pub fn daily(&self) -> Option<&TimeOfDay> {
        match self {
            Trigger::TimeOfDay(daily) | Trigger::Sunset(daily) | Trigger::Sunrise(daily) => {
                Some(daily)
            }
            Trigger::Timestamp(_) | Trigger::Delay(_) => None,
        }
    }

    /// The parsed value, formatted the way it was written.
    pub fn parsed(&self, location: Tz) -> ParsedValue {
        ParsedValue {
            trigger: *self,
            location,
        }
    }

    fn occurrence(&self) -> &dyn Occurrence {
        match self {
            Trigger::Timestamp(inner) => inner,
            Trigger::TimeOfDay(inner) | Trigger::Sunset(inner) | Trigger::Sunrise(inner) => inner,
            Trigger::Delay(inner) => inner,
        }
    }
}

impl Occurrence for Trigger {
    fn has_timestamp(&self) -> bool {
        self.occurrence().has_timestamp()
    }

    fn as_timestamp(&self, reference: DateTime<Utc>, location: Tz) -> DateTime<Utc> {
        self.occurrence().as_timestamp(reference, location)
    }

    fn is_recurring(&self) -> bool {
        self.occurrence().is_recurring()
    }

    fn has_final_event_occurred(&self, reference: DateTime<Utc>, location: Tz) -> bool {
        self.occurrence().has_final_event_occurred(reference, location)
    }
}

/// Display adapter for a trigger's parsed value.
pub struct ParsedValue {
    trigger: Trigger,
    location: Tz,
}

impl fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.trigger {
            Trigger::Timestamp(ts) => write!(
                f,
                "{}",
                ts.at.with_timezone(&self.location).format(TIMESTAMP_FORMAT)
            ),
            Trigger::Delay(delay) => write!(f, "{}", delay.raw.format(CLOCK_FORMAT)),
            Trigger::TimeOfDay(daily) | Trigger::Sunset(daily) | Trigger::Sunrise(daily) => {
                write!(f, "{}", daily.time.format(CLOCK_FORMAT))
            }
        }
    }
}

/// Maps a wall-clock time in `location` to an instant.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times that
/// do not exist (clocks springing forward) move past the gap.
pub fn resolve_local(location: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut probe = local;
    // No real zone has a gap longer than a day.
    for _ in 0..=24 * 4 {
        if let Some(at) = location.from_local_datetime(&probe).earliest() {
            return at.with_timezone(&Utc);
        }
        probe += TimeDelta::minutes(15);
    }
    Utc.from_utc_datetime(&local)
}

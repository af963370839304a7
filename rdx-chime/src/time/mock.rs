use super::{Clock, TimerCallback, TimerHandle};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// Timers are ordered by deadline, then by arming order.
type TimerKey = (DateTime<Utc>, u64);

struct MockState {
    now: DateTime<Utc>,
    next_seq: u64,
    timers: BTreeMap<TimerKey, TimerCallback>,
}

/// A deterministic clock that only moves when told to.
///
/// Timers armed through [`Clock::after_func`] fire synchronously, in deadline
/// order, from inside [`MockClock::set_now`] or [`MockClock::advance`] once the
/// clock reaches their deadline. A non-zero jitter pushes every deadline back
/// by a random amount in `[0, jitter]`.
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
    location: Tz,
    jitter: Duration,
}

impl MockClock {
    /// A clock frozen at `now`, in UTC, without jitter.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_jitter(now, Tz::UTC, Duration::ZERO)
    }

    pub fn with_jitter(now: DateTime<Utc>, location: Tz, jitter: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                now,
                next_seq: 0,
                timers: BTreeMap::new(),
            })),
            location,
            jitter,
        }
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Moves the clock to `now` and fires every timer that is due.
    ///
    /// Moving backwards is allowed; nothing fires in that case.
    pub fn set_now(&self, now: DateTime<Utc>) {
        let due = {
            let mut state = self.state.lock();
            state.now = now;
            let later = state.timers.split_off(&(now, u64::MAX));
            std::mem::replace(&mut state.timers, later)
        };
        if !due.is_empty() {
            trace!(count = due.len(), %now, "firing mock timers");
        }
        // Callbacks may read the clock, so they run without the lock held.
        for (_, callback) in due {
            callback(now);
        }
    }

    /// Moves the clock forward by `delta` and fires every timer that is due.
    pub fn advance(&self, delta: TimeDelta) {
        let now = self.state.lock().now + delta;
        self.set_now(now);
    }

    /// Number of timers armed but not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn sample_jitter(&self) -> TimeDelta {
        if self.jitter.is_zero() {
            return TimeDelta::zero();
        }
        let max = self.jitter.as_nanos().min(i64::MAX as u128) as i64;
        TimeDelta::nanoseconds(rand::thread_rng().gen_range(0..=max))
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn location(&self) -> Tz {
        self.location
    }

    fn after_func(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        let jitter = self.sample_jitter();
        let key = {
            let mut state = self.state.lock();
            let deadline = state
                .now
                .checked_add_signed(delay)
                .and_then(|at| at.checked_add_signed(jitter))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let key = (deadline, state.next_seq);
            state.next_seq += 1;
            state.timers.insert(key, callback);
            key
        };
        trace!(deadline = %key.0, "arming mock timer");

        let state: Weak<Mutex<MockState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().timers.remove(&key);
            }
        })
    }
}

impl std::fmt::Debug for MockClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockClock")
            .field("now", &state.now)
            .field("location", &self.location)
            .field("jitter", &self.jitter)
            .field("pending", &state.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn timers_fire_only_once_due_and_in_order() {
        let clock = MockClock::new(start());
        let fired = Arc::new(Mutex::new(Vec::new()));
        for secs in [30u64, 10, 20] {
            let fired = fired.clone();
            clock.after_func(
                Duration::from_secs(secs),
                Box::new(move |_: DateTime<Utc>| fired.lock().push(secs)),
            );
        }

        clock.advance(TimeDelta::seconds(15));
        assert_eq!(*fired.lock(), vec![10]);
        assert_eq!(clock.pending(), 2);

        clock.advance(TimeDelta::seconds(60));
        assert_eq!(*fired.lock(), vec![10, 20, 30]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn callbacks_receive_the_new_now() {
        let clock = MockClock::new(start());
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        clock.after_func(
            Duration::from_secs(5),
            Box::new(move |now: DateTime<Utc>| *slot.lock() = Some(now)),
        );
        let later = start() + TimeDelta::minutes(1);
        clock.set_now(later);
        assert_eq!(*seen.lock(), Some(later));
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let clock = MockClock::new(start());
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        let handle = clock.after_func(
            Duration::from_secs(1),
            Box::new(move |_: DateTime<Utc>| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        assert_eq!(clock.pending(), 0);
        clock.advance(TimeDelta::hours(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn jitter_only_delays_within_bounds() {
        let jitter = Duration::from_millis(200);
        let clock = MockClock::with_jitter(start(), Tz::UTC, jitter);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let hits = count.clone();
            clock.after_func(
                Duration::from_secs(1),
                Box::new(move |_: DateTime<Utc>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        clock.advance(TimeDelta::milliseconds(999));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        clock.advance(TimeDelta::milliseconds(201));
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }
}

//! Defines all configuration structures for chime.
//!
//! These structs are designed to be deserialized from a TOML file using
//! `serde` and the `config` crate, with `CHIME_`-prefixed environment
//! variables layered on top. They decide which location calendar arithmetic
//! happens in, which events the dev binary drives, and how noisy a simulated
//! clock is.

use crate::common::EventSpec;
use crate::time::{MockClock, SystemClock};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChimeConfig {
    /// The timezone the clock operates in for calendar calculations.
    /// Uses the string names from the IANA Time Zone Database
    /// (e.g., "America/New_York").
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// Events to build at startup.
    #[serde(default)]
    pub events: Vec<EventConfig>,

    /// Settings for simulated clocks.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// One named event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// A human-readable label for logging.
    pub name: String,

    #[serde(flatten)]
    pub spec: EventSpec,

    /// Whether a daily event rolls over to tomorrow once passed.
    #[serde(default)]
    pub close_event: bool,
}

/// Settings for a [`MockClock`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// Upper bound of the random delay added to every scheduled firing.
    #[serde(default)]
    pub jitter_ms: u64,
}

impl ChimeConfig {
    /// Loads the configuration from `path` (if it exists) and the environment.
    ///
    /// Environment keys use `__` to reach nested fields, e.g.
    /// `CHIME_SIMULATION__JITTER_MS=50`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("CHIME")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn system_clock(&self) -> SystemClock {
        SystemClock::new(self.timezone)
    }

    /// A simulated clock starting at `now`, in the configured location.
    pub fn mock_clock(&self, now: DateTime<Utc>) -> MockClock {
        MockClock::with_jitter(
            now,
            self.timezone,
            Duration::from_millis(self.simulation.jitter_ms),
        )
    }
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            events: Vec::new(),
            simulation: SimulationConfig::default(),
        }
    }
}

// --- Default value functions for serde ---

fn default_timezone() -> Tz {
    Tz::UTC
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(text: &str) -> ChimeConfig {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let config = from_toml("");
        assert_eq!(config.timezone, Tz::UTC);
        assert!(config.events.is_empty());
        assert_eq!(config.simulation.jitter_ms, 0);
    }

    #[test]
    fn events_flatten_their_spec() {
        let config = from_toml(
            r#"
            timezone = "Europe/Berlin"

            [simulation]
            jitter_ms = 25

            [[events]]
            name = "wake"
            rule = "time-of-day"
            parameter = "06:30:00"
            close_event = true

            [[events]]
            name = "dusk"
            rule = "sunset"
            "#,
        );
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.simulation.jitter_ms, 25);
        assert_eq!(config.events.len(), 2);
        assert_eq!(config.events[0].spec, EventSpec::new("time-of-day", "06:30:00"));
        assert!(config.events[0].close_event);
        assert_eq!(config.events[1].spec, EventSpec::new("sunset", ""));
        assert!(!config.events[1].close_event);

        let clock = config.mock_clock(Utc::now());
        assert_eq!(clock.jitter(), Duration::from_millis(25));
    }

    #[test]
    fn example_file_builds_every_event() {
        use crate::events::Event;
        use crate::time::Clock;
        use std::sync::Arc;

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("chime.example.toml");
        let config = ChimeConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.timezone, chrono_tz::Europe::London);
        assert_eq!(config.events.len(), 4);

        let clock: Arc<dyn Clock> = Arc::new(config.mock_clock(Utc::now()));
        for entry in &config.events {
            let event = Event::new(Some(&entry.spec), entry.close_event, clock.clone());
            assert!(event.is_ok(), "{}: {:?}", entry.name, event.err());
        }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = ChimeConfig::load(Some(Path::new("does/not/exist.toml"))).unwrap();
        assert!(config.events.is_empty());
    }
}

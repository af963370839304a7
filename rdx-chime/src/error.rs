use thiserror::Error;

/// Errors raised while turning an [`EventSpec`](crate::common::EventSpec) into an
/// [`Event`](crate::events::Event).
#[derive(Debug, Error)]
pub enum SpecError {
    /// No specification was supplied at all.
    #[error("illegal argument: event specification is absent")]
    Missing,

    /// The rule is not one of the known rule names.
    #[error("bad time specification: unknown rule '{rule}' (parameter '{parameter}')")]
    UnknownRule { rule: String, parameter: String },

    /// The rule is known but its parameter does not parse.
    #[error("bad time specification: rule '{rule}' cannot use parameter '{parameter}': {source}")]
    BadParameter {
        rule: String,
        parameter: String,
        #[source]
        source: ParameterError,
    },
}

/// Why a clock or timestamp parameter was refused.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// The text does not match the expected layout.
    #[error(transparent)]
    Format(#[from] chrono::ParseError),

    /// The text parsed, but names second 60.
    #[error("seconds must be in 00..=59")]
    LeapSecond,
}

pub type Result<T> = std::result::Result<T, SpecError>;

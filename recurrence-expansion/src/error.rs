use chrono::NaiveDateTime;
use thiserror::Error;

use crate::rule::Frequency;

/// Reasons a stored rule record cannot be turned into a `RecurrenceRule`.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RuleError {
    #[error("`interval` must be a positive integer, got {0}")]
    IntervalOutOfRange(i64),
    #[error("`weekdays` contains unrecognised token `{0}`")]
    UnknownWeekday(String),
    #[error("`relative_day` `{0}` is not of the form `{{ordinal}}{{weekday}}`, e.g. `2FR` or `-1SU`")]
    MalformedRelativeDay(String),
    #[error("`relative_day` ordinal {0} is out of range [-5, -1] or [1, 5]")]
    OrdinalOutOfRange(i8),
    #[error("`weekdays` only applies to weekly rules, not {0}")]
    WeekdaysNotApplicable(Frequency),
    #[error("`relative_day` only applies to monthly rules, not {0}")]
    RelativeDayNotApplicable(Frequency),
}

/// Failures raised before any occurrence is generated.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ExpandError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(#[from] RuleError),
    #[error("Event ends at {end}, which is not after its start at {start}")]
    InvalidWindow { start: NaiveDateTime, end: NaiveDateTime },
}

/// A literal instant string could not be parsed.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("`{0}` is not a recognised date-time, expected e.g. `2024-01-03T09:00:00`")]
pub struct InstantError(pub String);

//! Recurrence rules, both as stored and in validated form.
//!
//! A [`RuleRecord`] is what the surrounding CRUD layer persists: loose strings and integers,
//! any combination of which may be present. [`RuleRecord::validate`] turns it into a
//! [`RecurrenceRule`], whose [`Pattern`] only carries the fields meaningful for its frequency.

use chrono::{NaiveDate, Weekday};
use serde::Deserialize;
use std::{fmt, num::NonZeroU32, str::FromStr};

use crate::error::RuleError;

/// Largest magnitude of a relative-day ordinal; no month has a sixth of any weekday.
const MAX_ORDINAL: i8 = 5;

/// Weekday tokens in Monday-first order: RFC 5545 code, long form, day.
const WEEKDAY_TOKENS: [(&str, &str, Weekday); 7] = [
    ("MO", "MON", Weekday::Mon),
    ("TU", "TUE", Weekday::Tue),
    ("WE", "WED", Weekday::Wed),
    ("TH", "THU", Weekday::Thu),
    ("FR", "FRI", Weekday::Fri),
    ("SA", "SAT", Weekday::Sat),
    ("SU", "SUN", Weekday::Sun),
];

/// Parse a weekday token, accepting `MON` and `MO` spellings in any case.
pub fn parse_weekday(token: &str) -> Option<Weekday> {
    let token = token.trim();
    WEEKDAY_TOKENS
        .iter()
        .find(|(code, long, _)| {
            token.eq_ignore_ascii_case(code) || token.eq_ignore_ascii_case(long)
        })
        .map(|(_, _, day)| *day)
}

/// RFC 5545 two-letter code of a weekday.
fn weekday_code(day: Weekday) -> &'static str {
    WEEKDAY_TOKENS[day.num_days_from_monday() as usize].0
}

/// Unit of time that recurrence happens on.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    /// Every day.
    #[default]
    #[serde(alias = "daily")]
    Daily,
    /// Every week.
    #[serde(alias = "weekly")]
    Weekly,
    /// Every month.
    #[serde(alias = "monthly")]
    Monthly,
    /// Every year.
    #[serde(alias = "yearly")]
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "DAILY"),
            Frequency::Weekly => write!(f, "WEEKLY"),
            Frequency::Monthly => write!(f, "MONTHLY"),
            Frequency::Yearly => write!(f, "YEARLY"),
        }
    }
}

/// Set of weekdays, iterated Monday first.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub fn single(day: Weekday) -> Self {
        WeekdaySet(Self::bit(day))
    }

    /// Returns `true` if `day` was not already present.
    pub fn insert(&mut self, day: Weekday) -> bool {
        let absent = !self.contains(day);
        self.0 |= Self::bit(day);
        absent
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEKDAY_TOKENS.iter().map(|(_, _, day)| *day).filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<_> = self.iter().map(weekday_code).collect();
        write!(f, "{}", codes.join(","))
    }
}

/// The n-th (or n-th from last, when negative) given weekday of a month.
/// e.g. `2FR` is the second Friday, `-1SU` the last Sunday.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelativeDay {
    ordinal: i8,
    weekday: Weekday,
}

impl RelativeDay {
    pub fn new(ordinal: i8, weekday: Weekday) -> Result<Self, RuleError> {
        if ordinal == 0 || ordinal.unsigned_abs() > MAX_ORDINAL.unsigned_abs() {
            return Err(RuleError::OrdinalOutOfRange(ordinal));
        }
        Ok(RelativeDay { ordinal, weekday })
    }

    pub fn ordinal(self) -> i8 {
        self.ordinal
    }

    pub fn weekday(self) -> Weekday {
        self.weekday
    }
}

impl FromStr for RelativeDay {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RuleError::MalformedRelativeDay(s.to_string());

        let trimmed = s.trim();
        let split = trimmed.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(malformed)?;
        let (ordinal, weekday) = trimmed.split_at(split);
        let ordinal = ordinal.parse::<i8>().map_err(|_| malformed())?;
        let weekday = parse_weekday(weekday).ok_or_else(malformed)?;
        RelativeDay::new(ordinal, weekday)
    }
}

impl fmt::Display for RelativeDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ordinal, weekday_code(self.weekday))
    }
}

/// Frequency of a rule together with the fields that only make sense for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pattern {
    Daily,
    /// An empty set falls back to the weekday of the anchor occurrence.
    Weekly { weekdays: WeekdaySet },
    /// Without a relative day, recurs on the anchor's day of the month.
    Monthly { relative_day: Option<RelativeDay> },
    Yearly,
}

impl Pattern {
    pub fn frequency(&self) -> Frequency {
        match self {
            Pattern::Daily => Frequency::Daily,
            Pattern::Weekly { .. } => Frequency::Weekly,
            Pattern::Monthly { .. } => Frequency::Monthly,
            Pattern::Yearly => Frequency::Yearly,
        }
    }
}

/// A validated recurrence rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecurrenceRule {
    pattern: Pattern,
    interval: NonZeroU32,
    end_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(pattern: Pattern, interval: u32) -> Result<Self, RuleError> {
        let interval =
            NonZeroU32::new(interval).ok_or(RuleError::IntervalOutOfRange(i64::from(interval)))?;
        Ok(RecurrenceRule { pattern, interval, end_date: None })
    }

    /// Last date (inclusive) on which an occurrence may start.
    pub fn with_end_date(self, end_date: NaiveDate) -> Self {
        RecurrenceRule { end_date: Some(end_date), ..self }
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn frequency(&self) -> Frequency {
        self.pattern.frequency()
    }

    pub fn interval(&self) -> u32 {
        self.interval.get()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

/// Renders the rule as an RFC 5545 `RRULE` value.
impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={};INTERVAL={}", self.frequency(), self.interval)?;
        match self.pattern {
            Pattern::Weekly { weekdays } if !weekdays.is_empty() => write!(f, ";BYDAY={weekdays}")?,
            Pattern::Monthly { relative_day: Some(relative_day) } => {
                write!(f, ";BYDAY={relative_day}")?
            }
            _ => {}
        }
        if let Some(end_date) = self.end_date {
            write!(f, ";UNTIL={}", end_date.format("%Y%m%d"))?;
        }
        Ok(())
    }
}

/// Weekdays as stored: either `"MON,WED"` or `["MON", "WED"]`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum WeekdayTokens {
    Joined(String),
    List(Vec<String>),
}

impl WeekdayTokens {
    /// Non-blank tokens, trimmed.
    fn tokens(&self) -> Vec<&str> {
        let tokens: Vec<&str> = match self {
            WeekdayTokens::Joined(joined) => joined.split(',').collect(),
            WeekdayTokens::List(list) => list.iter().map(String::as_str).collect(),
        };
        tokens.into_iter().map(str::trim).filter(|t| !t.is_empty()).collect()
    }
}

fn default_interval() -> i64 {
    1
}

/// A recurrence rule as persisted alongside an event.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct RuleRecord {
    /// Unit of time that recurrence happens on.
    #[serde(default)]
    pub frequency: Frequency,
    /// How many `frequency` between each occurrence?
    /// e.g. a weekly rule with interval of two is every other week.
    #[serde(default = "default_interval")]
    pub interval: i64,
    /// Days of the week a weekly rule recurs on.
    #[serde(default)]
    pub weekdays: Option<WeekdayTokens>,
    /// Which weekday of the month a monthly rule recurs on, e.g. `2FR` or `-1SU`.
    #[serde(default)]
    pub relative_day: Option<String>,
    /// Last date on which an occurrence may start.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Default for RuleRecord {
    fn default() -> Self {
        RuleRecord {
            frequency: Frequency::default(),
            interval: default_interval(),
            weekdays: None,
            relative_day: None,
            end_date: None,
        }
    }
}

impl RuleRecord {
    pub fn validate(&self) -> Result<RecurrenceRule, RuleError> {
        let interval = u32::try_from(self.interval)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(RuleError::IntervalOutOfRange(self.interval))?;

        let weekdays = self.weekday_set()?;
        let relative_day = self
            .relative_day
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<RelativeDay>)
            .transpose()?;

        let frequency = self.frequency;
        if !weekdays.is_empty() && frequency != Frequency::Weekly {
            return Err(RuleError::WeekdaysNotApplicable(frequency));
        }
        if relative_day.is_some() && frequency != Frequency::Monthly {
            return Err(RuleError::RelativeDayNotApplicable(frequency));
        }

        let pattern = match frequency {
            Frequency::Daily => Pattern::Daily,
            Frequency::Weekly => Pattern::Weekly { weekdays },
            Frequency::Monthly => Pattern::Monthly { relative_day },
            Frequency::Yearly => Pattern::Yearly,
        };
        Ok(RecurrenceRule { pattern, interval, end_date: self.end_date })
    }

    fn weekday_set(&self) -> Result<WeekdaySet, RuleError> {
        let Some(weekdays) = &self.weekdays else {
            return Ok(WeekdaySet::EMPTY);
        };
        weekdays
            .tokens()
            .into_iter()
            .map(|token| {
                parse_weekday(token).ok_or_else(|| RuleError::UnknownWeekday(token.to_string()))
            })
            .collect()
    }
}

impl TryFrom<&RuleRecord> for RecurrenceRule {
    type Error = RuleError;

    fn try_from(record: &RuleRecord) -> Result<Self, Self::Error> {
        record.validate()
    }
}

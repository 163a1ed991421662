//! Lazy generation of occurrence instants from a rule and its anchor.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    calendar::{advance, first_day_of_month, matches_weekday_set, resolve_relative_weekday},
    rule::{Frequency, Pattern, RecurrenceRule, WeekdaySet},
};

/// A concrete occurrence of an event.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Occurrence {
    #[serde(rename = "start_time")]
    pub start: NaiveDateTime,
    #[serde(rename = "end_time")]
    pub end: NaiveDateTime,
}

/// Result of looking at one position of a rule.
enum Step {
    Candidate(NaiveDate),
    /// Nothing at this position, keep going.
    Skip,
    End,
}

/// Candidate start instants of a rule, ascending, starting at or after the anchor.
///
/// Each period is computed from the anchor rather than from the previous candidate, so
/// day-of-month clamping never drifts (Jan 31, Feb 29, Mar 31, ...). Without an end date the
/// sequence only ends at the edge of the representable calendar.
#[derive(Clone, Debug)]
pub struct Candidates {
    anchor: NaiveDateTime,
    rule: RecurrenceRule,
    /// Effective weekday set for weekly rules.
    weekdays: WeekdaySet,
    /// Index of the current `interval`-sized period.
    period: u32,
    /// Day within the current week, Monday being 0, for weekly rules.
    day: u8,
    done: bool,
}

impl Candidates {
    pub fn new(rule: RecurrenceRule, anchor: NaiveDateTime) -> Self {
        let weekdays = match rule.pattern() {
            Pattern::Weekly { weekdays } if !weekdays.is_empty() => weekdays,
            _ => WeekdaySet::single(anchor.weekday()),
        };
        // Week 0 is scanned from the anchor's own weekday; earlier days precede the anchor.
        let day = anchor.weekday().num_days_from_monday() as u8;
        Candidates { anchor, rule, weekdays, period: 0, day, done: false }
    }

    /// Offset of the current period in units of the rule's frequency.
    fn offset(&self) -> Option<u32> {
        self.period.checked_mul(self.rule.interval())
    }

    fn step(&mut self) -> Step {
        let anchor = self.anchor.date();
        let frequency = self.rule.frequency();

        let date = match self.rule.pattern() {
            Pattern::Daily | Pattern::Yearly | Pattern::Monthly { relative_day: None } => {
                let date = self.offset().and_then(|offset| advance(anchor, frequency, offset));
                self.period = self.period.saturating_add(1);
                date
            }
            Pattern::Monthly { relative_day: Some(relative_day) } => {
                let Some(month) = self
                    .offset()
                    .zip(first_day_of_month(anchor))
                    .and_then(|(offset, first)| advance(first, Frequency::Monthly, offset))
                else {
                    return Step::End;
                };
                self.period = self.period.saturating_add(1);

                if self.rule.end_date().is_some_and(|end_date| month > end_date) {
                    return Step::End;
                }
                let resolved = resolve_relative_weekday(
                    month.year(),
                    month.month(),
                    relative_day.ordinal(),
                    relative_day.weekday(),
                );
                if resolved.is_none() {
                    tracing::trace!(
                        year = month.year(),
                        month = month.month(),
                        %relative_day,
                        "no matching weekday in month, skipping"
                    );
                    return Step::Skip;
                }
                resolved
            }
            Pattern::Weekly { .. } => {
                if self.day == 7 {
                    self.day = 0;
                    self.period = self.period.saturating_add(1);
                    return Step::Skip;
                }
                // Relative to the anchor, whose Monday may not be representable.
                let shift =
                    i64::from(self.day) - i64::from(anchor.weekday().num_days_from_monday());
                let date = self
                    .offset()
                    .and_then(|offset| advance(anchor, Frequency::Weekly, offset))
                    .and_then(|date| date.checked_add_signed(Duration::days(shift)));
                self.day += 1;
                match date {
                    Some(date) if !matches_weekday_set(date, self.weekdays) => return Step::Skip,
                    date => date,
                }
            }
        };

        match date {
            Some(date) => Step::Candidate(date),
            None => Step::End,
        }
    }
}

impl Iterator for Candidates {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.step() {
                Step::Candidate(date) => {
                    if self.rule.end_date().is_some_and(|end_date| date > end_date) {
                        self.done = true;
                        break;
                    }
                    let start = date.and_time(self.anchor.time());
                    if start >= self.anchor {
                        return Some(start);
                    }
                }
                Step::Skip => {}
                Step::End => self.done = true,
            }
        }
        None
    }
}

/// Candidate starts of either a recurring or a single event.
#[derive(Clone, Debug)]
enum Starts {
    Once(Option<NaiveDateTime>),
    Recurring(Candidates),
}

/// Occurrences of an event: candidate starts paired with the template duration.
#[derive(Clone, Debug)]
pub struct Occurrences {
    starts: Starts,
    duration: Duration,
}

impl Occurrences {
    pub(crate) fn new(
        anchor: NaiveDateTime,
        duration: Duration,
        rule: Option<RecurrenceRule>,
    ) -> Self {
        let starts = match rule {
            Some(rule) => Starts::Recurring(Candidates::new(rule, anchor)),
            None => Starts::Once(Some(anchor)),
        };
        Occurrences { starts, duration }
    }
}

impl Iterator for Occurrences {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        let start = match &mut self.starts {
            Starts::Once(start) => start.take(),
            Starts::Recurring(candidates) => candidates.next(),
        }?;
        match start.checked_add_signed(self.duration) {
            Some(end) => Some(Occurrence { start, end }),
            None => {
                self.starts = Starts::Once(None);
                None
            }
        }
    }
}

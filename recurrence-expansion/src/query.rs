//! Bounded occurrence queries over a single event.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::{
    error::ExpandError,
    generator::{Occurrence, Occurrences},
    overlay::{ExceptionSet, Overlay},
    rule::{RecurrenceRule, RuleRecord},
};

/// Number of occurrences returned when the caller does not ask for a specific count.
pub const DEFAULT_COUNT: usize = 10;

/// How many occurrences to collect, and how far to look for them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OccurrenceQuery {
    /// Maximum number of occurrences returned.
    pub count: usize,
    /// Maximum number of candidates examined, suppressed ones included.
    pub scan_limit: Option<usize>,
}

impl OccurrenceQuery {
    pub fn new(count: usize) -> Self {
        OccurrenceQuery { count, scan_limit: None }
    }

    pub fn with_scan_limit(self, scan_limit: usize) -> Self {
        OccurrenceQuery { scan_limit: Some(scan_limit), ..self }
    }
}

impl Default for OccurrenceQuery {
    fn default() -> Self {
        OccurrenceQuery::new(DEFAULT_COUNT)
    }
}

/// Why a query stopped collecting.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The requested count was reached.
    Filled,
    /// The rule ran out of occurrences first.
    Exhausted,
    /// The scan limit was reached first.
    ScanLimitReached,
}

/// Occurrences collected by a query.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Expansion {
    pub occurrences: Vec<Occurrence>,
    pub completion: Completion,
}

/// An event's anchor occurrence together with its validated rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Schedule {
    start: NaiveDateTime,
    duration: Duration,
    rule: Option<RecurrenceRule>,
}

impl Schedule {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        rule: Option<RecurrenceRule>,
    ) -> Result<Self, ExpandError> {
        if end <= start {
            return Err(ExpandError::InvalidWindow { start, end });
        }
        Ok(Schedule { start, duration: end - start, rule })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.rule.as_ref()
    }

    /// Every occurrence, before exceptions are applied. Unbounded unless the rule has an end date.
    pub fn occurrences(&self) -> Occurrences {
        Occurrences::new(self.start, self.duration, self.rule)
    }

    /// Collect up to `query.count` occurrences not suppressed by `exceptions`.
    ///
    /// `ScanLimitReached` is only reported when candidates remain past the limit.
    pub fn query(&self, exceptions: &ExceptionSet, query: &OccurrenceQuery) -> Expansion {
        let limit = query.scan_limit.unwrap_or(usize::MAX);
        let mut candidates = self.occurrences();
        let mut overlay = Overlay::new(candidates.by_ref().take(limit), exceptions);
        let mut occurrences = Vec::new();

        let filled = loop {
            if occurrences.len() == query.count {
                break true;
            }
            match overlay.next() {
                Some(occurrence) => occurrences.push(occurrence),
                None => break false,
            }
        };
        let scanned = overlay.scanned();

        let completion = if filled {
            Completion::Filled
        } else if scanned == limit && candidates.next().is_some() {
            Completion::ScanLimitReached
        } else {
            Completion::Exhausted
        };

        tracing::debug!(
            count = query.count,
            scanned,
            returned = occurrences.len(),
            ?completion,
            "expanded occurrences"
        );
        Expansion { occurrences, completion }
    }
}

/// Expand an event into at most `count` occurrences, ascending by start.
///
/// The rule and the event window are validated before anything is generated. Fewer than `count`
/// occurrences are returned when the rule ends first.
pub fn expand<I>(
    anchor_start: NaiveDateTime,
    anchor_end: NaiveDateTime,
    rule: Option<&RuleRecord>,
    exceptions: I,
    count: usize,
) -> Result<Vec<Occurrence>, ExpandError>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let rule = rule.map(RuleRecord::validate).transpose()?;
    let schedule = Schedule::new(anchor_start, anchor_end, rule)?;
    let exceptions: ExceptionSet = exceptions.into_iter().collect();
    Ok(schedule.query(&exceptions, &OccurrenceQuery::new(count)).occurrences)
}

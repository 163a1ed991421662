//! Suppression of individual occurrences.

use chrono::{DateTime, NaiveDateTime, Timelike};
use std::collections::HashSet;

use crate::{error::InstantError, generator::Occurrence};

/// Formats accepted for literal instants without a UTC offset.
const NAIVE_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Drop sub-second precision; exceptions match candidates on whole seconds only.
pub fn normalize(instant: NaiveDateTime) -> NaiveDateTime {
    instant.with_nanosecond(0).unwrap_or(instant)
}

/// Parse the literal start instant of an occurrence deletion request.
///
/// Instants carrying a UTC offset are converted to UTC. The result is normalized.
pub fn parse_instant(s: &str) -> Result<NaiveDateTime, InstantError> {
    let s = s.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(normalize(instant.naive_utc()));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(normalize)
        .ok_or_else(|| InstantError(s.to_string()))
}

/// Start instants of suppressed occurrences.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExceptionSet(HashSet<NaiveDateTime>);

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the instant was not already suppressed.
    pub fn insert(&mut self, instant: NaiveDateTime) -> bool {
        self.0.insert(normalize(instant))
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.0.contains(&normalize(instant))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<NaiveDateTime> for ExceptionSet {
    fn from_iter<I: IntoIterator<Item = NaiveDateTime>>(iter: I) -> Self {
        ExceptionSet(iter.into_iter().map(normalize).collect())
    }
}

impl Extend<NaiveDateTime> for ExceptionSet {
    fn extend<I: IntoIterator<Item = NaiveDateTime>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(normalize));
    }
}

/// Occurrences of `candidates` whose start is not suppressed, in their original order.
pub struct Overlay<'a, I> {
    candidates: I,
    exceptions: &'a ExceptionSet,
    scanned: usize,
}

impl<'a, I> Overlay<'a, I>
where
    I: Iterator<Item = Occurrence>,
{
    pub fn new(candidates: I, exceptions: &'a ExceptionSet) -> Self {
        Overlay { candidates, exceptions, scanned: 0 }
    }

    /// Number of candidates pulled so far, suppressed or not.
    pub fn scanned(&self) -> usize {
        self.scanned
    }
}

impl<I> Iterator for Overlay<'_, I>
where
    I: Iterator<Item = Occurrence>,
{
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let occurrence = self.candidates.next()?;
            self.scanned += 1;
            if !self.exceptions.contains(occurrence.start) {
                return Some(occurrence);
            }
        }
    }
}

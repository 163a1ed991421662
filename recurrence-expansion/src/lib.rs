use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub mod calendar;
mod error;
pub mod generator;
pub mod overlay;
pub mod query;
pub mod rule;


pub use error::{ExpandError, InstantError, RuleError};
pub use generator::{Candidates, Occurrence, Occurrences};
pub use overlay::{parse_instant, ExceptionSet, Overlay};
pub use query::{expand, Completion, Expansion, OccurrenceQuery, Schedule, DEFAULT_COUNT};
pub use rule::{Frequency, Pattern, RecurrenceRule, RelativeDay, RuleRecord, WeekdaySet};

/// Source of event files, e.g. the filesystem.
pub trait External {
    type Error;

    fn load_without_includes(&self, path: &Path) -> Result<EventFile, Self::Error>;
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Event {0} has duplicate `id`")]
    DuplicateId(u64),
    #[error("Event {id}: {source}")]
    Event { id: u64, source: ExpandError },
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum QueryError {
    #[error("Event {0} not found")]
    NotFound(u64),
    #[error("Event {id}: {source}")]
    Expand { id: u64, source: ExpandError },
    #[error("Event {id}: {source}")]
    Instant { id: u64, source: InstantError },
}

/// A collection of events, as loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct EventFile {
    /// Name of the collection.
    #[serde(default)]
    name: String,
    /// Meta configuration (e.g. include other event files).
    meta: Option<Meta>,
    /// List of events.
    #[serde(default)]
    events: Vec<Event>,
}

impl EventFile {
    /// Load `path` and every file it includes, recursively. Include paths are relative to the
    /// including file. A file is loaded at most once, so include cycles and shared includes
    /// contribute their events a single time.
    pub fn load<E: External>(ctx: &E, path: &Path) -> Result<Self, <E as External>::Error> {
        EventFile::load_unvisited(ctx, path, &mut HashSet::new())
    }

    fn load_unvisited<E: External>(
        ctx: &E,
        path: &Path,
        loaded: &mut HashSet<PathBuf>,
    ) -> Result<Self, <E as External>::Error> {
        loaded.insert(path.to_path_buf());
        let mut root = ctx.load_without_includes(path)?;
        if let Some(meta) = root.meta.take() {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            for include in &meta.includes {
                let include = base.join(include);
                if loaded.contains(&include) {
                    tracing::debug!(path = %include.display(), "already loaded, skipping include");
                    continue;
                }
                let child = EventFile::load_unvisited(ctx, &include, loaded)?;
                root.events.extend(child.events);
            }
        }
        Ok(root)
    }

    /// Check every event up front so that no expansion starts from bad input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen_ids = HashSet::new();
        for event in &self.events {
            if !seen_ids.insert(event.id) {
                return Err(ValidationError::DuplicateId(event.id));
            }
            event.schedule().map_err(|source| ValidationError::Event { id: event.id, source })?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn events_owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Event> {
        self.events.iter().filter(move |event| event.owner == owner)
    }

    /// Occurrences of event `id`.
    pub fn occurrences(
        &self,
        id: u64,
        query: &OccurrenceQuery,
    ) -> Result<OccurrencePage, QueryError> {
        let event = self.event(id).ok_or(QueryError::NotFound(id))?;
        event.occurrences(query).map_err(|source| QueryError::Expand { id, source })
    }

    /// Record the deletion of the occurrence of event `id` starting at `instant`.
    ///
    /// Accepted whether or not such an occurrence exists; an instant that matches nothing
    /// simply never suppresses anything.
    pub fn suppress(&mut self, id: u64, instant: &str) -> Result<(), QueryError> {
        let event = self
            .events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or(QueryError::NotFound(id))?;
        let start = parse_instant(instant).map_err(|source| QueryError::Instant { id, source })?;
        event.suppress(start);
        Ok(())
    }
}

/// Meta configuration.
/// e.g. include other event files.
#[derive(Debug, Default, Deserialize)]
struct Meta {
    /// Other event files that events should be included from.
    #[serde(default)]
    includes: Vec<PathBuf>,
}

/// Deletion of the single occurrence starting at this instant.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct OccurrenceException {
    pub start: NaiveDateTime,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Event {
    /// Identifier of this event.
    pub id: u64,
    /// Title or short description of this event.
    pub title: String,
    /// Long description of this event.
    #[serde(default)]
    pub description: String,
    /// User who owns this event.
    #[serde(default)]
    pub owner: String,
    /// Start of the first occurrence.
    pub start: NaiveDateTime,
    /// End of the first occurrence; every occurrence lasts as long as this one.
    pub end: NaiveDateTime,
    /// Rule for how this event repeats, if it does.
    pub recurrence_rule: Option<RuleRecord>,
    /// Occurrences which have been deleted.
    #[serde(default)]
    pub exceptions: Vec<OccurrenceException>,
}

impl Event {
    pub fn schedule(&self) -> Result<Schedule, ExpandError> {
        let rule = self.recurrence_rule.as_ref().map(RuleRecord::validate).transpose()?;
        Schedule::new(self.start, self.end, rule)
    }

    pub fn exception_set(&self) -> ExceptionSet {
        self.exceptions.iter().map(|exception| exception.start).collect()
    }

    /// Record an exception for `start`, unless one is already recorded.
    pub fn suppress(&mut self, start: NaiveDateTime) {
        let start = overlay::normalize(start);
        if !self.exception_set().contains(start) {
            self.exceptions.push(OccurrenceException { start });
        }
    }

    pub fn occurrences(&self, query: &OccurrenceQuery) -> Result<OccurrencePage, ExpandError> {
        let schedule = self.schedule()?;
        tracing::debug!(event_id = self.id, title = %self.title, "expanding event");
        let Expansion { occurrences, completion } = schedule.query(&self.exception_set(), query);
        Ok(OccurrencePage {
            event_id: self.id,
            title: self.title.clone(),
            rule: schedule.rule().map(ToString::to_string),
            occurrences,
            completion,
        })
    }
}

/// Occurrences of one event, with what a calendar needs to display them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OccurrencePage {
    pub event_id: u64,
    pub title: String,
    /// The event's rule as an RFC 5545 `RRULE` value.
    pub rule: Option<String>,
    pub occurrences: Vec<Occurrence>,
    pub completion: Completion,
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::planning::PlanningError;

/// Wire format used by the planning API and the datetime-local inputs that
/// feed it. Seconds are accepted on input but never emitted.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATETIME_FORMAT_WITH_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

pub fn parse_wire_datetime(value: &str) -> Result<NaiveDateTime, PlanningError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, DATETIME_FORMAT_WITH_SECONDS))
        .map_err(|_| PlanningError::InvalidInput(format!("Invalid datetime '{}'", value)))
}

pub fn format_wire_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: String,
}

impl Event {
    /// True when the event's start falls on the given calendar day,
    /// ignoring time-of-day.
    pub fn starts_on(&self, date: NaiveDate) -> bool {
        self.start.date() == date
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Records applied without server confirmation carry provisional
    /// negative ids; server-assigned ids are positive.
    pub fn is_local_only(&self) -> bool {
        self.id < 0
    }
}

/// A not-yet-persisted event. The id and, usually, the color are assigned
/// at persist time (by the server, or locally in degraded mode).
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: Option<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            description: None,
            start,
            end,
            color: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Update payload: replaces title, time range and description wholesale.
/// The color is immutable after creation and not part of the patch.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPatch {
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl EventPatch {
    pub fn apply_to(&self, event: &mut Event) {
        event.title = self.title.clone();
        event.description = self.description.clone();
        event.start = self.start;
        event.end = self.end;
    }
}

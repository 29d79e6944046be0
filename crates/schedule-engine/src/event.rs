//! Calendar data model: base events, repeat rules, per-date exceptions, and
//! the occurrences derived from them.
//!
//! Every type here serializes to the camelCase plain-data shape that import
//! and export collaborators exchange, so a JSON round-trip is lossless.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How often a recurring event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A repeat rule attached to a base event.
///
/// `until` and `count` are meant to be mutually exclusive. Both are kept as
/// independent fields so a record carrying both survives a round-trip; the
/// recurrence engine honors whichever stops the series first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatRule {
    #[serde(rename = "type")]
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Weekdays, 0 = Sunday through 6 = Saturday. The `by*` lists are kept
    /// as written; out-of-range values are ignored at expansion time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_weekday: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_monthday: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month: Vec<i32>,
}

fn default_interval() -> i32 {
    1
}

impl RepeatRule {
    /// A rule repeating every period with no termination and no filters.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            until: None,
            count: None,
            by_weekday: Vec::new(),
            by_monthday: Vec::new(),
            by_month: Vec::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    pub fn interval(mut self, interval: i32) -> Self {
        self.interval = interval;
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn by_weekday(mut self, weekdays: impl Into<Vec<i32>>) -> Self {
        self.by_weekday = weekdays.into();
        self
    }

    pub fn by_monthday(mut self, days: impl Into<Vec<i32>>) -> Self {
        self.by_monthday = days.into();
        self
    }

    pub fn by_month(mut self, months: impl Into<Vec<i32>>) -> Self {
        self.by_month = months.into();
        self
    }
}

/// Field overrides carried by `modify` and `add` exceptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A per-date override applied while expanding a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Exception {
    /// Drop the occurrence on this date.
    Skip,
    /// Replace the occurrence on this date with the overridden fields.
    Modify { overrides: EventOverrides },
    /// Keep the occurrence and emit one more built from the overrides.
    Add { overrides: EventOverrides },
}

/// A canonical base event as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatRule>,
    /// Keyed by the unshifted local start date of the occurrence they affect.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exceptions: BTreeMap<NaiveDate, Exception>,
}

impl Event {
    pub fn is_recurring(&self) -> bool {
        self.repeat.is_some()
    }
}

/// Input for [`EventStore::add`](crate::store::EventStore::add).
///
/// Everything is optional so that validation, not deserialization, decides
/// what a usable event is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub repeat: Option<RepeatRule>,
    #[serde(default)]
    pub exceptions: BTreeMap<NaiveDate, Exception>,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            title: Some(title.into()),
            start: Some(start),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn all_day(mut self) -> Self {
        self.all_day = Some(true);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatRule) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn with_exception(mut self, date: NaiveDate, exception: Exception) -> Self {
        self.exceptions.insert(date, exception);
        self
    }
}

impl From<Event> for NewEvent {
    fn from(event: Event) -> Self {
        Self {
            id: Some(event.id),
            title: Some(event.title),
            start: Some(event.start),
            end: Some(event.end),
            all_day: Some(event.all_day),
            description: event.description,
            category: event.category,
            color: event.color,
            repeat: event.repeat,
            exceptions: event.exceptions,
        }
    }
}

/// Changes merged onto an existing event by
/// [`EventStore::update`](crate::store::EventStore::update).
///
/// Nullable fields use a double `Option`: outer `None` leaves the field as
/// is, `Some(None)` clears it. In JSON an absent key means "keep" and an
/// explicit `null` means "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub repeat: Option<Option<RepeatRule>>,
    #[serde(default)]
    pub exceptions: Option<BTreeMap<NaiveDate, Exception>>,
}

impl EventPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn repeat(mut self, repeat: Option<RepeatRule>) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn exceptions(mut self, exceptions: BTreeMap<NaiveDate, Exception>) -> Self {
        self.exceptions = Some(exceptions);
        self
    }

    /// Apply the patch to a copy of `event`. The id is never touched.
    pub fn merged_onto(&self, event: &Event) -> Event {
        let mut merged = event.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(start) = self.start {
            merged.start = start;
        }
        if let Some(end) = self.end {
            merged.end = end;
        }
        if let Some(all_day) = self.all_day {
            merged.all_day = all_day;
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(category) = &self.category {
            merged.category = category.clone();
        }
        if let Some(color) = &self.color {
            merged.color = color.clone();
        }
        if let Some(repeat) = &self.repeat {
            merged.repeat = repeat.clone();
        }
        if let Some(exceptions) = &self.exceptions {
            merged.exceptions = exceptions.clone();
        }
        merged
    }
}

fn present_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Where an occurrence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceKind {
    /// A non-recurring event, passed through unchanged.
    Single,
    /// A date produced by the repeat rule with no exception.
    Regular,
    /// A date replaced by a `modify` exception.
    Modified,
    /// The extra occurrence produced by an `add` exception.
    Added,
}

/// A concrete, dated projection of a base event. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: String,
    pub base_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_date: Option<NaiveDate>,
    #[serde(default = "default_kind")]
    pub kind: OccurrenceKind,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_kind() -> OccurrenceKind {
    OccurrenceKind::Single
}

impl Occurrence {
    /// The occurrence of a non-recurring event: same id, same times.
    pub fn single(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            base_id: event.id.clone(),
            series_date: None,
            kind: OccurrenceKind::Single,
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            all_day: event.all_day,
            description: event.description.clone(),
            category: event.category.clone(),
            color: event.color.clone(),
        }
    }

    /// A rule-generated occurrence of `event` on `date`, shifted to `start`.
    pub fn in_series(
        event: &Event,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: series_id(&event.id, date),
            base_id: event.id.clone(),
            series_date: Some(date),
            kind: OccurrenceKind::Regular,
            start,
            end,
            ..Self::single(event)
        }
    }

    /// Merge exception overrides onto this occurrence.
    ///
    /// An overridden start without an overridden end keeps the duration.
    /// An end before the start collapses to a zero-length occurrence.
    pub fn with_overrides(mut self, overrides: &EventOverrides) -> Self {
        let duration = self.end - self.start;
        if let Some(title) = &overrides.title {
            self.title = title.clone();
        }
        match (overrides.start, overrides.end) {
            (Some(start), Some(end)) => {
                self.start = start;
                self.end = end;
            }
            (Some(start), None) => {
                self.start = start;
                self.end = start + duration;
            }
            (None, Some(end)) => self.end = end,
            (None, None) => {}
        }
        if self.end < self.start {
            tracing::warn!(
                occurrence = %self.id,
                "exception override ends before it starts; collapsing to zero length"
            );
            self.end = self.start;
        }
        if let Some(all_day) = overrides.all_day {
            self.all_day = all_day;
        }
        if let Some(description) = &overrides.description {
            self.description = Some(description.clone());
        }
        if let Some(category) = &overrides.category {
            self.category = Some(category.clone());
        }
        if let Some(color) = &overrides.color {
            self.color = Some(color.clone());
        }
        self
    }
}

/// Synthetic id of the occurrence of `base_id` on `date`.
pub fn series_id(base_id: &str, date: NaiveDate) -> String {
    format!("{}::{}", base_id, date.format("%Y-%m-%d"))
}

/// Synthetic id of the extra occurrence an `add` exception creates on `date`.
pub fn added_id(base_id: &str, date: NaiveDate) -> String {
    format!("{}::add", series_id(base_id, date))
}

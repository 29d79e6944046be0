//! The canonical store of base events.
//!
//! The store is the only place base events are created, changed or removed,
//! and the only place `InvalidEvent` is raised. Recurring events are kept as
//! a single record; their occurrences are computed per query.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::event::{Event, EventPatch, Exception, NewEvent};

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: BTreeMap<String, Event>,
}

/// One step of [`EventStore::apply_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchOperation {
    Add { event: NewEvent },
    Update { id: String, changes: EventPatch },
    Delete { id: String },
}

/// What happened to one [`BatchOperation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Added { event: Event },
    Updated { event: Event },
    Deleted { id: String, existed: bool },
    Failed { error: String },
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new event.
    ///
    /// A missing `end` defaults to `start`; a missing id is generated.
    ///
    /// # Errors
    /// - `ScheduleError::InvalidEvent` if the title is blank, the start is missing,
    ///   or the end is before the start.
    /// - `ScheduleError::DuplicateId` if an event with the same id is already stored.
    pub fn add(&mut self, new: NewEvent) -> Result<Event> {
        let title = match new.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => return Err(ScheduleError::InvalidEvent("missing title".to_string())),
        };
        let start = new
            .start
            .ok_or_else(|| ScheduleError::InvalidEvent("missing start".to_string()))?;

        let id = match new.id {
            Some(id) if !id.is_empty() => id,
            _ => self.generate_id(),
        };
        if self.events.contains_key(&id) {
            return Err(ScheduleError::DuplicateId(id));
        }

        let event = Event {
            id,
            title,
            start,
            end: new.end.unwrap_or(start),
            all_day: new.all_day.unwrap_or(false),
            description: new.description,
            category: new.category,
            color: new.color,
            repeat: new.repeat,
            exceptions: new.exceptions,
        };
        validate(&event)?;

        tracing::debug!(id = %event.id, recurring = event.is_recurring(), "event added");
        self.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    /// Merge `changes` onto the stored event and re-validate.
    ///
    /// The stored record is left untouched when validation fails.
    ///
    /// # Errors
    /// - `ScheduleError::NotFound` if no event has this id.
    /// - `ScheduleError::InvalidEvent` if the merged event is invalid.
    pub fn update(&mut self, id: &str, changes: EventPatch) -> Result<Event> {
        let current = self
            .events
            .get(id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;

        let merged = changes.merged_onto(current);
        validate(&merged)?;

        tracing::debug!(id = %id, "event updated");
        self.events.insert(id.to_string(), merged.clone());
        Ok(merged)
    }

    /// Remove an event. Returns `false` if it was not stored.
    pub fn delete(&mut self, id: &str) -> bool {
        let existed = self.events.remove(id).is_some();
        if existed {
            tracing::debug!(id = %id, "event deleted");
        }
        existed
    }

    /// Set the exception for one series date, replacing any exception
    /// already recorded for that date. Returns the updated event.
    ///
    /// # Errors
    /// Returns `ScheduleError::NotFound` if no event has this id.
    pub fn set_exception(
        &mut self,
        id: &str,
        date: NaiveDate,
        exception: Exception,
    ) -> Result<Event> {
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;

        let replaced = event.exceptions.insert(date, exception).is_some();
        tracing::debug!(id = %id, %date, replaced, "exception set");
        Ok(event.clone())
    }

    /// Drop the exception for one series date. Returns `false` if the date
    /// had none.
    ///
    /// # Errors
    /// Returns `ScheduleError::NotFound` if no event has this id.
    pub fn remove_exception(&mut self, id: &str, date: NaiveDate) -> Result<bool> {
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;

        let removed = event.exceptions.remove(&date).is_some();
        if removed {
            tracing::debug!(id = %id, %date, "exception removed");
        }
        Ok(removed)
    }

    /// The exception recorded for `date` on event `id`, if any.
    pub fn exception(&self, id: &str, date: NaiveDate) -> Option<&Exception> {
        self.events.get(id)?.exceptions.get(&date)
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    /// All stored events, ordered by id.
    pub fn all(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        tracing::debug!(count = self.events.len(), "store cleared");
        self.events.clear();
    }

    /// Case-insensitive substring search over title, description and category.
    pub fn search(&self, query: &str) -> Vec<Event> {
        let needle = query.to_lowercase();
        self.events
            .values()
            .filter(|event| {
                event.title.to_lowercase().contains(&needle)
                    || field_contains(event.description.as_deref(), &needle)
                    || field_contains(event.category.as_deref(), &needle)
            })
            .cloned()
            .collect()
    }

    /// Apply operations in order. A failing operation is reported in its
    /// outcome and does not stop the rest of the batch.
    pub fn apply_batch(&mut self, operations: Vec<BatchOperation>) -> Vec<BatchOutcome> {
        operations
            .into_iter()
            .map(|operation| {
                let outcome = match operation {
                    BatchOperation::Add { event } => {
                        self.add(event).map(|event| BatchOutcome::Added { event })
                    }
                    BatchOperation::Update { id, changes } => self
                        .update(&id, changes)
                        .map(|event| BatchOutcome::Updated { event }),
                    BatchOperation::Delete { id } => {
                        let existed = self.delete(&id);
                        Ok(BatchOutcome::Deleted { id, existed })
                    }
                };
                outcome.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "batch operation failed");
                    BatchOutcome::Failed {
                        error: e.to_string(),
                    }
                })
            })
            .collect()
    }

    fn generate_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.events.contains_key(&id) {
                return id;
            }
        }
    }
}

fn field_contains(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(needle))
}

fn validate(event: &Event) -> Result<()> {
    if event.title.trim().is_empty() {
        return Err(ScheduleError::InvalidEvent("missing title".to_string()));
    }
    if event.end < event.start {
        return Err(ScheduleError::InvalidEvent(format!(
            "end {} is before start {}",
            event.end.to_rfc3339(),
            event.start.to_rfc3339()
        )));
    }
    Ok(())
}

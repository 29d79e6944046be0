//! The facade the view layer talks to: one store, one configuration.
//!
//! A `Scheduler` owns its [`EventStore`]; there is no process-wide instance.
//! Queries borrow it immutably, mutations need `&mut self`, so writes are
//! serialized by the borrow checker within one owner.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::codec::{self, ImportReport};
use crate::config::EngineConfig;
use crate::conflict::find_conflicts;
use crate::error::Result;
use crate::event::{Event, EventPatch, Exception, NewEvent, Occurrence};
use crate::layout::{compute_layout, LayoutSlot};
use crate::query;
use crate::store::{BatchOperation, BatchOutcome, EventStore};

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    store: EventStore,
    config: EngineConfig,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: EventStore::new(),
            config,
        }
    }

    /// Wrap an existing store.
    pub fn with_store(store: EventStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore {
        &mut self.store
    }

    pub fn into_store(self) -> EventStore {
        self.store
    }

    pub fn add_event(&mut self, event: NewEvent) -> Result<Event> {
        self.store.add(event)
    }

    pub fn update_event(&mut self, id: &str, changes: EventPatch) -> Result<Event> {
        self.store.update(id, changes)
    }

    pub fn delete_event(&mut self, id: &str) -> bool {
        self.store.delete(id)
    }

    pub fn set_exception(
        &mut self,
        id: &str,
        date: NaiveDate,
        exception: Exception,
    ) -> Result<Event> {
        self.store.set_exception(id, date, exception)
    }

    pub fn remove_exception(&mut self, id: &str, date: NaiveDate) -> Result<bool> {
        self.store.remove_exception(id, date)
    }

    pub fn exception(&self, id: &str, date: NaiveDate) -> Option<&Exception> {
        self.store.exception(id, date)
    }

    pub fn get_event(&self, id: &str) -> Option<&Event> {
        self.store.get(id)
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.store.all()
    }

    pub fn search(&self, query: &str) -> Vec<Event> {
        self.store.search(query)
    }

    pub fn apply_batch(&mut self, operations: Vec<BatchOperation>) -> Vec<BatchOutcome> {
        self.store.apply_batch(operations)
    }

    /// Occurrences on the local calendar day `date`.
    pub fn events_for_date(&self, date: NaiveDate) -> Vec<Occurrence> {
        query::events_for_date(&self.store, date, &self.config)
    }

    /// Occurrences touching `[start, end)`.
    pub fn events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Occurrence> {
        query::events_in_range(&self.store, start, end, &self.config)
    }

    /// Stored base events whose own time range overlaps `event`.
    pub fn check_conflicts(&self, event: &Event) -> Vec<Event> {
        let stored: Vec<&Event> = self.store.iter().collect();
        find_conflicts(event, &stored)
            .into_iter()
            .map(|conflict| (*conflict).clone())
            .collect()
    }

    /// Occurrences of stored events, recurring ones expanded, that overlap
    /// `event`. Occurrences of `event` itself are ignored.
    pub fn check_conflicts_expanded(&self, event: &Event) -> Vec<Occurrence> {
        // A zero-length event still collides with anything spanning its instant.
        let window_end = event.end.max(event.start + Duration::nanoseconds(1));
        let occurrences: Vec<Occurrence> = self
            .events_in_range(event.start, window_end)
            .into_iter()
            .filter(|occurrence| occurrence.base_id != event.id)
            .collect();
        find_conflicts(event, &occurrences)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Column layout for one day's timed occurrences.
    pub fn compute_layout(&self, occurrences: &[Occurrence]) -> Vec<LayoutSlot> {
        compute_layout(occurrences)
    }

    /// Column layout for the timed occurrences on `date`.
    pub fn layout_for_date(&self, date: NaiveDate) -> Vec<LayoutSlot> {
        compute_layout(&self.events_for_date(date))
    }

    pub fn export_json(&self, exported_at: DateTime<Utc>) -> Result<String> {
        codec::export_json(self.store.iter(), exported_at)
    }

    pub fn import_json(&mut self, data: &str) -> Result<ImportReport> {
        codec::import_json(&mut self.store, data)
    }
}

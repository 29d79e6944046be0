//! WASM bindings for schedule-engine.
//!
//! Exposes a stateful `Scheduler` (event store, per-date exceptions,
//! recurrence queries, conflict checks and day layout) to JavaScript via
//! `wasm-bindgen`. All complex types cross the boundary as JSON strings using
//! the engine's camelCase wire names.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p schedule-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir pkg/ \
//!   target/wasm32-unknown-unknown/release/schedule_engine_wasm.wasm
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use schedule_engine::codec::parse_instant;
use schedule_engine::{EngineConfig, Event, EventPatch, Exception, NewEvent, Occurrence};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// Serde-friendly DTOs for crossing the WASM boundary as JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConflictDto {
    a: String,
    b: String,
    overlap_minutes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutSlotDto {
    id: String,
    column: usize,
    total_columns: usize,
    width: f64,
    left: f64,
}

/// A bare `{id?, start, end, allDay?}` span, for the stateless helpers.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpanInput {
    #[serde(default)]
    id: Option<String>,
    start: String,
    end: String,
    #[serde(default)]
    all_day: bool,
}

// ---------------------------------------------------------------------------
// Helpers: parsing and serialization, kept free of JsValue so they run natively
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(s).map_err(|e| format!("Invalid datetime '{}': {}", s, e))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date '{}': {}", s, e))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

fn from_json<'a, T: Deserialize<'a>>(what: &str, json: &'a str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid {} JSON: {}", what, e))
}

/// Turn span inputs into occurrences so the engine's span-based functions
/// can take them. Missing ids become their position in the array.
fn parse_spans(json: &str) -> Result<Vec<Occurrence>, String> {
    let inputs: Vec<SpanInput> = from_json("events", json)?;
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let id = input.id.unwrap_or_else(|| index.to_string());
            let start = parse_datetime(&input.start)?;
            let end = parse_datetime(&input.end)?;
            let event = Event {
                id: id.clone(),
                title: id,
                start,
                end,
                all_day: input.all_day,
                description: None,
                category: None,
                color: None,
                repeat: None,
                exceptions: Default::default(),
            };
            Ok(Occurrence::single(&event))
        })
        .collect()
}

fn layout_json(occurrences: &[Occurrence]) -> Result<String, String> {
    let dtos: Vec<LayoutSlotDto> = schedule_engine::compute_layout(occurrences)
        .into_iter()
        .map(|slot| LayoutSlotDto {
            width: slot.width_fraction(),
            left: slot.left_fraction(),
            id: slot.id,
            column: slot.column,
            total_columns: slot.total_columns,
        })
        .collect();
    to_json(&dtos)
}

fn js_err(message: String) -> JsValue {
    JsValue::from_str(&message)
}

// ---------------------------------------------------------------------------
// Stateful scheduler
// ---------------------------------------------------------------------------

/// An event store with its query configuration, owned by the JS caller.
#[wasm_bindgen]
pub struct Scheduler {
    inner: schedule_engine::Scheduler,
}

impl Scheduler {
    fn try_new(timezone: Option<&str>) -> Result<Scheduler, String> {
        let config = match timezone {
            Some(name) => EngineConfig::with_timezone(name).map_err(|e| e.to_string())?,
            None => EngineConfig::default(),
        };
        Ok(Scheduler {
            inner: schedule_engine::Scheduler::new(config),
        })
    }

    fn try_add(&mut self, event_json: &str) -> Result<String, String> {
        let new: NewEvent = from_json("event", event_json)?;
        let event = self.inner.add_event(new).map_err(|e| e.to_string())?;
        to_json(&event)
    }

    fn try_update(&mut self, id: &str, changes_json: &str) -> Result<String, String> {
        let changes: EventPatch = from_json("changes", changes_json)?;
        let event = self
            .inner
            .update_event(id, changes)
            .map_err(|e| e.to_string())?;
        to_json(&event)
    }

    fn try_set_exception(
        &mut self,
        id: &str,
        date: &str,
        exception_json: &str,
    ) -> Result<String, String> {
        let date = parse_date(date)?;
        let exception: Exception = from_json("exception", exception_json)?;
        let event = self
            .inner
            .set_exception(id, date, exception)
            .map_err(|e| e.to_string())?;
        to_json(&event)
    }

    fn try_remove_exception(&mut self, id: &str, date: &str) -> Result<bool, String> {
        self.inner
            .remove_exception(id, parse_date(date)?)
            .map_err(|e| e.to_string())
    }

    fn try_range(&self, start: &str, end: &str) -> Result<String, String> {
        let start = parse_datetime(start)?;
        let end = parse_datetime(end)?;
        to_json(&self.inner.events_in_range(start, end))
    }

    fn try_for_date(&self, date: &str) -> Result<String, String> {
        to_json(&self.inner.events_for_date(parse_date(date)?))
    }

    fn try_conflicts(&self, event_json: &str, expand: bool) -> Result<String, String> {
        let target: Event = from_json("event", event_json)?;
        if expand {
            to_json(&self.inner.check_conflicts_expanded(&target))
        } else {
            to_json(&self.inner.check_conflicts(&target))
        }
    }

    fn try_layout(&self, date: &str) -> Result<String, String> {
        layout_json(&self.inner.events_for_date(parse_date(date)?))
    }
}

#[wasm_bindgen]
impl Scheduler {
    /// Create an empty scheduler. `timezone` is an IANA name (e.g.
    /// "Europe/Berlin") and defaults to UTC.
    #[wasm_bindgen(constructor)]
    pub fn new(timezone: Option<String>) -> Result<Scheduler, JsValue> {
        Scheduler::try_new(timezone.as_deref()).map_err(js_err)
    }

    /// Add an event from a JSON object. Returns the stored event as JSON.
    #[wasm_bindgen(js_name = "addEvent")]
    pub fn add_event(&mut self, event_json: &str) -> Result<String, JsValue> {
        self.try_add(event_json).map_err(js_err)
    }

    /// Merge a partial JSON object onto the event `id`.
    #[wasm_bindgen(js_name = "updateEvent")]
    pub fn update_event(&mut self, id: &str, changes_json: &str) -> Result<String, JsValue> {
        self.try_update(id, changes_json).map_err(js_err)
    }

    /// Set the exception (`{"type": "skip"}`, `{"type": "modify", "overrides": {..}}`
    /// or `{"type": "add", ...}`) for one `YYYY-MM-DD` series date, replacing
    /// any exception already on that date. Returns the updated event as JSON.
    #[wasm_bindgen(js_name = "setException")]
    pub fn set_exception(
        &mut self,
        id: &str,
        date: &str,
        exception_json: &str,
    ) -> Result<String, JsValue> {
        self.try_set_exception(id, date, exception_json)
            .map_err(js_err)
    }

    /// Drop the exception on a `YYYY-MM-DD` series date. Returns whether
    /// there was one.
    #[wasm_bindgen(js_name = "removeException")]
    pub fn remove_exception(&mut self, id: &str, date: &str) -> Result<bool, JsValue> {
        self.try_remove_exception(id, date).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "deleteEvent")]
    pub fn delete_event(&mut self, id: &str) -> bool {
        self.inner.delete_event(id)
    }

    /// The event `id` as JSON, or `undefined`.
    #[wasm_bindgen(js_name = "getEvent")]
    pub fn get_event(&self, id: &str) -> Result<Option<String>, JsValue> {
        self.inner
            .get_event(id)
            .map(|event| to_json(event).map_err(js_err))
            .transpose()
    }

    #[wasm_bindgen(js_name = "getAllEvents")]
    pub fn get_all_events(&self) -> Result<String, JsValue> {
        to_json(&self.inner.all_events()).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "searchEvents")]
    pub fn search_events(&self, query: &str) -> Result<String, JsValue> {
        to_json(&self.inner.search(query)).map_err(js_err)
    }

    /// Occurrences on a `YYYY-MM-DD` local date.
    #[wasm_bindgen(js_name = "getEventsForDate")]
    pub fn get_events_for_date(&self, date: &str) -> Result<String, JsValue> {
        self.try_for_date(date).map_err(js_err)
    }

    /// Occurrences touching `[start, end)`, both ISO 8601 datetimes.
    #[wasm_bindgen(js_name = "getEventsInRange")]
    pub fn get_events_in_range(&self, start: &str, end: &str) -> Result<String, JsValue> {
        self.try_range(start, end).map_err(js_err)
    }

    /// Stored events overlapping the JSON event. With `expand`, recurring
    /// series are expanded and occurrences are returned instead.
    #[wasm_bindgen(js_name = "checkConflicts")]
    pub fn check_conflicts(&self, event_json: &str, expand: bool) -> Result<String, JsValue> {
        self.try_conflicts(event_json, expand).map_err(js_err)
    }

    /// Column layout for the timed occurrences on a `YYYY-MM-DD` date.
    #[wasm_bindgen(js_name = "layoutForDate")]
    pub fn layout_for_date(&self, date: &str) -> Result<String, JsValue> {
        self.try_layout(date).map_err(js_err)
    }

    /// Export every stored event as a versioned JSON envelope.
    #[wasm_bindgen(js_name = "exportJson")]
    pub fn export_json(&self, export_date: &str) -> Result<String, JsValue> {
        let exported_at = parse_datetime(export_date).map_err(js_err)?;
        self.inner
            .export_json(exported_at)
            .map_err(|e| js_err(e.to_string()))
    }

    /// Import an envelope or bare array. Returns `{imported, failures}`.
    #[wasm_bindgen(js_name = "importJson")]
    pub fn import_json(&mut self, data: &str) -> Result<String, JsValue> {
        let report = self
            .inner
            .import_json(data)
            .map_err(|e| js_err(e.to_string()))?;
        to_json(&report).map_err(js_err)
    }
}

// ---------------------------------------------------------------------------
// Stateless exports
// ---------------------------------------------------------------------------

fn conflicts_json(events_json: &str) -> Result<String, String> {
    let spans = parse_spans(events_json)?;
    let dtos: Vec<ConflictDto> = schedule_engine::find_overlapping_pairs(&spans)
        .iter()
        .map(|c| ConflictDto {
            a: c.a.id.clone(),
            b: c.b.id.clone(),
            overlap_minutes: c.overlap_minutes,
        })
        .collect();
    to_json(&dtos)
}

/// Column layout for a JSON array of `{id?, start, end, allDay?}` spans.
///
/// Returns an array of `{id, column, totalColumns, width, left}` in input
/// order, all-day spans omitted.
#[wasm_bindgen(js_name = "computeLayout")]
pub fn compute_layout(events_json: &str) -> Result<String, JsValue> {
    parse_spans(events_json)
        .and_then(|spans| layout_json(&spans))
        .map_err(js_err)
}

/// Every overlapping pair in a JSON array of `{id?, start, end, allDay?}`
/// spans, as `{a, b, overlapMinutes}`.
#[wasm_bindgen(js_name = "findConflicts")]
pub fn find_conflicts(events_json: &str) -> Result<String, JsValue> {
    conflicts_json(events_json).map_err(js_err)
}

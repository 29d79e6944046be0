//! Range queries over the store: every occurrence touching a window, and
//! every occurrence on a calendar date.
//!
//! Occurrences are recomputed on every call; nothing is cached between
//! store mutations.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::config::EngineConfig;
use crate::dst::{resolve_local, DstPolicy};
use crate::event::Occurrence;
use crate::recurrence::expand_with;
use crate::store::EventStore;

/// All occurrences of all stored events that touch `[start, end)`,
/// sorted by start, then id. An empty or inverted window yields nothing.
pub fn events_in_range(
    store: &EventStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<Occurrence> {
    if end <= start {
        return Vec::new();
    }

    let mut occurrences: Vec<Occurrence> = store
        .iter()
        .flat_map(|event| expand_with(event, start, end, config))
        .collect();
    occurrences.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    occurrences
}

/// All occurrences touching the local calendar day `date` in the configured timezone.
pub fn events_for_date(store: &EventStore, date: NaiveDate, config: &EngineConfig) -> Vec<Occurrence> {
    let (start, end) = day_bounds(date, config);
    events_in_range(store, start, end, config)
}

/// `[start of date, start of the next date)` as instants.
///
/// Days that begin inside a DST gap start at the first valid local time, so
/// a day may be 23 or 25 hours long.
pub fn day_bounds(date: NaiveDate, config: &EngineConfig) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    (start_of_day(date, config), start_of_day(next, config))
}

fn start_of_day(date: NaiveDate, config: &EngineConfig) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    resolve_local(config.timezone, midnight, DstPolicy::ShiftForward)
        .unwrap_or_else(|| midnight.and_utc())
}

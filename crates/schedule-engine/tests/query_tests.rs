//! Tests for range queries and the scheduler facade.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use schedule_engine::query::day_bounds;
use schedule_engine::{
    events_in_range, EngineConfig, EventStore, Exception, NewEvent, RepeatRule, Scheduler,
};

fn at(month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, min, 0).unwrap()
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn timed(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> NewEvent {
    NewEvent::new(id, start).with_id(id).with_end(end)
}

/// A store with one weekly Mon/Fri series, one one-off, and one all-day event.
fn sample_scheduler() -> Scheduler {
    let mut scheduler = Scheduler::default();
    scheduler
        .add_event(
            timed("gym", at(3, 4, 9, 0), at(3, 4, 10, 0)).with_repeat(
                RepeatRule::weekly()
                    .by_weekday(vec![1, 5])
                    .until(at(3, 22, 0, 0)),
            ),
        )
        .unwrap();
    scheduler
        .add_event(timed("dentist", at(3, 8, 9, 30), at(3, 8, 10, 30)))
        .unwrap();
    scheduler
        .add_event(timed("holiday", at(3, 8, 0, 0), at(3, 9, 0, 0)).all_day())
        .unwrap();
    scheduler
}

// ---------------------------------------------------------------------------
// Range queries
// ---------------------------------------------------------------------------

#[test]
fn range_merges_recurring_and_single_events_sorted() {
    let scheduler = sample_scheduler();

    let result = scheduler.events_in_range(at(3, 8, 0, 0), at(3, 12, 0, 0));

    let ids: Vec<&str> = result.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["holiday", "gym::2024-03-08", "dentist", "gym::2024-03-11"]
    );
}

#[test]
fn inverted_range_is_empty() {
    let scheduler = sample_scheduler();

    assert!(scheduler
        .events_in_range(at(3, 12, 0, 0), at(3, 1, 0, 0))
        .is_empty());
}

#[test]
fn empty_range_is_empty() {
    let scheduler = sample_scheduler();
    // Inside both the dentist appointment and the holiday.
    let instant = at(3, 8, 10, 0);

    assert!(scheduler.events_in_range(instant, instant).is_empty());
}

#[test]
fn events_for_date_covers_the_whole_day() {
    let scheduler = sample_scheduler();

    let result = scheduler.events_for_date(date(3, 8));

    let ids: Vec<&str> = result.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["holiday", "gym::2024-03-08", "dentist"]);
}

#[test]
fn events_for_date_excludes_event_ending_at_midnight() {
    let mut store = EventStore::new();
    store
        .add(timed("late", at(3, 7, 23, 0), at(3, 8, 0, 0)))
        .unwrap();
    let config = EngineConfig::default();

    let result = schedule_engine::events_for_date(&store, date(3, 8), &config);

    assert!(result.is_empty(), "[23:00, 00:00) does not touch the next day");
}

#[test]
fn queries_reflect_store_mutations_immediately() {
    let mut scheduler = sample_scheduler();
    let before = scheduler.events_for_date(date(3, 11)).len();

    scheduler
        .update_event(
            "gym",
            schedule_engine::EventPatch::default().exceptions(
                [(date(3, 11), Exception::Skip)].into_iter().collect(),
            ),
        )
        .unwrap();

    assert_eq!(before, 1);
    assert!(scheduler.events_for_date(date(3, 11)).is_empty());
}

#[test]
fn per_date_exception_skips_a_single_occurrence() {
    let mut scheduler = sample_scheduler();

    scheduler
        .set_exception("gym", date(3, 8), Exception::Skip)
        .unwrap();
    let skipped = scheduler.events_for_date(date(3, 8));
    scheduler.remove_exception("gym", date(3, 8)).unwrap();
    let restored = scheduler.events_for_date(date(3, 8));

    assert!(skipped.iter().all(|o| o.base_id != "gym"));
    assert!(restored.iter().any(|o| o.id == "gym::2024-03-08"));
}

#[test]
fn day_bounds_follow_the_configured_timezone() {
    let config = EngineConfig::with_timezone("America/New_York").unwrap();

    let (start, end) = day_bounds(date(3, 10), &config);

    // Spring-forward day: midnight EST to midnight EDT is 23 hours.
    assert_eq!(start, at(3, 10, 5, 0));
    assert_eq!(end, at(3, 11, 4, 0));
}

#[test]
fn range_query_uses_the_free_function_with_a_store() {
    let scheduler = sample_scheduler();

    let result = events_in_range(
        scheduler.store(),
        at(3, 15, 0, 0),
        at(3, 16, 0, 0),
        scheduler.config(),
    );

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id, "gym::2024-03-15");
}

// ---------------------------------------------------------------------------
// Scheduler conflicts and layout
// ---------------------------------------------------------------------------

#[test]
fn check_conflicts_against_stored_base_events() {
    let scheduler = sample_scheduler();
    let dentist = scheduler.get_event("dentist").unwrap().clone();

    let conflicts = scheduler.check_conflicts(&dentist);

    // The gym base record is 03-04 09:00-10:00; holiday is all-day.
    assert!(conflicts.is_empty());
}

#[test]
fn expanded_conflicts_see_recurring_occurrences() {
    let scheduler = sample_scheduler();
    let dentist = scheduler.get_event("dentist").unwrap().clone();

    let conflicts = scheduler.check_conflicts_expanded(&dentist);

    let ids: Vec<&str> = conflicts.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["gym::2024-03-08"]);
}

#[test]
fn expanded_conflicts_for_a_zero_length_event() {
    let scheduler = sample_scheduler();
    let mut reminder = scheduler.get_event("dentist").unwrap().clone();
    reminder.id = "reminder".to_string();
    reminder.start = at(3, 8, 9, 45);
    reminder.end = reminder.start;

    let conflicts = scheduler.check_conflicts_expanded(&reminder);

    let ids: Vec<&str> = conflicts.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["gym::2024-03-08", "dentist"]);
}

#[test]
fn layout_for_date_packs_timed_events() {
    let scheduler = sample_scheduler();

    let slots = scheduler.layout_for_date(date(3, 8));

    assert_eq!(slots.len(), 2, "all-day holiday is not laid out");
    assert!(slots.iter().all(|s| s.total_columns == 2));
    let gym = slots.iter().find(|s| s.id == "gym::2024-03-08").unwrap();
    assert_eq!(gym.column, 0);
}

#[test]
fn compute_layout_on_query_output() {
    let scheduler = sample_scheduler();
    let day = scheduler.events_for_date(date(3, 4));

    let slots = scheduler.compute_layout(&day);

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].total_columns, 1);
}

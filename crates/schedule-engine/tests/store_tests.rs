//! Tests for the event store: validation, CRUD, search and batches.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use schedule_engine::{
    BatchOperation, BatchOutcome, EventOverrides, EventPatch, EventStore, Exception, NewEvent,
    RepeatRule, ScheduleError,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn meeting(id: &str, day: u32, start_hour: u32, end_hour: u32) -> NewEvent {
    NewEvent::new(format!("Meeting {}", id), at(day, start_hour))
        .with_id(id)
        .with_end(at(day, end_hour))
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

#[test]
fn add_stores_and_returns_event() {
    let mut store = EventStore::new();

    let event = store.add(meeting("a", 1, 9, 10)).expect("valid event");

    assert_eq!(event.id, "a");
    assert_eq!(event.title, "Meeting a");
    assert!(!event.all_day);
    assert_eq!(store.get("a"), Some(&event));
    assert_eq!(store.len(), 1);
}

#[test]
fn add_defaults_end_to_start() {
    let mut store = EventStore::new();

    let event = store
        .add(NewEvent::new("Reminder", at(1, 9)))
        .expect("valid event");

    assert_eq!(event.end, event.start);
}

#[test]
fn add_generates_unique_ids() {
    let mut store = EventStore::new();

    let a = store.add(NewEvent::new("One", at(1, 9))).unwrap();
    let b = store.add(NewEvent::new("Two", at(1, 9))).unwrap();

    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);
    assert_eq!(store.len(), 2);
}

#[test]
fn add_rejects_end_before_start() {
    let mut store = EventStore::new();

    let result = store.add(meeting("bad", 1, 10, 9));

    assert!(matches!(result, Err(ScheduleError::InvalidEvent(_))));
    assert!(store.is_empty(), "rejected events must not be stored");
}

#[test]
fn add_rejects_blank_title() {
    let mut store = EventStore::new();

    let result = store.add(NewEvent::new("   ", at(1, 9)));

    assert!(matches!(result, Err(ScheduleError::InvalidEvent(_))));
}

#[test]
fn add_rejects_missing_start() {
    let mut store = EventStore::new();
    let new = NewEvent {
        title: Some("No start".to_string()),
        ..NewEvent::default()
    };

    assert!(matches!(store.add(new), Err(ScheduleError::InvalidEvent(_))));
}

#[test]
fn add_rejects_duplicate_id() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    let result = store.add(meeting("a", 2, 9, 10));

    assert!(matches!(result, Err(ScheduleError::DuplicateId(id)) if id == "a"));
    assert_eq!(store.get("a").unwrap().start, at(1, 9), "original is untouched");
}

// ---------------------------------------------------------------------------
// update / delete
// ---------------------------------------------------------------------------

#[test]
fn update_merges_changes() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    let updated = store
        .update("a", EventPatch::default().title("Renamed").end(at(1, 11)))
        .expect("valid update");

    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.start, at(1, 9));
    assert_eq!(updated.end, at(1, 11));
    assert_eq!(store.get("a"), Some(&updated));
}

#[test]
fn update_missing_id_is_not_found() {
    let mut store = EventStore::new();

    let result = store.update("ghost", EventPatch::default().title("x"));

    assert!(matches!(result, Err(ScheduleError::NotFound(id)) if id == "ghost"));
}

#[test]
fn update_that_inverts_range_is_rejected_and_leaves_record() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    let result = store.update("a", EventPatch::default().start(at(1, 12)));

    assert!(matches!(result, Err(ScheduleError::InvalidEvent(_))));
    assert_eq!(store.get("a").unwrap().start, at(1, 9));
}

#[test]
fn update_can_set_and_clear_repeat() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    let with_rule = store
        .update("a", EventPatch::default().repeat(Some(RepeatRule::daily())))
        .unwrap();
    assert!(with_rule.is_recurring());

    let cleared = store
        .update("a", EventPatch::default().repeat(None))
        .unwrap();
    assert!(!cleared.is_recurring());
}

#[test]
fn patch_json_distinguishes_absent_from_null() {
    let mut store = EventStore::new();
    store
        .add(meeting("a", 1, 9, 10).with_description("agenda"))
        .unwrap();

    let keep: EventPatch = serde_json::from_str(r#"{"title":"Kept"}"#).unwrap();
    let kept = store.update("a", keep).unwrap();
    assert_eq!(kept.description.as_deref(), Some("agenda"));

    let clear: EventPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
    let cleared = store.update("a", clear).unwrap();
    assert_eq!(cleared.description, None);
}

#[test]
fn delete_reports_presence() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    assert!(store.delete("a"));
    assert!(!store.delete("a"));
    assert!(store.get("a").is_none());
}

// ---------------------------------------------------------------------------
// reads, search, batch
// ---------------------------------------------------------------------------

#[test]
fn all_is_ordered_by_id() {
    let mut store = EventStore::new();
    store.add(meeting("c", 1, 9, 10)).unwrap();
    store.add(meeting("a", 2, 9, 10)).unwrap();
    store.add(meeting("b", 3, 9, 10)).unwrap();

    let ids: Vec<String> = store.all().into_iter().map(|e| e.id).collect();

    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn search_matches_title_description_and_category_case_insensitively() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();
    store
        .add(
            NewEvent::new("Lunch", at(1, 12))
                .with_id("b")
                .with_description("Team MEETING spot"),
        )
        .unwrap();
    store
        .add(
            NewEvent::new("Dentist", at(2, 8))
                .with_id("c")
                .with_category("health"),
        )
        .unwrap();

    let meeting_ids: Vec<String> = store.search("meeting").into_iter().map(|e| e.id).collect();
    let health_ids: Vec<String> = store.search("HEALTH").into_iter().map(|e| e.id).collect();

    assert_eq!(meeting_ids, vec!["a", "b"]);
    assert_eq!(health_ids, vec!["c"]);
    assert!(store.search("nothing").is_empty());
}

#[test]
fn batch_continues_past_failures() {
    let mut store = EventStore::new();

    let outcomes = store.apply_batch(vec![
        BatchOperation::Add {
            event: meeting("a", 1, 9, 10),
        },
        BatchOperation::Add {
            event: meeting("a", 1, 9, 10),
        },
        BatchOperation::Update {
            id: "a".to_string(),
            changes: EventPatch::default().title("Renamed"),
        },
        BatchOperation::Delete {
            id: "missing".to_string(),
        },
    ]);

    assert_eq!(outcomes.len(), 4);
    assert!(matches!(&outcomes[0], BatchOutcome::Added { event } if event.id == "a"));
    assert!(matches!(&outcomes[1], BatchOutcome::Failed { .. }));
    assert!(matches!(&outcomes[2], BatchOutcome::Updated { event } if event.title == "Renamed"));
    assert!(matches!(
        &outcomes[3],
        BatchOutcome::Deleted { existed: false, .. }
    ));
    assert_eq!(store.len(), 1);
}

// ---------------------------------------------------------------------------
// Per-date exceptions
// ---------------------------------------------------------------------------

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn daily_store() -> EventStore {
    let mut store = EventStore::new();
    store
        .add(meeting("standup", 1, 9, 10).with_repeat(RepeatRule::daily()))
        .unwrap();
    store
}

#[test]
fn set_exception_adds_one_date() {
    let mut store = daily_store();

    let event = store
        .set_exception("standup", march(5), Exception::Skip)
        .unwrap();

    assert_eq!(event.exceptions.len(), 1);
    assert_eq!(store.exception("standup", march(5)), Some(&Exception::Skip));
    assert_eq!(store.exception("standup", march(6)), None);
}

#[test]
fn set_exception_replaces_same_date() {
    let mut store = daily_store();
    store
        .set_exception("standup", march(5), Exception::Skip)
        .unwrap();
    let modify = Exception::Modify {
        overrides: EventOverrides {
            title: Some("Late standup".to_string()),
            ..EventOverrides::default()
        },
    };

    let event = store
        .set_exception("standup", march(5), modify.clone())
        .unwrap();

    assert_eq!(event.exceptions.len(), 1);
    assert_eq!(event.exceptions.get(&march(5)), Some(&modify));
}

#[test]
fn set_exception_keeps_other_dates() {
    let mut store = daily_store();
    store
        .set_exception("standup", march(5), Exception::Skip)
        .unwrap();

    store
        .set_exception("standup", march(7), Exception::Skip)
        .unwrap();

    let keys: Vec<NaiveDate> = store
        .get("standup")
        .unwrap()
        .exceptions
        .keys()
        .copied()
        .collect();
    assert_eq!(keys, vec![march(5), march(7)]);
}

#[test]
fn remove_exception_reports_whether_one_existed() {
    let mut store = daily_store();
    store
        .set_exception("standup", march(5), Exception::Skip)
        .unwrap();

    assert!(store.remove_exception("standup", march(5)).unwrap());
    assert!(!store.remove_exception("standup", march(5)).unwrap());
    assert!(store.get("standup").unwrap().exceptions.is_empty());
}

#[test]
fn exception_operations_on_unknown_id_fail() {
    let mut store = daily_store();

    assert!(matches!(
        store.set_exception("missing", march(5), Exception::Skip),
        Err(ScheduleError::NotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        store.remove_exception("missing", march(5)),
        Err(ScheduleError::NotFound(_))
    ));
    assert_eq!(store.exception("missing", march(5)), None);
}

#[test]
fn clear_empties_the_store() {
    let mut store = EventStore::new();
    store.add(meeting("a", 1, 9, 10)).unwrap();

    store.clear();

    assert!(store.is_empty());
}

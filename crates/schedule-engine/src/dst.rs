//! DST transition policies for recurring events.
//!
//! Recurrence walks local wall-clock dates, so each occurrence's local start
//! has to be mapped back to an instant. Most local times map to exactly one
//! instant; the two exceptions are the spring-forward gap (no instant) and
//! the fall-back overlap (two instants, the earlier one wins).

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for handling events that fall during DST transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip instances that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid local minute after the gap
    ShiftForward,
    /// Keep the pre-transition UTC offset, so 2:30 reads as 3:30 after the jump
    #[default]
    WallClock,
}

/// Longest gap searched by [`DstPolicy::ShiftForward`].
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Map a local wall-clock time in `tz` to an instant under `policy`.
///
/// Returns `None` only for a gap time under [`DstPolicy::Skip`].
pub fn resolve_local(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::WallClock => Some(with_offset_before(tz, local)),
            DstPolicy::ShiftForward => Some(first_valid_after(tz, local)),
        },
    }
}

/// Interpret `local` with the offset in force a day earlier.
fn with_offset_before(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let offset = tz
        .offset_from_utc_datetime(&(local - Duration::days(1)))
        .fix()
        .local_minus_utc();
    (local - Duration::seconds(i64::from(offset))).and_utc()
}

fn first_valid_after(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    for minutes in 1..=MAX_GAP_MINUTES {
        let candidate = local + Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => continue,
        }
    }
    with_offset_before(tz, local)
}

//! Half-open time spans shared by the conflict detector, the layout packer
//! and range queries.
//!
//! All intervals are `[start, end)`: an event ending at 10:00 and another
//! starting at 10:00 touch but do not overlap.

use chrono::{DateTime, Utc};

use crate::event::{Event, Occurrence};

/// Anything with an id and a `[start, end)` time range.
pub trait TimeSpan {
    fn span_id(&self) -> &str;
    fn span_start(&self) -> DateTime<Utc>;
    fn span_end(&self) -> DateTime<Utc>;
    fn is_all_day(&self) -> bool;
}

impl TimeSpan for Event {
    fn span_id(&self) -> &str {
        &self.id
    }

    fn span_start(&self) -> DateTime<Utc> {
        self.start
    }

    fn span_end(&self) -> DateTime<Utc> {
        self.end
    }

    fn is_all_day(&self) -> bool {
        self.all_day
    }
}

impl TimeSpan for Occurrence {
    fn span_id(&self) -> &str {
        &self.id
    }

    fn span_start(&self) -> DateTime<Utc> {
        self.start
    }

    fn span_end(&self) -> DateTime<Utc> {
        self.end
    }

    fn is_all_day(&self) -> bool {
        self.all_day
    }
}

impl<T: TimeSpan + ?Sized> TimeSpan for &T {
    fn span_id(&self) -> &str {
        (**self).span_id()
    }

    fn span_start(&self) -> DateTime<Utc> {
        (**self).span_start()
    }

    fn span_end(&self) -> DateTime<Utc> {
        (**self).span_end()
    }

    fn is_all_day(&self) -> bool {
        (**self).is_all_day()
    }
}

/// Two half-open intervals overlap iff `a.start < b.end && b.start < a.end`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether an event touches the query window `[window_start, window_end)`.
///
/// An empty window contains nothing. A zero-length event is a point: it is
/// inside the window iff `window_start <= start < window_end`.
pub fn intersects_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    if window_start >= window_end {
        false
    } else if start == end {
        window_start <= start && start < window_end
    } else {
        overlaps(start, end, window_start, window_end)
    }
}

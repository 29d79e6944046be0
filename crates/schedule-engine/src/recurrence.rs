//! Recurrence expansion -- converts a base event and its repeat rule into the
//! concrete occurrences that touch a query window.
//!
//! The walk steps over local calendar dates in the configured timezone,
//! keeping the base event's local time of day, and maps each date back to an
//! instant through the configured [`DstPolicy`](crate::dst::DstPolicy).
//! Every visited date is checked against the event's exceptions; only the
//! emission of occurrences is filtered by the window, never the walk itself.
//!
//! Malformed rules never fail: they are normalized (with a warning) and the
//! walk is bounded by [`EngineConfig::max_expansion_steps`].

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc};

use crate::config::EngineConfig;
use crate::dst::{resolve_local, DstPolicy};
use crate::event::{added_id, Event, Exception, Frequency, Occurrence, OccurrenceKind, RepeatRule};
use crate::span::intersects_window;

/// Upper bound on months scanned when looking for a listed month-day that exists.
const MAX_MONTH_SCAN: u32 = 48;

/// Expand `event` over `[window_start, window_end)` with the default configuration.
pub fn expand(
    event: &Event,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Occurrence> {
    expand_with(event, window_start, window_end, &EngineConfig::default())
}

/// Expand `event` over `[window_start, window_end)`.
///
/// A non-recurring event yields itself iff it intersects the window. A
/// recurring event yields one occurrence per rule date that survives its
/// exceptions and intersects the window, plus the extra occurrences added by
/// `add` exceptions. The result is sorted by start, then id.
pub fn expand_with(
    event: &Event,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<Occurrence> {
    let Some(repeat) = &event.repeat else {
        return if intersects_window(event.start, event.end, window_start, window_end) {
            vec![Occurrence::single(event)]
        } else {
            Vec::new()
        };
    };

    let rule = NormalizedRule::new(&event.id, repeat);
    let walk = SeriesWalk::new(event, &rule, window_start, window_end, config);
    let mut occurrences = walk.run();
    occurrences.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    occurrences
}

/// A repeat rule with malformed values repaired.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub until: Option<DateTime<Utc>>,
    pub count: Option<u32>,
    pub weekdays: Vec<u32>,
    pub monthdays: Vec<u32>,
    pub months: Vec<u32>,
}

impl NormalizedRule {
    pub(crate) fn new(event_id: &str, rule: &RepeatRule) -> Self {
        let interval = if rule.interval <= 0 {
            tracing::warn!(
                event = %event_id,
                interval = rule.interval,
                "non-positive repeat interval, treating as 1"
            );
            1
        } else {
            rule.interval.unsigned_abs()
        };

        if rule.count == Some(0) {
            tracing::warn!(
                event = %event_id,
                "repeat count of 0 produces an empty series"
            );
        }

        if rule.until.is_some() && rule.count.is_some() {
            tracing::warn!(
                event = %event_id,
                "repeat rule sets both until and count; stopping at whichever comes first"
            );
        }

        let (weekdays, monthdays, months) = match rule.frequency {
            Frequency::Weekly => (
                normalized_set(event_id, "byWeekday", &rule.by_weekday, 0, 6),
                Vec::new(),
                Vec::new(),
            ),
            Frequency::Monthly => (
                Vec::new(),
                normalized_set(event_id, "byMonthday", &rule.by_monthday, 1, 31),
                Vec::new(),
            ),
            Frequency::Yearly => (
                Vec::new(),
                Vec::new(),
                normalized_set(event_id, "byMonth", &rule.by_month, 1, 12),
            ),
            Frequency::Daily => (Vec::new(), Vec::new(), Vec::new()),
        };

        Self {
            frequency: rule.frequency,
            interval,
            until: rule.until,
            count: rule.count,
            weekdays,
            monthdays,
            months,
        }
    }

    /// The date after `current` in the series. `anchor_day` is the base
    /// event's day of month, which month and year steps try to keep.
    ///
    /// Returns `None` when the calendar runs out (date overflow).
    pub(crate) fn next_date(&self, current: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
        match self.frequency {
            Frequency::Daily => current.checked_add_days(Days::new(u64::from(self.interval))),
            Frequency::Weekly => self.next_weekly(current),
            Frequency::Monthly => self.next_monthly(current, anchor_day),
            Frequency::Yearly => self.next_yearly(current, anchor_day),
        }
    }

    fn next_weekly(&self, current: NaiveDate) -> Option<NaiveDate> {
        let interval_days = u64::from(self.interval) * 7;
        let Some(&first) = self.weekdays.first() else {
            return current.checked_add_days(Days::new(interval_days));
        };

        let today = current.weekday().num_days_from_sunday();
        if let Some(&next) = self.weekdays.iter().find(|&&day| day > today) {
            return current.checked_add_days(Days::new(u64::from(next - today)));
        }

        let jumped = current.checked_add_days(Days::new(interval_days))?;
        let week_start = jumped.checked_sub_days(Days::new(u64::from(
            jumped.weekday().num_days_from_sunday(),
        )))?;
        week_start.checked_add_days(Days::new(u64::from(first)))
    }

    fn next_monthly(&self, current: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
        if self.monthdays.is_empty() {
            let (year, month) = shift_month(current.year(), current.month(), self.interval)?;
            return clamped_date(year, month, anchor_day);
        }

        let last = days_in_month(current.year(), current.month())?;
        if let Some(&day) = self
            .monthdays
            .iter()
            .find(|&&day| day > current.day() && day <= last)
        {
            return NaiveDate::from_ymd_opt(current.year(), current.month(), day);
        }

        let (mut year, mut month) = (current.year(), current.month());
        for _ in 0..MAX_MONTH_SCAN {
            (year, month) = shift_month(year, month, self.interval)?;
            let last = days_in_month(year, month)?;
            if let Some(&day) = self.monthdays.iter().find(|&&day| day <= last) {
                return NaiveDate::from_ymd_opt(year, month, day);
            }
        }
        None
    }

    fn next_yearly(&self, current: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
        let Some(&first) = self.months.first() else {
            let years = self.interval.checked_mul(12)?;
            let (year, month) = shift_month(current.year(), current.month(), years)?;
            return clamped_date(year, month, anchor_day);
        };

        if let Some(&month) = self.months.iter().find(|&&month| month > current.month()) {
            return clamped_date(current.year(), month, anchor_day);
        }

        let year = current
            .year()
            .checked_add(i32::try_from(self.interval).ok()?)?;
        clamped_date(year, first, anchor_day)
    }
}

/// Sort, dedupe and range-check a `by*` list.
fn normalized_set(event_id: &str, field: &str, values: &[i32], min: u32, max: u32) -> Vec<u32> {
    let mut set: Vec<u32> = values
        .iter()
        .filter_map(|&value| {
            let valid = u32::try_from(value)
                .ok()
                .filter(|value| (min..=max).contains(value));
            if valid.is_none() {
                tracing::warn!(
                    event = %event_id,
                    field,
                    value,
                    "ignoring out-of-range repeat filter value"
                );
            }
            valid
        })
        .collect();
    set.sort_unstable();
    set.dedup();
    set
}

/// State of one expansion walk over a recurring event.
struct SeriesWalk<'a> {
    event: &'a Event,
    rule: &'a NormalizedRule,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    config: &'a EngineConfig,
    local_time: NaiveTime,
    anchor_day: u32,
    duration: Duration,
    until_date: Option<NaiveDate>,
}

impl<'a> SeriesWalk<'a> {
    fn new(
        event: &'a Event,
        rule: &'a NormalizedRule,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        config: &'a EngineConfig,
    ) -> Self {
        let local_start = event.start.with_timezone(&config.timezone).naive_local();
        Self {
            event,
            rule,
            window_start,
            window_end,
            config,
            local_time: local_start.time(),
            anchor_day: local_start.day(),
            duration: event.end - event.start,
            until_date: rule
                .until
                .map(|until| until.with_timezone(&config.timezone).date_naive()),
        }
    }

    fn run(&self) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        let mut date = self
            .event
            .start
            .with_timezone(&self.config.timezone)
            .date_naive();
        let mut visited: u32 = 0;

        for _ in 0..self.config.max_expansion_steps {
            if self.until_date.is_some_and(|until| date > until) {
                return occurrences;
            }
            if self.rule.count.is_some_and(|count| visited >= count) {
                return occurrences;
            }
            let Some(wall_clock) = self.instant_on(date, DstPolicy::WallClock) else {
                return occurrences;
            };
            if wall_clock > self.window_end {
                return occurrences;
            }

            visited += 1;
            self.visit(date, wall_clock, &mut occurrences);

            match self.rule.next_date(date, self.anchor_day) {
                Some(next) if next > date => date = next,
                _ => return occurrences,
            }
        }

        tracing::debug!(
            event = %self.event.id,
            steps = self.config.max_expansion_steps,
            "recurrence expansion stopped at the step cap"
        );
        occurrences
    }

    /// Emit the occurrences for one series date, honoring its exception.
    fn visit(&self, date: NaiveDate, wall_clock: DateTime<Utc>, out: &mut Vec<Occurrence>) {
        let regular = self
            .instant_on(date, self.config.dst_policy)
            .map(|start| Occurrence::in_series(self.event, date, start, start + self.duration));

        match self.event.exceptions.get(&date) {
            None => {
                if let Some(occurrence) = regular {
                    self.emit(occurrence, out);
                }
            }
            Some(Exception::Skip) => {}
            Some(Exception::Modify { overrides }) => {
                let mut modified = regular
                    .unwrap_or_else(|| self.fallback(date, wall_clock))
                    .with_overrides(overrides);
                modified.kind = OccurrenceKind::Modified;
                self.emit(modified, out);
            }
            Some(Exception::Add { overrides }) => {
                let base = regular.clone().unwrap_or_else(|| self.fallback(date, wall_clock));
                if let Some(occurrence) = regular {
                    self.emit(occurrence, out);
                }
                let mut added = base.with_overrides(overrides);
                added.id = added_id(&self.event.id, date);
                added.kind = OccurrenceKind::Added;
                self.emit(added, out);
            }
        }
    }

    /// The occurrence an exception is applied to when the DST policy dropped
    /// the regular one.
    fn fallback(&self, date: NaiveDate, wall_clock: DateTime<Utc>) -> Occurrence {
        Occurrence::in_series(self.event, date, wall_clock, wall_clock + self.duration)
    }

    fn emit(&self, occurrence: Occurrence, out: &mut Vec<Occurrence>) {
        if intersects_window(
            occurrence.start,
            occurrence.end,
            self.window_start,
            self.window_end,
        ) {
            out.push(occurrence);
        }
    }

    fn instant_on(&self, date: NaiveDate, policy: DstPolicy) -> Option<DateTime<Utc>> {
        resolve_local(self.config.timezone, date.and_time(self.local_time), policy)
    }
}

/// `(year, month)` moved forward by `months`.
fn shift_month(year: i32, month: u32, months: u32) -> Option<(i32, u32)> {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + i64::from(months);
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = shift_month(year, month, 1)?;
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

/// `day` in the given month, clamped to the month's last day.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    /// Collects formatted log lines in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Warnings logged while normalizing `repeat`.
    fn warnings_for(repeat: RepeatRule) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            NormalizedRule::new("test", &repeat);
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(repeat: RepeatRule) -> NormalizedRule {
        NormalizedRule::new("test", &repeat)
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 4), Some(30));
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(shift_month(2024, 11, 3), Some((2025, 2)));
        assert_eq!(shift_month(2024, 1, 24), Some((2026, 1)));
    }

    #[test]
    fn weekly_steps_within_week_then_jumps() {
        let r = rule(RepeatRule::weekly().by_weekday(vec![1, 5]));
        // Mon 2024-03-04 -> Fri 03-08 -> Mon 03-11
        assert_eq!(r.next_date(date(2024, 3, 4), 4), Some(date(2024, 3, 8)));
        assert_eq!(r.next_date(date(2024, 3, 8), 4), Some(date(2024, 3, 11)));
    }

    #[test]
    fn weekly_interval_two_skips_a_week() {
        let r = rule(RepeatRule::weekly().interval(2).by_weekday(vec![1, 5]));
        assert_eq!(r.next_date(date(2024, 3, 8), 4), Some(date(2024, 3, 18)));
    }

    #[test]
    fn weekly_unsorted_duplicated_weekdays_are_normalized() {
        let r = rule(RepeatRule::weekly().by_weekday(vec![5, 1, 5, 9]));
        assert_eq!(r.weekdays, vec![1, 5]);
    }

    #[test]
    fn monthly_without_days_keeps_anchor_day() {
        let r = rule(RepeatRule::monthly());
        let feb = r.next_date(date(2024, 1, 31), 31).unwrap();
        assert_eq!(feb, date(2024, 2, 29));
        assert_eq!(r.next_date(feb, 31), Some(date(2024, 3, 31)));
    }

    #[test]
    fn monthly_by_day_skips_days_missing_from_month() {
        let r = rule(RepeatRule::monthly().by_monthday(vec![15, 31]));
        // April has no 31st: 04-15 -> 05-15.
        assert_eq!(r.next_date(date(2024, 4, 15), 15), Some(date(2024, 5, 15)));
        assert_eq!(r.next_date(date(2024, 5, 15), 15), Some(date(2024, 5, 31)));
    }

    #[test]
    fn yearly_by_month_keeps_day_of_month() {
        let r = rule(RepeatRule::yearly().by_month(vec![3, 9]));
        assert_eq!(r.next_date(date(2024, 3, 10), 10), Some(date(2024, 9, 10)));
        assert_eq!(r.next_date(date(2024, 9, 10), 10), Some(date(2025, 3, 10)));
    }

    #[test]
    fn yearly_leap_day_clamps_in_common_years() {
        let r = rule(RepeatRule::yearly());
        assert_eq!(r.next_date(date(2024, 2, 29), 29), Some(date(2025, 2, 28)));
    }

    #[test]
    fn negative_and_oversized_filter_values_are_dropped() {
        let r = rule(RepeatRule::weekly().by_weekday(vec![-1, 3, 300, 1]));
        assert_eq!(r.weekdays, vec![1, 3]);

        let r = rule(RepeatRule::monthly().by_monthday(vec![0, -15, 15]));
        assert_eq!(r.monthdays, vec![15]);
    }

    #[test]
    fn zero_count_is_logged() {
        assert!(warnings_for(RepeatRule::daily().count(0)).contains("count of 0"));
        assert!(warnings_for(RepeatRule::daily().count(3)).is_empty());
    }

    #[test]
    fn out_of_range_filter_values_are_logged() {
        let logs = warnings_for(RepeatRule::weekly().by_weekday(vec![-1, 2]));
        assert!(logs.contains("out-of-range repeat filter value"), "{}", logs);
        assert!(logs.contains("value=-1"), "{}", logs);
    }

    #[test]
    fn non_positive_interval_is_treated_as_one() {
        assert_eq!(rule(RepeatRule::daily().interval(0)).interval, 1);
        assert_eq!(rule(RepeatRule::daily().interval(-3)).interval, 1);
    }
}

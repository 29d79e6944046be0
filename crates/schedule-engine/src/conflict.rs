//! Detect overlapping events.
//!
//! Adjacent events (where one ends exactly when another starts) are NOT
//! conflicts, and all-day events never conflict with anything.

use crate::span::{overlaps, TimeSpan};

/// A detected conflict between two spans from the same list.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<'a, T> {
    pub a: &'a T,
    pub b: &'a T,
    pub overlap_minutes: i64,
}

/// Every candidate whose time range overlaps `target`.
///
/// Skips candidates sharing the target's id and, on either side, all-day
/// events. Candidate order is preserved.
pub fn find_conflicts<'a, T, C>(target: &T, candidates: &'a [C]) -> Vec<&'a C>
where
    T: TimeSpan + ?Sized,
    C: TimeSpan,
{
    if target.is_all_day() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|candidate| {
            candidate.span_id() != target.span_id()
                && !candidate.is_all_day()
                && overlaps(
                    target.span_start(),
                    target.span_end(),
                    candidate.span_start(),
                    candidate.span_end(),
                )
        })
        .collect()
}

/// Every pair of timed spans in `spans` that overlap, with the overlap length.
///
/// Pairs are reported once, in input order (`a` before `b`).
pub fn find_overlapping_pairs<T: TimeSpan>(spans: &[T]) -> Vec<Conflict<'_, T>> {
    let mut conflicts = Vec::new();

    for (i, a) in spans.iter().enumerate() {
        if a.is_all_day() {
            continue;
        }
        for b in &spans[i + 1..] {
            if b.is_all_day() || a.span_id() == b.span_id() {
                continue;
            }
            if overlaps(a.span_start(), a.span_end(), b.span_start(), b.span_end()) {
                conflicts.push(Conflict {
                    a,
                    b,
                    overlap_minutes: overlap_minutes(a, b),
                });
            }
        }
    }

    conflicts
}

/// Length of the overlap between two spans in whole minutes, 0 if disjoint.
pub fn overlap_minutes<A: TimeSpan + ?Sized, B: TimeSpan + ?Sized>(a: &A, b: &B) -> i64 {
    let overlap_start = a.span_start().max(b.span_start());
    let overlap_end = a.span_end().min(b.span_end());
    if overlap_end <= overlap_start {
        0
    } else {
        (overlap_end - overlap_start).num_minutes()
    }
}

//! Pack one day's timed events into side-by-side columns.
//!
//! Events are split into connected overlap groups (linked directly or through
//! a chain of overlaps). Within a group each event takes the lowest column
//! that is free at its start; a group's width is the number of columns it
//! opened, independently of every other group that day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::span::TimeSpan;

/// Column placement of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSlot {
    pub id: String,
    pub column: usize,
    pub total_columns: usize,
}

impl LayoutSlot {
    /// Fraction of the day column's width this event occupies.
    pub fn width_fraction(&self) -> f64 {
        1.0 / self.total_columns as f64
    }

    /// Fraction of the day column's width to the left of this event.
    pub fn left_fraction(&self) -> f64 {
        self.column as f64 / self.total_columns as f64
    }
}

/// Assign every timed span a column and its group's column count.
///
/// Output follows input order. All-day spans are left out.
pub fn compute_layout<T: TimeSpan>(spans: &[T]) -> Vec<LayoutSlot> {
    let mut order: Vec<usize> = (0..spans.len())
        .filter(|&i| !spans[i].is_all_day())
        .collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .span_start()
            .cmp(&spans[b].span_start())
            .then_with(|| spans[a].span_end().cmp(&spans[b].span_end()))
            .then_with(|| a.cmp(&b))
    });

    let mut placements: Vec<Option<(usize, usize)>> = vec![None; spans.len()];
    let mut group: Vec<usize> = Vec::new();
    let mut group_end: Option<DateTime<Utc>> = None;

    for index in order {
        let span = &spans[index];
        if group_end.is_some_and(|end| span.span_start() >= end) {
            pack_group(spans, &group, &mut placements);
            group.clear();
            group_end = None;
        }
        group.push(index);
        group_end = Some(group_end.map_or(span.span_end(), |end| end.max(span.span_end())));
    }
    pack_group(spans, &group, &mut placements);

    placements
        .into_iter()
        .enumerate()
        .filter_map(|(index, placement)| {
            placement.map(|(column, total_columns)| LayoutSlot {
                id: spans[index].span_id().to_string(),
                column,
                total_columns,
            })
        })
        .collect()
}

/// Greedy column assignment for one connected group, already start-sorted.
fn pack_group<T: TimeSpan>(
    spans: &[T],
    group: &[usize],
    placements: &mut [Option<(usize, usize)>],
) {
    let mut column_ends: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: Vec<(usize, usize)> = Vec::with_capacity(group.len());

    for &index in group {
        let span = &spans[index];
        let column = match column_ends
            .iter()
            .position(|&end| end <= span.span_start())
        {
            Some(free) => {
                column_ends[free] = span.span_end();
                free
            }
            None => {
                column_ends.push(span.span_end());
                column_ends.len() - 1
            }
        };
        columns.push((index, column));
    }

    let total_columns = column_ends.len();
    for (index, column) in columns {
        placements[index] = Some((column, total_columns));
    }
}

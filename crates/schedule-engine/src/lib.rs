//! # schedule-engine
//!
//! Scheduling math for calendar views: recurring-event expansion over a query
//! window, time-range conflict detection, and overlap layout for day views.
//!
//! Nothing here renders or persists anything. A view layer owns a
//! [`Scheduler`] (an [`EventStore`] plus an [`EngineConfig`]) and asks it for
//! the occurrences, conflicts and column placements it needs to draw.
//!
//! ## Modules
//!
//! - [`event`] — Events, repeat rules, exceptions, occurrences
//! - [`store`] — Validated CRUD over base events
//! - [`recurrence`] — Repeat rule → concrete occurrences in a window
//! - [`query`] — Range and single-day queries over a store
//! - [`conflict`] — Detect overlapping events
//! - [`layout`] — Pack overlapping events into display columns
//! - [`codec`] — JSON export and import
//! - [`dst`] — DST transition policies
//! - [`span`] — Half-open interval helpers shared by the above
//! - [`config`] — Timezone and expansion limits
//! - [`error`] — Error types

pub mod codec;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod event;
pub mod layout;
pub mod query;
pub mod recurrence;
pub mod scheduler;
pub mod span;
pub mod store;

pub use config::EngineConfig;
pub use conflict::{find_conflicts, find_overlapping_pairs};
pub use dst::DstPolicy;
pub use error::{Result, ScheduleError};
pub use event::{
    Event, EventOverrides, EventPatch, Exception, Frequency, NewEvent, Occurrence,
    OccurrenceKind, RepeatRule,
};
pub use layout::{compute_layout, LayoutSlot};
pub use query::{events_for_date, events_in_range};
pub use recurrence::{expand, expand_with};
pub use scheduler::Scheduler;
pub use span::TimeSpan;
pub use store::{BatchOperation, BatchOutcome, EventStore};

//! JSON interchange for base events.
//!
//! Export writes a versioned envelope. Import accepts that envelope or a
//! bare array of events, and adds records one at a time through the store so
//! each record is validated and a bad record does not sink the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::event::{Event, NewEvent};
use crate::store::EventStore;

/// Version written by [`export_json`] and accepted by [`import_json`].
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope<E> {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub events: Vec<E>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Envelope(ExportEnvelope<serde_json::Value>),
    Bare(Vec<serde_json::Value>),
}

/// Result of an import: what was stored and what was rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: Vec<Event>,
    pub failures: Vec<ImportFailure>,
}

/// A rejected record, by position in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub index: usize,
    pub error: String,
}

/// Serialize `events` into a pretty-printed export envelope.
pub fn export_json<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    exported_at: DateTime<Utc>,
) -> Result<String> {
    let envelope = ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        export_date: exported_at,
        events: events.into_iter().collect::<Vec<&Event>>(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parse a payload into event records without touching a store.
///
/// # Errors
/// Returns `ScheduleError::Json` if the payload or any record is malformed, and
/// `ScheduleError::UnsupportedVersion` for an envelope of an unknown version.
pub fn parse_events(data: &str) -> Result<Vec<NewEvent>> {
    records(data)?
        .into_iter()
        .map(|record| Ok(serde_json::from_value(record)?))
        .collect()
}

/// Add every record in `data` to `store`.
///
/// # Errors
/// Fails only when the payload as a whole cannot be read; per-record problems
/// are collected in the report.
pub fn import_json(store: &mut EventStore, data: &str) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (index, record) in records(data)?.into_iter().enumerate() {
        let outcome = serde_json::from_value::<NewEvent>(record)
            .map_err(ScheduleError::from)
            .and_then(|new| store.add(new));
        match outcome {
            Ok(event) => report.imported.push(event),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping event during import");
                report.failures.push(ImportFailure {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        imported = report.imported.len(),
        failed = report.failures.len(),
        "import finished"
    );
    Ok(report)
}

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts RFC 3339 (with offset, e.g. "2024-03-04T09:00:00+01:00") and naive
/// "2024-03-04T09:00:00", which is interpreted as UTC.
pub fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|ndt| ndt.and_utc())
}

fn records(data: &str) -> Result<Vec<serde_json::Value>> {
    match serde_json::from_str::<ImportPayload>(data)? {
        ImportPayload::Envelope(envelope) => {
            if envelope.version != EXPORT_VERSION {
                return Err(ScheduleError::UnsupportedVersion(envelope.version));
            }
            Ok(envelope.events)
        }
        ImportPayload::Bare(events) => Ok(events),
    }
}

//! Engine configuration: the calendar's timezone, the expansion safety cap,
//! and the DST policy.

use chrono_tz::Tz;

use crate::dst::DstPolicy;
use crate::error::{Result, ScheduleError};

/// Default number of recurrence steps walked per base event and query.
pub const DEFAULT_MAX_EXPANSION_STEPS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Timezone in which recurrence dates, exception keys and day
    /// boundaries are computed.
    pub timezone: Tz,
    /// Hard cap on recurrence steps. Guards against rules that never
    /// terminate on their own.
    pub max_expansion_steps: usize,
    pub dst_policy: DstPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            max_expansion_steps: DEFAULT_MAX_EXPANSION_STEPS,
            dst_policy: DstPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration in the named IANA timezone.
    ///
    /// # Errors
    /// Returns `ScheduleError::InvalidTimezone` if `name` is not a valid IANA identifier.
    pub fn with_timezone(name: &str) -> Result<Self> {
        Ok(Self {
            timezone: parse_timezone(name)?,
            ..Self::default()
        })
    }

    pub fn max_expansion_steps(mut self, steps: usize) -> Self {
        self.max_expansion_steps = steps;
        self
    }

    pub fn dst_policy(mut self, policy: DstPolicy) -> Self {
        self.dst_policy = policy;
        self
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

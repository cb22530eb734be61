//! Time helpers.
//!
//! Core never reads the system clock on its own. Components that need "now"
//! receive a `Clock` (or an explicit `OffsetDateTime`) from their caller, which
//! keeps rotation cutovers and tolerance windows testable.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::errors::ValidationError;

/// Source of "now".
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock pinned to one instant. Used by tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Parse an RFC3339 timestamp. Any offset is accepted.
pub fn parse_rfc3339(s: &str) -> Result<OffsetDateTime, ValidationError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| ValidationError::InvalidTimestamp(e.to_string()))
}

/// Parse an RFC3339 timestamp and require a UTC offset.
pub fn parse_rfc3339_utc(s: &str) -> Result<OffsetDateTime, ValidationError> {
    let dt = parse_rfc3339(s)?;
    if !dt.offset().is_utc() {
        return Err(ValidationError::InvalidTimestamp(format!(
            "offset must be UTC: {s}"
        )));
    }
    Ok(dt)
}

/// Format as RFC3339 UTC with whole seconds, e.g. `2026-10-19T08:30:00Z`.
pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    let dt = dt
        .to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .unwrap_or(dt);
    // Rfc3339 formatting only fails for years outside 0..=9999.
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

//! Session and date policy: decides which settled bars produce a row.
//!
//! The policy never affects the indicators themselves. With intraday bars
//! every bar advances the graph, but only the bar at the configured local
//! hour is written, yielding one row per session.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::config::PipelineConfig;

/// What happens to the record of a processed bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Emit,
    /// Still inside the warm-up period.
    Warmup,
    /// Before `start_date`; the bar only feeds history.
    BeforeStart,
    /// Not the session's emission hour.
    OffSession,
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    offset: Duration,
    emit_hour: Option<u32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl SessionPolicy {
    pub fn new(
        utc_offset_hours: i32,
        emit_hour: Option<u32>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            offset: Duration::hours(i64::from(utc_offset_hours)),
            emit_hour,
            start,
            end,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.session.utc_offset_hours,
            config.session.emit_hour,
            config.start_date,
            config.end_date,
        )
    }

    /// Bar timestamp on the session's local clock.
    pub fn local_time(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        timestamp + self.offset
    }

    /// True once the bar falls after `end_date`; it and everything after it
    /// is ignored.
    pub fn is_past_end(&self, timestamp: NaiveDateTime) -> bool {
        self.end
            .is_some_and(|end| self.local_time(timestamp).date() > end)
    }

    /// Classify a warm bar that is not past the end date.
    pub fn classify(&self, timestamp: NaiveDateTime) -> Emission {
        let local = self.local_time(timestamp);
        if self.start.is_some_and(|start| local.date() < start) {
            return Emission::BeforeStart;
        }
        match self.emit_hour {
            Some(hour) if local.hour() != hour => Emission::OffSession,
            _ => Emission::Emit,
        }
    }
}

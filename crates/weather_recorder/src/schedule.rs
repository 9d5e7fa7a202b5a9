//! Recording cadence: a fixed sample rate or a cron expression.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Errors from building or evaluating a cadence.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression: {0}")]
    CronParse(String),
    #[error("Invalid sample rate: {0}")]
    InvalidRate(String),
}

type Result<T> = std::result::Result<T, ScheduleError>;

/// When the next recording cycle should start.
#[derive(Debug, Clone)]
pub enum Cadence {
    /// One cycle per fixed interval, measured from the previous cycle's start.
    Every(TimeDelta),
    /// One cycle per cron occurrence.
    Cron(Box<cron::Schedule>),
}

impl Cadence {
    /// Build a fixed-rate cadence from whole seconds.
    pub fn every_secs(secs: u64) -> Result<Self> {
        if secs == 0 {
            return Err(ScheduleError::InvalidRate("must be at least 1 second".into()));
        }
        Self::every(Duration::from_secs(secs))
    }

    /// Build a fixed-rate cadence.
    pub fn every(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ScheduleError::InvalidRate("interval must be non-zero".into()));
        }
        let delta = TimeDelta::from_std(interval)
            .map_err(|_| ScheduleError::InvalidRate(format!("{interval:?} is too large")))?;
        Ok(Cadence::Every(delta))
    }

    /// Build a cron cadence from a 5- or 6-field expression.
    pub fn cron(expr: &str) -> Result<Self> {
        let normalized = normalize_cron_expr(expr);
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| ScheduleError::CronParse(format!("{}: {}", expr, e)))?;
        Ok(Cadence::Cron(Box::new(schedule)))
    }

    /// Cron when an expression is given, otherwise the fixed sample rate.
    pub fn from_config(sample_rate_secs: u64, cron: Option<&str>) -> Result<Self> {
        match cron {
            Some(expr) => Self::cron(expr),
            None => Self::every_secs(sample_rate_secs),
        }
    }

    /// The start time of the cycle after one that started at `last_start`.
    pub fn next_run(&self, last_start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self {
            Cadence::Every(delta) => last_start
                .checked_add_signed(*delta)
                .ok_or_else(|| ScheduleError::InvalidRate("next run overflows".into())),
            Cadence::Cron(schedule) => schedule
                .after(&last_start)
                .next()
                .ok_or_else(|| ScheduleError::CronParse("no next occurrence".to_string())),
        }
    }
}

/// Normalise a cron expression to 6-field format.
///
/// The `cron` crate expects a leading seconds field. Standard 5-field
/// expressions get "0 " prepended to pin the seconds to zero.
fn normalize_cron_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

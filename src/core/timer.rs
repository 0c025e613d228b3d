//! Timers that drive recurring task execution.
//!
//! A [`Timer`] is either a fixed [`Interval`](Timer::Interval) that fires
//! immediately and then every period, or a calendar [`Cron`](Timer::Cron)
//! expression with a seconds field. Cron timers can be built from structured
//! arguments (hourly, daily, weekly) or from a literal expression.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when building a timer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// Invalid timezone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A structured field is outside its allowed range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Day of week for weekly cron timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Sun => "SUN",
            DayOfWeek::Mon => "MON",
            DayOfWeek::Tue => "TUE",
            DayOfWeek::Wed => "WED",
            DayOfWeek::Thu => "THU",
            DayOfWeek::Fri => "FRI",
            DayOfWeek::Sat => "SAT",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring-fire schedule.
#[derive(Debug, Clone)]
pub enum Timer {
    /// Fires at start, then every period.
    Interval(IntervalTimer),
    /// Fires at wall-clock instants matching a cron expression.
    Cron(CronTimer),
}

/// Fixed-period timer.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    step: chrono::Duration,
}

impl IntervalTimer {
    /// The period between fires.
    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Calendar timer backed by a 6-field cron expression.
#[derive(Debug, Clone)]
pub struct CronTimer {
    /// The expression as built or supplied (`?` preserved).
    expression: String,
    timezone: Tz,
    schedule: Box<CronSchedule>,
}

impl CronTimer {
    /// The expression as built or supplied.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The timezone the expression is evaluated in.
    pub fn timezone(&self) -> &str {
        self.timezone.name()
    }

    fn after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Timer {
    /// Create a fixed-interval timer.
    pub fn interval(period: Duration) -> Result<Self, TimerError> {
        if period.is_zero() {
            return Err(TimerError::InvalidInterval("period must be non-zero".into()));
        }
        let step = chrono::Duration::from_std(period)
            .map_err(|e| TimerError::InvalidInterval(e.to_string()))?;
        Ok(Timer::Interval(IntervalTimer { period, step }))
    }

    /// Create a fixed-interval timer from milliseconds.
    pub fn every_millis(period_ms: u64) -> Result<Self, TimerError> {
        Self::interval(Duration::from_millis(period_ms))
    }

    /// Fires every hour at `minute:second`.
    pub fn hourly(minute: u32, second: u32) -> Result<Self, TimerError> {
        check("minute", minute, 59)?;
        check("second", second, 59)?;
        Self::cron(format!("{} {} * * * ?", second, minute))
    }

    /// Fires every day at `hour:minute:second`.
    pub fn daily(hour: u32, minute: u32, second: u32) -> Result<Self, TimerError> {
        check("hour", hour, 23)?;
        check("minute", minute, 59)?;
        check("second", second, 59)?;
        Self::cron(format!("{} {} {} * * ?", second, minute, hour))
    }

    /// Fires every `day` of the week at `hour:minute:second`.
    pub fn weekly(day: DayOfWeek, hour: u32, minute: u32, second: u32) -> Result<Self, TimerError> {
        check("hour", hour, 23)?;
        check("minute", minute, 59)?;
        check("second", second, 59)?;
        Self::cron(format!("{} {} {} ? * {}", second, minute, hour, day))
    }

    /// Create a cron timer from a literal expression, evaluated in UTC.
    ///
    /// Accepts 6-field `second minute hour day month weekday` expressions and
    /// 5-field expressions without seconds (fired at second 0).
    pub fn cron(expression: impl Into<String>) -> Result<Self, TimerError> {
        Self::cron_with_timezone(expression, "UTC")
    }

    /// Create a cron timer evaluated in the given IANA timezone.
    pub fn cron_with_timezone(
        expression: impl Into<String>,
        timezone: &str,
    ) -> Result<Self, TimerError> {
        let expression = expression.into();
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| TimerError::InvalidTimezone(timezone.to_string()))?;
        let schedule = parse_cron(&expression)?;

        Ok(Timer::Cron(CronTimer {
            expression,
            timezone,
            schedule: Box::new(schedule),
        }))
    }

    /// The cron expression, if this is a calendar timer.
    pub fn expression(&self) -> Option<&str> {
        match self {
            Timer::Interval(_) => None,
            Timer::Cron(cron) => Some(cron.expression()),
        }
    }

    /// The fixed period, if this is an interval timer.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Timer::Interval(interval) => Some(interval.period),
            Timer::Cron(_) => None,
        }
    }

    /// First fire time for a timer started at `now`.
    ///
    /// Interval timers fire immediately; cron timers fire at the next
    /// matching instant strictly after `now`.
    pub fn first_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timer::Interval(_) => Some(now),
            Timer::Cron(cron) => cron.after(now),
        }
    }

    /// Next fire time after a previous fire.
    pub fn next_after(&self, previous: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timer::Interval(interval) => previous.checked_add_signed(interval.step),
            Timer::Cron(cron) => cron.after(previous),
        }
    }

    /// Iterate fire times for a timer started at `start`.
    pub fn upcoming(&self, start: DateTime<Utc>) -> Upcoming<'_> {
        Upcoming {
            timer: self,
            next: self.first_fire(start),
        }
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timer::Interval(interval) => write!(f, "every {:?}", interval.period),
            Timer::Cron(cron) => write!(f, "cron '{}' ({})", cron.expression, cron.timezone()),
        }
    }
}

/// Iterator over a timer's fire times.
pub struct Upcoming<'a> {
    timer: &'a Timer,
    next: Option<DateTime<Utc>>,
}

impl Iterator for Upcoming<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.timer.next_after(current);
        Some(current)
    }
}

fn check(field: &'static str, value: u32, max: u32) -> Result<(), TimerError> {
    if value > max {
        return Err(TimerError::OutOfRange { field, value });
    }
    Ok(())
}

/// Parse a 5 or 6 field expression. `?` means "any" and is normalised to `*`.
fn parse_cron(expression: &str) -> Result<CronSchedule, TimerError> {
    let fields: Vec<&str> = expression
        .split_whitespace()
        .map(|f| if f == "?" { "*" } else { f })
        .collect();

    let normalized = match fields.len() {
        5 => format!("0 {}", fields.join(" ")),
        6 => fields.join(" "),
        n => {
            return Err(TimerError::InvalidCron(format!(
                "expected 5 or 6 fields, got {}",
                n
            )));
        }
    };

    CronSchedule::from_str(&normalized).map_err(|e| TimerError::InvalidCron(e.to_string()))
}

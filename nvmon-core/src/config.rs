use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing a suspend window argument.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid suspend window '{0}': expected START-END,MINUTES,PERCENT")]
    Format(String),

    #[error("invalid time '{0}': expected H[H]:MM")]
    Time(String),

    #[error("idle duration must be greater than zero")]
    ZeroIdleDuration,

    #[error("idle percent {0} out of range 0-100")]
    PercentOutOfRange(u32),
}

/// Daily time-of-day window during which auto-suspend is armed.
///
/// `start > end` means the window wraps past midnight, e.g. `22:00-6:00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownWindow {
    /// Window opens at this time of day.
    pub start: NaiveTime,

    /// Window closes at this time of day.
    pub end: NaiveTime,

    /// How long the GPU must stay idle before suspend fires (minutes).
    pub idle_minutes: u32,

    /// Utilization at or below this percentage counts as idle.
    pub idle_percent: u32,
}

impl ShutdownWindow {
    /// Idle duration as a time delta.
    pub fn idle_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.idle_minutes))
    }
}

impl FromStr for ShutdownWindow {
    type Err = ConfigError;

    /// Parse `H[H]:MM-H[H]:MM,idleMinutes,idlePercent`, e.g. `1:30-9:00,30,10`.
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 3 {
            return Err(ConfigError::Format(s.to_string()));
        }

        let (start_str, end_str) = parts[0]
            .split_once('-')
            .ok_or_else(|| ConfigError::Format(s.to_string()))?;
        let start = parse_time(start_str)?;
        let end = parse_time(end_str)?;

        let idle_minutes: u32 = parts[1]
            .parse()
            .map_err(|_| ConfigError::Format(s.to_string()))?;
        if idle_minutes == 0 {
            return Err(ConfigError::ZeroIdleDuration);
        }

        let idle_percent: u32 = parts[2]
            .parse()
            .map_err(|_| ConfigError::Format(s.to_string()))?;
        if idle_percent > 100 {
            return Err(ConfigError::PercentOutOfRange(idle_percent));
        }

        Ok(Self {
            start,
            end,
            idle_minutes,
            idle_percent,
        })
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, ConfigError> {
    let (hour_str, minute_str) = s
        .split_once(':')
        .ok_or_else(|| ConfigError::Time(s.to_string()))?;

    // Hours take one or two digits, minutes always two
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return Err(ConfigError::Time(s.to_string()));
    }

    let hour: u32 = hour_str.parse().map_err(|_| ConfigError::Time(s.to_string()))?;
    let minute: u32 = minute_str
        .parse()
        .map_err(|_| ConfigError::Time(s.to_string()))?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| ConfigError::Time(s.to_string()))
}

/// Settings for the polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Index of the GPU to watch.
    pub gpu_index: u32,

    /// Delay between polls.
    pub interval: Duration,

    /// Auto-suspend window; `None` disables the suspend policy entirely.
    pub window: Option<ShutdownWindow>,
}

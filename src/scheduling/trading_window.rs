use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::scheduling::zoned_time::to_zoned_time;

/// Half-open local hour range `[start, end)`. A range with `start > end`
/// wraps past midnight.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct HourRange {
    /// Start hour (inclusive), 0–23
    pub start: u8,

    /// End hour (exclusive), 1–24
    pub end: u8,
}

impl HourRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u8) -> bool {
        if self.start <= self.end {
            (hour >= self.start) && (hour < self.end)
        } else {
            (hour >= self.start) || (hour < self.end)
        }
    }
}

/// Local time range during which high-frequency polling is active.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TradingWindow {
    /// Offset of the market's local time from UTC, in minutes.
    pub utc_offset_minutes: i32,

    /// Active local weekdays, 0 = Sunday.
    pub weekdays: Vec<u8>,

    pub hours: Vec<HourRange>,
}

impl Default for TradingWindow {
    /// US session seen from UTC+8: Monday–Saturday, 21:00–05:00.
    fn default() -> Self {
        Self {
            utc_offset_minutes: 8 * 60,
            weekdays: vec![1, 2, 3, 4, 5, 6],
            hours: vec![HourRange::new(0, 5), HourRange::new(21, 24)],
        }
    }
}

impl TradingWindow {
    pub fn is_active(&self, instant: DateTime<Utc>) -> bool {
        let local = to_zoned_time(instant, self.utc_offset_minutes);

        self.weekdays.contains(&local.weekday)
            && self.hours.iter().any(|range| range.contains(local.hour))
    }

    pub fn validate(&self) -> Result<()> {
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            bail!("utc_offset_minutes must be within ±1440");
        }
        if self.weekdays.iter().any(|day| *day > 6) {
            bail!("weekdays must be between 0 (Sunday) and 6 (Saturday)");
        }
        for range in &self.hours {
            if range.start > 23 || range.end > 24 || range.start == range.end {
                bail!("invalid hour range {}..{}", range.start, range.end);
            }
        }
        Ok(())
    }
}

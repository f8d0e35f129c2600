use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};

/// Wall-clock fields of an instant at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedTime {
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
}

pub fn to_zoned_time(instant: DateTime<Utc>, offset_minutes: i32) -> ZonedTime {
    let local = instant.naive_utc() + TimeDelta::minutes(i64::from(offset_minutes));

    ZonedTime {
        weekday: local.weekday().num_days_from_sunday() as u8,
        hour: local.hour() as u8,
        minute: local.minute() as u8,
    }
}

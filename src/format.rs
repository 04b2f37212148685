//! Display formatting for server timestamps and the delivery promise.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const INVALID_DATE: &str = "Invalid Date";
pub const DELIVERY_DAYS: u64 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateStyle {
    /// `February 27, 2025`
    Long,
    /// `27 Feb, 10:33 AM`
    DateTime,
    /// `27 Feb`
    Short,
    /// `Mar 2, 2025`
    Custom,
}

impl std::str::FromStr for DateStyle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Self::Long),
            "datetime" => Ok(Self::DateTime),
            "short" => Ok(Self::Short),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown date style: {other}")),
        }
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.f]`, the same with `T`, RFC 3339, or a bare
/// date. Offsets are dropped; the wall-clock time is what gets shown.
pub fn parse_server_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let iso = raw.replacen(' ', "T", 1);
    if let Ok(dt) = NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return Some(dt.naive_local());
    }
    // Postgres-style `2025-02-27 10:33:00.123 +0530 IST`
    if let Some(head) = raw.get(..19) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|d| d.and_time(NaiveTime::MIN))
}

pub fn format_timestamp(raw: &str, style: DateStyle) -> String {
    match parse_server_timestamp(raw) {
        Some(dt) => format_datetime(&dt, style),
        None => INVALID_DATE.to_string(),
    }
}

pub fn format_datetime(dt: &NaiveDateTime, style: DateStyle) -> String {
    let pattern = match style {
        DateStyle::Long => "%B %d, %Y",
        DateStyle::DateTime => "%-d %b, %I:%M %p",
        DateStyle::Short => "%-d %b",
        DateStyle::Custom => "%b %-d, %Y",
    };
    dt.format(pattern).to_string()
}

/// "Arriving ..." plus the time left to order for that date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryEstimate {
    pub arrival: NaiveDate,
    pub hours_left: i64,
    pub minutes_left: i64,
    pub seconds_left: i64,
}

impl DeliveryEstimate {
    pub fn at(now: NaiveDateTime) -> Self {
        let arrival = now.date().checked_add_days(Days::new(DELIVERY_DAYS)).unwrap_or(now.date());
        let cutoff = now.date().and_hms_milli_opt(23, 59, 59, 999).unwrap_or(now);
        let left = (cutoff - now).num_seconds().max(0);
        Self { arrival, hours_left: left / 3600, minutes_left: (left % 3600) / 60, seconds_left: left % 60 }
    }

    pub fn now() -> Self { Self::at(chrono::Local::now().naive_local()) }

    pub fn arrival_label(&self) -> String {
        format!("Arriving {}", self.arrival.format("%b %d, %Y"))
    }

    pub fn cutoff_label(&self) -> String {
        format!(
            "If you order in the next {} hours, {} minutes, and {} seconds",
            self.hours_left, self.minutes_left, self.seconds_left
        )
    }
}

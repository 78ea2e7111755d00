//! Alarm bookkeeping, labels and small calendar helpers.
//!
//! Labels are `core::fmt::Display` values so they can be written to any
//! formatter without allocating.

use core::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English ordinal suffix of `n` (`st`, `nd`, `rd`, `th`).
pub fn ordinal_suffix(n: u32) -> &'static str {
    if (11..=13).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Number of days in `month` of `year`, or `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1)?,
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Wraps `value` into the inclusive range `low..=high`. `None` when the range
/// is empty.
pub fn wrap_to_range(value: i64, low: i32, high: i32) -> Option<i32> {
    let (low, high) = (i64::from(low), i64::from(high));
    if high < low {
        return None;
    }
    let wrapped = low + (value - low).rem_euclid(high - low + 1);
    i32::try_from(wrapped).ok()
}

/// Limits `value` to `low..=high`.
pub fn clip(value: f32, low: f32, high: f32) -> f32 {
    value.max(low).min(high)
}

/// Date label such as `Friday, March 14th, 2025`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DateLabel(NaiveDate);

impl DateLabel {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weekday: Weekday = self.0.weekday();
        let day = self.0.day();
        write!(
            f,
            "{}, {} {}{}, {}",
            WEEKDAYS[weekday.num_days_from_monday() as usize],
            MONTHS[self.0.month0() as usize],
            day,
            ordinal_suffix(day),
            self.0.year()
        )
    }
}

/// Time label `H:MM`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeLabel {
    hour: u32,
    minute: u32,
}

impl TimeLabel {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

/// Alarm label: `H:MM` when enabled, `None` otherwise.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlarmLabel(Option<TimeLabel>);

impl AlarmLabel {
    pub fn new(hour: u32, minute: u32, enabled: bool) -> Self {
        Self(enabled.then(|| TimeLabel::new(hour, minute)))
    }
}

impl fmt::Display for AlarmLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(time) => time.fmt(f),
            None => f.write_str("None"),
        }
    }
}

/// Daily alarm time kept by the clock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmSetting {
    pub hour: u32,
    pub minute: u32,
    pub enabled: bool,
}

impl AlarmSetting {
    pub fn set(&mut self, hour: u32, minute: u32, enable: bool) {
        self.hour = hour;
        self.minute = minute;
        self.enabled = enable;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn label(&self) -> AlarmLabel {
        AlarmLabel::new(self.hour, self.minute, self.enabled)
    }

    /// Seconds from today's alarm time to `now`; negative before the alarm.
    /// `None` if the stored time is not a valid time of day.
    pub fn delta_from(&self, now: NaiveTime) -> Option<i32> {
        let alarm = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        i32::try_from(now.signed_duration_since(alarm).num_seconds()).ok()
    }
}

//! Contracts of the collaborators around the state machine.
//!
//! The [`crate::controller::Controller`] only talks to the real-time clock,
//! the panel inputs, the LED display and the buzzer through these traits.
//! [`crate::display::As1115`] implements [`SegmentDisplay`].
//! [`crate::inputs::PanelInputs`] and [`crate::inputs::KeyScanInputs`]
//! implement [`Inputs`].

use chrono::NaiveDate;

use crate::clock::{AlarmLabel, DateLabel, TimeLabel};

/// Date, time and alarm bookkeeping.
pub trait Clock {
    type Error;

    /// Largest alarm delta in seconds, used to scale the alarm volume.
    const ALARM_DELTA_MAX: i32;

    fn year(&mut self) -> Result<i32, Self::Error>;
    fn month(&mut self) -> Result<u32, Self::Error>;
    fn day(&mut self) -> Result<u32, Self::Error>;
    fn hour(&mut self) -> Result<u32, Self::Error>;
    fn minute(&mut self) -> Result<u32, Self::Error>;

    /// Sets the date, keeping the time of day.
    fn set_date(&mut self, year: i32, month: u32, day: u32) -> Result<(), Self::Error>;
    /// Sets the time of day; seconds restart at zero.
    fn set_time(&mut self, hour: u32, minute: u32) -> Result<(), Self::Error>;

    fn alarm_hour(&mut self) -> Result<u32, Self::Error>;
    fn alarm_minute(&mut self) -> Result<u32, Self::Error>;
    fn alarm_enabled(&mut self) -> Result<bool, Self::Error>;
    fn set_alarm(&mut self, hour: u32, minute: u32, enable: bool) -> Result<(), Self::Error>;

    /// Whether the alarm is sounding, given the raw alarm switch level.
    fn alarm_status(&mut self, raw_flag: bool) -> Result<bool, Self::Error>;
    /// Seconds since the alarm time; negative before it.
    fn alarm_delta(&mut self) -> Result<i32, Self::Error>;
    fn disable_alarm(&mut self) -> Result<(), Self::Error>;
    /// Silences a sounding alarm and re-arms it for its next occurrence.
    fn reset_alarm(&mut self) -> Result<(), Self::Error>;

    /// Date as shown on the status display, e.g. `Friday, March 14th, 2025`.
    fn date_label(&mut self) -> Result<Option<DateLabel>, Self::Error> {
        let (year, month, day) = (self.year()?, self.month()?, self.day()?);
        Ok(NaiveDate::from_ymd_opt(year, month, day).map(DateLabel::new))
    }

    fn time_label(&mut self) -> Result<TimeLabel, Self::Error> {
        Ok(TimeLabel::new(self.hour()?, self.minute()?))
    }

    /// `H:MM` of the alarm, or `None` when it is off.
    fn alarm_label(&mut self) -> Result<AlarmLabel, Self::Error> {
        let enabled = self.alarm_enabled()?;
        Ok(AlarmLabel::new(self.alarm_hour()?, self.alarm_minute()?, enabled))
    }
}

/// Buttons and the rotary encoder.
pub trait Inputs {
    type Error;

    /// True exactly once when the encoder button is released after a press.
    /// Must be called every tick.
    fn update_button_enter(&mut self) -> Result<bool, Self::Error>;
    fn button_back(&mut self) -> Result<bool, Self::Error>;
    fn button_date(&mut self) -> Result<bool, Self::Error>;
    fn button_time(&mut self) -> Result<bool, Self::Error>;
    fn button_alarm(&mut self) -> Result<bool, Self::Error>;
    fn button_shades(&mut self) -> Result<bool, Self::Error>;
    /// Raw level of the alarm on/off switch.
    fn alarm_switch(&mut self) -> Result<bool, Self::Error>;

    /// Encoder detents since the last [`Inputs::rezero`].
    fn encoder_pos(&mut self) -> Result<i32, Self::Error>;
    fn rezero(&mut self) -> Result<(), Self::Error>;
}

/// Numeric LED display.
pub trait SegmentDisplay {
    type Error;

    /// Shows `left` on the left digit pair and `right` on the right pair.
    fn display_hourmin(&mut self, left: u8, right: u8) -> Result<(), Self::Error>;
    fn display_int(&mut self, value: u32) -> Result<(), Self::Error>;
    /// Shows the left digit pair when `on`, blanks it otherwise.
    fn wink_left(&mut self, on: bool) -> Result<(), Self::Error>;
    /// Shows the right digit pair when `on`, blanks it otherwise.
    fn wink_right(&mut self, on: bool) -> Result<(), Self::Error>;
    /// Shows every digit again.
    fn unwink(&mut self) -> Result<(), Self::Error>;

    fn brightness(&self) -> f32;
    fn set_brightness(&mut self, brightness: f32) -> Result<(), Self::Error>;
}

/// Piezo alarm tone.
pub trait Buzzer {
    type Error;

    /// Plays `tone_hz` at `amplitude` (0.0..=1.0) while `on`, silent otherwise.
    fn play(&mut self, tone_hz: u32, amplitude: f32, on: bool) -> Result<(), Self::Error>;
    fn shutoff(&mut self) -> Result<(), Self::Error>;
}

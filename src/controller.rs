//! Per-tick loop body of the clock.
//!
//! Each tick samples the panel into an [`InputSnapshot`], runs the
//! [`Engine`] and turns the resulting [`Token`] into clock, display and
//! buzzer calls. Values being edited live here between ticks, captured by the
//! `start_*` tokens and committed by the `end_*` tokens.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;

use crate::clock::{clip, days_in_month, wrap_to_range};
use crate::facade::{Buzzer, Clock, Inputs, SegmentDisplay};
use crate::fsm::{Engine, InputSnapshot, StateId, Token};

/// Highest brightness step offered by the brightness menu.
const BRIGHTNESS_MAX_LEVEL: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    /// Period of one tick
    pub tick_period_ms: u32,
    /// Half period of the heartbeat used to wink edited digits. Rounded down
    /// to whole ticks, so the defaults give 3 ticks per phase. The deployed
    /// firmware computed `int(0.3 / 0.1)` in floating point and got 2.
    pub beat_period_ms: u32,
    /// Lowest year the date menu offers
    pub year_min: i32,
    /// Highest year the date menu offers
    pub year_max: i32,
    /// Alarm tone frequency
    pub alarm_tone_hz: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            beat_period_ms: 300,
            year_min: 1970,
            year_max: 2037,
            alarm_tone_hz: 200,
        }
    }
}

/// Rejected [`ControllerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `year_min` is above `year_max`
    InvalidYearRange { min: i32, max: i32 },
    /// `tick_period_ms` is zero
    ZeroTickPeriod,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.year_min > self.year_max {
            return Err(ConfigError::InvalidYearRange {
                min: self.year_min,
                max: self.year_max,
            });
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        Ok(())
    }
}

/// Failure of one of the collaborators, tagged by origin.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerError<CE, IE, DE, BE> {
    Clock(CE),
    Inputs(IE),
    Display(DE),
    Buzzer(BE),
}

type TickError<C, I, D, B> = ControllerError<
    <C as Clock>::Error,
    <I as Inputs>::Error,
    <D as SegmentDisplay>::Error,
    <B as Buzzer>::Error,
>;

/// Values captured when an edit workflow starts and edited on later ticks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Edit {
    year: i32,
    month: i32,
    day: i32,
    hour: i32,
    minute: i32,
    brightness: i32,
    new_year: i32,
    new_month: i32,
    new_day: i32,
    new_hour: i32,
    new_minute: i32,
}

pub struct Controller {
    config: ControllerConfig,
    engine: Engine,
    beat_ticks: u32,
    beat_count: u32,
    heartbeat: bool,
    edit: Edit,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        Self::with_engine(config, Engine::new())
    }

    /// Uses an already constructed engine, e.g. one resumed in another state.
    pub fn with_engine(config: ControllerConfig, engine: Engine) -> Result<Self, ConfigError> {
        config.validate()?;
        let beat_ticks = (config.beat_period_ms / config.tick_period_ms).max(1);
        Ok(Self {
            config,
            engine,
            beat_ticks,
            beat_count: 0,
            heartbeat: true,
            edit: Edit::default(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn state(&self) -> StateId {
        self.engine.current()
    }

    /// Phase of the wink heartbeat used by the last tick.
    pub fn heartbeat(&self) -> bool {
        self.heartbeat
    }

    /// Runs ticks forever, sleeping one tick period after each. Only returns
    /// on a collaborator error.
    pub fn run<C, I, D, B, T>(
        &mut self,
        clock: &mut C,
        inputs: &mut I,
        display: &mut D,
        buzzer: &mut B,
        delay: &mut T,
    ) -> Result<Infallible, TickError<C, I, D, B>>
    where
        C: Clock,
        I: Inputs,
        D: SegmentDisplay,
        B: Buzzer,
        T: DelayNs,
    {
        loop {
            self.tick(clock, inputs, display, buzzer)?;
            delay.delay_ms(self.config.tick_period_ms);
        }
    }

    /// Samples the inputs, steps the state machine and applies its token.
    pub fn tick<C, I, D, B>(
        &mut self,
        clock: &mut C,
        inputs: &mut I,
        display: &mut D,
        buzzer: &mut B,
    ) -> Result<Token, TickError<C, I, D, B>>
    where
        C: Clock,
        I: Inputs,
        D: SegmentDisplay,
        B: Buzzer,
    {
        if self.beat_count >= self.beat_ticks {
            self.beat_count = 0;
            self.heartbeat = !self.heartbeat;
        }

        let snapshot = sample::<C, I, D::Error, B::Error>(clock, inputs)?;
        let token = self.engine.execute(&snapshot);
        trace!("token = {}", token.as_str());
        self.dispatch(token, clock, inputs, display, buzzer)?;

        self.beat_count += 1;
        Ok(token)
    }

    fn dispatch<C, I, D, B>(
        &mut self,
        token: Token,
        clock: &mut C,
        inputs: &mut I,
        display: &mut D,
        buzzer: &mut B,
    ) -> Result<(), TickError<C, I, D, B>>
    where
        C: Clock,
        I: Inputs,
        D: SegmentDisplay,
        B: Buzzer,
    {
        let clock_err = ControllerError::<C::Error, I::Error, D::Error, B::Error>::Clock;
        let inputs_err = ControllerError::<C::Error, I::Error, D::Error, B::Error>::Inputs;
        let display_err = ControllerError::<C::Error, I::Error, D::Error, B::Error>::Display;
        let buzzer_err = ControllerError::<C::Error, I::Error, D::Error, B::Error>::Buzzer;

        let beat = self.heartbeat;
        let edit = &mut self.edit;
        match token {
            Token::Default => {
                let (hour, minute) = (
                    clock.hour().map_err(clock_err)?,
                    clock.minute().map_err(clock_err)?,
                );
                display
                    .display_hourmin(pair(hour), pair(minute))
                    .map_err(display_err)?;
            }
            Token::StartSetMonth
            | Token::StartSetDay
            | Token::StartSetMin
            | Token::StartSetAlarmMin => {
                inputs.rezero().map_err(inputs_err)?;
            }

            Token::StartSetYear => {
                edit.year = clock.year().map_err(clock_err)?;
                edit.month = clock.month().map_err(clock_err)? as i32;
                edit.day = clock.day().map_err(clock_err)? as i32;
                edit.new_year = edit.year;
                edit.new_month = edit.month;
                edit.new_day = edit.day;
                inputs.rezero().map_err(inputs_err)?;
            }
            Token::SetYear => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                edit.new_year = step(edit.year, pos, self.config.year_min, self.config.year_max);
                display
                    .display_int(edit.new_year.unsigned_abs())
                    .map_err(display_err)?;
                display.wink_left(beat).map_err(display_err)?;
                display.wink_right(beat).map_err(display_err)?;
            }
            Token::SetMonth => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                edit.new_month = step(edit.month, pos, 1, 12);
                display
                    .display_hourmin(pair(edit.new_month), pair(edit.day))
                    .map_err(display_err)?;
                display.wink_left(beat).map_err(display_err)?;
            }
            Token::SetDay => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                let day_max = days_in_month(edit.new_year, edit.new_month as u32).unwrap_or(31);
                edit.new_day = step(edit.day, pos, 1, day_max as i32);
                display
                    .display_hourmin(pair(edit.new_month), pair(edit.new_day))
                    .map_err(display_err)?;
                display.wink_right(beat).map_err(display_err)?;
            }
            Token::EndSetDay => {
                clock
                    .set_date(edit.new_year, edit.new_month as u32, edit.new_day as u32)
                    .map_err(clock_err)?;
                info!(
                    "date set to {}-{}-{}",
                    edit.new_year, edit.new_month, edit.new_day
                );
                display.unwink().map_err(display_err)?;
            }

            Token::StartSetHour => {
                edit.hour = clock.hour().map_err(clock_err)? as i32;
                edit.minute = clock.minute().map_err(clock_err)? as i32;
                edit.new_hour = edit.hour;
                edit.new_minute = edit.minute;
                inputs.rezero().map_err(inputs_err)?;
            }
            Token::StartSetAlarm => {
                edit.hour = clock.alarm_hour().map_err(clock_err)? as i32;
                edit.minute = clock.alarm_minute().map_err(clock_err)? as i32;
                edit.new_hour = edit.hour;
                edit.new_minute = edit.minute;
                inputs.rezero().map_err(inputs_err)?;
            }
            Token::SetHour | Token::SetAlarmHour => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                edit.new_hour = step(edit.hour, pos, 0, 23);
                display
                    .display_hourmin(pair(edit.new_hour), pair(edit.minute))
                    .map_err(display_err)?;
                display.wink_left(beat).map_err(display_err)?;
            }
            Token::SetMin | Token::SetAlarmMin => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                edit.new_minute = step(edit.minute, pos, 0, 59);
                display
                    .display_hourmin(pair(edit.new_hour), pair(edit.new_minute))
                    .map_err(display_err)?;
                display.wink_right(beat).map_err(display_err)?;
            }
            Token::EndSetMin => {
                clock
                    .set_time(edit.new_hour as u32, edit.new_minute as u32)
                    .map_err(clock_err)?;
                info!("time set to {}:{}", edit.new_hour, edit.new_minute);
                display.unwink().map_err(display_err)?;
            }
            Token::EndSetAlarmMin => {
                clock
                    .set_alarm(edit.new_hour as u32, edit.new_minute as u32, true)
                    .map_err(clock_err)?;
                info!("alarm set to {}:{}", edit.new_hour, edit.new_minute);
                display.unwink().map_err(display_err)?;
            }
            Token::SetNoAlarm => {
                clock.disable_alarm().map_err(clock_err)?;
                info!("alarm disabled");
            }

            Token::StartSetBrightness => {
                inputs.rezero().map_err(inputs_err)?;
                edit.brightness = brightness_level(display.brightness());
            }
            Token::SetBrightness => {
                let pos = inputs.encoder_pos().map_err(inputs_err)?;
                let level = step(edit.brightness, pos, 0, BRIGHTNESS_MAX_LEVEL);
                display
                    .set_brightness(level as f32 / BRIGHTNESS_MAX_LEVEL as f32)
                    .map_err(display_err)?;
                display.display_int(level as u32).map_err(display_err)?;
            }
            Token::EndSetBrightness | Token::SetNoBrightness => {}

            Token::Alarming => {
                let (hour, minute) = (
                    clock.hour().map_err(clock_err)?,
                    clock.minute().map_err(clock_err)?,
                );
                display
                    .display_hourmin(pair(hour), pair(minute))
                    .map_err(display_err)?;
                let delta = clock.alarm_delta().map_err(clock_err)?;
                let magnitude = clip(
                    delta.unsigned_abs() as f32 / C::ALARM_DELTA_MAX as f32,
                    0.1,
                    1.0,
                );
                buzzer
                    .play(self.config.alarm_tone_hz, magnitude, beat)
                    .map_err(buzzer_err)?;
            }
            Token::EndAlarming => {
                clock.reset_alarm().map_err(clock_err)?;
                buzzer.shutoff().map_err(buzzer_err)?;
                display.unwink().map_err(display_err)?;
            }
        }
        Ok(())
    }
}

fn sample<C: Clock, I: Inputs, DE, BE>(
    clock: &mut C,
    inputs: &mut I,
) -> Result<InputSnapshot, ControllerError<C::Error, I::Error, DE, BE>> {
    let inputs_err = ControllerError::<C::Error, I::Error, DE, BE>::Inputs;

    let enter_edge = inputs.update_button_enter().map_err(inputs_err)?;
    let raw_alarm = inputs.alarm_switch().map_err(inputs_err)?;
    Ok(InputSnapshot {
        enter_edge,
        back_level: inputs.button_back().map_err(inputs_err)?,
        set_date_level: inputs.button_date().map_err(inputs_err)?,
        set_time_level: inputs.button_time().map_err(inputs_err)?,
        set_alarm_level: inputs.button_alarm().map_err(inputs_err)?,
        set_brightness_level: inputs.button_shades().map_err(inputs_err)?,
        alarm_status_level: clock
            .alarm_status(raw_alarm)
            .map_err(ControllerError::<C::Error, I::Error, DE, BE>::Clock)?,
    })
}

/// `base` moved by `pos` encoder steps, wrapped into `low..=high`.
fn step(base: i32, pos: i32, low: i32, high: i32) -> i32 {
    wrap_to_range(i64::from(base) + i64::from(pos), low, high).unwrap_or(low)
}

/// Last two decimal digits of `value`.
fn pair<T: TryInto<u32>>(value: T) -> u8 {
    value.try_into().map_or(0, |v| (v % 100) as u8)
}

/// Nearest brightness step to a 0.0..=1.0 brightness.
fn brightness_level(brightness: f32) -> i32 {
    let level = (brightness * BRIGHTNESS_MAX_LEVEL as f32 + 0.5) as i32;
    level.clamp(0, BRIGHTNESS_MAX_LEVEL)
}

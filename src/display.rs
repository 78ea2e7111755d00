//! Driver for the AS1115 7-segment LED display controller.
//!
//! Every register access goes through the fields of [`AS1115_MAP`], so digit
//! writes leave the decimal-point bit alone and option bits never clobber
//! their neighbours.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::facade::SegmentDisplay;
use crate::registers::{
    DisplayTest, Feature, RegAddr, Shutdown, AS1115_MAP, BLANK, DIGIT_COUNT, LED_DIAG_REGISTERS,
};
use crate::Error;

/// Time between two polls of the LED test in-progress bit.
const LED_TEST_POLL_MS: u32 = 1000;

/// Display setup applied by [`As1115::init`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    /// I2C address; anything but 0x00 enables self addressing
    pub address: u8,
    /// Initial brightness, 0.0..=1.0
    pub brightness: f32,
    /// Number of wired digits, 1..=8
    pub n_digits: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            address: 0x00,
            brightness: 1.0,
            n_digits: 6,
        }
    }
}

/// Digit index of the tens of the left pair, then the units.
const LEFT_PAIR: [usize; 2] = [3, 2];
/// Digit index of the tens of the right pair, then the units.
const RIGHT_PAIR: [usize; 2] = [1, 0];

macro_rules! set_and_get_register {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        $(
            paste::item! {
                /// Writes the whole register.
                pub fn [< set_ $name >](&mut self, value: $typ) -> Result<(), Error<I2C::Error>> {
                    self.i2c.write(self.address, &[$regaddr as u8, value.into()])?;
                    Ok(())
                }
            }

            /// Reads the whole register.
            pub fn $name(&mut self) -> Result<$typ, Error<I2C::Error>> {
                let mut data = [0];
                self.i2c
                    .write_read(self.address, &[$regaddr as u8], &mut data)?;
                Ok(<$typ>::from(data[0]))
            }
        )+
    }
}

pub struct As1115<I2C: I2c> {
    i2c: I2C,
    address: u8,
    n_digits: usize,
    initial_brightness: f32,
    brightness: f32,
    blink_rate: u8,
    /// Last value written to each digit, restored by unwink
    shown: [u8; DIGIT_COUNT],
}

impl<I2C: I2c> As1115<I2C> {
    /// Wraps the bus; nothing is sent until [`As1115::init`].
    pub fn new(i2c: I2C, config: &DisplayConfig) -> Self {
        Self {
            i2c,
            address: config.address,
            n_digits: config.n_digits,
            initial_brightness: config.brightness,
            brightness: config.brightness,
            blink_rate: 0,
            shown: [BLANK; DIGIT_COUNT],
        }
    }

    /// Takes the chip out of shutdown and applies the configuration.
    ///
    /// Decoding is enabled for digits 0-3 with the Code-B font, the scan
    /// limit covers the configured digits and blinking is turned off.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        if !(1..=DIGIT_COUNT).contains(&self.n_digits) {
            return Err(Error::InvalidDigitCount(self.n_digits));
        }
        if !(0.0..=1.0).contains(&self.initial_brightness) {
            return Err(Error::InvalidBrightness);
        }
        let map = &AS1115_MAP;
        map.shutdown_normal.set(&mut self.i2c, self.address, true)?;
        map.shutdown_preserve_feature
            .set(&mut self.i2c, self.address, false)?;
        if self.address != 0x00 {
            map.self_addressing.set(&mut self.i2c, self.address, true)?;
        }
        map.decode_mode.set(&mut self.i2c, self.address, 0x0F)?;
        map.feature_decode_select
            .set(&mut self.i2c, self.address, false)?;
        map.scan_limit
            .set(&mut self.i2c, self.address, self.n_digits as i64 - 1)?;
        self.set_blink_rate(0)?;
        self.set_brightness(self.initial_brightness)?;
        debug!(
            "as1115 init address={:#x} digits={}",
            self.address, self.n_digits
        );
        Ok(())
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn n_digits(&self) -> usize {
        self.n_digits
    }

    /// Digits that can actually be written.
    fn wired(&self) -> usize {
        self.n_digits.min(DIGIT_COUNT)
    }

    set_and_get_register!(
        (feature, RegAddr::Feature, Feature),
        (display_test, RegAddr::DisplayTestMode, DisplayTest),
        (shutdown, RegAddr::Shutdown, Shutdown)
    );

    pub fn blink_rate(&self) -> u8 {
        self.blink_rate
    }

    /// Sets blinking: 0 is off, 1 and 2 select the blink period.
    ///
    /// The period select lands on FEATURE bit 7, the only frequency-select
    /// bit the deployed firmware ever reached; bits 5 and 6 stay untouched.
    pub fn set_blink_rate(&mut self, rate: u8) -> Result<(), Error<I2C::Error>> {
        if rate > 2 {
            return Err(Error::InvalidBlinkRate(rate));
        }
        let map = &AS1115_MAP;
        if rate != 0 {
            map.feature_blink_enable
                .set(&mut self.i2c, self.address, true)?;
            map.feature_blink_start
                .set(&mut self.i2c, self.address, rate == 2)?;
        } else {
            map.feature_blink_enable
                .set(&mut self.i2c, self.address, false)?;
        }
        self.blink_rate = rate;
        Ok(())
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Sets the global intensity to `⌊brightness * 15⌋`.
    pub fn set_brightness(&mut self, brightness: f32) -> Result<(), Error<I2C::Error>> {
        if !(0.0..=1.0).contains(&brightness) {
            return Err(Error::InvalidBrightness);
        }
        let duty = (brightness * 15.0) as i64;
        AS1115_MAP
            .global_intensity
            .set(&mut self.i2c, self.address, duty)?;
        self.brightness = brightness;
        Ok(())
    }

    /// Writes `value` to digit `idx` without remembering it.
    fn write_digit(&mut self, idx: usize, value: u8) -> Result<(), Error<I2C::Error>> {
        AS1115_MAP.digits[idx].set(&mut self.i2c, self.address, i64::from(value))
    }

    /// Shows `value` (a Code-B character) on digit `idx`.
    pub fn display_idx(&mut self, idx: usize, value: u8) -> Result<(), Error<I2C::Error>> {
        if idx >= self.wired() {
            return Err(Error::InvalidDigit(idx));
        }
        self.write_digit(idx, value)?;
        self.shown[idx] = value;
        Ok(())
    }

    pub fn clear_idx(&mut self, idx: usize) -> Result<(), Error<I2C::Error>> {
        self.display_idx(idx, BLANK)
    }

    pub fn clear(&mut self) -> Result<(), Error<I2C::Error>> {
        for idx in 0..self.wired() {
            self.clear_idx(idx)?;
        }
        Ok(())
    }

    /// Shows `value` in decimal, digit 0 holding the units. Digits beyond the
    /// configured count are dropped.
    pub fn display_int(&mut self, value: u32) -> Result<(), Error<I2C::Error>> {
        for idx in 0..self.wired() {
            self.display_idx(idx, nth_digit(value, idx))?;
        }
        Ok(())
    }

    /// Shows two two-digit numbers, `left` on digits 3-2 and `right` on
    /// digits 1-0. Remaining digits are blanked.
    pub fn display_hourmin(&mut self, left: u8, right: u8) -> Result<(), Error<I2C::Error>> {
        let left = u32::from(left);
        let right = u32::from(right);
        for idx in 0..self.wired() {
            let value = match idx {
                0 | 1 => nth_digit(right, idx),
                2 | 3 => nth_digit(left, idx - 2),
                _ => BLANK,
            };
            self.display_idx(idx, value)?;
        }
        Ok(())
    }

    fn wink_pair(&mut self, pair: [usize; 2], on: bool) -> Result<(), Error<I2C::Error>> {
        for idx in pair {
            if idx < self.wired() {
                let value = if on { self.shown[idx] } else { BLANK };
                self.write_digit(idx, value)?;
            }
        }
        Ok(())
    }

    pub fn wink_left(&mut self, on: bool) -> Result<(), Error<I2C::Error>> {
        self.wink_pair(LEFT_PAIR, on)
    }

    pub fn wink_right(&mut self, on: bool) -> Result<(), Error<I2C::Error>> {
        self.wink_pair(RIGHT_PAIR, on)
    }

    /// Restores every digit to its last displayed value.
    pub fn unwink(&mut self) -> Result<(), Error<I2C::Error>> {
        for idx in 0..self.wired() {
            self.write_digit(idx, self.shown[idx])?;
        }
        Ok(())
    }

    /// Debounced KEYA state, `true` for a pressed key. Keys pull low.
    pub fn scan_keys(&mut self) -> Result<[bool; 8], Error<I2C::Error>> {
        self.scan(RegAddr::KeyA)
    }

    /// Debounced KEYB state, `true` for a pressed key.
    pub fn scan_keys_b(&mut self) -> Result<[bool; 8], Error<I2C::Error>> {
        self.scan(RegAddr::KeyB)
    }

    fn scan(&mut self, reg: RegAddr) -> Result<[bool; 8], Error<I2C::Error>> {
        let bits = match reg {
            RegAddr::KeyB => &AS1115_MAP.key_b,
            _ => &AS1115_MAP.key_a,
        };
        let mut data = [0];
        self.i2c
            .write_read(self.address, &[reg as u8], &mut data)?;
        let mut pressed = [false; 8];
        for (key, bit) in pressed.iter_mut().zip(bits.iter()) {
            *key = !bit.extract(&data);
        }
        Ok(pressed)
    }

    /// Lights every segment while `on`.
    pub fn visual_test(&mut self, on: bool) -> Result<(), Error<I2C::Error>> {
        AS1115_MAP.test_visual.set(&mut self.i2c, self.address, on)
    }

    /// Runs the shorted-LED test. Returns `true` if any LED failed.
    ///
    /// Blocks until the chip clears its test-in-progress bit, polling once
    /// per second. There is no timeout.
    pub fn led_short_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, Error<I2C::Error>> {
        let map = &AS1115_MAP;
        map.test_led_short.set(&mut self.i2c, self.address, true)?;
        map.test_led_open.set(&mut self.i2c, self.address, false)?;
        self.finish_led_test(delay)
    }

    /// Runs the open-LED test. Returns `true` if any LED failed.
    ///
    /// Blocks like [`As1115::led_short_test`].
    pub fn led_open_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, Error<I2C::Error>> {
        let map = &AS1115_MAP;
        map.test_led_short.set(&mut self.i2c, self.address, false)?;
        map.test_led_open.set(&mut self.i2c, self.address, true)?;
        self.finish_led_test(delay)
    }

    fn finish_led_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, Error<I2C::Error>> {
        let map = &AS1115_MAP;
        loop {
            debug!("led test ongoing");
            let ongoing = map.test_led_in_progress.get(&mut self.i2c, self.address)?;
            delay.delay_ms(LED_TEST_POLL_MS);
            if !ongoing {
                break;
            }
        }
        let failed = map.test_led_global.get(&mut self.i2c, self.address)?;
        if failed {
            warn!("led test detected an error");
            self.log_led_diag()?;
        }
        Ok(failed)
    }

    fn log_led_diag(&mut self) -> Result<(), Error<I2C::Error>> {
        for (digit, reg) in LED_DIAG_REGISTERS.iter().enumerate() {
            let mut data = [0];
            self.i2c.write_read(self.address, &[*reg], &mut data)?;
            for (segment, bit) in AS1115_MAP.led_diag[digit].iter().enumerate() {
                warn!("led diag {} {} {}", digit, segment, bit.extract(&data));
            }
        }
        Ok(())
    }

    /// Checks the external Rset resistor once. Returns `true` if it is open
    /// or shorted.
    pub fn rset_test(&mut self) -> Result<bool, Error<I2C::Error>> {
        let map = &AS1115_MAP;
        let open = map.test_rset_open.get(&mut self.i2c, self.address)?;
        let short = map.test_rset_short.get(&mut self.i2c, self.address)?;
        if open {
            warn!("rset test detected an open circuit");
        } else if short {
            warn!("rset test detected a short circuit");
        }
        Ok(open || short)
    }
}

/// Decimal digit `idx` of `value`, units first.
fn nth_digit(value: u32, idx: usize) -> u8 {
    match 10u32.checked_pow(idx as u32) {
        Some(scale) => (value / scale % 10) as u8,
        None => 0,
    }
}

impl<I2C: I2c> SegmentDisplay for As1115<I2C> {
    type Error = Error<I2C::Error>;

    fn display_hourmin(&mut self, left: u8, right: u8) -> Result<(), Self::Error> {
        As1115::display_hourmin(self, left, right)
    }

    fn display_int(&mut self, value: u32) -> Result<(), Self::Error> {
        As1115::display_int(self, value)
    }

    fn wink_left(&mut self, on: bool) -> Result<(), Self::Error> {
        As1115::wink_left(self, on)
    }

    fn wink_right(&mut self, on: bool) -> Result<(), Self::Error> {
        As1115::wink_right(self, on)
    }

    fn unwink(&mut self) -> Result<(), Self::Error> {
        As1115::unwink(self)
    }

    fn brightness(&self) -> f32 {
        As1115::brightness(self)
    }

    fn set_brightness(&mut self, brightness: f32) -> Result<(), Self::Error> {
        As1115::set_brightness(self, brightness)
    }
}

//! Front panel sampling: push buttons, the alarm switch and the rotary
//! encoder.
//!
//! Buttons are wired to ground with pull-ups, so a pressed button reads low.
//! [`PanelInputs`] reads every button from its own pin. [`KeyScanInputs`]
//! reads the menu buttons and the alarm switch from the AS1115 KEYA scan and
//! only the encoder push button from a pin.

use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;

use crate::display::As1115;
use crate::facade::Inputs;
use crate::Error;

/// Detects a button being released after a press.
///
/// [`ReleaseEdge::update`] has to see every sample; a press and release that
/// both fall between two samples is lost.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReleaseEdge {
    pressed: bool,
}

impl ReleaseEdge {
    pub const fn new() -> Self {
        Self { pressed: false }
    }

    /// Feeds one sample. Returns `true` once, on the sample where the button
    /// is first seen released after being held.
    pub fn update(&mut self, pressed: bool) -> bool {
        if self.pressed && !pressed {
            self.pressed = false;
            return true;
        }
        self.pressed = pressed;
        false
    }
}

/// Encoder position relative to the last rezero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderOrigin {
    zero: i32,
}

impl EncoderOrigin {
    pub const fn new(position: i32) -> Self {
        Self { zero: position }
    }

    pub fn rezero(&mut self, position: i32) {
        self.zero = position;
    }

    pub fn delta(&self, position: i32) -> i32 {
        position.wrapping_sub(self.zero)
    }
}

/// Source of the raw encoder count, such as a timer in quadrature mode.
pub trait QuadratureCounter {
    type Error;

    fn position(&mut self) -> Result<i32, Self::Error>;
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError<PE, EE> {
    /// Reading a button pin failed
    Pin(PE),
    /// Reading the encoder count failed
    Encoder(EE),
}

/// Button pins of the front panel.
pub struct PanelPins<P> {
    /// Encoder push button
    pub enter: P,
    pub back: P,
    pub date: P,
    pub time: P,
    pub alarm: P,
    pub shades: P,
    pub alarm_switch: P,
}

/// Front panel read straight from GPIO pins.
pub struct PanelInputs<P, Q> {
    pins: PanelPins<P>,
    encoder: Q,
    enter_edge: ReleaseEdge,
    origin: EncoderOrigin,
}

impl<P, Q> PanelInputs<P, Q>
where
    P: InputPin,
    Q: QuadratureCounter,
{
    /// Takes the pins and the counter. The current encoder count becomes the
    /// origin.
    pub fn new(pins: PanelPins<P>, mut encoder: Q) -> Result<Self, InputError<P::Error, Q::Error>> {
        let position = encoder.position().map_err(InputError::Encoder)?;
        Ok(Self {
            pins,
            encoder,
            enter_edge: ReleaseEdge::new(),
            origin: EncoderOrigin::new(position),
        })
    }

    /// Gives back the pins and the counter.
    pub fn release(self) -> (PanelPins<P>, Q) {
        (self.pins, self.encoder)
    }
}

fn pressed<P: InputPin, EE>(pin: &mut P) -> Result<bool, InputError<P::Error, EE>> {
    pin.is_low().map_err(InputError::Pin)
}

impl<P, Q> Inputs for PanelInputs<P, Q>
where
    P: InputPin,
    Q: QuadratureCounter,
{
    type Error = InputError<P::Error, Q::Error>;

    fn update_button_enter(&mut self) -> Result<bool, Self::Error> {
        let level = pressed(&mut self.pins.enter)?;
        let released = self.enter_edge.update(level);
        if released {
            trace!("enter released");
        }
        Ok(released)
    }

    fn button_back(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.back)
    }

    fn button_date(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.date)
    }

    fn button_time(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.time)
    }

    fn button_alarm(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.alarm)
    }

    fn button_shades(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.shades)
    }

    fn alarm_switch(&mut self) -> Result<bool, Self::Error> {
        pressed(&mut self.pins.alarm_switch)
    }

    fn encoder_pos(&mut self) -> Result<i32, Self::Error> {
        let position = self.encoder.position().map_err(InputError::Encoder)?;
        Ok(self.origin.delta(position))
    }

    fn rezero(&mut self) -> Result<(), Self::Error> {
        let position = self.encoder.position().map_err(InputError::Encoder)?;
        self.origin.rezero(position);
        Ok(())
    }
}

/// KEYA lines of the menu buttons and the alarm switch.
const KEY_BACK: usize = 0;
const KEY_DATE: usize = 1;
const KEY_TIME: usize = 2;
const KEY_ALARM: usize = 3;
const KEY_SHADES: usize = 4;
const KEY_ALARM_SWITCH: usize = 5;

/// Front panel wired to the AS1115 key-scan lines.
///
/// The display keeps sole ownership of the bus. Call [`KeyScanInputs::latch`]
/// with the display once per tick, before [`crate::Controller::tick`]; the
/// button methods then answer from that scan without touching the bus.
///
/// ```rust,ignore
/// loop {
///     panel.latch(&mut display)?;
///     controller.tick(&mut clock, &mut panel, &mut display, &mut buzzer)?;
///     delay.delay_ms(controller.config().tick_period_ms);
/// }
/// ```
pub struct KeyScanInputs<P, Q> {
    enter: P,
    encoder: Q,
    enter_edge: ReleaseEdge,
    origin: EncoderOrigin,
    keys: [bool; 8],
}

impl<P, Q> KeyScanInputs<P, Q>
where
    P: InputPin,
    Q: QuadratureCounter,
{
    /// Takes the encoder push button and the counter. Every key reads
    /// released until the first [`KeyScanInputs::latch`].
    pub fn new(enter: P, mut encoder: Q) -> Result<Self, InputError<P::Error, Q::Error>> {
        let position = encoder.position().map_err(InputError::Encoder)?;
        Ok(Self {
            enter,
            encoder,
            enter_edge: ReleaseEdge::new(),
            origin: EncoderOrigin::new(position),
            keys: [false; 8],
        })
    }

    /// Reads KEYA once and keeps the result for this tick.
    pub fn latch<I2C: I2c>(&mut self, display: &mut As1115<I2C>) -> Result<(), Error<I2C::Error>> {
        self.keys = display.scan_keys()?;
        let mask = self.keys.iter().rev().fold(0u8, |acc, key| (acc << 1) | u8::from(*key));
        trace!("keys pressed = {:#x}", mask);
        Ok(())
    }

    /// Keys seen by the last latch, `true` for pressed.
    pub fn keys(&self) -> [bool; 8] {
        self.keys
    }

    pub fn release(self) -> (P, Q) {
        (self.enter, self.encoder)
    }
}

impl<P, Q> Inputs for KeyScanInputs<P, Q>
where
    P: InputPin,
    Q: QuadratureCounter,
{
    type Error = InputError<P::Error, Q::Error>;

    fn update_button_enter(&mut self) -> Result<bool, Self::Error> {
        let level = pressed(&mut self.enter)?;
        let released = self.enter_edge.update(level);
        if released {
            trace!("enter released");
        }
        Ok(released)
    }

    fn button_back(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_BACK])
    }

    fn button_date(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_DATE])
    }

    fn button_time(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_TIME])
    }

    fn button_alarm(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_ALARM])
    }

    fn button_shades(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_SHADES])
    }

    fn alarm_switch(&mut self) -> Result<bool, Self::Error> {
        Ok(self.keys[KEY_ALARM_SWITCH])
    }

    fn encoder_pos(&mut self) -> Result<i32, Self::Error> {
        let position = self.encoder.position().map_err(InputError::Encoder)?;
        Ok(self.origin.delta(position))
    }

    fn rezero(&mut self) -> Result<(), Self::Error> {
        let position = self.encoder.position().map_err(InputError::Encoder)?;
        self.origin.rezero(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use crate::display::DisplayConfig;
    use alloc::vec;
    use alloc::vec::Vec;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTrans,
    };
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x00;

    struct FakeCounter {
        positions: Vec<i32>,
    }

    impl QuadratureCounter for FakeCounter {
        type Error = ();

        fn position(&mut self) -> Result<i32, ()> {
            if self.positions.is_empty() {
                return Err(());
            }
            Ok(self.positions.remove(0))
        }
    }

    fn pins(enter: &[PinTrans], back: &[PinTrans], alarm_switch: &[PinTrans]) -> PanelPins<PinMock> {
        PanelPins {
            enter: PinMock::new(enter),
            back: PinMock::new(back),
            date: PinMock::new(&[]),
            time: PinMock::new(&[]),
            alarm: PinMock::new(&[]),
            shades: PinMock::new(&[]),
            alarm_switch: PinMock::new(alarm_switch),
        }
    }

    fn done(pins: &mut PanelPins<PinMock>) {
        pins.enter.done();
        pins.back.done();
        pins.date.done();
        pins.time.done();
        pins.alarm.done();
        pins.shades.done();
        pins.alarm_switch.done();
    }

    #[test]
    fn test_release_edge() {
        let mut edge = ReleaseEdge::new();
        assert!(!edge.update(false));
        assert!(!edge.update(true));
        assert!(!edge.update(true));
        assert!(edge.update(false));
        assert!(!edge.update(false));
        assert!(!edge.update(true));
        assert!(edge.update(false));
    }

    #[test]
    fn test_encoder_origin() {
        let mut origin = EncoderOrigin::new(10);
        assert_eq!(origin.delta(13), 3);
        assert_eq!(origin.delta(7), -3);
        origin.rezero(20);
        assert_eq!(origin.delta(20), 0);
        assert_eq!(origin.delta(18), -2);
    }

    #[test]
    fn test_buttons_active_low() {
        let pins = pins(
            &[],
            &[PinTrans::get(PinState::Low), PinTrans::get(PinState::High)],
            &[PinTrans::get(PinState::Low)],
        );
        let counter = FakeCounter { positions: alloc::vec![0] };
        let mut inputs = PanelInputs::new(pins, counter).unwrap();

        assert!(inputs.button_back().unwrap());
        assert!(!inputs.button_back().unwrap());
        assert!(inputs.alarm_switch().unwrap());

        let (mut pins, _) = inputs.release();
        done(&mut pins);
    }

    #[test]
    fn test_enter_fires_on_release() {
        let enter = [
            PinTrans::get(PinState::High),
            PinTrans::get(PinState::Low),
            PinTrans::get(PinState::Low),
            PinTrans::get(PinState::High),
            PinTrans::get(PinState::High),
        ];
        let pins = pins(&enter, &[], &[]);
        let counter = FakeCounter { positions: alloc::vec![0] };
        let mut inputs = PanelInputs::new(pins, counter).unwrap();

        let edges: Vec<bool> = (0..5).map(|_| inputs.update_button_enter().unwrap()).collect();
        assert_eq!(edges, [false, false, false, true, false]);

        let (mut pins, _) = inputs.release();
        done(&mut pins);
    }

    #[test]
    fn test_encoder_rezero() {
        let counter = FakeCounter {
            positions: alloc::vec![100, 104, 104, 101],
        };
        let mut inputs = PanelInputs::new(pins(&[], &[], &[]), counter).unwrap();
        assert_eq!(inputs.encoder_pos().unwrap(), 4);
        inputs.rezero().unwrap();
        assert_eq!(inputs.encoder_pos().unwrap(), -3);
        assert!(matches!(inputs.encoder_pos(), Err(InputError::Encoder(()))));

        let (mut pins, _) = inputs.release();
        done(&mut pins);
    }

    fn key_scan(keya: &[u8]) -> I2cMock {
        let expectations: Vec<I2cTrans> = keya
            .iter()
            .map(|byte| I2cTrans::write_read(DEVICE_ADDRESS, vec![0x1C], vec![*byte]))
            .collect();
        I2cMock::new(&expectations)
    }

    #[test]
    fn test_key_scan_maps_buttons() {
        // date (key 1) and alarm switch (key 5) pulled low, then all released
        let mut display = As1115::new(key_scan(&[0b1101_1101, 0xFF]), &DisplayConfig::default());
        let counter = FakeCounter { positions: alloc::vec![0] };
        let mut inputs = KeyScanInputs::new(PinMock::new(&[]), counter).unwrap();

        assert_eq!(inputs.keys(), [false; 8]);
        inputs.latch(&mut display).unwrap();
        assert!(!inputs.button_back().unwrap());
        assert!(inputs.button_date().unwrap());
        assert!(!inputs.button_time().unwrap());
        assert!(!inputs.button_alarm().unwrap());
        assert!(!inputs.button_shades().unwrap());
        assert!(inputs.alarm_switch().unwrap());
        // answered from the latch, no second scan
        assert!(inputs.button_date().unwrap());

        inputs.latch(&mut display).unwrap();
        assert_eq!(inputs.keys(), [false; 8]);

        let (mut enter, _) = inputs.release();
        enter.done();
        display.release().done();
    }

    #[test]
    fn test_key_scan_each_line() {
        let bytes = [0xFE, 0xFD, 0xFB, 0xF7, 0xEF, 0xDF];
        let mut display = As1115::new(key_scan(&bytes), &DisplayConfig::default());
        let counter = FakeCounter { positions: alloc::vec![0] };
        let mut inputs = KeyScanInputs::new(PinMock::new(&[]), counter).unwrap();

        let mut seen = Vec::new();
        for _ in bytes {
            inputs.latch(&mut display).unwrap();
            seen.push([
                inputs.button_back().unwrap(),
                inputs.button_date().unwrap(),
                inputs.button_time().unwrap(),
                inputs.button_alarm().unwrap(),
                inputs.button_shades().unwrap(),
                inputs.alarm_switch().unwrap(),
            ]);
        }
        for (line, pressed) in seen.iter().enumerate() {
            let expected: Vec<bool> = (0..6).map(|k| k == line).collect();
            assert_eq!(pressed.as_slice(), expected.as_slice());
        }

        let (mut enter, _) = inputs.release();
        enter.done();
        display.release().done();
    }

    #[test]
    fn test_key_scan_enter_and_encoder() {
        let enter = PinMock::new(&[PinTrans::get(PinState::Low), PinTrans::get(PinState::High)]);
        let counter = FakeCounter {
            positions: alloc::vec![50, 53],
        };
        let mut inputs = KeyScanInputs::new(enter, counter).unwrap();

        assert!(!inputs.update_button_enter().unwrap());
        assert!(inputs.update_button_enter().unwrap());
        assert_eq!(inputs.encoder_pos().unwrap(), 3);

        let (mut enter, _) = inputs.release();
        enter.done();
    }

    #[test]
    fn test_key_scan_bus_error_keeps_keys() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x1C], vec![0xFE]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x1C], vec![0xFF]).with_error(ErrorKind::Other),
        ]);
        let mut display = As1115::new(mock, &DisplayConfig::default());
        let counter = FakeCounter { positions: alloc::vec![0] };
        let mut inputs = KeyScanInputs::new(PinMock::new(&[]), counter).unwrap();

        inputs.latch(&mut display).unwrap();
        let result = inputs.latch(&mut display);
        assert!(matches!(result, Err(Error::I2c(ErrorKind::Other))));
        assert!(inputs.button_back().unwrap());

        let (mut enter, _) = inputs.release();
        enter.done();
        display.release().done();
    }
}

//! Register definitions for the AS1115 LED display driver.
//!
//! Addresses, option values and the [`RegisterMap`] of every named field the
//! driver touches. The map is built in a const context, so a field that does
//! not fit its register is a build failure rather than a runtime one.

use bitfield::bitfield;

use crate::field::{Bit, Layout, ReadOnlyBit, RegisterField};

/// Control register addresses of the AS1115.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Enables Code-B/HEX decoding on selected digits
    DecodeMode = 0x09,
    /// Intensity of the whole display
    GlobalIntensity = 0x0A,
    /// Number of scanned digits
    ScanLimit = 0x0B,
    /// Shutdown and feature-reset control
    Shutdown = 0x0C,
    /// Clock, decode and blink features
    Feature = 0x0E,
    /// Display and LED/Rset tests
    DisplayTestMode = 0x0F,
    /// Intensity of digits 0 and 1
    Dig01Intensity = 0x10,
    /// Intensity of digits 2 and 3
    Dig23Intensity = 0x11,
    /// Intensity of digits 4 and 5
    Dig45Intensity = 0x12,
    /// Intensity of digits 6 and 7
    Dig67Intensity = 0x13,
    /// Debounced key-scan result for KEYA
    KeyA = 0x1C,
    /// Debounced key-scan result for KEYB
    KeyB = 0x1D,
    /// Address selection through two of the sixteen keys
    SelfAddressing = 0x2D,
}

/// Number of digits the chip can drive.
pub const DIGIT_COUNT: usize = 8;

/// Digit data registers, digit 0 first.
pub const DIGIT_REGISTERS: [u8; DIGIT_COUNT] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

/// Per-digit LED diagnostic registers, digit 0 first.
pub const LED_DIAG_REGISTERS: [u8; DIGIT_COUNT] = [0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B];

/// Raw segment patterns for 0-9 and A-F when decoding is disabled.
pub const NUMBERS: [u8; 16] = [
    0x7E, 0x30, 0x6D, 0x79, 0x33, 0x5B, 0x5F, 0x70, 0x7F, 0x7B, 0x77, 0x1F, 0x4E, 0x3D, 0x4F, 0x47,
];

/// Code-B character that lights no segment.
pub const BLANK: u8 = 0x0F;

/// Bit position of each segment in a digit register.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedSegment {
    G = 0,
    F = 1,
    E = 2,
    D = 3,
    C = 4,
    B = 5,
    A = 6,
    DecimalPoint = 7,
}

/// Decoder selected for digits with decoding enabled.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeSelect {
    /// Code-B font (0-9, -, E, H, L, P, blank)
    CodeB = 0,
    /// Hexadecimal font (0-9, A-F)
    Hex = 1,
}
impl From<u8> for DecodeSelect {
    /// Creates a `DecodeSelect` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => DecodeSelect::CodeB,
            1 => DecodeSelect::Hex,
            _ => panic!("Invalid value for DecodeSelect: {}", v),
        }
    }
}
impl From<DecodeSelect> for u8 {
    fn from(v: DecodeSelect) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Shutdown register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Shutdown(u8);
    impl Debug;
    /// Leave the FEATURE register untouched when leaving shutdown
    pub preserve_feature, set_preserve_feature: 7;
    /// Normal operation (clear for shutdown)
    pub normal_operation, set_normal_operation: 0;
}
from_register_u8!(Shutdown);

bitfield! {
    /// Feature register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Feature(u8);
    impl Debug;
    /// Start blinking with the display turned on
    pub blink_start, set_blink_start: 7;
    /// Synchronise blinking with the LD/CS pin
    pub blink_sync, set_blink_sync: 6;
    /// Blink period select
    pub blink_frequency, set_blink_frequency: 5;
    /// Enable blinking
    pub blink_enable, set_blink_enable: 4;
    /// Decoder used by the decode-enabled digits
    pub from into DecodeSelect, decode_select, set_decode_select: 2, 2;
    /// Reset all control registers except FEATURE
    pub reset_all, set_reset_all: 1;
    /// Use the external clock
    pub clock_active, set_clock_active: 0;
}
from_register_u8!(Feature);

bitfield! {
    /// Display test mode register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct DisplayTest(u8);
    impl Debug;
    /// External resistor Rset is shorted
    pub rset_short, _: 6;
    /// External resistor Rset is open
    pub rset_open, _: 5;
    /// Last LED test found an error
    pub led_global, _: 4;
    /// An LED open/short test is running
    pub led_test, _: 3;
    /// Start a test for open LEDs
    pub led_open, set_led_open: 2;
    /// Start a test for shorted LEDs
    pub led_short, set_led_short: 1;
    /// Optical display test, all segments on
    pub visual, set_visual: 0;
}
from_register_u8!(DisplayTest);

#[cfg(feature = "defmt")]
impl defmt::Format for DisplayTest {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DisplayTest({=u8:#b})", self.0);
    }
}

/// Every named field of the AS1115 the driver uses.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    pub decode_mode: RegisterField,
    pub global_intensity: RegisterField,
    pub scan_limit: RegisterField,
    pub shutdown_normal: Bit,
    pub shutdown_preserve_feature: Bit,
    pub self_addressing: Bit,

    pub feature_clock_active: Bit,
    pub feature_reset_all: Bit,
    pub feature_decode_select: Bit,
    pub feature_blink_enable: Bit,
    pub feature_blink_frequency: Bit,
    pub feature_blink_sync: Bit,
    pub feature_blink_start: Bit,

    pub test_visual: Bit,
    pub test_led_short: Bit,
    pub test_led_open: Bit,
    pub test_led_in_progress: ReadOnlyBit,
    pub test_led_global: ReadOnlyBit,
    pub test_rset_open: ReadOnlyBit,
    pub test_rset_short: ReadOnlyBit,

    /// Digit value nibble, digit 0 first
    pub digits: [RegisterField; DIGIT_COUNT],
    /// Per-digit intensity nibble, digit 0 first
    pub digit_intensity: [RegisterField; DIGIT_COUNT],
    pub key_a: [ReadOnlyBit; 8],
    pub key_b: [ReadOnlyBit; 8],
    /// `led_diag[digit][segment]` is set when that LED failed the last test
    pub led_diag: [[ReadOnlyBit; 8]; DIGIT_COUNT],
}

const fn field(address: u8, layout: Layout) -> RegisterField {
    match RegisterField::new(address, layout) {
        Ok(field) => field,
        Err(_) => panic!("invalid AS1115 field definition"),
    }
}

const fn bit(address: u8, index: u8) -> Bit {
    match Bit::new(address, Layout::bit(index)) {
        Ok(bit) => bit,
        Err(_) => panic!("invalid AS1115 bit definition"),
    }
}

const fn status_bit(address: u8, index: u8) -> ReadOnlyBit {
    match ReadOnlyBit::new(address, Layout::bit(index)) {
        Ok(bit) => bit,
        Err(_) => panic!("invalid AS1115 status bit definition"),
    }
}

const fn status_bits(address: u8) -> [ReadOnlyBit; 8] {
    let mut bits = [status_bit(address, 0); 8];
    let mut i = 1;
    while i < 8 {
        bits[i] = status_bit(address, i as u8);
        i += 1;
    }
    bits
}

const fn digit_fields() -> [RegisterField; DIGIT_COUNT] {
    let mut digits = [field(DIGIT_REGISTERS[0], Layout::bits(0, 4)); DIGIT_COUNT];
    let mut i = 1;
    while i < DIGIT_COUNT {
        digits[i] = field(DIGIT_REGISTERS[i], Layout::bits(0, 4));
        i += 1;
    }
    digits
}

// Each intensity register holds two digits: even digit in the low nibble.
const fn digit_intensity_fields() -> [RegisterField; DIGIT_COUNT] {
    let base = RegAddr::Dig01Intensity as u8;
    let mut fields = [field(base, Layout::bits(0, 4)); DIGIT_COUNT];
    let mut i = 1;
    while i < DIGIT_COUNT {
        fields[i] = field(base + (i / 2) as u8, Layout::bits(((i % 2) * 4) as u8, 4));
        i += 1;
    }
    fields
}

const fn led_diag_bits() -> [[ReadOnlyBit; 8]; DIGIT_COUNT] {
    let mut diag = [status_bits(LED_DIAG_REGISTERS[0]); DIGIT_COUNT];
    let mut i = 1;
    while i < DIGIT_COUNT {
        diag[i] = status_bits(LED_DIAG_REGISTERS[i]);
        i += 1;
    }
    diag
}

impl RegisterMap {
    pub const fn new() -> Self {
        let feature = RegAddr::Feature as u8;
        let test = RegAddr::DisplayTestMode as u8;
        Self {
            decode_mode: field(RegAddr::DecodeMode as u8, Layout::bits(0, 4)),
            global_intensity: field(RegAddr::GlobalIntensity as u8, Layout::bits(0, 4)),
            scan_limit: field(RegAddr::ScanLimit as u8, Layout::bits(0, 3)),
            shutdown_normal: bit(RegAddr::Shutdown as u8, 0),
            shutdown_preserve_feature: bit(RegAddr::Shutdown as u8, 7),
            self_addressing: bit(RegAddr::SelfAddressing as u8, 0),

            feature_clock_active: bit(feature, 0),
            feature_reset_all: bit(feature, 1),
            feature_decode_select: bit(feature, 2),
            feature_blink_enable: bit(feature, 4),
            feature_blink_frequency: bit(feature, 5),
            feature_blink_sync: bit(feature, 6),
            feature_blink_start: bit(feature, 7),

            test_visual: bit(test, 0),
            test_led_short: bit(test, 1),
            test_led_open: bit(test, 2),
            test_led_in_progress: status_bit(test, 3),
            test_led_global: status_bit(test, 4),
            test_rset_open: status_bit(test, 5),
            test_rset_short: status_bit(test, 6),

            digits: digit_fields(),
            digit_intensity: digit_intensity_fields(),
            key_a: status_bits(RegAddr::KeyA as u8),
            key_b: status_bits(RegAddr::KeyB as u8),
            led_diag: led_diag_bits(),
        }
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::new()
    }
}

/// The AS1115 register map.
pub const AS1115_MAP: RegisterMap = RegisterMap::new();

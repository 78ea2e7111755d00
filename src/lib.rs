//! Firmware core of an AS1115-based digital alarm clock.
//!
//! Two pieces carry the logic:
//!
//! - [`field`]: bit-field access inside byte-oriented registers reached over
//!   I2C, with read-modify-write that never disturbs neighbouring bits. The
//!   [`registers`] module describes the AS1115 LED driver in those terms and
//!   [`display::As1115`] drives it.
//! - [`fsm`]: the menu state machine (set date, set time, set alarm, set
//!   brightness, alarm firing) evaluated once per tick from an
//!   [`fsm::InputSnapshot`].
//!
//! The [`controller`] ties them to the clock, input and buzzer collaborators
//! described in [`facade`].
//!
//! # Features
//!
//! - `async`: async register-field transactions over `embedded-hal-async`
//! - `log`: log through the `log` crate
//! - `defmt`: log through `defmt`

#![no_std]

#[macro_use]
mod fmt;

#[cfg(feature = "async")]
pub mod asynch;
pub mod clock;
pub mod controller;
pub mod display;
pub mod facade;
pub mod field;
pub mod fsm;
pub mod inputs;
pub mod registers;

pub use controller::{ConfigError, Controller, ControllerConfig};
pub use display::{As1115, DisplayConfig};
pub use field::{Bit, ByteOrder, FieldError, Layout, ReadOnlyBit, ReadOnlyField, RegisterField};
pub use fsm::{Engine, FsmError, InputSnapshot, StateId, Token, Transition};
pub use registers::{RegAddr, RegisterMap, AS1115_MAP};

/// Errors produced by register access and the display driver.
#[derive(Debug)]
pub enum Error<E> {
    /// Bus transaction failed
    I2c(E),
    /// Attempted write to a read-only field
    AccessViolation {
        /// Register the field lives in
        address: u8,
    },
    /// Brightness outside 0.0..=1.0
    InvalidBrightness,
    /// Blink rate other than 0, 1 or 2
    InvalidBlinkRate(u8),
    /// Digit index beyond the configured digit count
    InvalidDigit(usize),
    /// Digit count outside 1..=8
    InvalidDigitCount(usize),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::I2c(e)
    }
}

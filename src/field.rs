//! Bit-field access inside byte-oriented device registers.
//!
//! A [`RegisterField`] names a run of bits inside a register that can only be
//! read or written as a whole over the bus. Reading a field is one
//! write-then-read transaction; writing it is a read-modify-write that leaves
//! every bit outside the field untouched.
//!
//! The arithmetic lives in pure functions over payload slices
//! ([`assemble`], [`disassemble`], [`RegisterField::extract`],
//! [`RegisterField::insert`]) so it can be exercised without a bus. The bus
//! methods borrow the I2C handle mutably for the whole transaction, so no
//! other access to the device can land between the read and the write.
//!
//! # Example
//!
//! ```rust,ignore
//! use as1115_clock::field::{Layout, RegisterField};
//!
//! // Four-bit intensity nibble in register 0x0A.
//! const INTENSITY: RegisterField = match RegisterField::new(0x0A, Layout::bits(0, 4)) {
//!     Ok(field) => field,
//!     Err(_) => panic!("bad field"),
//! };
//!
//! INTENSITY.set(&mut i2c, 0x00, 7)?;
//! assert_eq!(INTENSITY.get(&mut i2c, 0x00)?, 7);
//! ```

use embedded_hal::i2c::I2c;

use crate::Error;

/// Widest register the field layer can assemble into a single `u64`.
pub const MAX_REGISTER_BYTES: usize = 8;

/// Order in which payload bytes are combined into the register value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// The first byte on the wire is the least significant byte
    LsbFirst,
    /// The first byte on the wire is the most significant byte
    MsbFirst,
}

/// Errors raised while defining a field. These are configuration mistakes
/// and are never produced by a bus transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldError {
    /// The field has no bits
    EmptyField,
    /// The register has no payload bytes
    EmptyRegister,
    /// The register is wider than [`MAX_REGISTER_BYTES`]
    RegisterTooWide,
    /// The field mask does not fit inside the register
    MaskOutOfRange,
    /// A single-bit accessor was given a layout wider than one bit
    NotSingleBit,
}

/// Position and encoding of a field inside its register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    bit_offset: u8,
    bit_width: u8,
    register_bytes: u8,
    byte_order: ByteOrder,
    signed: bool,
}

impl Layout {
    /// An unsigned field of `bit_width` bits starting at `bit_offset` in a
    /// one-byte register.
    pub const fn bits(bit_offset: u8, bit_width: u8) -> Self {
        Self {
            bit_offset,
            bit_width,
            register_bytes: 1,
            byte_order: ByteOrder::LsbFirst,
            signed: false,
        }
    }

    /// A single bit at `index` in a one-byte register.
    pub const fn bit(index: u8) -> Self {
        Self::bits(index, 1)
    }

    /// Sets the number of payload bytes in the register.
    pub const fn register_bytes(mut self, register_bytes: u8) -> Self {
        self.register_bytes = register_bytes;
        self
    }

    /// Sets the order of the payload bytes.
    pub const fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Marks the field as two's complement.
    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    const fn check_register(&self) -> Result<(), FieldError> {
        if self.bit_width == 0 {
            return Err(FieldError::EmptyField);
        }
        if self.register_bytes == 0 {
            return Err(FieldError::EmptyRegister);
        }
        if self.register_bytes as usize > MAX_REGISTER_BYTES {
            return Err(FieldError::RegisterTooWide);
        }
        if self.bit_offset as u32 + self.bit_width as u32 > self.register_bytes as u32 * 8 {
            return Err(FieldError::MaskOutOfRange);
        }
        Ok(())
    }
}

const fn width_mask(bit_width: u8) -> u64 {
    if bit_width >= 64 {
        u64::MAX
    } else {
        (1 << bit_width) - 1
    }
}

/// Combines payload bytes into one register value.
pub fn assemble(payload: &[u8], order: ByteOrder) -> u64 {
    let shift_in = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
    match order {
        ByteOrder::LsbFirst => payload.iter().rev().fold(0, shift_in),
        ByteOrder::MsbFirst => payload.iter().fold(0, shift_in),
    }
}

/// Splits a register value back into payload bytes. Bits above
/// `payload.len() * 8` are dropped.
pub fn disassemble(mut value: u64, order: ByteOrder, payload: &mut [u8]) {
    let mut shift_out = |byte: &mut u8| {
        *byte = (value & 0xFF) as u8;
        value >>= 8;
    };
    match order {
        ByteOrder::LsbFirst => payload.iter_mut().for_each(&mut shift_out),
        ByteOrder::MsbFirst => payload.iter_mut().rev().for_each(&mut shift_out),
    }
}

/// A readable and writable multi-bit field bound to one register address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterField {
    address: u8,
    mask: u64,
    layout: Layout,
}

impl RegisterField {
    /// Defines a field at register `address`.
    ///
    /// # Errors
    /// Returns a [`FieldError`] if the layout does not fit the register.
    pub const fn new(address: u8, layout: Layout) -> Result<Self, FieldError> {
        if let Err(e) = layout.check_register() {
            return Err(e);
        }
        Ok(Self {
            address,
            mask: width_mask(layout.bit_width) << layout.bit_offset,
            layout,
        })
    }

    /// Register address the field lives in.
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Field mask, already shifted into register position.
    pub const fn mask(&self) -> u64 {
        self.mask
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) const fn payload_len(&self) -> usize {
        self.layout.register_bytes as usize
    }

    /// Reads the field out of a register payload.
    ///
    /// Signed fields are sign-extended from their top bit.
    pub fn extract(&self, payload: &[u8]) -> i64 {
        let raw = (assemble(payload, self.layout.byte_order) & self.mask) >> self.layout.bit_offset;
        if self.layout.signed {
            let unused = 64 - u32::from(self.layout.bit_width);
            ((raw << unused) as i64) >> unused
        } else {
            raw as i64
        }
    }

    /// Writes `value` into the field's bits of a register payload.
    ///
    /// Bits of `value` that do not fit the field are discarded; bits outside
    /// the mask are preserved.
    pub fn insert(&self, payload: &mut [u8], value: i64) {
        let order = self.layout.byte_order;
        let current = assemble(payload, order);
        let shifted = ((value as u64) << self.layout.bit_offset) & self.mask;
        disassemble((current & !self.mask) | shifted, order, payload);
    }

    /// Reads the field from the device in one write-then-read transaction.
    pub fn get<I2C: I2c>(&self, i2c: &mut I2C, device: u8) -> Result<i64, Error<I2C::Error>> {
        let mut payload = [0; MAX_REGISTER_BYTES];
        let payload = &mut payload[..self.payload_len()];
        i2c.write_read(device, &[self.address], payload)?;
        Ok(self.extract(payload))
    }

    /// Read-modify-write of the field. Only the field's bits change.
    pub fn set<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
        value: i64,
    ) -> Result<(), Error<I2C::Error>> {
        let mut buffer = [0; MAX_REGISTER_BYTES + 1];
        let frame = read_frame(i2c, device, self.address, &mut buffer, self.payload_len())?;
        self.insert(&mut frame[1..], value);
        trace!("field write reg={:#x} value={}", self.address, value);
        i2c.write(device, frame)?;
        Ok(())
    }
}

/// Reads `len` payload bytes of register `address` into `buffer[1..]`, with
/// the address in `buffer[0]`, and returns the filled frame.
fn read_frame<'b, I2C: I2c>(
    i2c: &mut I2C,
    device: u8,
    address: u8,
    buffer: &'b mut [u8; MAX_REGISTER_BYTES + 1],
    len: usize,
) -> Result<&'b mut [u8], Error<I2C::Error>> {
    let frame = &mut buffer[..=len];
    frame[0] = address;
    let (head, payload) = frame.split_at_mut(1);
    i2c.write_read(device, head, payload)?;
    Ok(frame)
}

/// A single bit, addressed by byte and bit index rather than mask arithmetic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bit {
    address: u8,
    byte: u8,
    mask: u8,
    register_bytes: u8,
}

impl Bit {
    /// Defines a bit at register `address`. The layout must be one bit wide.
    ///
    /// # Errors
    /// Returns a [`FieldError`] if the layout is wider than one bit or the
    /// bit lies outside the register.
    pub const fn new(address: u8, layout: Layout) -> Result<Self, FieldError> {
        if layout.bit_width != 1 {
            return Err(FieldError::NotSingleBit);
        }
        if let Err(e) = layout.check_register() {
            return Err(e);
        }
        let byte = match layout.byte_order {
            ByteOrder::LsbFirst => layout.bit_offset / 8,
            ByteOrder::MsbFirst => layout.register_bytes - 1 - layout.bit_offset / 8,
        };
        Ok(Self {
            address,
            byte,
            mask: 1 << (layout.bit_offset % 8),
            register_bytes: layout.register_bytes,
        })
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    pub(crate) const fn payload_len(&self) -> usize {
        self.register_bytes as usize
    }

    pub fn extract(&self, payload: &[u8]) -> bool {
        payload[usize::from(self.byte)] & self.mask != 0
    }

    pub fn insert(&self, payload: &mut [u8], value: bool) {
        let byte = &mut payload[usize::from(self.byte)];
        if value {
            *byte |= self.mask;
        } else {
            *byte &= !self.mask;
        }
    }

    pub fn get<I2C: I2c>(&self, i2c: &mut I2C, device: u8) -> Result<bool, Error<I2C::Error>> {
        let mut payload = [0; MAX_REGISTER_BYTES];
        let payload = &mut payload[..self.payload_len()];
        i2c.write_read(device, &[self.address], payload)?;
        Ok(self.extract(payload))
    }

    pub fn set<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
        value: bool,
    ) -> Result<(), Error<I2C::Error>> {
        let mut buffer = [0; MAX_REGISTER_BYTES + 1];
        let frame = read_frame(i2c, device, self.address, &mut buffer, self.payload_len())?;
        self.insert(&mut frame[1..], value);
        trace!("bit write reg={:#x} value={}", self.address, value);
        i2c.write(device, frame)?;
        Ok(())
    }
}

/// A bit the device only reports, such as a key-scan or diagnostic flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadOnlyBit(Bit);

impl ReadOnlyBit {
    /// # Errors
    /// Same as [`Bit::new`].
    pub const fn new(address: u8, layout: Layout) -> Result<Self, FieldError> {
        match Bit::new(address, layout) {
            Ok(bit) => Ok(Self(bit)),
            Err(e) => Err(e),
        }
    }

    pub const fn address(&self) -> u8 {
        self.0.address
    }

    pub fn extract(&self, payload: &[u8]) -> bool {
        self.0.extract(payload)
    }

    pub fn get<I2C: I2c>(&self, i2c: &mut I2C, device: u8) -> Result<bool, Error<I2C::Error>> {
        self.0.get(i2c, device)
    }

    /// Always fails with [`Error::AccessViolation`]; nothing is sent.
    pub fn set<I2C: I2c>(
        &self,
        _i2c: &mut I2C,
        _device: u8,
        _value: bool,
    ) -> Result<(), Error<I2C::Error>> {
        Err(Error::AccessViolation {
            address: self.0.address,
        })
    }

    pub(crate) const fn bit(&self) -> &Bit {
        &self.0
    }
}

/// A multi-bit field the device only reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadOnlyField(RegisterField);

impl ReadOnlyField {
    /// # Errors
    /// Same as [`RegisterField::new`].
    pub const fn new(address: u8, layout: Layout) -> Result<Self, FieldError> {
        match RegisterField::new(address, layout) {
            Ok(field) => Ok(Self(field)),
            Err(e) => Err(e),
        }
    }

    pub const fn address(&self) -> u8 {
        self.0.address
    }

    pub fn extract(&self, payload: &[u8]) -> i64 {
        self.0.extract(payload)
    }

    pub fn get<I2C: I2c>(&self, i2c: &mut I2C, device: u8) -> Result<i64, Error<I2C::Error>> {
        self.0.get(i2c, device)
    }

    /// Always fails with [`Error::AccessViolation`]; nothing is sent.
    pub fn set<I2C: I2c>(
        &self,
        _i2c: &mut I2C,
        _device: u8,
        _value: i64,
    ) -> Result<(), Error<I2C::Error>> {
        Err(Error::AccessViolation {
            address: self.0.address,
        })
    }

    pub(crate) const fn field(&self) -> &RegisterField {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;

    const fn field(address: u8, layout: Layout) -> RegisterField {
        match RegisterField::new(address, layout) {
            Ok(field) => field,
            Err(_) => panic!("invalid test field"),
        }
    }

    #[test]
    fn test_layout_validation() {
        assert_eq!(
            RegisterField::new(0x0A, Layout::bits(0, 0)),
            Err(FieldError::EmptyField)
        );
        assert_eq!(
            RegisterField::new(0x0A, Layout::bits(5, 4)),
            Err(FieldError::MaskOutOfRange)
        );
        assert_eq!(
            RegisterField::new(0x0A, Layout::bits(0, 4).register_bytes(0)),
            Err(FieldError::EmptyRegister)
        );
        assert_eq!(
            RegisterField::new(0x0A, Layout::bits(0, 4).register_bytes(9)),
            Err(FieldError::RegisterTooWide)
        );
        assert!(RegisterField::new(0x0A, Layout::bits(4, 4)).is_ok());
        assert!(RegisterField::new(0x0A, Layout::bits(12, 4).register_bytes(2)).is_ok());
        assert!(RegisterField::new(0x0A, Layout::bits(0, 64).register_bytes(8)).is_ok());
        assert_eq!(Bit::new(0x0E, Layout::bits(0, 2)), Err(FieldError::NotSingleBit));
        assert_eq!(Bit::new(0x0E, Layout::bit(8)), Err(FieldError::MaskOutOfRange));
    }

    #[test]
    fn test_assemble_byte_order() {
        assert_eq!(assemble(&[0x34, 0x12], ByteOrder::LsbFirst), 0x1234);
        assert_eq!(assemble(&[0x12, 0x34], ByteOrder::MsbFirst), 0x1234);
        assert_eq!(
            assemble(&[1, 2, 3, 4, 5, 6, 7, 8], ByteOrder::LsbFirst),
            0x0807_0605_0403_0201
        );

        let mut payload = [0; 3];
        disassemble(0x00AB_CDEF, ByteOrder::LsbFirst, &mut payload);
        assert_eq!(payload, [0xEF, 0xCD, 0xAB]);
        disassemble(0x00AB_CDEF, ByteOrder::MsbFirst, &mut payload);
        assert_eq!(payload, [0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_extract_unsigned() {
        let nibble = field(0x0A, Layout::bits(4, 4));
        assert_eq!(nibble.mask(), 0xF0);
        assert_eq!(nibble.extract(&[0xA5]), 0x0A);

        let straddle = field(0x10, Layout::bits(6, 4).register_bytes(2));
        // bits 6..9 of 0b11_1100_0000
        assert_eq!(straddle.extract(&[0xC0, 0x03]), 0b1111);
        let straddle_msb = field(
            0x10,
            Layout::bits(6, 4)
                .register_bytes(2)
                .byte_order(ByteOrder::MsbFirst),
        );
        assert_eq!(straddle_msb.extract(&[0x03, 0xC0]), 0b1111);
    }

    #[test]
    fn test_extract_signed() {
        let signed = field(0x11, Layout::bits(2, 4).signed());
        assert_eq!(signed.extract(&[0b0011_1100]), -1);
        assert_eq!(signed.extract(&[0b0010_0000]), -8);
        assert_eq!(signed.extract(&[0b0001_1100]), 7);

        let full = field(0x11, Layout::bits(0, 16).register_bytes(2).signed());
        assert_eq!(full.extract(&[0x00, 0x80]), i64::from(i16::MIN));
    }

    #[test]
    fn test_insert_preserves_other_bits() {
        let nibble = field(0x0A, Layout::bits(2, 3));
        for start in [0x00u8, 0xFF, 0xA5, 0x5A] {
            for value in 0..8 {
                let mut payload = [start];
                nibble.insert(&mut payload, value);
                assert_eq!(nibble.extract(&payload), value);
                assert_eq!(payload[0] & !0b0001_1100, start & !0b0001_1100);
            }
        }
    }

    #[test]
    fn test_insert_signed_values() {
        let signed = field(0x11, Layout::bits(3, 5).register_bytes(2).signed());
        for value in -16..16 {
            let mut payload = [0xFF, 0xFF];
            signed.insert(&mut payload, value);
            assert_eq!(signed.extract(&payload), value);
            assert_eq!(payload[0] & 0b0000_0111, 0b0000_0111);
            assert_eq!(payload[1], 0xFF);
        }
    }

    #[test]
    fn test_insert_truncates_oversized_value() {
        let nibble = field(0x0A, Layout::bits(0, 4));
        let mut payload = [0xF0];
        nibble.insert(&mut payload, 0x1_23);
        assert_eq!(payload, [0xF3]);
        nibble.insert(&mut payload, -1);
        assert_eq!(payload, [0xFF]);
    }

    #[test]
    fn test_bit_byte_index() {
        let lsb = Bit::new(0x20, Layout::bit(9).register_bytes(2)).unwrap();
        let mut payload = [0, 0];
        lsb.insert(&mut payload, true);
        assert_eq!(payload, [0x00, 0x02]);

        let msb = Bit::new(
            0x20,
            Layout::bit(9)
                .register_bytes(2)
                .byte_order(ByteOrder::MsbFirst),
        )
        .unwrap();
        let mut payload = [0, 0];
        msb.insert(&mut payload, true);
        assert_eq!(payload, [0x02, 0x00]);
        assert!(msb.extract(&payload));
        msb.insert(&mut payload, false);
        assert_eq!(payload, [0, 0]);
    }

    mod bus {
        use super::*;
        use alloc::vec;
        use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

        const DEVICE_ADDRESS: u8 = 0x00;

        #[test]
        fn test_get_single_transaction() {
            let mut mock = I2cMock::new(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![0x0B],
                vec![0b1111_1101],
            )]);
            let scan_limit = field(0x0B, Layout::bits(0, 3));
            assert_eq!(scan_limit.get(&mut mock, DEVICE_ADDRESS).unwrap(), 5);
            mock.done();
        }

        #[test]
        fn test_set_read_modify_write() {
            let mut mock = I2cMock::new(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0A], vec![0b1010_0000]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x0A, 0b1010_1001]),
            ]);
            let intensity = field(0x0A, Layout::bits(0, 4));
            intensity.set(&mut mock, DEVICE_ADDRESS, 9).unwrap();
            mock.done();
        }

        #[test]
        fn test_set_multi_byte_msb_first() {
            let mut mock = I2cMock::new(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x40], vec![0xFF, 0x00]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x40, 0xF0, 0x0F]),
            ]);
            // bits 4..11 of a big-endian 16-bit register
            let wide = field(
                0x40,
                Layout::bits(4, 8)
                    .register_bytes(2)
                    .byte_order(ByteOrder::MsbFirst),
            );
            wide.set(&mut mock, DEVICE_ADDRESS, 0x00).unwrap();
            mock.done();
        }

        #[test]
        fn test_bit_set_and_clear() {
            let mut mock = I2cMock::new(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0E], vec![0b0000_0100]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x0E, 0b0001_0100]),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0E], vec![0b0001_0100]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x0E, 0b0000_0100]),
            ]);
            let blink = Bit::new(0x0E, Layout::bit(4)).unwrap();
            blink.set(&mut mock, DEVICE_ADDRESS, true).unwrap();
            blink.set(&mut mock, DEVICE_ADDRESS, false).unwrap();
            mock.done();
        }

        #[test]
        fn test_read_only_rejects_writes_without_traffic() {
            let mut mock = I2cMock::new(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![0x1C],
                vec![0b1111_1110],
            )]);
            let key = ReadOnlyBit::new(0x1C, Layout::bit(0)).unwrap();
            assert!(!key.get(&mut mock, DEVICE_ADDRESS).unwrap());
            assert!(matches!(
                key.set(&mut mock, DEVICE_ADDRESS, true),
                Err(Error::AccessViolation { address: 0x1C })
            ));

            let diag = ReadOnlyField::new(0x14, Layout::bits(0, 8)).unwrap();
            assert!(matches!(
                diag.set(&mut mock, DEVICE_ADDRESS, 0),
                Err(Error::AccessViolation { address: 0x14 })
            ));
            mock.done();
        }

        #[test]
        fn test_bus_error_propagates() {
            use embedded_hal::i2c::ErrorKind;
            let mut mock = I2cMock::new(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![0x0A],
                vec![0],
            )
            .with_error(ErrorKind::Other)]);
            let intensity = field(0x0A, Layout::bits(0, 4));
            assert!(matches!(
                intensity.set(&mut mock, DEVICE_ADDRESS, 1),
                Err(Error::I2c(ErrorKind::Other))
            ));
            mock.done();
        }
    }
}

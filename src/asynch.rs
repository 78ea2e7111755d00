//! Async register-field transactions.
//!
//! The same single-transaction reads and read-modify-write updates as the
//! blocking methods of [`crate::field`], over `embedded-hal-async` buses. It
//! is only available when the `async` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use as1115_clock::AS1115_MAP;
//!
//! AS1115_MAP.global_intensity.set_async(&mut i2c, 0x00, 7).await?;
//! let pressed = AS1115_MAP.key_a[0].get_async(&mut i2c, 0x00).await?;
//! ```
//!
//! The read-modify-write holds `&mut I2C` across its await points. Tasks that
//! share one bus through a mutex must keep the lock for the whole call.

use embedded_hal_async::i2c::I2c;

use crate::field::{Bit, ReadOnlyBit, ReadOnlyField, RegisterField, MAX_REGISTER_BYTES};
use crate::Error;

async fn read_frame<'b, I2C: I2c>(
    i2c: &mut I2C,
    device: u8,
    address: u8,
    buffer: &'b mut [u8; MAX_REGISTER_BYTES + 1],
    len: usize,
) -> Result<&'b mut [u8], Error<I2C::Error>> {
    let frame = &mut buffer[..=len];
    frame[0] = address;
    let (head, payload) = frame.split_at_mut(1);
    i2c.write_read(device, head, payload).await?;
    Ok(frame)
}

impl RegisterField {
    /// Async version of [`RegisterField::get`].
    pub async fn get_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
    ) -> Result<i64, Error<I2C::Error>> {
        let mut payload = [0; MAX_REGISTER_BYTES];
        let payload = &mut payload[..self.payload_len()];
        i2c.write_read(device, &[self.address()], payload).await?;
        Ok(self.extract(payload))
    }

    /// Async version of [`RegisterField::set`].
    pub async fn set_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
        value: i64,
    ) -> Result<(), Error<I2C::Error>> {
        let mut buffer = [0; MAX_REGISTER_BYTES + 1];
        let frame =
            read_frame(i2c, device, self.address(), &mut buffer, self.payload_len()).await?;
        self.insert(&mut frame[1..], value);
        trace!("field write reg={:#x} value={}", self.address(), value);
        i2c.write(device, frame).await?;
        Ok(())
    }
}

impl Bit {
    /// Async version of [`Bit::get`].
    pub async fn get_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
    ) -> Result<bool, Error<I2C::Error>> {
        let mut payload = [0; MAX_REGISTER_BYTES];
        let payload = &mut payload[..self.payload_len()];
        i2c.write_read(device, &[self.address()], payload).await?;
        Ok(self.extract(payload))
    }

    /// Async version of [`Bit::set`].
    pub async fn set_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
        value: bool,
    ) -> Result<(), Error<I2C::Error>> {
        let mut buffer = [0; MAX_REGISTER_BYTES + 1];
        let frame =
            read_frame(i2c, device, self.address(), &mut buffer, self.payload_len()).await?;
        self.insert(&mut frame[1..], value);
        trace!("bit write reg={:#x} value={}", self.address(), value);
        i2c.write(device, frame).await?;
        Ok(())
    }
}

impl ReadOnlyBit {
    pub async fn get_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
    ) -> Result<bool, Error<I2C::Error>> {
        self.bit().get_async(i2c, device).await
    }

    /// Always fails with [`Error::AccessViolation`]; nothing is sent.
    pub async fn set_async<I2C: I2c>(
        &self,
        _i2c: &mut I2C,
        _device: u8,
        _value: bool,
    ) -> Result<(), Error<I2C::Error>> {
        Err(Error::AccessViolation {
            address: self.address(),
        })
    }
}

impl ReadOnlyField {
    pub async fn get_async<I2C: I2c>(
        &self,
        i2c: &mut I2C,
        device: u8,
    ) -> Result<i64, Error<I2C::Error>> {
        self.field().get_async(i2c, device).await
    }

    /// Always fails with [`Error::AccessViolation`]; nothing is sent.
    pub async fn set_async<I2C: I2c>(
        &self,
        _i2c: &mut I2C,
        _device: u8,
        _value: i64,
    ) -> Result<(), Error<I2C::Error>> {
        Err(Error::AccessViolation {
            address: self.address(),
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use crate::field::{ByteOrder, Layout};
    use crate::registers::AS1115_MAP;
    use alloc::vec;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x00;

    async fn setup_mock(expectations: &[I2cTrans]) -> I2cMock {
        I2cMock::new(expectations)
    }

    #[tokio::test]
    async fn test_async_field_get() {
        let mut mock = setup_mock(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x0B],
            vec![0b1111_1011],
        )])
        .await;
        let limit = AS1115_MAP.scan_limit.get_async(&mut mock, DEVICE_ADDRESS).await;
        assert_eq!(limit.unwrap(), 3);
        mock.done();
    }

    #[tokio::test]
    async fn test_async_field_set_preserves_neighbours() {
        let mut mock = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x10], vec![0x5A]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x10, 0xCA]),
        ])
        .await;
        AS1115_MAP.digit_intensity[1]
            .set_async(&mut mock, DEVICE_ADDRESS, 0x0C)
            .await
            .unwrap();
        mock.done();
    }

    #[tokio::test]
    async fn test_async_wide_register() {
        let field =
            RegisterField::new(0x20, Layout::bits(4, 8).register_bytes(2).byte_order(ByteOrder::MsbFirst))
                .unwrap();
        let mut mock = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x20], vec![0x0A, 0xB0]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x20], vec![0x0A, 0xB0]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x20, 0x01, 0x20]),
        ])
        .await;
        assert_eq!(field.get_async(&mut mock, DEVICE_ADDRESS).await.unwrap(), 0xAB);
        field.set_async(&mut mock, DEVICE_ADDRESS, 0x12).await.unwrap();
        mock.done();
    }

    #[tokio::test]
    async fn test_async_bits() {
        let mut mock = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0C], vec![0x80]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x0C, 0x81]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x1C], vec![0xFE]),
        ])
        .await;
        AS1115_MAP
            .shutdown_normal
            .set_async(&mut mock, DEVICE_ADDRESS, true)
            .await
            .unwrap();
        let key = AS1115_MAP.key_a[0].get_async(&mut mock, DEVICE_ADDRESS).await;
        assert!(!key.unwrap());
        mock.done();
    }

    #[tokio::test]
    async fn test_async_read_only_rejects_writes() {
        let mut mock = setup_mock(&[]).await;
        let result = AS1115_MAP
            .test_led_global
            .set_async(&mut mock, DEVICE_ADDRESS, true)
            .await;
        assert!(matches!(result, Err(Error::AccessViolation { address: 0x0F })));

        let status = ReadOnlyField::new(0x0F, Layout::bits(5, 2)).unwrap();
        let result = status.set_async(&mut mock, DEVICE_ADDRESS, 1).await;
        assert!(matches!(result, Err(Error::AccessViolation { address: 0x0F })));
        mock.done();
    }

    #[tokio::test]
    async fn test_async_bus_error() {
        let mut mock = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0F], vec![0x00]).with_error(ErrorKind::Other),
        ])
        .await;
        let status = ReadOnlyField::new(0x0F, Layout::bits(5, 2)).unwrap();
        let result = status.get_async(&mut mock, DEVICE_ADDRESS).await;
        assert!(matches!(result, Err(Error::I2c(ErrorKind::Other))));
        mock.done();
    }
}

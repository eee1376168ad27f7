use i2c_linux::{
    I2c, Message, WriteFlags,
};
use log::debug;
use std::fs::File;
use std::path::Path;
use std::{thread, time};
use thiserror::Error;

// -- the widest value the bit decoder assembles
const MAX_BIT_WIDTH: u8 = 32;

#[derive(Error, Debug)]
pub enum I2cError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Short read at register {register:#04x}: expected {expected} bytes, got {actual}")]
    ShortRead { register: u8, expected: usize, actual: usize },
    #[error("Invalid bit width {0}, expected 1..=32")]
    InvalidBitWidth(u8),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Endian {
    Little,
    Big,
}

/// Byte-level access to the registers of a single device.
pub trait RegisterTransport {
    // -- writes `data` starting at `register` in one transaction
    fn write_bytes(&mut self, register: u8, data: &[u8]) -> Result<(), I2cError>;

    // -- writes the register address without releasing the bus, then fills `data`
    // -- fails with `I2cError::ShortRead` when the device delivers fewer bytes
    fn read_bytes(&mut self, register: u8, data: &mut [u8]) -> Result<(), I2cError>;

    // -- zero-length transaction used for presence detection
    fn probe(&mut self) -> bool;

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2cError> {
        self.write_bytes(register, &[value])
    }

    fn write_register_16(&mut self, register: u8, value: u16, big_endian: bool) -> Result<(), I2cError> {
        let data = if big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.write_bytes(register, &data)
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, I2cError> {
        let mut val: [u8; 1] = [0];
        self.read_bytes(register, &mut val)?;
        Ok(val[0])
    }
}

// -- integer types the bit decoder can produce. The raw value is truncated to the
// -- target width, so signed types pick up their sign from the top bit
pub trait FromBits: Sized {
    fn from_bits(raw: u32) -> Self;
}

macro_rules! impl_from_bits {
    ($($t:ty),*) => {
        $(
            impl FromBits for $t {
                fn from_bits(raw: u32) -> Self {
                    raw as $t
                }
            }
        )*
    };
}

impl_from_bits!(u8, i8, u16, i16, u32, i32);

pub fn byte_count(bits: u8) -> usize {
    (bits as usize + 7) / 8
}

// -- assembles `bytes` in the given order and drops the low padding bits of a
// -- width that is not a multiple of eight
pub fn decode_bits(bytes: &[u8], bits: u8, endian: Endian) -> u32 {
    let len = bytes.len();
    let mut val: u32 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        let shift = match endian {
            Endian::Little => 8 * i,
            Endian::Big => 8 * (len - 1 - i),
        };
        val |= (*byte as u32) << shift;
    }
    if bits % 8 != 0 {
        val >>= 8 - bits % 8;
    }
    val
}

pub fn read_bits<T: FromBits, R: RegisterTransport + ?Sized>(io: &mut R, register: u8, bits: u8,
    endian: Endian) -> Result<T, I2cError> {
    if bits == 0 || bits > MAX_BIT_WIDTH {
        return Err(I2cError::InvalidBitWidth(bits))
    }
    let mut buf: [u8; 4] = [0; 4];
    let buf = &mut buf[..byte_count(bits)];
    io.read_bytes(register, buf)?;
    Ok(T::from_bits(decode_bits(buf, bits, endian)))
}

// -- transport over a Linux i2c character device such as `/dev/i2c-1`
pub struct LinuxI2c {
    // -- i2c bus
    i2c: I2c<File>,
    // -- slave address
    device_addr: u16,
}

impl LinuxI2c {

    pub fn open(bus_path: &Path, device_addr: u16) -> Result<LinuxI2c, I2cError> {
        let mut i2c = get_bus(bus_path)?;
        set_slave(&mut i2c, device_addr)?;
        debug!("Opened i2c bus {} for device {device_addr:#04x}", bus_path.display());
        Ok(LinuxI2c { i2c, device_addr })
    }

    pub fn device_addr(&self) -> u16 {
        self.device_addr
    }
}

impl RegisterTransport for LinuxI2c {

    fn write_bytes(&mut self, register: u8, data: &[u8]) -> Result<(), I2cError> {
        if let [value] = data {
            self.i2c.smbus_write_byte_data(register, *value)?;
            return Ok(())
        }
        // -- register address followed by the payload in a single message
        let mut buf = Vec::with_capacity(data.len() + 1);
        buf.push(register);
        buf.extend_from_slice(data);
        let write_message = Message::Write { address: self.device_addr, data: &buf, flags: WriteFlags::empty() };
        let mut messages = [write_message];
        self.i2c.i2c_transfer(&mut messages)?;
        Ok(())
    }

    fn read_bytes(&mut self, register: u8, data: &mut [u8]) -> Result<(), I2cError> {
        let expected = data.len();
        let actual = self.i2c.i2c_read_block_data(register, data)?;
        if actual < expected {
            return Err(I2cError::ShortRead { register, expected, actual })
        }
        Ok(())
    }

    fn probe(&mut self) -> bool {
        let probe_message = Message::Write { address: self.device_addr, data: &[], flags: WriteFlags::empty() };
        let mut messages = [probe_message];
        match self.i2c.i2c_transfer(&mut messages) {
            Ok(()) => true,
            Err(err) => {
                debug!("Probe of device {:#04x} failed: {err}", self.device_addr);
                false
            }
        }
    }
}

// -- blocking time source. Tests substitute an implementation that only records
pub trait Delay {
    fn delay_ms(&mut self, milli_secs: u32);

    // -- gives other work on the same scheduler a chance to run
    fn yield_now(&mut self) {
        thread::yield_now();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, milli_secs: u32) {
        delay(milli_secs);
    }
}

pub fn get_bus(bus_path: &Path)  -> Result<I2c<File>, std::io::Error> {
    I2c::from_path(bus_path)
}

pub fn set_slave(i2c: &mut I2c<File>, dev_addr: u16) -> Result<(), std::io::Error> {
    i2c.smbus_set_slave_address(dev_addr, false)
}

pub fn delay(milli_secs: u32) {
    let delay = time::Duration::from_millis(milli_secs as u64);
    thread::sleep(delay);
}


#[cfg(test)]
mod tests {
    use super::testing::FakeBus;
    use super::*;
    use test_log::test;

    #[test]
    fn decode_12_bits_both_byte_orders() {
        // -- 0xc0ab >> 4 and 0xabc0 >> 4
        assert_eq!(decode_bits(&[0xab, 0xc0], 12, Endian::Little), 0x0c0a);
        assert_eq!(decode_bits(&[0xab, 0xc0], 12, Endian::Big), 0x0abc);
    }

    #[test]
    fn decode_byte_aligned_widths_keep_all_bits() {
        assert_eq!(decode_bits(&[0x34, 0x12], 16, Endian::Little), 0x1234);
        assert_eq!(decode_bits(&[0x12, 0x34], 16, Endian::Big), 0x1234);
        assert_eq!(decode_bits(&[0x7f], 8, Endian::Big), 0x7f);
    }

    #[test]
    fn decode_20_bit_adc_value() {
        // -- msb, lsb, xlsb with the low nibble of xlsb as padding
        assert_eq!(decode_bits(&[0x7a, 0x12, 0x3f], 20, Endian::Big), 0x7a123);
    }

    #[test]
    fn decode_10_bit_gas_adc() {
        assert_eq!(decode_bits(&[0xff, 0xc0], 10, Endian::Big), 0x3ff);
        assert_eq!(decode_bits(&[0x80, 0x00], 10, Endian::Big), 0x200);
    }

    #[test]
    fn byte_count_rounds_up() {
        assert_eq!(byte_count(1), 1);
        assert_eq!(byte_count(8), 1);
        assert_eq!(byte_count(10), 2);
        assert_eq!(byte_count(20), 3);
        assert_eq!(byte_count(32), 4);
    }

    #[test]
    fn read_bits_sign_follows_target_type() {
        let mut bus = FakeBus::with_regs(&[(0x10, 0xfe), (0x11, 0xff)]);
        let signed: i16 = read_bits(&mut bus, 0x10, 16, Endian::Little).unwrap();
        let unsigned: u16 = read_bits(&mut bus, 0x10, 16, Endian::Little).unwrap();
        assert_eq!(signed, -2);
        assert_eq!(unsigned, 0xfffe);
        let byte: i8 = read_bits(&mut bus, 0x10, 8, Endian::Big).unwrap();
        assert_eq!(byte, -2);
    }

    #[test]
    fn read_bits_rejects_invalid_width() {
        let mut bus = FakeBus::new();
        assert!(matches!(read_bits::<u32, _>(&mut bus, 0x00, 0, Endian::Big), Err(I2cError::InvalidBitWidth(0))));
        assert!(matches!(read_bits::<u32, _>(&mut bus, 0x00, 33, Endian::Big), Err(I2cError::InvalidBitWidth(33))));
    }

    #[test]
    fn read_bits_reports_short_read() {
        let mut bus = FakeBus::new();
        bus.short_reads.push(0x22);
        let result = read_bits::<i32, _>(&mut bus, 0x22, 20, Endian::Big);
        assert!(matches!(result, Err(I2cError::ShortRead { register: 0x22, expected: 3, .. })));
    }

    #[test]
    fn write_register_16_honours_byte_order() {
        let mut bus = FakeBus::new();
        bus.write_register_16(0x40, 0x1234, true).unwrap();
        bus.write_register_16(0x50, 0x1234, false).unwrap();
        assert_eq!(bus.writes, vec![(0x40, 0x12), (0x41, 0x34), (0x50, 0x34), (0x51, 0x12)]);
    }
}

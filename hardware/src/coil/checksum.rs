//! Checksums for coil command frames.
//!
//! The CRC is the Modbus variant: polynomial 0xA001 applied LSB-first,
//! initial register 0xFFFF, no final xor. The legacy firmware revision
//! uses a single running-XOR byte instead.

use crc::{Crc, CRC_16_MODBUS};

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Modbus CRC16 over a byte range.
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// Running XOR over a byte range.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

//! Helmholtz coil driver amplifier protocol
//!
//! The coil amplifier accepts a 15-byte command frame carrying the three
//! axis outputs as little-endian f32 values:
//!
//! ```text
//! [0xA0, X_f32, Y_f32, Z_f32, <2 trailer bytes>]
//! ```
//!
//! Two firmware revisions exist in the field and differ only in the
//! trailer: the legacy revision takes an XOR checksum of bytes 0..13
//! followed by a 0x0A terminator, the current revision takes a Modbus
//! CRC16 of bytes 0..13 (low byte first). [`ChecksumScheme`] selects the
//! revision; CRC16 is the default contract.

pub mod checksum;
pub mod frame;

pub use checksum::{crc16, xor_checksum};
pub use frame::{encode_command, ChecksumScheme, FRAME_HEADER, FRAME_LEN, FRAME_TERMINATOR};

use std::io::Write;

/// Outbound channel to the coil amplifier.
///
/// Abstracts the physical transport so the control loop can be exercised
/// against a mock in tests. Any `Write` transport (serial port handle,
/// TCP stream) is a `CoilPort`.
pub trait CoilPort {
    /// Deliver one sealed command frame.
    fn send_frame(&mut self, frame: &[u8; FRAME_LEN]) -> std::io::Result<()>;
}

impl<W: Write> CoilPort for W {
    fn send_frame(&mut self, frame: &[u8; FRAME_LEN]) -> std::io::Result<()> {
        self.write_all(frame)?;
        self.flush()
    }
}

//! Command frame assembly.

use serde::{Deserialize, Serialize};

use super::checksum::{crc16, xor_checksum};

/// Command frame length on the wire.
pub const FRAME_LEN: usize = 15;

/// Leading frame header byte.
pub const FRAME_HEADER: u8 = 0xA0;

/// Trailing terminator byte of the legacy (XOR) revision.
pub const FRAME_TERMINATOR: u8 = 0x0A;

/// Number of bytes covered by the trailer checksum (header + payload).
const SEALED_LEN: usize = 13;

/// Trailer scheme of the target firmware revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumScheme {
    /// XOR checksum byte followed by a 0x0A terminator (legacy revision).
    Xor,
    /// Modbus CRC16 over bytes 0..13, low byte first (current revision).
    #[default]
    Crc16,
}

/// Assemble and seal one command frame into a reusable buffer.
///
/// The buffer is fully overwritten: header, the three axis outputs as
/// little-endian f32, and the trailer for the selected firmware revision.
pub fn encode_command(buf: &mut [u8; FRAME_LEN], outputs: [f32; 3], scheme: ChecksumScheme) {
    buf[0] = FRAME_HEADER;
    for (i, output) in outputs.iter().enumerate() {
        let offset = 1 + i * 4;
        buf[offset..offset + 4].copy_from_slice(&output.to_le_bytes());
    }
    match scheme {
        ChecksumScheme::Xor => {
            buf[13] = xor_checksum(&buf[..SEALED_LEN]);
            buf[14] = FRAME_TERMINATOR;
        }
        ChecksumScheme::Crc16 => {
            let crc = crc16(&buf[..SEALED_LEN]);
            buf[13..15].copy_from_slice(&crc.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_frame_layout() {
        let mut buf = [0u8; FRAME_LEN];
        encode_command(&mut buf, [1.5, -2.25, 0.0], ChecksumScheme::Xor);

        assert_eq!(buf[0], FRAME_HEADER);
        assert_eq!(&buf[1..5], &1.5f32.to_le_bytes());
        assert_eq!(&buf[5..9], &(-2.25f32).to_le_bytes());
        assert_eq!(&buf[9..13], &0.0f32.to_le_bytes());
        // Independently computed XOR of bytes 0..13 for this payload.
        assert_eq!(buf[13], 0x8F);
        assert_eq!(buf[14], FRAME_TERMINATOR);
    }

    #[test]
    fn test_crc_frame_layout() {
        let mut buf = [0u8; FRAME_LEN];
        encode_command(&mut buf, [1.5, -2.25, 0.0], ChecksumScheme::Crc16);

        assert_eq!(buf[0], FRAME_HEADER);
        // Independently computed Modbus CRC16 of bytes 0..13, low first.
        assert_eq!(buf[13], 0x91);
        assert_eq!(buf[14], 0x06);
    }

    #[test]
    fn test_zero_output_frames() {
        let mut buf = [0u8; FRAME_LEN];
        encode_command(&mut buf, [0.0; 3], ChecksumScheme::Xor);
        assert_eq!(buf[13], 0xA0);
        assert_eq!(buf[14], FRAME_TERMINATOR);

        encode_command(&mut buf, [0.0; 3], ChecksumScheme::Crc16);
        let crc = u16::from_le_bytes([buf[13], buf[14]]);
        assert_eq!(crc, 0x4A83);
    }

    #[test]
    fn test_buffer_reuse_overwrites_previous_frame() {
        let mut buf = [0xEEu8; FRAME_LEN];
        encode_command(&mut buf, [10.0, 20.0, 30.0], ChecksumScheme::Crc16);
        let first = buf;
        encode_command(&mut buf, [10.0, 20.0, 30.0], ChecksumScheme::Crc16);
        assert_eq!(buf, first);
        assert!(!buf.contains(&0xEE));
    }

    #[test]
    fn test_trailer_verifies_round_trip() {
        let mut buf = [0u8; FRAME_LEN];
        encode_command(&mut buf, [123.5, -0.25, 8000.0], ChecksumScheme::Xor);
        assert_eq!(xor_checksum(&buf[..SEALED_LEN]), buf[13]);

        encode_command(&mut buf, [123.5, -0.25, 8000.0], ChecksumScheme::Crc16);
        assert_eq!(crc16(&buf[..SEALED_LEN]), u16::from_le_bytes([buf[13], buf[14]]));
    }
}

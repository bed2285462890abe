//! MFG-3 sample packet layout.

/// Size of one sample packet on the wire, terminator included.
pub const PACKET_SIZE: usize = 7;

/// Packet terminator byte (carriage return).
pub const TERMINATOR: u8 = 0x0D;

/// Readiness handshake sent once by the instrument after connect (`"OK"`).
pub const HANDSHAKE: [u8; 2] = [0x4F, 0x4B];

/// One three-axis field sample in raw instrument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl FieldSample {
    /// Decode a complete 7-byte packet.
    ///
    /// The caller (the framer) guarantees the terminator position; only
    /// the three big-endian axis words are read here.
    pub fn from_frame(frame: &[u8; PACKET_SIZE]) -> Self {
        Self {
            x: i16::from_be_bytes([frame[0], frame[1]]),
            y: i16::from_be_bytes([frame[2], frame[3]]),
            z: i16::from_be_bytes([frame[4], frame[5]]),
        }
    }

    /// Encode the sample as a wire packet.
    pub fn to_frame(&self) -> [u8; PACKET_SIZE] {
        let x = self.x.to_be_bytes();
        let y = self.y.to_be_bytes();
        let z = self.z.to_be_bytes();
        [x[0], x[1], y[0], y[1], z[0], z[1], TERMINATOR]
    }

    /// Axes as an `[x, y, z]` array.
    pub fn as_array(&self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }
}

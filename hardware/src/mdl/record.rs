//! MDL record layout and slot accessors.

use bytemuck::{Pod, Zeroable};
use strum::{Display, FromRepr};

/// Size of one record on the wire.
pub const RECORD_SIZE: usize = 72;

/// Record kind discriminant values.
///
/// The discriminant is the leading i32 of every record and selects the
/// semantic interpretation of the shared slot layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(i32)]
pub enum RecordKind {
    /// Field measurement with temperatures and two sensor triplets.
    Measurement = 1,
    /// Reply to a previously issued command.
    Reply = 2,
    /// GPS position fix.
    GpsPosition = 3,
    /// On-board storage status.
    StorageStatus = 4,
    /// Free-form log entry.
    Log = 5,
    /// Capture counter snapshot.
    CaptureCounter = 6,
    /// Sensor heater status.
    HeaterStatus = 7,
}

/// One 72-byte MDL record.
///
/// Slot meaning depends on the discriminant; the typed accessors return
/// `None` when called on a record of the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TelemetryRecord {
    /// Record kind discriminant (see [`RecordKind`]).
    pub kind: i32,

    /// Integer slots. For measurements: unix-seconds timestamp and a
    /// status bitfield.
    pub ints: [i32; 3],

    /// Float slots. For measurements: temperatures in slots 0, 1 and 7;
    /// sensor field triplets in slots 8-10 and 11-13, in nanotesla.
    pub floats: [f32; 14],
}

impl TelemetryRecord {
    /// Decode a record from a byte stream.
    ///
    /// Returns `None` for inputs shorter than [`RECORD_SIZE`]; a record is
    /// never partially populated. Extra trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_SIZE {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&bytes[..RECORD_SIZE]))
    }

    /// Decode a record from exactly one frame.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }

    /// Encode the record as a wire frame.
    pub fn as_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut frame = [0u8; RECORD_SIZE];
        frame.copy_from_slice(bytemuck::bytes_of(self));
        frame
    }

    /// Typed record kind, or `None` for an unknown discriminant.
    pub fn record_kind(&self) -> Option<RecordKind> {
        RecordKind::from_repr(self.kind)
    }

    fn is_kind(&self, kind: RecordKind) -> bool {
        self.record_kind() == Some(kind)
    }

    /// Measurement timestamp in unix seconds.
    pub fn unix_seconds(&self) -> Option<i32> {
        self.is_kind(RecordKind::Measurement).then(|| self.ints[0])
    }

    /// Measurement status bitfield.
    pub fn status_bits(&self) -> Option<u32> {
        self.is_kind(RecordKind::Measurement)
            .then(|| self.ints[1] as u32)
    }

    /// Measurement temperatures (sensor, electronics, reference).
    pub fn temperatures(&self) -> Option<[f32; 3]> {
        self.is_kind(RecordKind::Measurement)
            .then(|| [self.floats[0], self.floats[1], self.floats[7]])
    }

    /// Primary sensor field triplet in nanotesla.
    pub fn sensor_a_field(&self) -> Option<[f32; 3]> {
        self.is_kind(RecordKind::Measurement)
            .then(|| [self.floats[8], self.floats[9], self.floats[10]])
    }

    /// Secondary sensor field triplet in nanotesla.
    pub fn sensor_b_field(&self) -> Option<[f32; 3]> {
        self.is_kind(RecordKind::Measurement)
            .then(|| [self.floats[11], self.floats[12], self.floats[13]])
    }

    /// GPS fix as (latitude, longitude) in degrees.
    pub fn lat_lon(&self) -> Option<(f32, f32)> {
        self.is_kind(RecordKind::GpsPosition)
            .then(|| (self.floats[0], self.floats[1]))
    }
}

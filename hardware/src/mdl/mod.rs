//! MDL datalogger station protocol
//!
//! The MDL station streams fixed 72-byte binary records over TCP. Every
//! record shares one little-endian layout:
//!
//! ```text
//! offset  0: record kind discriminant (i32)
//! offset  4: three i32 slots
//! offset 16: fourteen f32 slots
//! ```
//!
//! The discriminant selects how the slots are interpreted (see
//! [`RecordKind`]); the decoder itself is kind-agnostic and exposes the
//! raw slots plus typed accessors for the documented measurement and GPS
//! layouts.
//!
//! # Transport
//!
//! Plain TCP with bounded read timeouts, in the same shape as the other
//! bench drivers. A zero-length read means the station closed the
//! connection; it is reported as [`MdlError::ConnectionClosed`], never as
//! a parse failure.

pub mod link;
pub mod record;

pub use link::{MdlError, MdlEvent, MdlLink, MdlReader, MdlResult, DEFAULT_PORT};
pub use record::{RecordKind, TelemetryRecord, RECORD_SIZE};

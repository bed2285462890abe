//! MFG-3 fluxgate magnetometer serial protocol
//!
//! The MFG-3 streams three-axis field samples over a plain serial line.
//! After power-up the instrument announces readiness with a one-time
//! two-byte handshake (`"OK"`); everything after the handshake is a
//! sequence of 7-byte packets:
//!
//! ```text
//! [X_hi, X_lo, Y_hi, Y_lo, Z_hi, Z_lo, 0x0D]
//! ```
//!
//! Each axis is a signed 16-bit big-endian count. The terminating carriage
//! return is the only framing mark, so the decoder resynchronizes on it
//! after line noise (see [`framer::Framer`]).
//!
//! The sampling rate is selected with an ASCII command on the same line,
//! `"0 0 <code>\r\n"`, where codes 0-3 select 100/50/10/1 Hz (see
//! [`link::SampleRate`]).

pub mod framer;
pub mod link;
pub mod packet;

pub use framer::{Framer, BUFFER_CAP, TRIM_RETAIN};
pub use link::{MfgError, MfgEvent, MfgLink, SampleRate};
pub use packet::{FieldSample, HANDSHAKE, PACKET_SIZE, TERMINATOR};

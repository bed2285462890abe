//! Byte-stream framing and resynchronization for the MFG-3.
//!
//! The serial line delivers bytes at arbitrary boundaries, so the framer
//! accumulates chunks in an internal buffer and extracts complete packets
//! as terminators appear. A terminator closer than a full packet to the
//! buffer start marks a malformed prefix, which is discarded silently.
//!
//! The buffer is bounded: past [`BUFFER_CAP`] bytes only the most recent
//! [`TRIM_RETAIN`] bytes are retained, trading completeness for recency
//! under sustained overflow.

use tracing::{debug, trace};

use super::packet::{FieldSample, HANDSHAKE, PACKET_SIZE, TERMINATOR};

/// Buffer size at which the framer trims accumulated bytes.
pub const BUFFER_CAP: usize = 1000;

/// Bytes retained after a trim (most recent first-to-last).
pub const TRIM_RETAIN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Waiting for the instrument's one-time readiness token.
    AwaitingHandshake,
    /// Handshake seen; extracting terminated packets.
    Streaming,
}

/// Incremental packet decoder for the MFG-3 serial stream.
///
/// Feed raw chunks with [`feed`](Self::feed); complete samples are
/// returned as they are framed. Call [`reset`](Self::reset) on every
/// channel teardown so a fresh connection re-synchronizes through the
/// handshake.
#[derive(Debug)]
pub struct Framer {
    buf: Vec<u8>,
    state: FramerState,
    cap: usize,
    retain: usize,
}

impl Framer {
    /// Create a framer with the default buffer limits.
    pub fn new() -> Self {
        Self::with_limits(BUFFER_CAP, TRIM_RETAIN)
    }

    /// Create a framer with explicit buffer cap and trim-to length.
    pub fn with_limits(cap: usize, retain: usize) -> Self {
        assert!(retain <= cap, "trim length cannot exceed buffer cap");
        Self {
            buf: Vec::with_capacity(cap.min(4096)),
            state: FramerState::AwaitingHandshake,
            cap,
            retain,
        }
    }

    /// Whether the handshake has been observed on this connection.
    pub fn is_streaming(&self) -> bool {
        self.state == FramerState::Streaming
    }

    /// Append a raw chunk and extract any complete samples.
    ///
    /// While awaiting the handshake no samples are emitted, even if packet
    /// bytes follow the token in the same chunk; they are picked up on the
    /// next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FieldSample> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.cap {
            let excess = self.buf.len() - self.retain;
            debug!(dropped = excess, "framer buffer overflow, trimming");
            self.buf.drain(..excess);
        }

        match self.state {
            FramerState::AwaitingHandshake => {
                if let Some(pos) = find_handshake(&self.buf) {
                    trace!("handshake observed, entering streaming state");
                    self.buf.drain(..pos + HANDSHAKE.len());
                    self.state = FramerState::Streaming;
                }
                Vec::new()
            }
            FramerState::Streaming => self.extract_packets(),
        }
    }

    /// Drop all buffered bytes and return to the handshake state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = FramerState::AwaitingHandshake;
    }

    fn extract_packets(&mut self) -> Vec<FieldSample> {
        let mut samples = Vec::new();
        while self.buf.len() >= PACKET_SIZE {
            let Some(offset) = self.buf.iter().position(|&b| b == TERMINATOR) else {
                break;
            };
            if offset < PACKET_SIZE - 1 {
                // Terminator too close to the buffer start: malformed
                // prefix, resynchronize past it.
                trace!(offset, "discarding malformed prefix");
                self.buf.drain(..=offset);
                continue;
            }
            let mut frame = [0u8; PACKET_SIZE];
            frame.copy_from_slice(&self.buf[offset + 1 - PACKET_SIZE..=offset]);
            samples.push(FieldSample::from_frame(&frame));
            self.buf.drain(..=offset);
        }
        samples
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of the first handshake token in `buf`, if present.
fn find_handshake(buf: &[u8]) -> Option<usize> {
    buf.windows(HANDSHAKE.len())
        .position(|window| window == HANDSHAKE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: i16, y: i16, z: i16) -> FieldSample {
        FieldSample { x, y, z }
    }

    fn streaming_framer() -> Framer {
        let mut framer = Framer::new();
        assert!(framer.feed(&HANDSHAKE).is_empty());
        assert!(framer.is_streaming());
        framer
    }

    #[test]
    fn test_handshake_required_before_packets() {
        let mut framer = Framer::new();
        let packet = sample(1, 2, 3).to_frame();
        assert!(framer.feed(&packet).is_empty());
        assert!(!framer.is_streaming());
    }

    #[test]
    fn test_no_emission_on_handshake_call() {
        let mut framer = Framer::new();
        let mut stream = HANDSHAKE.to_vec();
        stream.extend_from_slice(&sample(1, 2, 3).to_frame());
        // The packet bytes arrive with the handshake but are not framed
        // until the next call.
        assert!(framer.feed(&stream).is_empty());
        assert!(framer.is_streaming());
        assert_eq!(framer.feed(&[]), vec![sample(1, 2, 3)]);
    }

    #[test]
    fn test_handshake_split_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.feed(&[0x00, HANDSHAKE[0]]).is_empty());
        assert!(!framer.is_streaming());
        assert!(framer.feed(&[HANDSHAKE[1]]).is_empty());
        assert!(framer.is_streaming());
    }

    #[test]
    fn test_single_packet() {
        let mut framer = streaming_framer();
        let packets = framer.feed(&sample(100, -200, 300).to_frame());
        assert_eq!(packets, vec![sample(100, -200, 300)]);
    }

    #[test]
    fn test_multiple_packets_in_one_feed() {
        let mut framer = streaming_framer();
        let mut stream = Vec::new();
        for i in 0..5i16 {
            stream.extend_from_slice(&sample(i, -i, i * 10).to_frame());
        }
        let packets = framer.feed(&stream);
        assert_eq!(packets.len(), 5);
        assert_eq!(packets[4], sample(4, -4, 40));
    }

    #[test]
    fn test_fragmentation_invariance() {
        let expected: Vec<FieldSample> = (0..20i16)
            .map(|i| sample(i * 3, i * 5 - 40, -i))
            .collect();
        let stream: Vec<u8> = expected
            .iter()
            .flat_map(|s| s.to_frame())
            .collect();

        let mut all_at_once = streaming_framer();
        assert_eq!(all_at_once.feed(&stream), expected);

        let mut byte_at_a_time = streaming_framer();
        let mut collected = Vec::new();
        for &byte in &stream {
            collected.extend(byte_at_a_time.feed(&[byte]));
        }
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_resync_discards_early_terminator() {
        let mut framer = streaming_framer();
        let mut stream = vec![TERMINATOR];
        stream.extend_from_slice(&sample(7, 8, 9).to_frame());
        let packets = framer.feed(&stream);
        assert_eq!(packets, vec![sample(7, 8, 9)]);
    }

    #[test]
    fn test_resync_after_noise_burst() {
        let mut framer = streaming_framer();
        // Noise with embedded terminators at short offsets, then a clean packet.
        let mut stream = vec![0xAA, TERMINATOR, 0xBB, 0xCC, TERMINATOR];
        stream.extend_from_slice(&sample(-5, 5, 0).to_frame());
        let packets = framer.feed(&stream);
        assert_eq!(packets, vec![sample(-5, 5, 0)]);
    }

    #[test]
    fn test_unterminated_data_waits() {
        let mut framer = streaming_framer();
        let frame = sample(1, 1, 1).to_frame();
        assert!(framer.feed(&frame[..6]).is_empty());
        assert_eq!(framer.feed(&frame[6..]), vec![sample(1, 1, 1)]);
    }

    #[test]
    fn test_overflow_trims_to_recent_bytes() {
        let mut framer = Framer::with_limits(50, 10);
        framer.feed(&HANDSHAKE);
        // Terminator-free junk far past the cap.
        framer.feed(&vec![0x55u8; 200]);
        // The retained tail is junk, but a fresh packet still frames: the
        // junk in front of the terminator is dropped by the window rule.
        let packets = framer.feed(&sample(3, 2, 1).to_frame());
        assert_eq!(packets, vec![sample(3, 2, 1)]);
    }

    #[test]
    fn test_reset_returns_to_handshake() {
        let mut framer = streaming_framer();
        framer.feed(&sample(1, 2, 3).to_frame());
        framer.reset();
        assert!(!framer.is_streaming());
        // Packets are ignored until a fresh handshake arrives.
        assert!(framer.feed(&sample(4, 5, 6).to_frame()).is_empty());
        framer.feed(&HANDSHAKE);
        assert_eq!(framer.feed(&sample(4, 5, 6).to_frame()), vec![sample(4, 5, 6)]);
    }
}

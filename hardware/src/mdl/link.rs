//! Blocking TCP client for the MDL station.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::{TelemetryRecord, RECORD_SIZE};

/// Default TCP port the station listens on.
pub const DEFAULT_PORT: u16 = 4001;

/// Default timeout for socket operations.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur on the MDL link.
#[derive(Error, Debug)]
pub enum MdlError {
    /// Failed to establish the TCP connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The station closed the connection (zero-length read).
    ///
    /// The caller must reconnect; no record data is lost mid-frame since
    /// the partial buffer dies with the link.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// No complete record within the timeout. Recoverable: the partial
    /// frame is retained and the next read continues filling it.
    #[error("Timeout waiting for record")]
    Timeout,

    /// Low-level socket failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for MDL operations.
pub type MdlResult<T> = Result<T, MdlError>;

/// Blocking record stream from one MDL station.
///
/// Records arrive as fixed 72-byte frames; [`read_record`](Self::read_record)
/// accumulates partial socket reads until one full frame is available and
/// never yields a partially decoded record.
pub struct MdlLink {
    stream: TcpStream,
    pending: [u8; RECORD_SIZE],
    filled: usize,
}

impl MdlLink {
    /// Connect to a station at the given address.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> MdlResult<Self> {
        let stream = TcpStream::connect(&addr)
            .map_err(|e| MdlError::ConnectionFailed(format!("Failed to connect: {e}")))?;
        stream.set_read_timeout(Some(DEFAULT_TIMEOUT))?;
        stream.set_write_timeout(Some(DEFAULT_TIMEOUT))?;
        info!("Connected to MDL station");

        Ok(Self {
            stream,
            pending: [0u8; RECORD_SIZE],
            filled: 0,
        })
    }

    /// Connect to a station at the given IP using [`DEFAULT_PORT`].
    pub fn connect_default_port(ip: &str) -> MdlResult<Self> {
        Self::connect(format!("{ip}:{DEFAULT_PORT}"))
    }

    /// Set the timeout for socket reads.
    pub fn set_timeout(&mut self, timeout: Duration) -> MdlResult<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Read one complete record.
    ///
    /// Accumulates until exactly [`RECORD_SIZE`] bytes are buffered. A
    /// timeout leaves the partial frame in place for the next call; a
    /// zero-length read is the station closing and surfaces as
    /// [`MdlError::ConnectionClosed`].
    pub fn read_record(&mut self) -> MdlResult<TelemetryRecord> {
        while self.filled < RECORD_SIZE {
            match self.stream.read(&mut self.pending[self.filled..]) {
                Ok(0) => return Err(MdlError::ConnectionClosed),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(MdlError::Timeout)
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(MdlError::Timeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.filled = 0;
        let record = TelemetryRecord::from_bytes(&self.pending);
        debug!(kind = record.kind, "MDL record");
        Ok(record)
    }

    /// Spawn a background reader delivering records over a channel.
    ///
    /// Timeouts keep the loop reading; a closed connection (or a
    /// connection-reset class error) emits [`MdlEvent::Closed`] and ends
    /// the loop. Other I/O errors are logged and retried, leaving the
    /// channel open.
    pub fn into_reader(mut self) -> (MdlReader, Receiver<MdlEvent>) {
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = channel();
        let handle = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || read_loop(&mut self, running, tx))
        };
        (
            MdlReader {
                running,
                handle: Some(handle),
            },
            rx,
        )
    }
}

/// Events delivered by the background reader.
#[derive(Debug)]
pub enum MdlEvent {
    /// One decoded record.
    Record(TelemetryRecord),
    /// The reader stopped; the connection must be re-established.
    Closed(MdlError),
}

/// Handle to a running background reader.
pub struct MdlReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MdlReader {
    /// Stop the reader and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MdlReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(link: &mut MdlLink, running: Arc<AtomicBool>, tx: Sender<MdlEvent>) {
    while running.load(Ordering::Relaxed) {
        match link.read_record() {
            Ok(record) => {
                if tx.send(MdlEvent::Record(record)).is_err() {
                    return;
                }
            }
            Err(MdlError::Timeout) => continue,
            Err(e @ MdlError::ConnectionClosed) => {
                let _ = tx.send(MdlEvent::Closed(e));
                return;
            }
            Err(MdlError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                let _ = tx.send(MdlEvent::Closed(MdlError::Io(e)));
                return;
            }
            Err(e) => {
                // Channel-scoped, recoverable; keep the link open.
                warn!("MDL read failed: {e}");
            }
        }
    }
}

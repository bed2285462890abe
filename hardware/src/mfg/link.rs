//! Serial link management for the MFG-3.
//!
//! Opens the port, runs a background reader that feeds the [`Framer`], and
//! delivers decoded samples over an mpsc channel. Rate commands go out on a
//! cloned handle of the same port.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::framer::Framer;
use super::packet::FieldSample;

/// Reader poll timeout. Bounds every blocking read so shutdown is prompt.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Errors from the MFG serial link.
#[derive(Error, Debug)]
pub enum MfgError {
    /// Failed to open or clone the serial port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Read or write failure on an open port.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Instrument sampling rate codes.
///
/// The code is the third field of the ASCII rate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz100,
    Hz50,
    Hz10,
    Hz1,
}

impl SampleRate {
    /// Wire code for the rate command.
    pub fn code(self) -> u8 {
        match self {
            SampleRate::Hz100 => 0,
            SampleRate::Hz50 => 1,
            SampleRate::Hz10 => 2,
            SampleRate::Hz1 => 3,
        }
    }

    /// Rate for a wire code, if the code is valid.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SampleRate::Hz100),
            1 => Some(SampleRate::Hz50),
            2 => Some(SampleRate::Hz10),
            3 => Some(SampleRate::Hz1),
            _ => None,
        }
    }

    /// Nominal sample frequency in hertz.
    pub fn frequency_hz(self) -> f64 {
        match self {
            SampleRate::Hz100 => 100.0,
            SampleRate::Hz50 => 50.0,
            SampleRate::Hz10 => 10.0,
            SampleRate::Hz1 => 1.0,
        }
    }

    /// ASCII command line selecting this rate.
    pub fn command(self) -> String {
        format!("0 0 {}\r\n", self.code())
    }
}

/// Events delivered by the background reader.
#[derive(Debug)]
pub enum MfgEvent {
    /// One decoded field sample.
    Sample(FieldSample),
    /// The reader stopped on an unrecoverable channel failure.
    Closed(MfgError),
}

/// Open MFG-3 serial connection with a background reader thread.
///
/// Dropping the link (or calling [`close`](Self::close)) stops the reader
/// deterministically; the framer state dies with it, so the next
/// connection starts from a fresh handshake.
pub struct MfgLink {
    port: Box<dyn SerialPort>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl MfgLink {
    /// Open the port at `baud` and start the reader.
    ///
    /// Returns the link handle and the receiving end of the event channel.
    pub fn open(port_name: &str, baud: u32) -> Result<(Self, Receiver<MfgEvent>), MfgError> {
        let port = serialport::new(port_name, baud)
            .timeout(READ_TIMEOUT)
            .open()?;
        let reader_port = port.try_clone()?;
        info!(port = port_name, baud, "MFG link open");

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = channel();
        let reader = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || read_loop(reader_port, running, tx))
        };

        Ok((
            Self {
                port,
                running,
                reader: Some(reader),
            },
            rx,
        ))
    }

    /// Select the instrument sampling rate.
    pub fn set_sample_rate(&mut self, rate: SampleRate) -> Result<(), MfgError> {
        let command = rate.command();
        debug!(?rate, "MFG send: {:?}", command.trim_end());
        self.port.write_all(command.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Stop the reader and release the port.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MfgLink {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, running: Arc<AtomicBool>, tx: Sender<MfgEvent>) {
    let mut framer = Framer::new();
    let mut chunk = [0u8; 256];
    while running.load(Ordering::Relaxed) {
        match port.read(&mut chunk) {
            Ok(0) => {
                let _ = tx.send(MfgEvent::Closed(MfgError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "serial port closed",
                ))));
                return;
            }
            Ok(n) => {
                for sample in framer.feed(&chunk[..n]) {
                    if tx.send(MfgEvent::Sample(sample)).is_err() {
                        // Consumer gone; nothing left to deliver to.
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                warn!("MFG read failed: {e}");
                let _ = tx.send(MfgEvent::Closed(MfgError::Io(e)));
                return;
            }
        }
    }
}

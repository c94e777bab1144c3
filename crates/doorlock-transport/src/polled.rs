//! Polled transport over a synchronous serial handle.
//!
//! Opening the port and writing to it block, so both run on the blocking
//! thread pool with the line behind a shared mutex. Readiness is checked by
//! asking the driver how many bytes are queued, on a fixed interval, until the
//! deadline.

use crate::{Result, Transport, TransportError};
use bytes::Bytes;
use doorlock_core::ConnectionConfig;
use doorlock_core::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_WRITE_TIMEOUT_MS};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// Synchronous serial handle used by [`PolledTransport`].
///
/// Implemented for `Box<dyn SerialPort>`; tests provide in-memory lines.
pub trait SerialLine: Send {
    /// Bytes waiting in the driver's receive queue.
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Drop everything in the receive queue.
    fn clear_input(&self) -> io::Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

impl SerialLine for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> io::Result<u32> {
        SerialPort::bytes_to_read(&**self).map_err(io::Error::from)
    }

    fn clear_input(&self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// Opens a [`SerialLine`] for a configuration.
pub type LineOpener =
    Arc<dyn Fn(&ConnectionConfig) -> Result<Box<dyn SerialLine>> + Send + Sync>;

/// Open a real serial port: 8N1, no flow control, RTS and DTR asserted.
///
/// The port timeout is the write timeout, which bounds blocking writes.
pub fn open_serial_line(config: &ConnectionConfig) -> Result<Box<dyn SerialLine>> {
    let mut port = serialport::new(config.port.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.write_timeout())
        .open()
        .map_err(|e| TransportError::connect_failed(&config.port, e.to_string()))?;

    port.write_request_to_send(true)
        .map_err(|e| TransportError::connect_failed(&config.port, format!("RTS: {e}")))?;
    port.write_data_terminal_ready(true)
        .map_err(|e| TransportError::connect_failed(&config.port, format!("DTR: {e}")))?;

    Ok(Box::new(port))
}

type SharedLine = Arc<Mutex<Box<dyn SerialLine>>>;

fn lock_line(line: &SharedLine) -> MutexGuard<'_, Box<dyn SerialLine>> {
    line.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport over a synchronous serial handle with timed readiness checks.
pub struct PolledTransport {
    opener: LineOpener,
    line: Option<SharedLine>,
    port: String,
    poll_interval: Duration,
    write_timeout: Duration,
    armed: bool,
}

impl PolledTransport {
    /// Transport that opens real serial ports.
    pub fn new() -> Self {
        Self::with_opener(Arc::new(open_serial_line))
    }

    /// Transport that opens lines through `opener`.
    pub fn with_opener(opener: LineOpener) -> Self {
        Self {
            opener,
            line: None,
            port: String::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            armed: false,
        }
    }

    fn line(&self) -> Result<&SharedLine> {
        self.line.as_ref().ok_or(TransportError::NotOpen)
    }

    fn available(&self) -> Result<usize> {
        let count = lock_line(self.line()?)
            .bytes_to_read()
            .map_err(|e| TransportError::read_failed(e.to_string()))?;
        Ok(count as usize)
    }
}

impl Default for PolledTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolledTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolledTransport")
            .field("port", &self.port)
            .field("open", &self.line.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Transport for PolledTransport {
    fn is_open(&self) -> bool {
        self.line.is_some()
    }

    async fn open(&mut self, config: &ConnectionConfig) -> Result<()> {
        if self.is_open() {
            self.close().await;
        }

        info!(port = %config.port, baud = config.baud_rate, "Opening serial port (polled)");

        let opener = self.opener.clone();
        let settings = config.clone();
        let line = tokio::task::spawn_blocking(move || opener(&settings))
            .await
            .map_err(|e| TransportError::connect_failed(&config.port, e.to_string()))
            .and_then(|opened| opened)
            .inspect_err(|e| {
                error!(port = %config.port, error = %e, "Failed to open serial port");
            })?;

        self.line = Some(Arc::new(Mutex::new(line)));
        self.port = config.port.clone();
        self.poll_interval = config.poll_interval();
        self.write_timeout = config.write_timeout();
        self.armed = false;

        if !config.settle_delay().is_zero() {
            tokio::time::sleep(config.settle_delay()).await;
        }

        debug!(port = %self.port, "Serial port ready");
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let timeout_ms = self.write_timeout.as_millis() as u64;
        let line = self.line()?.clone();
        let frame = data.to_vec();

        let written = tokio::task::spawn_blocking(move || {
            let mut port = lock_line(&line);
            port.write_all(&frame).and_then(|()| port.flush())
        })
        .await
        .map_err(|e| TransportError::write_failed(format!("write task failed: {e}")))?;

        written.map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => TransportError::write_timeout(timeout_ms),
            _ => TransportError::write_failed(e.to_string()),
        })?;

        trace!(bytes = data.len(), "Wrote to serial line");
        Ok(data.len())
    }

    fn arm_read_wait(&mut self) -> Result<()> {
        self.line()?;
        self.armed = true;
        Ok(())
    }

    async fn wait_for_readable(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            ticker.tick().await;

            match self.available() {
                Ok(0) if Instant::now() >= deadline => break Ok(false),
                Ok(0) => continue,
                Ok(_) => break Ok(true),
                Err(e) => break Err(e),
            }
        };

        self.armed = false;
        outcome
    }

    fn cancel_read_wait(&mut self) {
        self.armed = false;
    }

    fn read(&mut self, max: usize) -> Result<Bytes> {
        let available = self.available()?.min(max);
        if available == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; available];
        let n = lock_line(self.line()?)
            .read(&mut buf)
            .map_err(|e| TransportError::read_failed(e.to_string()))?;
        buf.truncate(n);

        trace!(bytes = n, "Read from serial line");
        Ok(Bytes::from(buf))
    }

    fn purge_receive_buffer(&mut self) -> Result<usize> {
        let discarded = self.available()?;
        lock_line(self.line()?)
            .clear_input()
            .map_err(|e| TransportError::read_failed(e.to_string()))?;
        Ok(discarded)
    }

    async fn close(&mut self) {
        if let Some(line) = self.line.take() {
            drop(line);
            self.armed = false;
            info!(port = %self.port, "Serial port closed");
        }
    }

    fn pending_waits(&self) -> usize {
        usize::from(self.armed)
    }
}

impl Drop for PolledTransport {
    fn drop(&mut self) {
        if self.line.is_some() {
            debug!(port = %self.port, "Dropping open polled transport");
        }
    }
}

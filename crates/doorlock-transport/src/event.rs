//! Event-driven transport over an asynchronous serial stream.
//!
//! # Architecture
//!
//! ```text
//! EventTransport
//!     │
//!     ├─> write half ──────────────> serial line
//!     │
//!     └─> reader task <── read half <── serial line
//!             │
//!             ├─> shared receive buffer
//!             └─> watch::Sender<u64>  (bytes received so far)
//! ```
//!
//! Arming marks the current arrival counter as seen. Any chunk the reader
//! task appends afterwards bumps the counter, so `wait_for_readable` wakes
//! even when the reply landed between the write and the wait.

use crate::{Result, Transport, TransportError};
use bytes::{Bytes, BytesMut};
use doorlock_core::ConnectionConfig;
use doorlock_core::constants::DEFAULT_WRITE_TIMEOUT_MS;
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, StopBits};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, error, info, trace, warn};

/// Byte stream the event-driven transport runs over.
pub trait SerialIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialIo for T {}

/// Opens a [`SerialIo`] stream for a configuration.
///
/// Called from inside the runtime, so implementations may register with the
/// reactor.
pub type StreamOpener =
    Arc<dyn Fn(&ConnectionConfig) -> Result<Box<dyn SerialIo>> + Send + Sync>;

/// Open a real serial port as an async stream: 8N1, no flow control, RTS and
/// DTR asserted.
pub fn open_serial_stream(config: &ConnectionConfig) -> Result<Box<dyn SerialIo>> {
    let mut stream = tokio_serial::new(config.port.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| TransportError::connect_failed(&config.port, e.to_string()))?;

    stream
        .write_request_to_send(true)
        .map_err(|e| TransportError::connect_failed(&config.port, format!("RTS: {e}")))?;
    stream
        .write_data_terminal_ready(true)
        .map_err(|e| TransportError::connect_failed(&config.port, format!("DTR: {e}")))?;

    Ok(Box::new(stream))
}

type ReceiveBuffer = Arc<Mutex<BytesMut>>;

/// State that only exists while the port is open.
struct Connection {
    writer: WriteHalf<Box<dyn SerialIo>>,
    arrivals: watch::Receiver<u64>,
    reader: JoinHandle<()>,
}

/// Transport over an asynchronous serial stream with a background reader.
pub struct EventTransport {
    opener: StreamOpener,
    connection: Option<Connection>,
    buffer: ReceiveBuffer,
    port: String,
    write_timeout: Duration,
    armed: bool,
}

impl EventTransport {
    /// Transport that opens real serial ports through `tokio-serial`.
    pub fn new() -> Self {
        Self::with_opener(Arc::new(open_serial_stream))
    }

    /// Transport that opens streams through `opener`.
    pub fn with_opener(opener: StreamOpener) -> Self {
        Self {
            opener,
            connection: None,
            buffer: Arc::new(Mutex::new(BytesMut::new())),
            port: String::new(),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            armed: false,
        }
    }

    fn buffered(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Default for EventTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTransport")
            .field("port", &self.port)
            .field("open", &self.is_open())
            .field("buffered", &self.buffered())
            .field("armed", &self.armed)
            .finish()
    }
}

/// Drain the read half into `buffer` until EOF or error.
///
/// Dropping `arrivals` on exit wakes any waiter with a closed channel.
async fn pump(
    read_half: ReadHalf<Box<dyn SerialIo>>,
    buffer: ReceiveBuffer,
    arrivals: watch::Sender<u64>,
    port: String,
) {
    let mut chunks = FramedRead::new(read_half, BytesCodec::new());

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => {
                trace!(port = %port, bytes = bytes.len(), "Received from serial line");
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&bytes);
                arrivals.send_modify(|total| *total += bytes.len() as u64);
            }
            Err(e) => {
                warn!(port = %port, error = %e, "Serial read failed, stopping reader");
                return;
            }
        }
    }

    debug!(port = %port, "Serial line closed by peer");
}

impl Transport for EventTransport {
    fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| !c.reader.is_finished())
    }

    async fn open(&mut self, config: &ConnectionConfig) -> Result<()> {
        if self.connection.is_some() {
            self.close().await;
        }

        info!(port = %config.port, baud = config.baud_rate, "Opening serial port (event-driven)");

        let stream = (self.opener)(config).inspect_err(|e| {
            error!(port = %config.port, error = %e, "Failed to open serial port");
        })?;
        let (read_half, writer) = tokio::io::split(stream);

        self.buffer = Arc::new(Mutex::new(BytesMut::new()));
        let (tx, arrivals) = watch::channel(0u64);
        let reader = tokio::spawn(pump(
            read_half,
            self.buffer.clone(),
            tx,
            config.port.clone(),
        ));

        self.connection = Some(Connection {
            writer,
            arrivals,
            reader,
        });
        self.port = config.port.clone();
        self.write_timeout = config.write_timeout();
        self.armed = false;

        if !config.settle_delay().is_zero() {
            tokio::time::sleep(config.settle_delay()).await;
        }

        debug!(port = %self.port, "Serial port ready");
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let write_timeout = self.write_timeout;
        let writer = &mut self.connection_mut()?.writer;

        let write = async {
            writer.write_all(data).await?;
            writer.flush().await
        };

        match tokio::time::timeout(write_timeout, write).await {
            Ok(Ok(())) => {
                trace!(bytes = data.len(), "Wrote to serial line");
                Ok(data.len())
            }
            Ok(Err(e)) => Err(TransportError::write_failed(e.to_string())),
            Err(_) => Err(TransportError::write_timeout(
                write_timeout.as_millis() as u64,
            )),
        }
    }

    fn arm_read_wait(&mut self) -> Result<()> {
        let connection = self.connection_mut()?;
        connection.arrivals.borrow_and_update();
        self.armed = true;
        Ok(())
    }

    async fn wait_for_readable(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;

        // A wake-up only counts once the reader task has appended bytes that
        // are still unread.
        let outcome = loop {
            if self.buffered() > 0 {
                break Ok(true);
            }
            let Some(connection) = self.connection.as_mut() else {
                break Err(TransportError::NotOpen);
            };

            let changed = timeout_at(deadline, connection.arrivals.changed()).await;
            match changed {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => break Err(TransportError::disconnected(self.port.clone())),
                Err(_) => break Ok(false),
            }
        };

        self.armed = false;
        outcome
    }

    fn cancel_read_wait(&mut self) {
        self.armed = false;
    }

    fn read(&mut self, max: usize) -> Result<Bytes> {
        self.connection_mut()?;

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let n = buffer.len().min(max);
        Ok(buffer.split_to(n).freeze())
    }

    fn purge_receive_buffer(&mut self) -> Result<usize> {
        let connection = self.connection_mut()?;
        connection.arrivals.borrow_and_update();

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let discarded = buffer.len();
        buffer.clear();
        Ok(discarded)
    }

    async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.reader.abort();
            if let Err(e) = connection.writer.shutdown().await {
                debug!(port = %self.port, error = %e, "Shutdown on close failed");
            }
            self.armed = false;
            info!(port = %self.port, "Serial port closed");
        }
    }

    fn pending_waits(&self) -> usize {
        usize::from(self.armed)
    }
}

impl Drop for EventTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.reader.abort();
            debug!(port = %self.port, "Dropping open event-driven transport");
        }
    }
}

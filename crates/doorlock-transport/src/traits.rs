//! Transport trait for the lock controller serial line.
//!
//! All async methods use native `async fn` in traits (Rust 1.90 + Edition
//! 2024), so the trait is not object-safe. Use
//! [`AnyTransport`](crate::devices::AnyTransport) where a single concrete
//! type is needed.

#![allow(async_fn_in_trait)]

use crate::Result;
use bytes::Bytes;
use doorlock_core::ConnectionConfig;
use std::time::Duration;

/// Exclusive owner of one serial handle.
///
/// The read side is split into explicit steps so an exchange can arm the
/// wait before writing and never miss a reply that lands between the write
/// and the wait:
///
/// 1. [`purge_receive_buffer`](Self::purge_receive_buffer)
/// 2. [`arm_read_wait`](Self::arm_read_wait)
/// 3. [`write`](Self::write)
/// 4. [`wait_for_readable`](Self::wait_for_readable)
/// 5. [`read`](Self::read), or [`cancel_read_wait`](Self::cancel_read_wait)
///    when the wait was abandoned
///
/// Every armed wait is retired either by `wait_for_readable` returning (for
/// any outcome) or by `cancel_read_wait`. [`pending_waits`](Self::pending_waits)
/// reports waits that were armed and not yet retired.
///
/// # Examples
///
/// ```
/// use doorlock_core::ConnectionConfig;
/// use doorlock_transport::{MockTransport, Transport};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> doorlock_transport::Result<()> {
///     let (mut transport, handle) = MockTransport::new();
///     handle.queue_reply(vec![0x01, b'0', b'1', 0x10, 0x03]);
///
///     transport.open(&ConnectionConfig::new("COM2")).await?;
///     transport.purge_receive_buffer()?;
///     transport.arm_read_wait()?;
///     transport.write(&[0x10, 0x02, 0x01, 0x1C, 0xFF, 0x00, 0x10, 0x03]).await?;
///
///     assert!(transport.wait_for_readable(Duration::from_secs(1)).await?);
///     let reply = transport.read(64)?;
///     assert_eq!(reply.len(), 5);
///     assert_eq!(transport.pending_waits(), 0);
///     Ok(())
/// }
/// ```
pub trait Transport: Send {
    /// Whether the handle is open and usable.
    fn is_open(&self) -> bool;

    /// Open the port: 8N1 at the configured baud, no flow control, RTS and
    /// DTR asserted, then the settle delay.
    ///
    /// Opening an already open transport closes the old handle first.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectFailed` if the port cannot be opened.
    async fn open(&mut self, config: &ConnectionConfig) -> Result<()>;

    /// Write all of `data`, bounded by the write timeout.
    ///
    /// # Errors
    ///
    /// `NotOpen`, `WriteFailed` or `WriteTimeout`.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Start observing arrivals. Data that arrives after this call makes
    /// the next [`wait_for_readable`](Self::wait_for_readable) return true.
    fn arm_read_wait(&mut self) -> Result<()>;

    /// Wait until unread data is available.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first. Never consumes data.
    /// Retires the armed wait on every outcome.
    async fn wait_for_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Retire an armed wait without waiting. No-op when nothing is armed.
    fn cancel_read_wait(&mut self);

    /// Take up to `max` buffered bytes without blocking.
    fn read(&mut self, max: usize) -> Result<Bytes>;

    /// Discard unread input. Returns the number of bytes dropped.
    fn purge_receive_buffer(&mut self) -> Result<usize>;

    /// Release the handle and any wait objects. Idempotent.
    async fn close(&mut self);

    /// Armed waits not yet retired.
    fn pending_waits(&self) -> usize;
}

//! Mock transport for testing without a serial port.
//!
//! The transport and its handle share one state. The handle scripts what the
//! "device" does in response to each write and records what was sent.

use crate::{Result, Transport, TransportError};
use bytes::{Bytes, BytesMut};
use doorlock_core::ConnectionConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What the simulated device does after a write.
#[derive(Debug, Clone)]
enum Scripted {
    Reply(Bytes),
    Silence,
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    config: Option<ConnectionConfig>,
    incoming: BytesMut,
    script: VecDeque<Scripted>,
    written: Vec<Bytes>,
    fail_next_open: Option<String>,
    fail_next_write: Option<String>,
    pending_waits: usize,
    open_count: usize,
    close_count: usize,
    purge_count: usize,
}

fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock serial transport.
///
/// Each write consumes one scripted step: a queued reply is made readable
/// immediately, silence leaves the line quiet. With nothing scripted the
/// device stays silent.
///
/// # Examples
///
/// ```
/// use doorlock_core::ConnectionConfig;
/// use doorlock_transport::{MockTransport, Transport};
///
/// #[tokio::main]
/// async fn main() -> doorlock_transport::Result<()> {
///     let (mut transport, handle) = MockTransport::new();
///     transport.open(&ConnectionConfig::new("COM2")).await?;
///     transport.write(&[0x01, 0x00, 0x00, 0x00]).await?;
///
///     assert_eq!(handle.written_frames(), vec![vec![0x01, 0x00, 0x00, 0x00]]);
///     assert_eq!(handle.open_count(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a closed mock transport and the handle that controls it.
    pub fn new() -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockTransportHandle { state },
        )
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new().0
    }
}

impl Transport for MockTransport {
    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn open(&mut self, config: &ConnectionConfig) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_next_open.take() {
            return Err(TransportError::connect_failed(&config.port, message));
        }

        state.open = true;
        state.open_count += 1;
        state.pending_waits = 0;
        state.config = Some(config.clone());
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if let Some(message) = state.fail_next_write.take() {
            return Err(TransportError::write_failed(message));
        }

        state.written.push(Bytes::copy_from_slice(data));
        if let Some(Scripted::Reply(reply)) = state.script.pop_front() {
            state.incoming.extend_from_slice(&reply);
        }
        Ok(data.len())
    }

    fn arm_read_wait(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.pending_waits += 1;
        Ok(())
    }

    async fn wait_for_readable(&mut self, timeout: Duration) -> Result<bool> {
        let ready = {
            let state = lock(&self.state);
            if !state.open {
                return Err(TransportError::NotOpen);
            }
            !state.incoming.is_empty()
        };

        if !ready {
            tokio::time::sleep(timeout).await;
        }

        let mut state = lock(&self.state);
        state.pending_waits = state.pending_waits.saturating_sub(1);
        Ok(!state.incoming.is_empty())
    }

    fn cancel_read_wait(&mut self) {
        let mut state = lock(&self.state);
        state.pending_waits = state.pending_waits.saturating_sub(1);
    }

    fn read(&mut self, max: usize) -> Result<Bytes> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        let n = state.incoming.len().min(max);
        Ok(state.incoming.split_to(n).freeze())
    }

    fn purge_receive_buffer(&mut self) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.purge_count += 1;
        let discarded = state.incoming.len();
        state.incoming.clear();
        Ok(discarded)
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        if state.open {
            state.open = false;
            state.close_count += 1;
            state.pending_waits = 0;
        }
    }

    fn pending_waits(&self) -> usize {
        lock(&self.state).pending_waits
    }
}

/// Handle for scripting and inspecting a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransportHandle {
    /// Reply to the next unscripted write with `reply`.
    pub fn queue_reply(&self, reply: impl Into<Bytes>) {
        lock(&self.state)
            .script
            .push_back(Scripted::Reply(reply.into()));
    }

    /// Stay silent after the next unscripted write.
    pub fn queue_silence(&self) {
        lock(&self.state).script.push_back(Scripted::Silence);
    }

    /// Make bytes readable now, without a write. Models unsolicited or late
    /// replies.
    pub fn inject(&self, data: &[u8]) {
        lock(&self.state).incoming.extend_from_slice(data);
    }

    /// Fail the next `open` with `ConnectFailed`.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_open = Some(message.into());
    }

    /// Fail the next `write` with `WriteFailed`.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_write = Some(message.into());
    }

    /// Simulate the port disappearing (cable pulled, adapter removed).
    pub fn unplug(&self) {
        lock(&self.state).open = false;
    }

    /// Every frame written so far, oldest first.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.state)
            .written
            .iter()
            .map(|frame| frame.to_vec())
            .collect()
    }

    pub fn last_written(&self) -> Option<Vec<u8>> {
        lock(&self.state).written.last().map(|frame| frame.to_vec())
    }

    /// Configuration passed to the most recent successful `open`.
    pub fn opened_with(&self) -> Option<ConnectionConfig> {
        lock(&self.state).config.clone()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    pub fn purge_count(&self) -> usize {
        lock(&self.state).purge_count
    }

    pub fn pending_waits(&self) -> usize {
        lock(&self.state).pending_waits
    }

    /// Bytes readable but not yet read.
    pub fn unread(&self) -> usize {
        lock(&self.state).incoming.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("mock0")
    }

    #[tokio::test]
    async fn test_scripted_reply_after_write() {
        let (mut transport, handle) = MockTransport::new();
        handle.queue_reply(vec![0x01, b'0', b'0', 0x10, 0x03]);
        transport.open(&config()).await.unwrap();

        transport.arm_read_wait().unwrap();
        assert_eq!(handle.unread(), 0);
        transport.write(&[0x00]).await.unwrap();

        assert!(transport.wait_for_readable(Duration::from_secs(1)).await.unwrap());
        assert_eq!(transport.read(64).unwrap().len(), 5);
        assert_eq!(transport.pending_waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out() {
        let (mut transport, handle) = MockTransport::new();
        handle.queue_silence();
        handle.queue_reply(vec![0xAAu8]);
        transport.open(&config()).await.unwrap();

        transport.arm_read_wait().unwrap();
        transport.write(&[0x00]).await.unwrap();
        assert!(!transport.wait_for_readable(Duration::from_millis(50)).await.unwrap());

        transport.arm_read_wait().unwrap();
        transport.write(&[0x00]).await.unwrap();
        assert!(transport.wait_for_readable(Duration::from_millis(50)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failures_are_one_shot() {
        let (mut transport, handle) = MockTransport::new();
        handle.fail_next_open("busy");

        assert!(matches!(
            transport.open(&config()).await,
            Err(TransportError::ConnectFailed { .. })
        ));
        transport.open(&config()).await.unwrap();

        handle.fail_next_write("framing error");
        assert!(matches!(
            transport.write(&[0x01]).await,
            Err(TransportError::WriteFailed { .. })
        ));
        transport.write(&[0x01]).await.unwrap();
        assert_eq!(handle.written_frames(), vec![vec![0x01]]);
    }

    #[tokio::test]
    async fn test_unplug_closes() {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&config()).await.unwrap();
        handle.unplug();

        assert!(!transport.is_open());
        assert!(matches!(transport.write(&[0x01]).await, Err(TransportError::NotOpen)));
    }

    #[tokio::test]
    async fn test_purge_and_counts() {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&config()).await.unwrap();
        handle.inject(&[0xDE, 0xAD]);

        assert_eq!(transport.purge_receive_buffer().unwrap(), 2);
        transport.close().await;
        transport.close().await;

        assert_eq!(handle.purge_count(), 1);
        assert_eq!(handle.close_count(), 1);
        assert_eq!(handle.opened_with().unwrap().port, "mock0");
    }
}

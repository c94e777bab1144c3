//! Public entry point for driving one lock controller.
//!
//! # Architecture
//!
//! ```text
//! caller
//!   │
//!   └─> DeviceController
//!           │
//!           ├─> doorlock-protocol  (build frame / parse reply)
//!           ├─> ExchangeCoordinator (purge → arm → write → wait → read)
//!           └─> Transport ───(serial)───> lock controller
//! ```
//!
//! Every operation first makes sure the transport is open, reconnecting if
//! the port went away since the last call. Nothing is retried beyond that.
//!
//! # Soft and Strict Operations
//!
//! `open_lock`, `close_lock`, `query_status` and `send_raw` never return an
//! error: open/close/raw report a `bool`, status queries fall back to an
//! unknown status. The matching `try_*` operations expose the full
//! [`DoorLockError`] taxonomy.

use crate::error::{DoorLockError, Result};
use crate::exchange::{ExchangeCoordinator, ExchangeOutcome, ExchangeState};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use doorlock_core::constants::{PARAM_AUTO_RECLOSE, PARAM_MANUAL};
use doorlock_core::{ConnectionConfig, DeviceId, FramingMode, LockCommand, LockStatus};
use doorlock_protocol::{
    CommandFrame, ParsedStatus, build_legacy_frame, build_raw_frame, build_status_query_frame,
    build_structured_frame, encode_hex, format_hex, lock_status_for_code, parse_status_response,
};
use doorlock_transport::{AnyTransport, Transport};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Most recent reply bytes seen by a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastResponse {
    pub data: Bytes,
    pub received_at: DateTime<Utc>,
}

impl LastResponse {
    /// Spaced uppercase hex of the reply.
    pub fn to_hex(&self) -> String {
        format_hex(&self.data)
    }
}

/// What a completed open/close/raw command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The frame that was written.
    pub frame: CommandFrame,
    /// Reply bytes, when the controller answered within the timeout.
    pub reply: Option<Bytes>,
}

impl CommandOutcome {
    pub fn replied(&self) -> bool {
        self.reply.is_some()
    }
}

/// Drives one lock controller over one serial transport.
///
/// The controller exclusively owns its transport. Operations take
/// `&mut self`, so one controller runs at most one exchange at a time; wrap
/// it in a [`SharedController`](crate::SharedController) to share it
/// between tasks.
///
/// # Examples
///
/// ```
/// use doorlock_controller::DeviceController;
/// use doorlock_core::{ConnectionConfig, DeviceId, LockState};
/// use doorlock_transport::{AnyTransport, MockTransport};
///
/// #[tokio::main]
/// async fn main() {
///     let (mock, device) = MockTransport::new();
///     device.queue_reply(vec![0x01, b'0', b'1', 0x10, 0x03]);
///
///     let config = ConnectionConfig::new("COM2");
///     let mut controller = DeviceController::with_transport(config, AnyTransport::from(mock));
///
///     let status = controller.query_status(DeviceId::default()).await;
///     assert_eq!(status.lock_state, LockState::Locked);
/// }
/// ```
#[derive(Debug)]
pub struct DeviceController<T: Transport = AnyTransport> {
    config: ConnectionConfig,
    transport: T,
    exchange: ExchangeCoordinator,
    last_response: Option<LastResponse>,
}

impl DeviceController<AnyTransport> {
    /// Controller for a real serial port, using the transport selected by
    /// `config.io_model`. The port is opened on first use.
    ///
    /// # Errors
    ///
    /// Returns `DoorLockError::Protocol` if the configuration is invalid.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let transport = AnyTransport::from_config(&config);
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> DeviceController<T> {
    /// Controller over an existing transport. The configuration is used as
    /// given.
    pub fn with_transport(config: ConnectionConfig, transport: T) -> Self {
        let exchange = ExchangeCoordinator::new(config.response_timeout(), config.read_capacity);
        Self {
            config,
            transport,
            exchange,
            last_response: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn last_response(&self) -> Option<&LastResponse> {
        self.last_response.as_ref()
    }

    pub fn exchange_state(&self) -> ExchangeState {
        self.exchange.state()
    }

    /// Armed transport waits not yet retired. Zero between operations.
    pub fn pending_waits(&self) -> usize {
        self.transport.pending_waits()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the serial port. Does nothing when it is already open.
    ///
    /// # Errors
    ///
    /// Returns `DoorLockError::ConnectFailed` if the port cannot be opened.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_open() {
            debug!(port = %self.config.port, "Already connected");
            return Ok(());
        }

        info!(
            port = %self.config.port,
            baud = self.config.baud_rate,
            framing = %self.config.framing,
            io_model = %self.config.io_model,
            "Connecting to lock controller"
        );

        self.transport
            .open(&self.config)
            .await
            .map_err(|e| DoorLockError::connect_failed(&self.config.port, e))?;
        self.exchange.reset(&mut self.transport);

        info!(port = %self.config.port, "Connected");
        Ok(())
    }

    /// Close the serial port. Safe to call when already closed.
    pub async fn disconnect(&mut self) {
        if self.transport.is_open() {
            info!(port = %self.config.port, "Disconnecting from lock controller");
        }
        self.exchange.reset(&mut self.transport);
        self.transport.close().await;
    }

    /// Replace the configuration. The transport is torn down and opened
    /// again with the new settings.
    ///
    /// # Errors
    ///
    /// `Protocol` for an invalid configuration (the current one is kept),
    /// `ConnectFailed` if the port cannot be reopened.
    pub async fn reconfigure(&mut self, config: ConnectionConfig) -> Result<()> {
        config.validate()?;

        info!(from = %self.config.port, to = %config.port, "Reconfiguring lock controller");
        self.disconnect().await;

        self.exchange = ExchangeCoordinator::new(config.response_timeout(), config.read_capacity);
        self.config = config;
        self.connect().await
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.transport.is_open() {
            return Ok(());
        }
        debug!(port = %self.config.port, "Transport closed, reconnecting");
        self.connect().await
    }

    fn record_response(&mut self, data: &Bytes) {
        self.last_response = Some(LastResponse {
            data: data.clone(),
            received_at: Utc::now(),
        });
    }

    /// Frame for an open/close under the configured framing mode.
    fn lock_frame(
        &self,
        device_id: DeviceId,
        command: LockCommand,
        auto_reclose: bool,
    ) -> CommandFrame {
        match self.config.framing {
            FramingMode::Legacy => {
                if auto_reclose {
                    warn!("Legacy framing has no auto-reclose; sending a plain {command}");
                }
                if device_id != self.config.device_id {
                    warn!(%device_id, "Legacy framing carries no device address; ignoring it");
                }
                build_legacy_frame(command, self.config.append_terminator)
            }
            FramingMode::Structured => {
                let param = if auto_reclose && command == LockCommand::Open {
                    PARAM_AUTO_RECLOSE
                } else {
                    PARAM_MANUAL
                };
                build_structured_frame(device_id, command, param)
            }
        }
    }

    async fn send_command(&mut self, frame: CommandFrame) -> Result<CommandOutcome> {
        self.ensure_connected().await?;

        match self.exchange.execute(&mut self.transport, &frame).await? {
            ExchangeOutcome::Response(data) => {
                debug!(frame = %frame.kind(), reply = %format_hex(&data), "Command acknowledged");
                self.record_response(&data);
                Ok(CommandOutcome {
                    frame,
                    reply: Some(data),
                })
            }
            ExchangeOutcome::TimedOut if self.config.require_reply => {
                warn!(frame = %frame.kind(), "No reply to command");
                Err(DoorLockError::timeout(self.config.response_timeout_ms))
            }
            ExchangeOutcome::TimedOut => {
                debug!(frame = %frame.kind(), "No reply to command (not required)");
                Ok(CommandOutcome { frame, reply: None })
            }
        }
    }

    /// Unlock the door.
    ///
    /// With `auto_reclose` the controller re-locks after 5 seconds if the
    /// door is not opened (structured framing only).
    pub async fn try_open_lock(
        &mut self,
        device_id: DeviceId,
        auto_reclose: bool,
    ) -> Result<CommandOutcome> {
        let frame = self.lock_frame(device_id, LockCommand::Open, auto_reclose);
        self.send_command(frame).await
    }

    pub async fn try_close_lock(&mut self, device_id: DeviceId) -> Result<CommandOutcome> {
        let frame = self.lock_frame(device_id, LockCommand::Close, false);
        self.send_command(frame).await
    }

    /// Send a hex command unmodified.
    ///
    /// # Errors
    ///
    /// `MalformedInput` before any I/O if `hex` is not valid hex of even
    /// length.
    pub async fn try_send_raw(&mut self, hex: &str) -> Result<CommandOutcome> {
        let frame = build_raw_frame(hex)?;
        self.send_command(frame).await
    }

    /// Query lock and door state.
    ///
    /// Status queries always use the structured frame, whatever the framing
    /// mode.
    ///
    /// # Errors
    ///
    /// `Timeout` when nothing arrives, `ParseAmbiguous` when the reply
    /// matches no known framing, plus connect/write/transport failures.
    pub async fn try_query_status(&mut self, device_id: DeviceId) -> Result<LockStatus> {
        self.ensure_connected().await?;

        let frame = build_status_query_frame(device_id);
        let data = match self.exchange.execute(&mut self.transport, &frame).await? {
            ExchangeOutcome::Response(data) if !data.is_empty() => data,
            _ => return Err(DoorLockError::timeout(self.config.response_timeout_ms)),
        };
        self.record_response(&data);

        self.status_from(device_id, &data)
    }

    /// Wait up to `timeout` for a status reply the controller sends on its
    /// own, without writing anything.
    pub async fn try_listen_status(&mut self, timeout: Duration) -> Result<LockStatus> {
        self.ensure_connected().await?;

        let data = match self.exchange.listen(&mut self.transport, timeout).await? {
            ExchangeOutcome::Response(data) if !data.is_empty() => data,
            _ => return Err(DoorLockError::timeout(timeout.as_millis() as u64)),
        };
        self.record_response(&data);

        self.status_from(self.config.device_id, &data)
    }

    fn status_from(&self, device_id: DeviceId, data: &[u8]) -> Result<LockStatus> {
        match parse_status_response(data) {
            ParsedStatus::Matched(m) => {
                if let Some(echoed) = m.device.filter(|d| *d != device_id.as_u8()) {
                    warn!(%device_id, echoed, "Status reply carries another device address");
                }
                debug!(code = %m.code, framing = %m.framing, offset = m.offset, "Status decoded");
                Ok(lock_status_for_code(&m.code).with_raw_hex(encode_hex(data)))
            }
            ParsedStatus::Unparsed { raw_hex } => Err(DoorLockError::ParseAmbiguous { raw_hex }),
        }
    }

    /// Unlock the door. True when the command went out without a transport
    /// error; a reply is only required when `require_reply` is set.
    pub async fn open_lock(&mut self, device_id: DeviceId, auto_reclose: bool) -> bool {
        report("open_lock", self.try_open_lock(device_id, auto_reclose).await)
    }

    /// Lock the door. Same result rules as [`open_lock`](Self::open_lock).
    pub async fn close_lock(&mut self, device_id: DeviceId) -> bool {
        report("close_lock", self.try_close_lock(device_id).await)
    }

    /// Send a hex command unmodified. False for malformed hex (nothing is
    /// sent) or a transport error.
    pub async fn send_raw(&mut self, hex: &str) -> bool {
        report("send_raw", self.try_send_raw(hex).await)
    }

    /// Query lock and door state. Never fails: no reply or an unrecognized
    /// reply yields an unknown status.
    pub async fn query_status(&mut self, device_id: DeviceId) -> LockStatus {
        soften(self.try_query_status(device_id).await)
    }

    /// Passive counterpart of [`query_status`](Self::query_status).
    pub async fn listen_status(&mut self, timeout: Duration) -> LockStatus {
        soften(self.try_listen_status(timeout).await)
    }
}

impl<T: Transport> Drop for DeviceController<T> {
    fn drop(&mut self) {
        if self.transport.is_open() {
            debug!(port = %self.config.port, "Dropping connected lock controller");
        }
    }
}

fn report(operation: &str, result: Result<CommandOutcome>) -> bool {
    match result {
        Ok(_) => true,
        Err(DoorLockError::MalformedInput(message)) => {
            warn!(operation, %message, "Rejected malformed command");
            false
        }
        Err(e) => {
            error!(operation, error = %e, "Command failed");
            false
        }
    }
}

fn soften(result: Result<LockStatus>) -> LockStatus {
    match result {
        Ok(status) => status,
        Err(DoorLockError::Timeout { timeout_ms }) => {
            warn!(timeout_ms, "No status reply");
            LockStatus::unknown("No reply from controller")
        }
        Err(DoorLockError::ParseAmbiguous { raw_hex }) => {
            warn!(raw = %raw_hex, "Unrecognized status reply");
            ParsedStatus::Unparsed { raw_hex }.into_lock_status()
        }
        Err(e) => {
            error!(error = %e, "Status query failed");
            LockStatus::unknown(format!("Status query failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlock_core::{DoorState, LockState};
    use doorlock_transport::{MockTransport, MockTransportHandle};
    use rstest::rstest;

    fn mock_controller(config: ConnectionConfig) -> (DeviceController, MockTransportHandle) {
        let (mock, handle) = MockTransport::new();
        (
            DeviceController::with_transport(config, AnyTransport::from(mock)),
            handle,
        )
    }

    fn device(id: u8) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    #[rstest]
    #[case(false, vec![0x10, 0x02, 0x05, 0x1B, 0x31, 0xFF, 0x10, 0x03])]
    #[case(true, vec![0x10, 0x02, 0x05, 0x1B, 0x31, 0x31, 0x10, 0x03])]
    #[tokio::test(start_paused = true)]
    async fn test_open_structured(#[case] auto_reclose: bool, #[case] expected: Vec<u8>) {
        let (mut controller, handle) = mock_controller(ConnectionConfig::new("COM2"));

        assert!(controller.open_lock(device(5), auto_reclose).await);
        assert_eq!(handle.last_written(), Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_legacy_with_terminator() {
        let config = ConnectionConfig::new("COM2")
            .with_framing(FramingMode::Legacy)
            .with_append_terminator(true);
        let (mut controller, handle) = mock_controller(config);

        assert!(controller.close_lock(device(9)).await);
        assert_eq!(handle.last_written(), Some(vec![0x00, 0x00, 0x00, 0x00, 0x0D]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_ignores_auto_reclose() {
        let config = ConnectionConfig::new("COM2").with_framing(FramingMode::Legacy);
        let (mut controller, handle) = mock_controller(config);

        assert!(controller.open_lock(DeviceId::default(), true).await);
        assert_eq!(handle.last_written(), Some(vec![0x01, 0x00, 0x00, 0x00]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_query_always_structured() {
        let config = ConnectionConfig::new("COM2").with_framing(FramingMode::Legacy);
        let (mut controller, handle) = mock_controller(config);
        handle.queue_reply(vec![0x01, b'1', b'0', 0x10, 0x03]);

        let status = controller.query_status(device(2)).await;

        assert_eq!(
            handle.last_written(),
            Some(vec![0x10, 0x02, 0x02, 0x1C, 0xFF, 0x00, 0x10, 0x03])
        );
        assert_eq!(status.lock_state, LockState::Unlocked);
        assert_eq!(status.door_state, DoorState::Open);
        assert_eq!(status.raw_hex.as_deref(), Some("0131301003"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_require_reply() {
        let config = ConnectionConfig::new("COM2").with_require_reply(true);
        let (mut controller, _handle) = mock_controller(config);

        let err = controller
            .try_open_lock(DeviceId::default(), false)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!controller.open_lock(DeviceId::default(), false).await);
    }

    #[tokio::test]
    async fn test_last_response_recorded() {
        let (mut controller, handle) = mock_controller(ConnectionConfig::new("COM2"));
        handle.queue_reply(vec![0x06]);

        let outcome = controller
            .try_close_lock(DeviceId::default())
            .await
            .unwrap();

        assert!(outcome.replied());
        let last = controller.last_response().unwrap();
        assert_eq!(last.to_hex(), "06");
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let err = DeviceController::new(ConnectionConfig::new("")).unwrap_err();
        assert!(matches!(err, DoorLockError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_connect_when_open_keeps_port() {
        let (mut controller, handle) = mock_controller(ConnectionConfig::new("COM2"));
        controller.connect().await.unwrap();
        handle.inject(&[0x06]);

        controller.connect().await.unwrap();

        assert_eq!(handle.open_count(), 1);
        assert_eq!(handle.close_count(), 0);
        assert_eq!(handle.unread(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces() {
        let (mut controller, handle) = mock_controller(ConnectionConfig::new("COM7"));
        handle.fail_next_open("port in use");

        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, DoorLockError::ConnectFailed { .. }));
        assert!(!controller.is_connected());
    }
}

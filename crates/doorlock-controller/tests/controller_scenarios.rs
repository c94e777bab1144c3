//! End-to-end controller behavior against the mock transport.

use doorlock_controller::{DeviceController, DoorLockError, ExchangeState, SharedController};
use doorlock_core::{ConnectionConfig, DeviceId, DoorState, FramingMode, IoModel, LockState};
use doorlock_transport::{AnyTransport, MockTransport, MockTransportHandle};
use rstest::rstest;
use std::time::Duration;

fn controller_with(config: ConnectionConfig) -> (DeviceController, MockTransportHandle) {
    let (mock, handle) = MockTransport::new();
    (
        DeviceController::with_transport(config, AnyTransport::from(mock)),
        handle,
    )
}

fn controller() -> (DeviceController, MockTransportHandle) {
    controller_with(ConnectionConfig::new("COM2"))
}

#[tokio::test(start_paused = true)]
async fn test_repeated_timeouts_leave_no_waits_behind() {
    let (mut controller, handle) = controller();

    for _ in 0..100 {
        let status = controller.query_status(DeviceId::default()).await;
        assert_eq!(status.lock_state, LockState::Unknown);
        assert_eq!(status.description, "No reply from controller");
        assert_eq!(controller.pending_waits(), 0);
        assert_eq!(controller.exchange_state(), ExchangeState::Idle);
    }

    assert_eq!(handle.written_frames().len(), 100);
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.pending_waits(), 0);
}

#[tokio::test]
async fn test_malformed_raw_sends_nothing() {
    let (mut controller, handle) = controller();

    let err = controller.try_send_raw("ZZ").await.unwrap_err();
    assert!(matches!(err, DoorLockError::MalformedInput(_)));
    assert!(!controller.send_raw("1002A").await);

    assert_eq!(handle.open_count(), 0);
    assert!(handle.written_frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_raw_bytes_sent_unmodified() {
    let config = ConnectionConfig::new("COM2")
        .with_framing(FramingMode::Legacy)
        .with_append_terminator(true);
    let (mut controller, handle) = controller_with(config);

    assert!(controller.send_raw("10 02 01 1b 31 ff 10 03").await);
    assert_eq!(
        handle.last_written(),
        Some(vec![0x10, 0x02, 0x01, 0x1B, 0x31, 0xFF, 0x10, 0x03])
    );
}

#[tokio::test]
async fn test_write_failure_reported() {
    let (mut controller, handle) = controller();
    controller.connect().await.unwrap();
    handle.fail_next_write("device not configured");

    let err = controller
        .try_open_lock(DeviceId::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DoorLockError::WriteFailed(_)));
    assert_eq!(controller.pending_waits(), 0);

    handle.fail_next_write("device not configured");
    assert!(!controller.close_lock(DeviceId::default()).await);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_unplug() {
    let (mut controller, handle) = controller();
    assert!(controller.close_lock(DeviceId::default()).await);

    handle.unplug();
    assert!(!controller.is_connected());

    assert!(controller.close_lock(DeviceId::default()).await);
    assert_eq!(handle.open_count(), 2);
    assert_eq!(handle.written_frames().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_then_recovery() {
    let (mut controller, handle) = controller();
    handle.fail_next_open("Access denied");

    let err = controller
        .try_query_status(DeviceId::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DoorLockError::ConnectFailed { ref port, .. } if port == "COM2"));

    handle.queue_reply(vec![0x01u8, b'0', b'0', 0x10, 0x03]);
    let status = controller.query_status(DeviceId::default()).await;
    assert_eq!(status.lock_state, LockState::Unlocked);
    assert_eq!(handle.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_soft_status() {
    let (mut controller, handle) = controller();
    handle.fail_next_open("No such file or directory");

    let status = controller.query_status(DeviceId::default()).await;
    assert_eq!(status.lock_state, LockState::Unknown);
    assert!(status.description.starts_with("Status query failed"));
}

#[tokio::test]
async fn test_reconfigure_reopens_with_new_settings() {
    let (mut controller, handle) = controller();
    controller.connect().await.unwrap();

    let next = ConnectionConfig::new("COM5")
        .with_baud_rate(19200)
        .with_io_model(IoModel::Polled);
    controller.reconfigure(next).await.unwrap();

    let opened = handle.opened_with().unwrap();
    assert_eq!(opened.port, "COM5");
    assert_eq!(opened.baud_rate, 19200);
    assert_eq!(handle.open_count(), 2);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(controller.config().port, "COM5");
}

#[tokio::test]
async fn test_reconfigure_rejects_invalid_config() {
    let (mut controller, handle) = controller();
    controller.connect().await.unwrap();

    let err = controller
        .reconfigure(ConnectionConfig::new("COM5").with_baud_rate(0))
        .await
        .unwrap_err();
    assert!(matches!(err, DoorLockError::Protocol(_)));
    assert_eq!(controller.config().port, "COM2");
    assert!(controller.is_connected());
    assert_eq!(handle.close_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_frames() {
    let config = ConnectionConfig::new("COM2")
        .with_framing(FramingMode::Legacy)
        .with_append_terminator(true);
    let (mut controller, handle) = controller_with(config);

    assert!(controller.open_lock(DeviceId::default(), false).await);
    assert!(controller.close_lock(DeviceId::default()).await);

    assert_eq!(
        handle.written_frames(),
        vec![
            vec![0x01, 0x00, 0x00, 0x00, 0x0D],
            vec![0x00, 0x00, 0x00, 0x00, 0x0D],
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_auto_reclose_frame() {
    let (mut controller, handle) = controller();

    assert!(controller.open_lock(DeviceId::default(), true).await);
    assert_eq!(
        handle.last_written(),
        Some(vec![0x10, 0x02, 0x01, 0x1B, 0x31, 0x31, 0x10, 0x03])
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_without_reply_is_success_by_default() {
    let (mut controller, _handle) = controller();

    let outcome = controller
        .try_open_lock(DeviceId::default(), false)
        .await
        .unwrap();
    assert!(!outcome.replied());
    assert!(controller.last_response().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_require_reply_turns_silence_into_timeout() {
    let (mut controller, handle) = controller_with(
        ConnectionConfig::new("COM2")
            .with_require_reply(true)
            .with_response_timeout(Duration::from_millis(250)),
    );

    let err = controller
        .try_close_lock(DeviceId::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DoorLockError::Timeout { timeout_ms: 250 }));

    handle.queue_reply(vec![0x06u8]);
    assert!(controller.close_lock(DeviceId::default()).await);
}

#[rstest]
#[case(b"00", LockState::Unlocked, DoorState::Closed, "Unlocked (door closed)")]
#[case(b"01", LockState::Locked, DoorState::Closed, "Locked (door closed)")]
#[case(b"10", LockState::Unlocked, DoorState::Open, "Door open")]
#[case(b"42", LockState::Unknown, DoorState::Unknown, "Unknown status code: 42")]
#[tokio::test]
async fn test_status_codes(
    #[case] code: &[u8; 2],
    #[case] lock: LockState,
    #[case] door: DoorState,
    #[case] description: &str,
) {
    let (mut controller, handle) = controller();
    handle.queue_reply(vec![0x01, code[0], code[1], 0x10, 0x03]);

    let status = controller.query_status(DeviceId::default()).await;

    assert_eq!(status.lock_state, lock);
    assert_eq!(status.door_state, door);
    assert_eq!(status.description, description);
    assert_eq!(
        status.raw_hex.as_deref(),
        Some(format!("01{:02x}{:02x}1003", code[0], code[1]).as_str())
    );
}

#[tokio::test]
async fn test_stx_marker_status() {
    let (mut controller, handle) = controller();
    handle.queue_reply(vec![0xFF, 0x02, b'S', 0x03, b'0', b'1', 0x10, 0x03]);

    let status = controller
        .try_query_status(DeviceId::new(3).unwrap())
        .await
        .unwrap();
    assert_eq!(status.lock_state, LockState::Locked);
}

#[tokio::test]
async fn test_unparsed_reply() {
    let (mut controller, handle) = controller();
    handle.queue_reply(vec![0xAAu8, 0xBB]);
    handle.queue_reply(vec![0xAAu8, 0xBB]);

    let err = controller
        .try_query_status(DeviceId::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DoorLockError::ParseAmbiguous { ref raw_hex } if raw_hex == "aabb"));

    let status = controller.query_status(DeviceId::default()).await;
    assert_eq!(status.lock_state, LockState::Unknown);
    assert_eq!(status.raw_hex.as_deref(), Some("aabb"));
    assert_eq!(status.description, "Unparsed reply (raw: aabb)");
}

#[tokio::test]
async fn test_last_response_tracks_latest_reply() {
    let (mut controller, handle) = controller();
    handle.queue_reply(vec![0x06u8]);
    handle.queue_reply(vec![0x01u8, b'1', b'0', 0x10, 0x03]);

    assert!(controller.open_lock(DeviceId::default(), false).await);
    let first = controller.last_response().unwrap().clone();
    assert_eq!(first.to_hex(), "06");

    controller.query_status(DeviceId::default()).await;
    let second = controller.last_response().unwrap();
    assert_eq!(second.to_hex(), "01 31 30 10 03");
    assert!(second.received_at >= first.received_at);
}

#[tokio::test]
async fn test_stale_input_discarded_before_command() {
    let (mut controller, handle) = controller();
    controller.connect().await.unwrap();
    handle.inject(&[0x01, b'0', b'1', 0x10, 0x03]);
    handle.queue_reply(vec![0x01u8, b'0', b'0', 0x10, 0x03]);

    let status = controller.query_status(DeviceId::default()).await;
    assert_eq!(status.lock_state, LockState::Unlocked);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_query_is_reaped() {
    let (mut controller, handle) = controller();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        controller.query_status(DeviceId::default()),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(controller.pending_waits(), 1);
    assert_ne!(controller.exchange_state(), ExchangeState::Idle);

    handle.queue_reply(vec![0x01u8, b'0', b'1', 0x10, 0x03]);
    let status = controller.query_status(DeviceId::default()).await;

    assert_eq!(status.lock_state, LockState::Locked);
    assert_eq!(controller.pending_waits(), 0);
    assert_eq!(controller.exchange_state(), ExchangeState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_listen_picks_up_unsolicited_status() {
    let (mut controller, handle) = controller();
    controller.connect().await.unwrap();
    handle.inject(&[0x01, b'1', b'0', 0x10, 0x03]);

    let status = controller.listen_status(Duration::from_millis(100)).await;
    assert_eq!(status.door_state, DoorState::Open);
    assert!(handle.written_frames().is_empty());

    let quiet = controller.listen_status(Duration::from_millis(100)).await;
    assert_eq!(quiet.lock_state, LockState::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_shared_controller_serializes_callers() {
    let (mock, handle) = MockTransport::new();
    let shared = SharedController::new(DeviceController::with_transport(
        ConnectionConfig::new("COM2"),
        AnyTransport::from(mock),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            tokio::spawn(async move { shared.query_status(DeviceId::default()).await })
        })
        .collect();

    for task in tasks {
        let status = task.await.unwrap();
        assert_eq!(status.lock_state, LockState::Unknown);
    }

    assert_eq!(handle.written_frames().len(), 8);
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.pending_waits(), 0);
}

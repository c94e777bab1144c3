//! Cloneable handle for sharing one controller between tasks.
//!
//! Callers are serialized on an async mutex, so at most one exchange is in
//! flight on the serial line. A caller whose future is dropped while holding
//! the lock releases it; the next caller reaps the abandoned exchange.

use crate::controller::{CommandOutcome, DeviceController};
use crate::error::Result;
use doorlock_core::{ConnectionConfig, DeviceId, LockStatus};
use doorlock_transport::{AnyTransport, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Shared, serialized access to a [`DeviceController`].
pub struct SharedController<T: Transport = AnyTransport> {
    inner: Arc<Mutex<DeviceController<T>>>,
}

impl<T: Transport> SharedController<T> {
    pub fn new(controller: DeviceController<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Exclusive access for a sequence of operations.
    pub async fn lock(&self) -> MutexGuard<'_, DeviceController<T>> {
        self.inner.lock().await
    }

    pub async fn connect(&self) -> Result<()> {
        self.lock().await.connect().await
    }

    pub async fn disconnect(&self) {
        self.lock().await.disconnect().await;
    }

    pub async fn reconfigure(&self, config: ConnectionConfig) -> Result<()> {
        self.lock().await.reconfigure(config).await
    }

    pub async fn open_lock(&self, device_id: DeviceId, auto_reclose: bool) -> bool {
        self.lock().await.open_lock(device_id, auto_reclose).await
    }

    pub async fn close_lock(&self, device_id: DeviceId) -> bool {
        self.lock().await.close_lock(device_id).await
    }

    pub async fn query_status(&self, device_id: DeviceId) -> LockStatus {
        self.lock().await.query_status(device_id).await
    }

    pub async fn send_raw(&self, hex: &str) -> bool {
        self.lock().await.send_raw(hex).await
    }

    pub async fn try_open_lock(
        &self,
        device_id: DeviceId,
        auto_reclose: bool,
    ) -> Result<CommandOutcome> {
        self.lock().await.try_open_lock(device_id, auto_reclose).await
    }

    pub async fn try_close_lock(&self, device_id: DeviceId) -> Result<CommandOutcome> {
        self.lock().await.try_close_lock(device_id).await
    }

    pub async fn try_query_status(&self, device_id: DeviceId) -> Result<LockStatus> {
        self.lock().await.try_query_status(device_id).await
    }

    pub async fn listen_status(&self, timeout: Duration) -> LockStatus {
        self.lock().await.listen_status(timeout).await
    }
}

impl<T: Transport> Clone for SharedController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> From<DeviceController<T>> for SharedController<T> {
    fn from(controller: DeviceController<T>) -> Self {
        Self::new(controller)
    }
}

impl<T: Transport> fmt::Debug for SharedController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedController")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

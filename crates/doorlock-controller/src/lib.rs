//! Door lock controller driver.
//!
//! Ties the protocol layer (frame building, reply parsing) to a serial
//! transport and runs one request/reply exchange at a time against the lock
//! controller.
//!
//! - [`DeviceController`]: open, close, status, raw commands for one port.
//! - [`SharedController`]: cloneable handle serializing concurrent callers.
//! - [`ExchangeCoordinator`]: the purge/arm/write/wait/read sequence.
//!
//! # Examples
//!
//! ```no_run
//! use doorlock_controller::DeviceController;
//! use doorlock_core::{ConnectionConfig, DeviceId};
//!
//! #[tokio::main]
//! async fn main() -> doorlock_controller::Result<()> {
//!     let mut controller = DeviceController::new(ConnectionConfig::new("/dev/ttyUSB0"))?;
//!     controller.connect().await?;
//!
//!     let status = controller.query_status(DeviceId::default()).await;
//!     println!("{status}");
//!
//!     controller.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod error;
pub mod exchange;
pub mod shared;

pub use controller::{CommandOutcome, DeviceController, LastResponse};
pub use error::{DoorLockError, Result};
pub use exchange::{ExchangeCoordinator, ExchangeOutcome, ExchangeState};
pub use shared::SharedController;

//! Serial transport layer for the door lock controller.
//!
//! This crate owns the serial handle. It writes command bytes, waits (with a
//! bound) for reply data, and drains whatever arrived. It knows nothing about
//! frames or status codes; that lives in `doorlock-protocol`.
//!
//! # Transports
//!
//! - [`PolledTransport`]: synchronous `serialport` handle, readiness checked
//!   on a timer.
//! - [`EventTransport`]: `tokio-serial` stream, a reader task signals
//!   arrivals through a `watch` channel.
//! - [`MockTransport`]: scripted replies and failures for tests.
//!
//! [`AnyTransport`] dispatches over all three and is what the controller
//! holds by default.
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`] with [`TransportError`]. Nothing is
//! retried here.

pub mod devices;
pub mod error;
pub mod event;
pub mod mock;
pub mod polled;
pub mod ports;
pub mod traits;

pub use devices::AnyTransport;
pub use error::{Result, TransportError};
pub use event::{EventTransport, SerialIo, StreamOpener};
pub use mock::{MockTransport, MockTransportHandle};
pub use polled::{LineOpener, PolledTransport, SerialLine};
pub use ports::{PortInfo, list_ports};
pub use traits::Transport;

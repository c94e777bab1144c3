//! Exchange coordinator: one command, one bounded wait for a reply.
//!
//! # States
//!
//! - `Idle`: no exchange in flight
//! - `BufferPurged`: stale input discarded
//! - `WaitArmed`: transport is watching for arrivals
//! - `Written`: command on the wire, waiting for data
//! - `ResponseReady`: reply bytes read
//! - `TimedOut`: nothing arrived within the response timeout
//!
//! # Valid Transitions
//!
//! - Idle → BufferPurged → WaitArmed → Written → ResponseReady/TimedOut → Idle
//! - Idle → WaitArmed → ResponseReady/TimedOut (passive listen, nothing written)
//! - any state → Idle (abort)
//!
//! # Late Replies
//!
//! The wire protocol has no sequence numbers. A reply that arrives after its
//! exchange timed out is indistinguishable from a reply to the next command.
//! The coordinator purges the receive buffer before every command, which
//! drops replies that are already late by then, but a reply landing after the
//! purge is attributed to the new command. This is a protocol-level race and
//! is not resolved here.

use crate::error::{DoorLockError, Result};
use bytes::Bytes;
use doorlock_core::Error;
use doorlock_protocol::{CommandFrame, format_hex};
use doorlock_transport::Transport;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Phase of the exchange in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    Idle,
    BufferPurged,
    WaitArmed,
    Written,
    ResponseReady,
    TimedOut,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeState::Idle => "Idle",
            ExchangeState::BufferPurged => "BufferPurged",
            ExchangeState::WaitArmed => "WaitArmed",
            ExchangeState::Written => "Written",
            ExchangeState::ResponseReady => "ResponseReady",
            ExchangeState::TimedOut => "TimedOut",
        };
        write!(f, "{s}")
    }
}

impl ExchangeState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorlock_controller::ExchangeState;
    ///
    /// assert!(ExchangeState::Idle.can_transition_to(&ExchangeState::BufferPurged));
    /// assert!(!ExchangeState::Idle.can_transition_to(&ExchangeState::Written));
    /// assert!(ExchangeState::Written.can_transition_to(&ExchangeState::Idle));
    /// ```
    pub fn can_transition_to(&self, target: &ExchangeState) -> bool {
        use ExchangeState::*;

        matches!(
            (self, target),
            (Idle, BufferPurged | WaitArmed)
                | (BufferPurged, WaitArmed)
                | (WaitArmed, Written | ResponseReady | TimedOut)
                | (Written, ResponseReady | TimedOut)
                | (BufferPurged | WaitArmed | Written | ResponseReady | TimedOut, Idle)
        )
    }
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Bytes read after the transport signalled data. May hold a partial
    /// reply; only one read is attempted.
    Response(Bytes),
    /// The response timeout elapsed with nothing to read.
    TimedOut,
}

impl ExchangeOutcome {
    pub fn response(&self) -> Option<&Bytes> {
        match self {
            ExchangeOutcome::Response(data) => Some(data),
            ExchangeOutcome::TimedOut => None,
        }
    }
}

/// Sequences purge, arm, write, wait and read for one command.
///
/// Taking `&mut self` for the whole exchange means two exchanges can never
/// overlap on the same coordinator.
#[derive(Debug)]
pub struct ExchangeCoordinator {
    state: ExchangeState,
    response_timeout: Duration,
    read_capacity: usize,
}

impl ExchangeCoordinator {
    pub fn new(response_timeout: Duration, read_capacity: usize) -> Self {
        Self {
            state: ExchangeState::Idle,
            response_timeout,
            read_capacity,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    fn transition_to(&mut self, target: ExchangeState) -> Result<()> {
        if !self.state.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            }
            .into());
        }
        trace!(from = %self.state, to = %target, "Exchange transition");
        self.state = target;
        Ok(())
    }

    /// Retire whatever an abandoned exchange left behind and return to
    /// `Idle`.
    ///
    /// An exchange future dropped mid-flight (for example by a caller-side
    /// timeout) leaves the coordinator outside `Idle` and the transport wait
    /// armed.
    pub fn reset<T: Transport>(&mut self, transport: &mut T) {
        if self.state != ExchangeState::Idle || transport.pending_waits() > 0 {
            warn!(
                state = %self.state,
                pending_waits = transport.pending_waits(),
                "Reaping abandoned exchange"
            );
        }
        self.finish(transport);
    }

    /// Retire any armed wait and return to `Idle`.
    fn finish<T: Transport>(&mut self, transport: &mut T) {
        if transport.pending_waits() > 0 {
            transport.cancel_read_wait();
        }
        if self.state != ExchangeState::Idle {
            trace!(from = %self.state, "Exchange finished");
            self.state = ExchangeState::Idle;
        }
    }

    /// Run one command exchange.
    ///
    /// A timeout is a normal outcome, not an error. A write failure is
    /// reported as [`DoorLockError::WriteFailed`] without waiting. The
    /// coordinator is back in `Idle` when this returns.
    pub async fn execute<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &CommandFrame,
    ) -> Result<ExchangeOutcome> {
        self.reset(transport);
        let outcome = self.run(transport, frame).await;
        self.finish(transport);
        outcome
    }

    /// Wait for bytes the controller sends without being asked.
    ///
    /// Nothing is purged or written.
    pub async fn listen<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<ExchangeOutcome> {
        self.reset(transport);
        let outcome = self.run_listen(transport, timeout).await;
        self.finish(transport);
        outcome
    }

    async fn run_listen<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<ExchangeOutcome> {
        transport.arm_read_wait()?;
        self.transition_to(ExchangeState::WaitArmed)?;
        self.await_reply(transport, timeout).await
    }

    async fn run<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &CommandFrame,
    ) -> Result<ExchangeOutcome> {
        let discarded = transport.purge_receive_buffer()?;
        if discarded > 0 {
            debug!(discarded, "Purged stale input before command");
        }
        self.transition_to(ExchangeState::BufferPurged)?;

        transport.arm_read_wait()?;
        self.transition_to(ExchangeState::WaitArmed)?;

        debug!(frame = %frame.kind(), bytes = %frame.to_hex(), "Writing command");
        if let Err(e) = transport.write(frame.as_bytes()).await {
            error!(frame = %frame.kind(), error = %e, "Command write failed");
            transport.cancel_read_wait();
            return Err(DoorLockError::WriteFailed(e));
        }
        self.transition_to(ExchangeState::Written)?;

        self.await_reply(transport, self.response_timeout).await
    }

    async fn await_reply<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<ExchangeOutcome> {
        if transport.wait_for_readable(timeout).await? {
            let data = transport.read(self.read_capacity)?;
            self.transition_to(ExchangeState::ResponseReady)?;
            trace!(bytes = %format_hex(&data), len = data.len(), "Reply received");
            Ok(ExchangeOutcome::Response(data))
        } else {
            transport.cancel_read_wait();
            self.transition_to(ExchangeState::TimedOut)?;
            debug!(timeout_ms = timeout.as_millis() as u64, "No reply within timeout");
            Ok(ExchangeOutcome::TimedOut)
        }
    }
}

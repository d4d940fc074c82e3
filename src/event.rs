//! Structured lifecycle events for monitoring pool behavior, modeled on this codebase's own
//! connection-pool event surface. Installing a handler is optional; by default the pool emits
//! nothing but `tracing` spans.

use std::time::Duration;

/// Event emitted when a pool is constructed.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PoolCreatedEvent {
    /// The pool's address, as configured in its credentials.
    pub address: String,
}

/// Event emitted when a checkout begins.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CheckoutStartedEvent {
    /// The pool's address.
    pub address: String,
}

/// Event emitted when a checkout succeeds.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CheckedOutEvent {
    /// The pool's address.
    pub address: String,
    /// The id of the connection that was checked out.
    pub connection_id: u64,
    /// How long the whole checkout attempt took, from the first call to the algorithm to success.
    pub duration: Duration,
    /// Whether this checkout reclaimed an overdue lease rather than reusing or creating one.
    pub reclaimed: bool,
}

/// Event emitted when a checkout attempt fails outright.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CheckoutFailedEvent {
    /// The pool's address.
    pub address: String,
    /// A human-readable reason for the failure.
    pub reason: String,
}

/// Event emitted when a lease is returned to the pool.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CheckedInEvent {
    /// The pool's address.
    pub address: String,
    /// The id of the connection that was checked in.
    pub connection_id: u64,
    /// Whether the connection was re-parked in the idle list (`false` means it was hard-closed).
    pub reparked: bool,
}

/// Event emitted when a raw connection is closed by the pool, for any reason.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ConnectionClosedEvent {
    /// The pool's address.
    pub address: String,
    /// The id of the connection that was closed.
    pub connection_id: u64,
    /// Why the connection was closed.
    pub reason: ConnectionClosedReason,
}

/// The reason a raw connection was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionClosedReason {
    /// The idle list was already at capacity when the connection was returned.
    IdleListFull,
    /// The handle's type code no longer matched the pool's credentials.
    StaleTypeCode,
    /// The connection failed its liveness check.
    Unhealthy,
    /// The whole pool was force-closed (reconfiguration or shutdown).
    PoolClosed,
}

/// Event emitted when `force_close_all` runs.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PoolClearedEvent {
    /// The pool's address.
    pub address: String,
    /// The pool's generation after this clear.
    pub generation: u64,
}

/// Receives structured events describing a pool's lifecycle. All methods have a default no-op
/// implementation, so a handler only needs to implement the events it cares about.
pub trait PoolEventHandler: Send + Sync {
    /// A pool was created.
    fn handle_pool_created(&self, _event: PoolCreatedEvent) {}
    /// A checkout attempt started.
    fn handle_checkout_started(&self, _event: CheckoutStartedEvent) {}
    /// A checkout attempt succeeded.
    fn handle_checked_out(&self, _event: CheckedOutEvent) {}
    /// A checkout attempt failed outright.
    fn handle_checkout_failed(&self, _event: CheckoutFailedEvent) {}
    /// A lease was returned.
    fn handle_checked_in(&self, _event: CheckedInEvent) {}
    /// A raw connection was closed.
    fn handle_connection_closed(&self, _event: ConnectionClosedEvent) {}
    /// The pool was cleared (reconfigured).
    fn handle_pool_cleared(&self, _event: PoolClearedEvent) {}
}

//! The raw connection and factory contracts the pool depends on. Everything beyond these two
//! traits — the SQL mapper, dynamic-SQL assembly, result mapping, and so on — is an external
//! collaborator the pool never sees.

use std::fmt::Debug;

use crate::error::Result;

/// The capability set a raw transport connection must expose so the pool can manage its
/// lifecycle. Callers reach the rest of the connection's native API (queries, statements, whatever
/// the driver offers) through [`crate::LeaseProxy::with_raw`], which hands `f` a `&mut R`
/// directly — there is no need for this trait to enumerate query methods the pool itself never
/// calls.
pub trait RawConnection: Send + Debug {
    /// A stable identity for this connection, used to derive the lease proxy's equality/hash and
    /// for diagnostics. Two distinct raw connections must never report the same id while both are
    /// live.
    fn id(&self) -> u64;

    /// Whether the underlying transport reports itself closed.
    fn is_closed(&self) -> bool;

    /// Whether the connection is currently in auto-commit mode.
    fn auto_commit(&self) -> bool;

    /// Rolls back any open transaction. Failures here are recovered locally by the pool and never
    /// surfaced to callers.
    fn rollback(&mut self) -> Result<()>;

    /// Closes the underlying transport. Idempotent: closing an already-closed connection must not
    /// error.
    fn close(&mut self) -> Result<()>;

    /// Executes the configured ping query and returns whether the probe succeeded. A probe that
    /// throws, or that observes a closed transport, must return `Ok(false)` rather than
    /// propagating — the health checker treats a failed probe as "discard this connection", not as
    /// an error to surface.
    fn ping(&mut self, query: &str) -> Result<bool>;
}

/// Produces fresh raw connections on demand. The pool never retries at this layer: a factory
/// failure surfaces immediately as [`crate::Error::CheckoutFailed`].
pub trait ConnectionFactory: Send + Sync {
    /// The concrete raw connection type this factory produces.
    type Connection: RawConnection;

    /// Produces a fresh transport connection, or fails.
    fn create(&self) -> Result<Self::Connection>;
}

//! `LeaseProxy`: the caller-facing wrapper around a raw connection.
//!
//! Access to the wrapped connection goes through [`LeaseProxy::with_raw`] rather than a blanket
//! `Deref`, because a lease can be invalidated — and its raw connection repossessed — by
//! *another* thread (an overdue reclaim or a reconfiguration) while the lessee still holds the
//! proxy; an infallible `Deref` could not surface [`Error::LeaseInvalid`] in that case. `close` is
//! an inherent method, so it shadows anything the wrapped connection type itself might call
//! `close`, and it is idempotent: a second call observes the raw connection already taken and is a
//! silent no-op.

use std::{
    hash::{Hash, Hasher},
    sync::{atomic::Ordering, Arc},
    time::Instant,
};

use crate::{
    error::{Error, Result},
    factory::ConnectionFactory,
    handle::ConnSlot,
    pool::PoolInner,
};

/// The caller-facing handle to a checked-out connection. Exposes the native connection capability
/// set through [`LeaseProxy::with_raw`]; the single divergence from the raw connection's own
/// interface is [`LeaseProxy::close`], which returns the lease to the pool instead of destroying
/// the transport.
pub struct LeaseProxy<F: ConnectionFactory> {
    slot: ConnSlot<F::Connection>,
    id: u64,
    type_code: u64,
    created_at: Instant,
    checked_out_at: Instant,
    valid: Arc<std::sync::atomic::AtomicBool>,
    pool: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> LeaseProxy<F> {
    pub(crate) fn new(
        slot: ConnSlot<F::Connection>,
        id: u64,
        type_code: u64,
        created_at: Instant,
        checked_out_at: Instant,
        valid: Arc<std::sync::atomic::AtomicBool>,
        pool: Arc<PoolInner<F>>,
    ) -> Self {
        Self {
            slot,
            id,
            type_code,
            created_at,
            checked_out_at,
            valid,
            pool,
        }
    }

    /// The stable identity of the wrapped raw connection, used for equality/hashing.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this lease is still valid. A lease stops being valid once it has been closed,
    /// reclaimed as overdue by another caller, or invalidated by a pool reconfiguration.
    pub fn is_valid(&self) -> bool {
        if !self.valid.load(Ordering::SeqCst) {
            return false;
        }
        match self.slot.lock() {
            Ok(guard) => guard.is_some(),
            Err(_) => false,
        }
    }

    /// Runs `f` against the wrapped connection, failing with [`Error::LeaseInvalid`] if this
    /// lease has already been invalidated. This is the general-purpose way to forward an
    /// arbitrary native connection call through the lease, without this crate needing to
    /// enumerate the driver's full query/statement API.
    pub fn with_raw<T>(&self, f: impl FnOnce(&mut F::Connection) -> T) -> Result<T> {
        if !self.valid.load(Ordering::SeqCst) {
            return Err(Error::LeaseInvalid);
        }
        let mut guard = self.slot.lock().map_err(|_| Error::Interrupted)?;
        match guard.as_mut() {
            Some(raw) => Ok(f(raw)),
            None => Err(Error::LeaseInvalid),
        }
    }

    /// Returns the lease to the pool. Idempotent: a lease that has already been closed (or whose
    /// raw connection has already been repossessed by the pool) silently no-ops on a second call.
    pub fn close(&mut self) -> Result<()> {
        let raw = {
            let mut guard = self.slot.lock().map_err(|_| Error::Interrupted)?;
            guard.take()
        };
        let Some(raw) = raw else {
            return Ok(());
        };

        self.pool
            .check_in(self.id, self.type_code, self.created_at, self.valid.clone(), raw);
        Ok(())
    }
}

impl<F: ConnectionFactory> Drop for LeaseProxy<F> {
    fn drop(&mut self) {
        // A caller that never explicitly closes the lease still gets it returned to the pool,
        // matching this codebase's own `PooledConnection::drop` behavior.
        let _ = self.close();
    }
}

impl<F: ConnectionFactory> PartialEq for LeaseProxy<F> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<F: ConnectionFactory> Eq for LeaseProxy<F> {}

impl<F: ConnectionFactory> Hash for LeaseProxy<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for LeaseProxy<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseProxy")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

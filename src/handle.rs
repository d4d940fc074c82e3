//! `LeaseHandle`, the pool-internal record for one idle raw connection, and `ActiveRecord`, the
//! bookkeeping entry kept in `PoolState::active` while a connection is checked out.

use std::{
    sync::{atomic::AtomicBool, Arc, Mutex},
    time::Instant,
};

use crate::factory::RawConnection;

/// A raw connection shared between a caller's [`crate::proxy::LeaseProxy`] and the pool's
/// `ActiveRecord` for the same lease. Sharing the cell (rather than giving the proxy sole
/// ownership) is what lets overdue reclamation and `force_close_all` reach in and repossess or
/// close a connection that is still checked out — exactly as this crate's source behavior
/// requires. In the overwhelming common case the cell is only ever touched by the lessee; the
/// pool only reaches in across the two documented exceptions, both already monitor-held
/// operations per the concurrency model.
pub(crate) type ConnSlot<R> = Arc<Mutex<Option<R>>>;

/// One pooled connection record, used for entries in the idle list. Idle connections are only
/// ever touched by the pool itself while holding the monitor, so they need no shared cell.
///
/// Per the invalidate-on-return pattern, a `LeaseHandle` is never mutated in place across a
/// checkout/return boundary: returning or reclaiming a lease constructs a *new* `LeaseHandle`
/// wrapping the same raw connection (see [`LeaseHandle::reuse`]) and leaves the old handle's
/// [`ActiveRecord::valid`] flag permanently `false`. This makes "lease identity" disjoint from
/// "raw connection identity" and makes stale-proxy misuse trivially detectable.
pub(crate) struct LeaseHandle<R> {
    pub(crate) raw: R,
    pub(crate) id: u64,
    pub(crate) type_code: u64,
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
}

impl<R: RawConnection> LeaseHandle<R> {
    /// Wraps a freshly created raw connection in a brand new handle.
    pub(crate) fn fresh(raw: R, type_code: u64) -> Self {
        let id = raw.id();
        let now = Instant::now();
        Self {
            raw,
            id,
            type_code,
            created_at: now,
            last_used_at: now,
        }
    }

    /// Constructs a handle reusing a raw connection recovered from a `ConnSlot`, preserving
    /// `created_at` and `last_used_at` from whatever record last owned it. Used on return and on
    /// overdue reclamation, where the same transport connection survives but the handle identity
    /// must not.
    pub(crate) fn reuse(raw: R, type_code: u64, created_at: Instant, last_used_at: Instant) -> Self {
        Self {
            id: raw.id(),
            raw,
            type_code,
            created_at,
            last_used_at,
        }
    }

    pub(crate) fn elapsed_since_last_use(&self) -> std::time::Duration {
        self.last_used_at.elapsed()
    }
}

/// Bookkeeping kept in [`crate::state::PoolState::active`] for a handle whose raw connection is
/// currently out with a caller.
pub(crate) struct ActiveRecord<R> {
    pub(crate) id: u64,
    pub(crate) type_code: u64,
    pub(crate) created_at: Instant,
    /// The `last_used_at` this lease was checked out with, preserved so a return or reclaim can
    /// construct its replacement `LeaseHandle` without resetting the ping cool-down clock.
    pub(crate) last_used_at: Instant,
    pub(crate) checked_out_at: Instant,
    /// Shared with the `LeaseProxy` the caller holds. Flipped to `false` by the pool on return,
    /// overdue reclamation, or `force_close_all`; observed by the proxy on every forwarded call.
    pub(crate) valid: Arc<AtomicBool>,
    /// Shared with the `LeaseProxy` the caller holds; see [`ConnSlot`].
    pub(crate) slot: ConnSlot<R>,
}

impl<R> ActiveRecord<R> {
    pub(crate) fn checkout_age(&self) -> std::time::Duration {
        self.checked_out_at.elapsed()
    }
}

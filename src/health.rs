//! Liveness checking for a lease about to be handed out.

use crate::{config::PoolConfig, factory::RawConnection, handle::LeaseHandle};

/// Decides whether a handle is still usable before it is handed to a caller.
///
/// Combines, in order: the handle's validity flag, the raw transport's own closed-check, and —
/// when ping is enabled and the handle has been idle long enough — an active liveness probe with a
/// cool-down, so a busy pool does not ping every connection on every checkout.
pub(crate) struct HealthChecker;

impl HealthChecker {
    /// Returns whether `handle` may be handed out. `valid` is the handle's own validity flag
    /// (already false for an invalidated idle slot should one ever reach here; present mainly so
    /// callers at the overdue-reclaim and idle-pop sites can share this one check).
    pub(crate) fn is_usable<R: RawConnection>(
        handle: &mut LeaseHandle<R>,
        valid: bool,
        config: &PoolConfig,
    ) -> bool {
        if !valid {
            return false;
        }

        if handle.raw.is_closed() {
            return false;
        }

        if !config.ping_enabled || handle.elapsed_since_last_use() <= config.ping_not_used_for {
            return true;
        }

        match handle.raw.ping(&config.ping_query) {
            Ok(true) => {
                if !handle.raw.auto_commit() {
                    let _ = handle.raw.rollback();
                }
                true
            }
            Ok(false) | Err(_) => {
                let _ = handle.raw.close();
                false
            }
        }
    }
}

//! `Pool`: the checkout/return algorithm, overdue reclamation, reconfiguration, and introspection.
//!
//! Operates entirely under a single monitor — a `Mutex<PoolState<R>>` paired with a `Condvar` —
//! exactly as described by the concurrency model: creating a connection, pinging one, and closing
//! one all happen while the monitor is held. This keeps the bookkeeping invariants trivially
//! checkable at the cost of serializing checkout behind whatever I/O the factory/health checker
//! perform; callers who need overlapping factory creation would have to redesign step 2 of the
//! checkout algorithm to release and reacquire the monitor around it.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use tracing::{debug, trace, warn};

use crate::{
    config::{Credentials, PoolConfig},
    error::{Error, Result},
    event::{
        CheckedInEvent, CheckedOutEvent, CheckoutFailedEvent, CheckoutStartedEvent,
        ConnectionClosedEvent, ConnectionClosedReason, PoolClearedEvent, PoolCreatedEvent,
        PoolEventHandler,
    },
    factory::ConnectionFactory,
    handle::{ActiveRecord, ConnSlot, LeaseHandle},
    health::HealthChecker,
    proxy::LeaseProxy,
    state::{PoolState, PoolStats},
};

/// The shared, `Arc`-held interior of a [`Pool`]. Split out from `Pool` itself so that
/// [`LeaseProxy`] can hold a direct reference to it without holding a whole extra `Pool` handle.
pub(crate) struct PoolInner<F: ConnectionFactory> {
    factory: F,
    address: String,
    state: Mutex<PoolState<F::Connection>>,
    condvar: Condvar,
    event_handler: Mutex<Option<Arc<dyn PoolEventHandler>>>,
}

/// A bounded pool of raw connections produced by `F`, multiplexed across concurrent callers.
///
/// Cloning a `Pool` is cheap and shares the same underlying monitor and connections; this is the
/// intended way to hand the pool to multiple threads.
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Creates a new pool. `address` is used only for diagnostics (events, tracing, status dumps).
    pub fn new(
        address: impl Into<String>,
        credentials: Credentials,
        config: PoolConfig,
        factory: F,
    ) -> Self {
        let address = address.into();
        let state = PoolState::new(credentials, config);

        let inner = Arc::new(PoolInner {
            factory,
            address: address.clone(),
            state: Mutex::new(state),
            condvar: Condvar::new(),
            event_handler: Mutex::new(None),
        });

        inner.emit(|handler| {
            handler.handle_pool_created(PoolCreatedEvent {
                address: address.clone(),
            });
        });
        debug!(address = %address, "connection pool created");

        Self { inner }
    }

    /// Installs (or removes, with `None`) the structured event listener for this pool.
    pub fn set_event_handler(&self, handler: Option<Arc<dyn PoolEventHandler>>) {
        if let Ok(mut guard) = self.inner.event_handler.lock() {
            *guard = handler;
        }
    }

    /// Checks out a connection, blocking until one is available, a bad-connection ceiling is hit,
    /// or the factory fails outright. See the checkout algorithm in the component design for the
    /// full admission/reclamation/validation loop this runs.
    pub fn checkout(&self) -> Result<LeaseProxy<F>> {
        self.inner.checkout(&self.inner)
    }

    /// Forces every connection in the pool closed: idle connections are closed immediately;
    /// outstanding leases are invalidated so their next non-`close` call fails with
    /// [`Error::LeaseInvalid`] and their eventual `close` hard-closes rather than re-parks.
    /// Recomputes the pool's `expected_type_code` from its current credentials and bumps its
    /// generation counter.
    pub fn force_close_all(&self) -> Result<()> {
        self.inner.force_close_all()
    }

    /// A point-in-time snapshot of the pool's counters and sizes.
    pub fn stats(&self) -> Result<PoolStats> {
        Ok(self.inner.lock_state()?.snapshot())
    }

    /// A human-readable status dump, equivalent to `stats().to_string()`.
    pub fn status(&self) -> Result<String> {
        Ok(self.stats()?.to_string())
    }

    /// Replaces the pool's credentials. Triggers [`Pool::force_close_all`].
    pub fn set_credentials(&self, credentials: Credentials) -> Result<()> {
        self.inner.reconfigure(|state| state.credentials = credentials)
    }

    /// Sets the cap on leased connections outstanding. Triggers [`Pool::force_close_all`].
    pub fn set_max_active(&self, max_active: u32) -> Result<()> {
        self.inner.reconfigure(|state| state.config.max_active = max_active)
    }

    /// Sets the cap on parked connections. Triggers [`Pool::force_close_all`].
    pub fn set_max_idle(&self, max_idle: u32) -> Result<()> {
        self.inner.reconfigure(|state| state.config.max_idle = max_idle)
    }

    /// Sets the lease-age threshold past which an active lease is reclaimable. Triggers
    /// [`Pool::force_close_all`].
    pub fn set_max_checkout_time(&self, max_checkout_time: Duration) -> Result<()> {
        self.inner
            .reconfigure(|state| state.config.max_checkout_time = max_checkout_time)
    }

    /// Sets the bounded wait interval between retry sweeps when a checkout blocks. Triggers
    /// [`Pool::force_close_all`].
    pub fn set_wait_time(&self, wait_time: Duration) -> Result<()> {
        self.inner.reconfigure(|state| state.config.wait_time = wait_time)
    }

    /// Sets the per-caller consecutive bad-connection ceiling. Triggers [`Pool::force_close_all`].
    pub fn set_max_local_bad_tolerance(&self, max_local_bad_tolerance: u32) -> Result<()> {
        self.inner
            .reconfigure(|state| state.config.max_local_bad_tolerance = max_local_bad_tolerance)
    }

    /// Enables or disables the active liveness probe. Triggers [`Pool::force_close_all`].
    pub fn set_ping_enabled(&self, ping_enabled: bool) -> Result<()> {
        self.inner.reconfigure(|state| state.config.ping_enabled = ping_enabled)
    }

    /// Sets the probe statement. Triggers [`Pool::force_close_all`].
    pub fn set_ping_query(&self, ping_query: impl Into<String>) -> Result<()> {
        let ping_query = ping_query.into();
        self.inner.reconfigure(|state| state.config.ping_query = ping_query)
    }

    /// Sets the minimum idle-age before a probe is issued. Triggers [`Pool::force_close_all`].
    pub fn set_ping_not_used_for(&self, ping_not_used_for: Duration) -> Result<()> {
        self.inner
            .reconfigure(|state| state.config.ping_not_used_for = ping_not_used_for)
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, PoolState<F::Connection>>> {
        self.state.lock().map_err(|_| Error::Interrupted)
    }

    fn emit(&self, f: impl FnOnce(&Arc<dyn PoolEventHandler>)) {
        if let Ok(guard) = self.event_handler.lock() {
            if let Some(handler) = guard.as_ref() {
                f(handler);
            }
        }
    }

    /// Applies `mutate` to the pool's configuration/credentials and force-closes the whole pool,
    /// exactly as every reconfiguration setter in the data model requires.
    fn reconfigure(&self, mutate: impl FnOnce(&mut PoolState<F::Connection>)) -> Result<()> {
        let mut state = self.lock_state()?;
        mutate(&mut state);
        self.force_close_all_locked(&mut state);
        Ok(())
    }

    fn force_close_all(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        self.force_close_all_locked(&mut state);
        Ok(())
    }

    /// The guts of `force_close_all`, callable both from the public method and from every
    /// reconfiguration setter, always under the monitor.
    fn force_close_all_locked(&self, state: &mut PoolState<F::Connection>) {
        state.expected_type_code = state.credentials.type_code();

        for handle in state.active.drain(..) {
            handle.valid.store(false, Ordering::SeqCst);
            // The raw connection is not reachable here: it is still owned by the lessee's
            // `ConnSlot`. It is hard-closed lazily, the next time that lessee calls `close` (or
            // drops the proxy) and the return algorithm observes the stale validity/type code —
            // see the return algorithm's invalid-handle branch.
        }

        while let Some(mut handle) = state.idle.pop_front() {
            if !handle.raw.auto_commit() {
                let _ = handle.raw.rollback();
            }
            let _ = handle.raw.close();
            self.emit(|h| {
                h.handle_connection_closed(ConnectionClosedEvent {
                    address: self.address.clone(),
                    connection_id: handle.id,
                    reason: ConnectionClosedReason::PoolClosed,
                });
            });
        }

        state.generation += 1;
        let generation = state.generation;

        self.emit(|h| {
            h.handle_pool_cleared(PoolClearedEvent {
                address: self.address.clone(),
                generation,
            });
        });
        debug!(address = %self.address, generation, "connection pool cleared");

        self.condvar.notify_all();
    }

    fn checkout(&self, pool: &Arc<Self>) -> Result<LeaseProxy<F>> {
        let attempt_start = Instant::now();
        self.emit(|h| {
            h.handle_checkout_started(CheckoutStartedEvent {
                address: self.address.clone(),
            });
        });

        let mut state = self.lock_state()?;
        let mut local_bad: u32 = 0;
        let mut counted_wait = false;

        loop {
            // Step 1: an idle connection is available.
            if let Some(handle) = state.idle.pop_front() {
                if let Some(proxy) =
                    self.validate_and_admit(&mut state, handle, attempt_start, false, pool)?
                {
                    return Ok(proxy);
                }
                local_bad += 1;
                self.fail_if_ceiling_exceeded(&state, local_bad)?;
                continue;
            }

            // Step 2: no idle connection, but the pool is below its active cap.
            if (state.active.len() as u32) < state.config.max_active {
                let type_code = state.expected_type_code;
                match self.factory.create() {
                    Ok(raw) => {
                        let handle = LeaseHandle::fresh(raw, type_code);
                        if let Some(proxy) =
                            self.validate_and_admit(&mut state, handle, attempt_start, false, pool)?
                        {
                            return Ok(proxy);
                        }
                        local_bad += 1;
                        self.fail_if_ceiling_exceeded(&state, local_bad)?;
                        continue;
                    }
                    Err(e) => {
                        self.emit(|h| {
                            h.handle_checkout_failed(CheckoutFailedEvent {
                                address: self.address.clone(),
                                reason: e.to_string(),
                            });
                        });
                        return Err(Error::CheckoutFailed {
                            message: e.to_string(),
                        });
                    }
                }
            }

            // Step 3: at the active cap. Is the oldest lease overdue?
            let max_checkout_time = state.config.max_checkout_time;
            let overdue = state
                .active
                .front()
                .is_some_and(|record| record.checkout_age() > max_checkout_time);

            if overdue {
                let record = state.active.pop_front().expect("checked Some above");
                let age = record.checkout_age();
                state.counters.claimed_overdue_count += 1;
                state.counters.accumulated_checkout_time_of_overdue += age;
                state.counters.accumulated_checkout_time += age;
                record.valid.store(false, Ordering::SeqCst);

                let stolen = record.slot.lock().map_err(|_| Error::Interrupted)?.take();
                warn!(
                    address = %self.address,
                    connection_id = record.id,
                    age_ms = age.as_millis() as u64,
                    "reclaiming overdue lease"
                );

                match stolen {
                    Some(raw) => {
                        let type_code = state.expected_type_code;
                        let handle =
                            LeaseHandle::reuse(raw, type_code, record.created_at, record.last_used_at);
                        if let Some(proxy) =
                            self.validate_and_admit(&mut state, handle, attempt_start, true, pool)?
                        {
                            return Ok(proxy);
                        }
                        local_bad += 1;
                        self.fail_if_ceiling_exceeded(&state, local_bad)?;
                        continue;
                    }
                    None => {
                        // Raced with the lessee's own `close`; nothing physical to reclaim this
                        // iteration. The active count already dropped, so step 2 will admit on
                        // the next pass.
                        continue;
                    }
                }
            }

            // Nothing idle, nothing overdue, pool saturated: wait for a checkin or a timeout.
            if !counted_wait {
                state.counters.had_to_wait_count += 1;
                counted_wait = true;
            }
            let wait_time = state.config.wait_time;
            let wait_start = Instant::now();
            let (guard, _timed_out) = self
                .condvar
                .wait_timeout(state, wait_time)
                .map_err(|_| Error::Interrupted)?;
            state = guard;
            state.counters.accumulated_wait_time += wait_start.elapsed();
        }
    }

    /// The ceiling comparison from the checkout algorithm's validation step: `local_bad` may equal
    /// `max_idle + max_local_bad_tolerance` without failing; only a strictly greater count fails.
    fn fail_if_ceiling_exceeded(
        &self,
        state: &PoolState<F::Connection>,
        local_bad: u32,
    ) -> Result<()> {
        let ceiling = state.config.max_idle + state.config.max_local_bad_tolerance;
        if local_bad > ceiling {
            self.emit(|h| {
                h.handle_checkout_failed(CheckoutFailedEvent {
                    address: self.address.clone(),
                    reason: "bad-connection ceiling exceeded".to_string(),
                });
            });
            Err(Error::Unreachable {
                attempts: local_bad,
            })
        } else {
            Ok(())
        }
    }

    /// The validation step shared by all three checkout paths (idle pop, fresh creation, overdue
    /// reclaim): runs the health check, and on success admits the handle into `active` and wraps
    /// it in a `LeaseProxy`; on failure, discards it and reports `None` so the caller continues
    /// the checkout loop.
    fn validate_and_admit(
        &self,
        state: &mut PoolState<F::Connection>,
        mut handle: LeaseHandle<F::Connection>,
        attempt_start: Instant,
        reclaimed: bool,
        pool: &Arc<Self>,
    ) -> Result<Option<LeaseProxy<F>>> {
        let usable = HealthChecker::is_usable(&mut handle, true, &state.config);
        if !usable {
            state.counters.bad_connection_count += 1;
            let _ = handle.raw.close();
            self.emit(|h| {
                h.handle_connection_closed(ConnectionClosedEvent {
                    address: self.address.clone(),
                    connection_id: handle.id,
                    reason: ConnectionClosedReason::Unhealthy,
                });
            });
            return Ok(None);
        }

        if !handle.raw.auto_commit() {
            let _ = handle.raw.rollback();
        }

        let type_code = state.expected_type_code;
        let checked_out_at = Instant::now();
        handle.last_used_at = checked_out_at;
        let valid = Arc::new(AtomicBool::new(true));
        let slot: ConnSlot<F::Connection> = Arc::new(Mutex::new(Some(handle.raw)));

        state.active.push_back(ActiveRecord {
            id: handle.id,
            type_code,
            created_at: handle.created_at,
            last_used_at: handle.last_used_at,
            checked_out_at,
            valid: valid.clone(),
            slot: slot.clone(),
        });

        state.counters.request_count += 1;
        state.counters.accumulated_request_time += attempt_start.elapsed();

        self.emit(|h| {
            h.handle_checked_out(CheckedOutEvent {
                address: self.address.clone(),
                connection_id: handle.id,
                duration: attempt_start.elapsed(),
                reclaimed,
            });
        });
        trace!(
            address = %self.address,
            connection_id = handle.id,
            reclaimed,
            "connection checked out"
        );

        Ok(Some(LeaseProxy::new(
            slot,
            handle.id,
            type_code,
            handle.created_at,
            checked_out_at,
            valid,
            pool.clone(),
        )))
    }

    /// The return algorithm, invoked by `LeaseProxy::close` once it has recovered the raw
    /// connection from its `ConnSlot`.
    pub(crate) fn check_in(
        &self,
        id: u64,
        type_code_at_checkout: u64,
        created_at: Instant,
        valid: Arc<AtomicBool>,
        mut raw: F::Connection,
    ) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            // A poisoned monitor must not prevent a connection from being physically closed; this
            // is one of the failures the design recovers locally rather than surfacing.
            Err(poisoned) => poisoned.into_inner(),
        };

        let is_stale = !valid.load(Ordering::SeqCst) || type_code_at_checkout != state.expected_type_code;

        // Falls back to `created_at` only if the record is no longer in `active` (e.g. it was
        // already drained by a concurrent `force_close_all`), in which case `is_stale` is already
        // true and this value is never actually used to construct a re-parked handle.
        let mut last_used_at = created_at;
        if let Some(pos) = state.active.iter().position(|record| record.id == id) {
            let record = state.active.remove(pos).expect("position just found");
            state.counters.accumulated_checkout_time += record.checkout_age();
            last_used_at = record.last_used_at;
        }

        if is_stale {
            state.counters.bad_connection_count += 1;
            let _ = raw.close();
            valid.store(false, Ordering::SeqCst);
            self.emit(|h| {
                h.handle_connection_closed(ConnectionClosedEvent {
                    address: self.address.clone(),
                    connection_id: id,
                    reason: ConnectionClosedReason::StaleTypeCode,
                });
            });
            self.emit(|h| {
                h.handle_checked_in(CheckedInEvent {
                    address: self.address.clone(),
                    connection_id: id,
                    reparked: false,
                });
            });
            self.condvar.notify_all();
            return;
        }

        if !raw.auto_commit() {
            let _ = raw.rollback();
        }

        if (state.idle.len() as u32) < state.config.max_idle {
            let type_code = state.expected_type_code;
            let handle = LeaseHandle::reuse(raw, type_code, created_at, last_used_at);
            state.idle.push_back(handle);
            valid.store(false, Ordering::SeqCst);
            self.emit(|h| {
                h.handle_checked_in(CheckedInEvent {
                    address: self.address.clone(),
                    connection_id: id,
                    reparked: true,
                });
            });
        } else {
            let _ = raw.close();
            valid.store(false, Ordering::SeqCst);
            self.emit(|h| {
                h.handle_connection_closed(ConnectionClosedEvent {
                    address: self.address.clone(),
                    connection_id: id,
                    reason: ConnectionClosedReason::IdleListFull,
                });
            });
            self.emit(|h| {
                h.handle_checked_in(CheckedInEvent {
                    address: self.address.clone(),
                    connection_id: id,
                    reparked: false,
                });
            });
        }

        self.condvar.notify_all();
    }
}

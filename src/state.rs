//! `PoolState`: the data guarded by the pool's monitor (a `Mutex` + `Condvar` pair), and the
//! point-in-time statistics snapshot served from it.

use std::{collections::VecDeque, fmt, time::Duration};

use crate::{
    config::{Credentials, PoolConfig},
    handle::{ActiveRecord, LeaseHandle},
};

/// The monotonically nondecreasing counters tracked by the pool.
#[derive(Clone, Debug, Default)]
pub(crate) struct Counters {
    pub(crate) request_count: u64,
    pub(crate) accumulated_request_time: Duration,
    pub(crate) accumulated_checkout_time: Duration,
    pub(crate) accumulated_checkout_time_of_overdue: Duration,
    pub(crate) accumulated_wait_time: Duration,
    pub(crate) claimed_overdue_count: u64,
    pub(crate) had_to_wait_count: u64,
    pub(crate) bad_connection_count: u64,
}

/// All mutable state shared across threads, guarded by the pool's `Mutex`. Configuration and
/// credentials live here too (rather than behind a separate lock) because every read of them that
/// matters — the checkout algorithm's admission decisions, `force_close_all`'s recomputation of
/// `expected_type_code` — already happens under this same monitor.
pub(crate) struct PoolState<R> {
    pub(crate) idle: VecDeque<LeaseHandle<R>>,
    pub(crate) active: VecDeque<ActiveRecord<R>>,
    pub(crate) counters: Counters,
    pub(crate) expected_type_code: u64,
    /// Incremented once per `force_close_all`.
    pub(crate) generation: u64,
    pub(crate) config: PoolConfig,
    pub(crate) credentials: Credentials,
}

impl<R> PoolState<R> {
    pub(crate) fn new(credentials: Credentials, config: PoolConfig) -> Self {
        let expected_type_code = credentials.type_code();
        Self {
            idle: VecDeque::new(),
            active: VecDeque::new(),
            counters: Counters::default(),
            expected_type_code,
            generation: 0,
            config,
            credentials,
        }
    }
}

/// A point-in-time, read-only snapshot of a pool's counters and sizes, taken under the monitor and
/// then handed back by value so the caller never has to hold the lock.
#[derive(Clone, Debug)]
pub struct PoolStats {
    /// Number of connections currently parked and available.
    pub idle_count: u32,
    /// Number of connections currently leased out.
    pub active_count: u32,
    /// Number of `force_close_all` reconfigurations observed so far.
    pub generation: u64,
    /// Total successful checkouts.
    pub request_count: u64,
    /// Total time spent across all checkout attempts (creation/validation/waiting), accumulated.
    pub accumulated_request_time: Duration,
    /// Total time leases have spent checked out, accumulated over every return and reclamation.
    pub accumulated_checkout_time: Duration,
    /// The portion of `accumulated_checkout_time` attributable to overdue reclamations.
    pub accumulated_checkout_time_of_overdue: Duration,
    /// Total time callers have spent blocked waiting for a connection, accumulated.
    pub accumulated_wait_time: Duration,
    /// Number of active leases reclaimed for being overdue.
    pub claimed_overdue_count: u64,
    /// Number of checkout attempts that had to wait at least once.
    pub had_to_wait_count: u64,
    /// Number of connections discarded for failing their liveness check.
    pub bad_connection_count: u64,
}

impl<R> PoolState<R> {
    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            idle_count: self.idle.len() as u32,
            active_count: self.active.len() as u32,
            generation: self.generation,
            request_count: self.counters.request_count,
            accumulated_request_time: self.counters.accumulated_request_time,
            accumulated_checkout_time: self.counters.accumulated_checkout_time,
            accumulated_checkout_time_of_overdue: self.counters.accumulated_checkout_time_of_overdue,
            accumulated_wait_time: self.counters.accumulated_wait_time,
            claimed_overdue_count: self.counters.claimed_overdue_count,
            had_to_wait_count: self.counters.had_to_wait_count,
            bad_connection_count: self.counters.bad_connection_count,
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pool status (generation {}):", self.generation)?;
        writeln!(f, "  idle:                {}", self.idle_count)?;
        writeln!(f, "  active:              {}", self.active_count)?;
        writeln!(f, "  requests served:     {}", self.request_count)?;
        writeln!(f, "  had to wait:         {}", self.had_to_wait_count)?;
        writeln!(f, "  claimed overdue:     {}", self.claimed_overdue_count)?;
        writeln!(f, "  bad connections:     {}", self.bad_connection_count)?;
        writeln!(
            f,
            "  accumulated request time:     {:?}",
            self.accumulated_request_time
        )?;
        writeln!(
            f,
            "  accumulated checkout time:    {:?}",
            self.accumulated_checkout_time
        )?;
        writeln!(
            f,
            "  accumulated overdue checkout: {:?}",
            self.accumulated_checkout_time_of_overdue
        )?;
        write!(
            f,
            "  accumulated wait time:        {:?}",
            self.accumulated_wait_time
        )
    }
}

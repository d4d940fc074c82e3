//! A deterministic in-memory `ConnectionFactory`/`RawConnection` test double, used across the
//! integration suite instead of a real database driver.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use pooled_conn::{ConnectionFactory, RawConnection, Result};

#[derive(Debug)]
pub struct FakeConnection {
    id: u64,
    closed: bool,
    auto_commit: bool,
    ping_ok: Arc<AtomicBool>,
    ping_calls: Arc<AtomicU64>,
}

impl RawConnection for FakeConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn ping(&mut self, _query: &str) -> Result<bool> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ping_ok.load(Ordering::SeqCst))
    }
}

/// A factory producing `FakeConnection`s with shared, test-controllable behavior: whether newly
/// created connections report closed immediately, and whether pings succeed.
pub struct FakeFactory {
    next_id: AtomicU64,
    created_closed: AtomicBool,
    auto_commit: AtomicBool,
    ping_ok: Arc<AtomicBool>,
    ping_calls: Arc<AtomicU64>,
    created_count: AtomicU64,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            created_closed: AtomicBool::new(false),
            auto_commit: AtomicBool::new(true),
            ping_ok: Arc::new(AtomicBool::new(true)),
            ping_calls: Arc::new(AtomicU64::new(0)),
            created_count: AtomicU64::new(0),
        }
    }

    /// Newly created connections will report `is_closed() == value` from now on.
    pub fn set_created_closed(&self, value: bool) {
        self.created_closed.store(value, Ordering::SeqCst);
    }

    pub fn set_auto_commit(&self, value: bool) {
        self.auto_commit.store(value, Ordering::SeqCst);
    }

    /// All outstanding and future connections' pings will succeed/fail as `value`.
    pub fn set_ping_ok(&self, value: bool) {
        self.ping_ok.store(value, Ordering::SeqCst);
    }

    /// A handle to the shared ping-success flag, so a test can keep toggling it after the factory
    /// itself has been moved into a `Pool`.
    pub fn ping_ok_flag(&self) -> Arc<AtomicBool> {
        self.ping_ok.clone()
    }

    /// A handle to the shared ping-call counter, so a test can keep reading it after the factory
    /// itself has been moved into a `Pool`.
    pub fn ping_calls_handle(&self) -> Arc<AtomicU64> {
        self.ping_calls.clone()
    }

    pub fn created_count(&self) -> u64 {
        self.created_count.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> u64 {
        self.ping_calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for FakeFactory {
    type Connection = FakeConnection;

    fn create(&self) -> Result<FakeConnection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created_count.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            id,
            closed: self.created_closed.load(Ordering::SeqCst),
            auto_commit: self.auto_commit.load(Ordering::SeqCst),
            ping_ok: self.ping_ok.clone(),
            ping_calls: self.ping_calls.clone(),
        })
    }
}

//! End-to-end scenarios for the checkout/return/reclamation/reconfiguration algorithms.

mod support;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use pooled_conn::{Credentials, Error, Pool, PoolConfig};
use pretty_assertions::assert_eq;
use support::FakeFactory;

fn credentials() -> Credentials {
    Credentials::new("fake://test", "user", "pass")
}

#[test]
fn basic_serve_one() {
    let config = PoolConfig::builder().max_active(1).max_idle(1).build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut lease = pool.checkout().expect("checkout should succeed");
    lease.with_raw(|_conn| {}).expect("lease should be usable");
    lease.close().expect("close should succeed");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.idle_count, 1);
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.request_count, 1);
}

#[test]
fn saturation_wait_serializes_and_counts() {
    let config = PoolConfig::builder()
        .max_active(1)
        .max_idle(1)
        .max_checkout_time(Duration::from_secs(10))
        .wait_time(Duration::from_millis(50))
        .build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let a = pool.checkout().expect("A checks out");

    let pool_b = pool.clone();
    let b_thread = thread::spawn(move || pool_b.checkout().expect("B eventually checks out"));

    thread::sleep(Duration::from_millis(200));
    drop(a); // returns A's lease via Drop

    let b = b_thread.join().expect("B's thread should not panic");
    assert!(b.is_valid());

    let stats = pool.stats().unwrap();
    assert_eq!(stats.had_to_wait_count, 1);
}

#[test]
fn overdue_lease_is_reclaimed() {
    let config = PoolConfig::builder()
        .max_active(1)
        .max_idle(1)
        .max_checkout_time(Duration::from_millis(100))
        .wait_time(Duration::from_millis(20))
        .build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut a = pool.checkout().expect("A checks out");
    let a_id = a.id();

    thread::sleep(Duration::from_millis(500));

    let b = pool.checkout().expect("B reclaims A's overdue lease");
    assert_eq!(b.id(), a_id, "B must receive A's same raw connection");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.claimed_overdue_count, 1);

    assert!(!a.is_valid());
    assert!(matches!(a.with_raw(|_| {}), Err(Error::LeaseInvalid)));
    a.close().expect("A's close must be a silent no-op");
}

#[test]
fn bad_connection_ceiling_fails_after_exact_attempt_count() {
    let factory = FakeFactory::new();
    factory.set_created_closed(true);
    let config = PoolConfig::builder().max_idle(2).max_local_bad_tolerance(3).build();
    let pool = Pool::new("test", credentials(), config, factory);

    let result = pool.checkout();
    assert!(matches!(result, Err(Error::Unreachable { attempts: 6 })));
}

#[test]
fn reconfiguration_invalidates_outstanding_lease() {
    let config = PoolConfig::builder().max_active(1).max_idle(1).build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut a = pool.checkout().expect("A checks out");
    pool.set_credentials(Credentials::new("fake://test", "user", "new-password"))
        .expect("reconfiguration should not fail");

    assert!(matches!(a.with_raw(|_| {}), Err(Error::LeaseInvalid)));
    a.close().expect("close must still succeed, hard-closing instead of re-parking");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.idle_count, 0);
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.generation, 1);
}

#[test]
fn ping_cooldown_skips_then_fires() {
    let factory = FakeFactory::new();
    let config = PoolConfig::builder()
        .max_active(1)
        .max_idle(1)
        .ping_enabled(true)
        .ping_not_used_for(Duration::from_millis(1000))
        .build();
    let pool = Pool::new("test", credentials(), config, factory);

    let lease = pool.checkout().expect("first checkout creates a connection");
    lease.close().unwrap();

    thread::sleep(Duration::from_millis(200));
    let lease = pool.checkout().expect("second checkout within cool-down");
    let first_id = lease.id();
    lease.close().unwrap();

    thread::sleep(Duration::from_millis(1500));
    let lease = pool.checkout().expect("third checkout past cool-down pings successfully");
    assert_eq!(lease.id(), first_id, "ping succeeded so the same connection is reused");
    lease.close().unwrap();
}

#[test]
fn ping_cooldown_is_measured_from_the_original_checkout_not_the_return() {
    let factory = FakeFactory::new();
    let ping_calls = factory.ping_calls_handle();
    let config = PoolConfig::builder()
        .max_active(1)
        .max_idle(1)
        .ping_enabled(true)
        .ping_not_used_for(Duration::from_millis(100))
        .build();
    let pool = Pool::new("test", credentials(), config, factory);

    let lease = pool.checkout().expect("checkout creates a connection");
    thread::sleep(Duration::from_millis(500));
    lease.close().expect("close should succeed");

    // The connection was held (not idle) for 500ms, well past the 100ms cool-down measured from
    // its checkout, so re-checking it out immediately must still trigger a ping: `last_used_at`
    // must be preserved from checkout time, not reset to the moment it was returned.
    let reused = pool.checkout().expect("second checkout reuses the parked connection");
    reused.close().expect("close should succeed");
    assert_eq!(
        ping_calls.load(Ordering::SeqCst),
        1,
        "elapsed-since-last-use must be measured from the original checkout, not the return"
    );
}

#[test]
fn max_idle_zero_hard_closes_every_return() {
    let config = PoolConfig::builder().max_active(1).max_idle(0).build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut lease = pool.checkout().expect("checkout should succeed");
    lease.close().expect("close should succeed");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.idle_count, 0, "nothing is ever re-parked when max_idle is 0");
    assert_eq!(stats.active_count, 0);
}

#[test]
fn round_trip_with_no_contention_reuses_the_same_connection() {
    let config = PoolConfig::builder().max_active(1).max_idle(1).build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut first = pool.checkout().expect("first checkout creates a connection");
    let first_id = first.id();
    first.close().expect("close should succeed");

    let second = pool.checkout().expect("second checkout reuses the parked connection");
    assert_eq!(second.id(), first_id);
}

#[test]
fn double_close_is_a_silent_no_op() {
    let config = PoolConfig::builder().max_active(1).max_idle(1).build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut lease = pool.checkout().expect("checkout should succeed");
    lease.close().expect("first close should succeed");
    lease.close().expect("second close must be a no-op, not an error");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.idle_count, 1, "the connection must not be double-counted");
}

#[test]
fn lease_age_at_exactly_the_threshold_is_not_reclaimed() {
    let config = PoolConfig::builder()
        .max_active(1)
        .max_checkout_time(Duration::from_secs(10))
        .wait_time(Duration::from_millis(20))
        .build();
    let pool = Pool::new("test", credentials(), config, FakeFactory::new());

    let mut a = pool.checkout().expect("A checks out");
    let a_id = a.id();

    // Age is nowhere near the 10s threshold; B must not be able to reclaim it, so bound the
    // attempt with a short-lived background checkout and confirm it has not resolved yet.
    let pool_b = pool.clone();
    let b_thread = thread::spawn(move || pool_b.checkout());
    thread::sleep(Duration::from_millis(200));
    assert!(
        !b_thread.is_finished(),
        "B must still be waiting: A's lease age is far below max_checkout_time"
    );

    a.close().expect("A releases its lease");
    let b = b_thread.join().unwrap().expect("B now receives A's connection back");
    assert_eq!(b.id(), a_id);

    let stats = pool.stats().unwrap();
    assert_eq!(stats.claimed_overdue_count, 0, "no reclamation should have occurred");
}

#[test]
fn ping_failure_past_cooldown_discards_connection() {
    let factory = FakeFactory::new();
    let ping_ok = factory.ping_ok_flag();
    let config = PoolConfig::builder()
        .max_active(1)
        .max_idle(1)
        .ping_enabled(true)
        .ping_not_used_for(Duration::from_millis(50))
        .build();
    let pool = Pool::new("test", credentials(), config, factory);

    let lease = pool.checkout().unwrap();
    let stale_id = lease.id();
    lease.close().unwrap();

    ping_ok.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(200));

    let lease = pool.checkout().expect("a fresh connection is created after the stale one is discarded");
    assert_ne!(lease.id(), stale_id, "the failed-ping connection must not be reused");

    let stats = pool.stats().unwrap();
    assert_eq!(stats.bad_connection_count, 1);
}

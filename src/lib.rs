//! A synchronous, thread-safe pooled connection manager.
//!
//! A [`Pool`] hands out [`LeaseProxy`] handles wrapping a caller-supplied `RawConnection` type,
//! bounding how many are outstanding at once, reclaiming leases held past a configurable timeout,
//! and reusing idle connections across callers while validating their health before handing them
//! out. The whole data model lives behind a single monitor (a `Mutex` paired with a `Condvar`), so
//! every admission decision — pop an idle connection, create one, reclaim one, or wait — is made
//! with a consistent view of the pool.
//!
//! ```no_run
//! use pooled_conn::{Credentials, Error, Pool, PoolConfig, RawConnection, ConnectionFactory};
//!
//! # #[derive(Debug)]
//! # struct MyConnection;
//! # impl RawConnection for MyConnection {
//! #     fn id(&self) -> u64 { 0 }
//! #     fn is_closed(&self) -> bool { false }
//! #     fn auto_commit(&self) -> bool { true }
//! #     fn rollback(&mut self) -> pooled_conn::Result<()> { Ok(()) }
//! #     fn close(&mut self) -> pooled_conn::Result<()> { Ok(()) }
//! #     fn ping(&mut self, _query: &str) -> pooled_conn::Result<bool> { Ok(true) }
//! # }
//! # struct MyFactory;
//! # impl ConnectionFactory for MyFactory {
//! #     type Connection = MyConnection;
//! #     fn create(&self) -> pooled_conn::Result<MyConnection> { Ok(MyConnection) }
//! # }
//! # fn main() -> Result<(), Error> {
//! let pool = Pool::new(
//!     "db.internal:5432",
//!     Credentials::new("db.internal:5432", "app", "secret"),
//!     PoolConfig::default(),
//!     MyFactory,
//! );
//!
//! let lease = pool.checkout()?;
//! lease.with_raw(|conn| println!("{conn:?}"))?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod event;
mod factory;
mod handle;
mod health;
mod pool;
mod proxy;
mod state;

pub use config::{Credentials, PoolConfig};
pub use error::{Error, Result};
pub use event::{
    CheckedInEvent, CheckedOutEvent, CheckoutFailedEvent, CheckoutStartedEvent,
    ConnectionClosedEvent, ConnectionClosedReason, PoolClearedEvent, PoolCreatedEvent,
    PoolEventHandler,
};
pub use factory::{ConnectionFactory, RawConnection};
pub use pool::Pool;
pub use proxy::LeaseProxy;
pub use state::PoolStats;

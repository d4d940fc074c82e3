//! The `Error` and `Result` types this crate uses.

use thiserror::Error;

/// The result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error surfaced by the pool or a lease.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The [`ConnectionFactory`](crate::factory::ConnectionFactory) failed to produce a new
    /// connection.
    #[error("failed to create a new connection: {message}")]
    CheckoutFailed {
        /// The underlying factory failure, rendered as text.
        message: String,
    },

    /// A single checkout attempt discarded more consecutive bad connections than
    /// `max_idle + max_local_bad_tolerance` allows. A strong hint the database is unreachable.
    #[error(
        "checkout gave up after {attempts} consecutive bad connections; the database is likely \
         unreachable"
    )]
    Unreachable {
        /// The number of bad connections this attempt discarded before giving up.
        attempts: u32,
    },

    /// The thread waiting on the pool's monitor observed a poisoned lock, which this crate treats
    /// as an interruption since `std::sync::Mutex` has no other signal for it.
    #[error("checkout was interrupted: the pool's internal lock was poisoned")]
    Interrupted,

    /// A call was made on a lease whose handle has already been invalidated (returned, reclaimed,
    /// or force-closed).
    #[error("this lease is no longer valid")]
    LeaseInvalid,

    /// The checkout loop exited without producing a handle. This should be unreachable; if it is
    /// observed, it indicates a bug in the checkout algorithm rather than a transient failure.
    ///
    /// Kept for parity with the source error taxonomy, but `Pool::checkout`'s loop has no arm that
    /// falls through without either returning or looping back (its "wait" arm is an intentional,
    /// unbounded retry — saturation is not a bug), so there is no call site in this crate that
    /// constructs it; see `DESIGN.md` for why a `debug_assert!`-guarded fallback arm was rejected
    /// rather than added as dead code.
    #[error("internal error: checkout loop exited without a lease")]
    NullLease,
}

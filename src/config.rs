//! Pool configuration: the options enumerated in the data model, plus the credential triple used
//! to fingerprint handles across reconfiguration.

use std::{
    hash::{Hash, Hasher},
    time::Duration,
    collections::hash_map::DefaultHasher,
};

/// The `(url, user, password)` triple a pool is configured with. Hashing this triple produces the
/// `type_code` stamped onto every handle parked by this pool; a handle carrying a stale type code
/// is never re-parked after a reconfiguration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Credentials {
    /// The connection URL / DSN.
    pub url: String,
    /// The authenticating user.
    pub user: String,
    /// The authenticating password.
    pub password: String,
}

impl Credentials {
    /// Creates a new credential triple.
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Computes this credential triple's fingerprint (`type_code`).
    pub(crate) fn type_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Runtime-mutable pool configuration. Every field here corresponds to one row of the
/// configuration table in the data model; mutating any of them through [`crate::Pool`]'s setters
/// triggers `force_close_all`.
#[derive(Clone, Debug, typed_builder::TypedBuilder)]
pub struct PoolConfig {
    /// Cap on leased connections outstanding; above this, callers wait.
    #[builder(default = 10)]
    pub max_active: u32,

    /// Cap on parked connections; surplus are hard-closed on return.
    #[builder(default = 5)]
    pub max_idle: u32,

    /// Lease age threshold past which an active lease is reclaimable.
    #[builder(default = Duration::from_secs(20 * 60))]
    pub max_checkout_time: Duration,

    /// Bounded wait interval between retry sweeps when a checkout blocks.
    #[builder(default = Duration::from_secs(20 * 60))]
    pub wait_time: Duration,

    /// Per-caller consecutive bad-connection ceiling before a checkout attempt fails with
    /// [`crate::Error::Unreachable`]. Coupled to `max_idle` per the source behavior: the ceiling is
    /// `max_idle + max_local_bad_tolerance`, exceeded on strict inequality.
    #[builder(default = 3)]
    pub max_local_bad_tolerance: u32,

    /// Enables the active liveness probe described in the health-checker design.
    #[builder(default = false)]
    pub ping_enabled: bool,

    /// The probe statement issued when `ping_enabled` and the cool-down has elapsed.
    #[builder(default = String::from("SELECT 1"), setter(into))]
    pub ping_query: String,

    /// Minimum idle-age before a probe is issued; below this, the probe is skipped.
    #[builder(default = Duration::from_secs(0))]
    pub ping_not_used_for: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_code_is_stable_for_identical_credentials() {
        let a = Credentials::new("db:5432", "app", "secret");
        let b = Credentials::new("db:5432", "app", "secret");
        assert_eq!(a.type_code(), b.type_code());
    }

    #[test]
    fn type_code_differs_across_any_field() {
        let base = Credentials::new("db:5432", "app", "secret");
        let other_password = Credentials::new("db:5432", "app", "different");
        let other_user = Credentials::new("db:5432", "other", "secret");
        let other_url = Credentials::new("other:5432", "app", "secret");
        assert_ne!(base.type_code(), other_password.type_code());
        assert_ne!(base.type_code(), other_user.type_code());
        assert_ne!(base.type_code(), other_url.type_code());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = PoolConfig::default();
        assert_eq!(config.max_active, 10);
        assert_eq!(config.max_idle, 5);
        assert_eq!(config.max_checkout_time, Duration::from_secs(20 * 60));
        assert_eq!(config.wait_time, Duration::from_secs(20 * 60));
        assert_eq!(config.max_local_bad_tolerance, 3);
        assert!(!config.ping_enabled);
        assert_eq!(config.ping_query, "SELECT 1");
        assert_eq!(config.ping_not_used_for, Duration::from_secs(0));
    }
}

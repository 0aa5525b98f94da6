//! Reads and writes of the persisted ECM state.

use tracing::info;

use crate::error::EcmResult;
use crate::identity::with_cleared_identity;
use crate::platform::{Platform, Uid, UserId};
use crate::state::{EcmState, OPSTR_ACCESS_RESTRICTED_SETTINGS};

/// Accessor for the app-op-backed ECM state of packages.
///
/// The package uid is resolved on every call, so a reinstall under a new uid
/// starts again from [`EcmState::Implicit`]. App-op access always runs with
/// the calling identity cleared.
#[derive(Debug, Clone)]
pub struct EcmStateStore {
    platform: Platform,
}

impl EcmStateStore {
    /// Creates a store over the given platform.
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn package_uid(&self, package: &str, user: UserId) -> EcmResult<Uid> {
        Ok(self.platform.packages.application_info(package, user)?.uid)
    }

    /// Current state of `package` for `user`.
    ///
    /// # Errors
    ///
    /// Package-not-found if the package is not installed for the user,
    /// illegal-state if the stored mode is not an ECM state, or a platform
    /// failure.
    pub fn get(&self, package: &str, user: UserId) -> EcmResult<EcmState> {
        let uid = self.package_uid(package, user)?;
        let mode = with_cleared_identity(|| {
            self.platform
                .app_ops
                .unsafe_check_op_raw(OPSTR_ACCESS_RESTRICTED_SETTINGS, uid, package)
        })?;
        EcmState::from_mode(mode)
    }

    /// Persists `state` for `package` in `user`.
    ///
    /// # Errors
    ///
    /// Package-not-found if the package is not installed for the user, or a
    /// platform failure.
    pub fn set(&self, package: &str, user: UserId, state: EcmState) -> EcmResult<()> {
        let uid = self.package_uid(package, user)?;
        with_cleared_identity(|| {
            self.platform.app_ops.set_mode(
                OPSTR_ACCESS_RESTRICTED_SETTINGS,
                uid,
                package,
                state.to_mode(),
            )
        })?;
        info!(package, %user, %uid, %state, "ECM state written");
        Ok(())
    }
}

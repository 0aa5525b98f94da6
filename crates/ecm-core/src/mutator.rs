//! State mutator.
//!
//! The only component that writes ECM state. A restriction can be cleared
//! only after the user has acknowledged the confirmation dialog:
//!
//! ```text
//! guarded --set_clear_restriction_allowed--> GUARDED_AND_ACKNOWLEDGED
//! GUARDED_AND_ACKNOWLEDGED --clear_restriction--> NOT_GUARDED
//! anything else --clear_restriction--> IllegalState
//! ```

use tracing::{debug, info};

use crate::error::{EcmError, EcmResult};
use crate::platform::UserId;
use crate::resolver::GuardStateResolver;
use crate::state::EcmState;

/// Applies ECM state transitions.
#[derive(Debug, Clone)]
pub struct StateMutator {
    resolver: GuardStateResolver,
}

impl StateMutator {
    /// Creates a mutator that consults `resolver` for the current guard
    /// status.
    #[must_use]
    pub const fn new(resolver: GuardStateResolver) -> Self {
        Self { resolver }
    }

    /// Whether the user has acknowledged the restriction, so that it may be
    /// cleared.
    ///
    /// # Errors
    ///
    /// Package-not-found, or a failure reading the persisted state.
    pub fn is_clear_restriction_allowed(&self, package: &str, user: UserId) -> EcmResult<bool> {
        Ok(self.resolver.states().get(package, user)? == EcmState::GuardedAndAcknowledged)
    }

    /// Records that the user has seen the confirmation dialog. No-op unless
    /// the package is currently guarded.
    ///
    /// # Errors
    ///
    /// Package-not-found, or a failure reading or writing the state.
    pub fn set_clear_restriction_allowed(&self, package: &str, user: UserId) -> EcmResult<()> {
        if !self.resolver.is_package_guarded(package, user)? {
            debug!(package, %user, "not guarded, nothing to acknowledge");
            return Ok(());
        }
        self.resolver
            .states()
            .set(package, user, EcmState::GuardedAndAcknowledged)
    }

    /// Lifts the restriction.
    ///
    /// # Errors
    ///
    /// [`EcmError::IllegalState`] unless the restriction was acknowledged
    /// first; package-not-found or platform failures otherwise.
    pub fn clear_restriction(&self, package: &str, user: UserId) -> EcmResult<()> {
        if !self.is_clear_restriction_allowed(package, user)? {
            return Err(EcmError::illegal_state(format!(
                "clear restriction is not allowed for {package} in user {user}"
            )));
        }
        self.resolver
            .states()
            .set(package, user, EcmState::NotGuarded)?;
        info!(package, %user, "ECM restriction cleared");
        Ok(())
    }
}

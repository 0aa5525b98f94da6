//! The ECM engine: classifier, resolver and mutator wired to one platform.
//!
//! The engine performs no caller checks. It is the policy core behind the
//! service surface, which validates callers and arguments first.

use std::sync::Arc;

use tracing::debug;

use crate::classifier::{ProtectedSettings, RestrictionClassifier};
use crate::config::EcmConfig;
use crate::error::EcmResult;
use crate::mutator::StateMutator;
use crate::platform::{Platform, UserId};
use crate::resolver::GuardStateResolver;
use crate::state::EcmState;
use crate::trust::TrustRegistry;

/// Policy core of Enhanced Confirmation Mode.
#[derive(Debug, Clone)]
pub struct EcmEngine {
    classifier: RestrictionClassifier,
    resolver: GuardStateResolver,
    mutator: StateMutator,
    trust: Arc<TrustRegistry>,
}

impl EcmEngine {
    /// Builds the engine described by `config` on top of `platform`.
    #[must_use]
    pub fn from_config(config: &EcmConfig, platform: Platform) -> Self {
        let trust = Arc::new(TrustRegistry::new(
            &config.trusted_packages,
            &config.trusted_installers,
        ));
        let classifier = RestrictionClassifier::new(
            config.device.form_factor,
            ProtectedSettings::from_config(&config.policy),
        );
        let resolver = GuardStateResolver::new(platform, Arc::clone(&trust), &config.policy);
        let mutator = StateMutator::new(resolver.clone());
        Self {
            classifier,
            resolver,
            mutator,
            trust,
        }
    }

    /// The restriction classifier.
    #[must_use]
    pub const fn classifier(&self) -> &RestrictionClassifier {
        &self.classifier
    }

    /// The guard-state resolver.
    #[must_use]
    pub const fn resolver(&self) -> &GuardStateResolver {
        &self.resolver
    }

    /// The state mutator.
    #[must_use]
    pub const fn mutator(&self) -> &StateMutator {
        &self.mutator
    }

    /// The signer allowlists.
    #[must_use]
    pub fn trust_registry(&self) -> &TrustRegistry {
        &self.trust
    }

    /// Whether `setting` is ECM-protected on this device.
    #[must_use]
    pub fn is_setting_protected(&self, setting: &str) -> bool {
        self.classifier.is_setting_protected(setting)
    }

    /// Whether changing `setting` for `package` must be blocked until the
    /// user confirms.
    ///
    /// # Errors
    ///
    /// Package-not-found, or a failure reading the persisted state.
    pub fn is_restricted(&self, package: &str, setting: &str, user: UserId) -> EcmResult<bool> {
        if !self.classifier.is_setting_protected(setting) {
            return Ok(false);
        }
        let restricted = self.resolver.is_package_guarded(package, user)?;
        debug!(package, setting, %user, restricted, "restriction check");
        Ok(restricted)
    }

    /// Persisted state of `package`, without provenance fallback.
    ///
    /// # Errors
    ///
    /// Package-not-found, or a failure reading the persisted state.
    pub fn ecm_state(&self, package: &str, user: UserId) -> EcmResult<EcmState> {
        self.resolver.states().get(package, user)
    }

    /// See [`StateMutator::is_clear_restriction_allowed`].
    ///
    /// # Errors
    ///
    /// See [`StateMutator::is_clear_restriction_allowed`].
    pub fn is_clear_restriction_allowed(&self, package: &str, user: UserId) -> EcmResult<bool> {
        self.mutator.is_clear_restriction_allowed(package, user)
    }

    /// See [`StateMutator::set_clear_restriction_allowed`].
    ///
    /// # Errors
    ///
    /// See [`StateMutator::set_clear_restriction_allowed`].
    pub fn set_clear_restriction_allowed(&self, package: &str, user: UserId) -> EcmResult<()> {
        self.mutator.set_clear_restriction_allowed(package, user)
    }

    /// See [`StateMutator::clear_restriction`].
    ///
    /// # Errors
    ///
    /// See [`StateMutator::clear_restriction`].
    pub fn clear_restriction(&self, package: &str, user: UserId) -> EcmResult<()> {
        self.mutator.clear_restriction(package, user)
    }
}

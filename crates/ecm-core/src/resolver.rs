//! Guard-state resolver.
//!
//! Decides whether a package is currently guarded for a user. Explicit state
//! always wins over install provenance; provenance is only consulted while
//! the state is [`EcmState::Implicit`].
//!
//! Only the immediate installer's trust matters. A trusted installer that
//! installed an untrusted installer does not make the packages the latter
//! installs trusted.

use std::sync::Arc;

use tracing::debug;

use crate::config::{PolicyConfig, TrustPolicy};
use crate::error::EcmResult;
use crate::platform::{INSTALL_PACKAGES, Platform, UserId};
use crate::state::EcmState;
use crate::store::EcmStateStore;
use crate::trust::TrustRegistry;

/// Why a package ended up guarded or not. Reported in logs and returned by
/// [`GuardStateResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Signed with an allowlisted certificate, or itself a trusted installer.
    Allowlisted,
    /// Pre-installed on the system image.
    SystemPackage,
    /// Explicit state says guarded (possibly acknowledged).
    ExplicitlyGuarded(EcmState),
    /// Explicit state says not guarded.
    ExplicitlyNotGuarded,
    /// Installed from a local or downloaded file.
    SideloadedFile,
    /// Installer not checked because unlisted installers are trusted.
    UnlistedInstallerTrusted,
    /// Installed by a trusted installer.
    TrustedInstaller,
    /// Installed by an untrusted or unknown installer.
    UntrustedInstaller,
}

impl GuardDecision {
    /// Whether the decision guards the package.
    #[must_use]
    pub const fn is_guarded(self) -> bool {
        matches!(
            self,
            Self::ExplicitlyGuarded(_) | Self::SideloadedFile | Self::UntrustedInstaller
        )
    }
}

/// Computes guard status of packages.
#[derive(Debug, Clone)]
pub struct GuardStateResolver {
    platform: Platform,
    trust: Arc<TrustRegistry>,
    trust_policy: TrustPolicy,
    trust_unlisted_installers: bool,
    states: EcmStateStore,
}

impl GuardStateResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(platform: Platform, trust: Arc<TrustRegistry>, policy: &PolicyConfig) -> Self {
        Self {
            states: EcmStateStore::new(platform.clone()),
            platform,
            trust,
            trust_policy: policy.trust,
            trust_unlisted_installers: policy.trust_unlisted_installers,
        }
    }

    /// The state accessor the resolver reads through.
    #[must_use]
    pub const fn states(&self) -> &EcmStateStore {
        &self.states
    }

    /// Whether `package` is guarded for `user`.
    ///
    /// # Errors
    ///
    /// Package-not-found if the package is not installed for the user, or
    /// any failure reading the persisted state.
    pub fn is_package_guarded(&self, package: &str, user: UserId) -> EcmResult<bool> {
        Ok(self.resolve(package, user)?.is_guarded())
    }

    /// Full decision for `package` in `user`.
    ///
    /// # Errors
    ///
    /// See [`Self::is_package_guarded`].
    pub fn resolve(&self, package: &str, user: UserId) -> EcmResult<GuardDecision> {
        let info = self.platform.packages.application_info(package, user)?;

        let decision = if self.is_allowlisted(package, user) {
            GuardDecision::Allowlisted
        } else if info.is_system {
            GuardDecision::SystemPackage
        } else {
            match self.states.get(package, user)? {
                state if state.is_explicitly_guarded() => GuardDecision::ExplicitlyGuarded(state),
                EcmState::NotGuarded => GuardDecision::ExplicitlyNotGuarded,
                _ => self.resolve_implicit(package, user)?,
            }
        };

        debug!(package, %user, ?decision, "resolved ECM guard state");
        Ok(decision)
    }

    fn resolve_implicit(&self, package: &str, user: UserId) -> EcmResult<GuardDecision> {
        let source = self.platform.packages.install_source_info(package, user)?;
        if source.package_source.is_file_based() {
            return Ok(GuardDecision::SideloadedFile);
        }
        if self.trust_unlisted_installers {
            return Ok(GuardDecision::UnlistedInstallerTrusted);
        }
        let trusted = source
            .installing_package
            .as_deref()
            .is_some_and(|installer| self.is_trusted_installer(installer, user));
        Ok(if trusted {
            GuardDecision::TrustedInstaller
        } else {
            GuardDecision::UntrustedInstaller
        })
    }

    fn is_allowlisted(&self, package: &str, user: UserId) -> bool {
        let packages = self.platform.packages.as_ref();
        self.trust.is_allowlisted_package(packages, package, user)
            || self.is_trusted_installer(package, user)
    }

    fn is_trusted_installer(&self, package: &str, user: UserId) -> bool {
        let packages = self.platform.packages.as_ref();
        match self.trust_policy {
            TrustPolicy::SignatureAllowlist => {
                self.trust.is_allowlisted_installer(packages, package, user)
            },
            TrustPolicy::InstallPermission => {
                packages
                    .application_info(package, user)
                    .is_ok_and(|info| info.is_system)
                    && packages.check_package_permission(INSTALL_PACKAGES, package, user)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{
        InMemoryAppOps, InMemoryPackageManager, InMemoryUserManager, PackageRecord,
    };
    use crate::platform::{AppId, PackageSource};
    use crate::trust::{CertificateDigest, SignedPackage};

    const USER: UserId = UserId(0);

    fn store_cert() -> CertificateDigest {
        CertificateDigest::of_certificate(b"store-signing-cert")
    }

    fn fixture(policy: &PolicyConfig) -> (Arc<InMemoryPackageManager>, GuardStateResolver) {
        let packages = Arc::new(InMemoryPackageManager::new());
        packages.install(
            PackageRecord::new("com.store", AppId(10_001))
                .for_user(USER)
                .signed_with(store_cert()),
        );
        packages.install(
            PackageRecord::new("com.android.vending", AppId(10_002))
                .for_user(USER)
                .system()
                .granted(INSTALL_PACKAGES),
        );
        packages.install(PackageRecord::new("com.sketchy.market", AppId(10_003)).for_user(USER));
        let platform = Platform {
            packages: packages.clone(),
            app_ops: Arc::new(InMemoryAppOps::new()),
            users: Arc::new(InMemoryUserManager::new()),
        };
        let trust = Arc::new(TrustRegistry::new(&[], &[SignedPackage {
            package_name: "com.store".to_string(),
            certificate_digest: store_cert(),
        }]));
        (packages, GuardStateResolver::new(platform, trust, policy))
    }

    fn strict(trust: TrustPolicy) -> PolicyConfig {
        PolicyConfig {
            trust,
            trust_unlisted_installers: false,
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn file_installs_are_guarded() {
        let (packages, resolver) = fixture(&PolicyConfig::default());
        for source in [PackageSource::LocalFile, PackageSource::DownloadedFile] {
            packages.install(
                PackageRecord::new("com.app", AppId(10_100))
                    .for_user(USER)
                    .installed_from(source, Some("com.store")),
            );
            assert_eq!(
                resolver.resolve("com.app", USER).unwrap(),
                GuardDecision::SideloadedFile
            );
        }
    }

    #[test]
    fn unlisted_installers_trusted_by_default() {
        let (packages, resolver) = fixture(&PolicyConfig::default());
        packages.install(
            PackageRecord::new("com.app", AppId(10_100))
                .for_user(USER)
                .installed_from(PackageSource::Other, Some("com.sketchy.market")),
        );
        assert_eq!(
            resolver.resolve("com.app", USER).unwrap(),
            GuardDecision::UnlistedInstallerTrusted
        );
    }

    #[test]
    fn signature_allowlist_installer_trust() {
        let (packages, resolver) = fixture(&strict(TrustPolicy::SignatureAllowlist));
        packages.install(
            PackageRecord::new("com.good", AppId(10_100))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.store")),
        );
        packages.install(
            PackageRecord::new("com.bad", AppId(10_101))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.sketchy.market")),
        );
        packages.install(
            PackageRecord::new("com.orphan", AppId(10_102))
                .for_user(USER)
                .installed_from(PackageSource::Unspecified, None),
        );
        assert_eq!(
            resolver.resolve("com.good", USER).unwrap(),
            GuardDecision::TrustedInstaller
        );
        assert_eq!(
            resolver.resolve("com.bad", USER).unwrap(),
            GuardDecision::UntrustedInstaller
        );
        assert!(resolver.is_package_guarded("com.orphan", USER).unwrap());
    }

    #[test]
    fn install_permission_installer_trust() {
        let (packages, resolver) = fixture(&strict(TrustPolicy::InstallPermission));
        packages.install(
            PackageRecord::new("com.good", AppId(10_100))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.android.vending")),
        );
        packages.install(
            PackageRecord::new("com.bad", AppId(10_101))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.store")),
        );
        assert_eq!(
            resolver.resolve("com.good", USER).unwrap(),
            GuardDecision::TrustedInstaller
        );
        // Allowlisted signer, but neither system nor holding INSTALL_PACKAGES.
        assert_eq!(
            resolver.resolve("com.bad", USER).unwrap(),
            GuardDecision::UntrustedInstaller
        );
    }

    #[test]
    fn only_the_immediate_installer_counts() {
        let (packages, resolver) = fixture(&strict(TrustPolicy::SignatureAllowlist));
        packages.install(
            PackageRecord::new("com.sketchy.market", AppId(10_003))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.store")),
        );
        packages.install(
            PackageRecord::new("com.app", AppId(10_100))
                .for_user(USER)
                .installed_from(PackageSource::Store, Some("com.sketchy.market")),
        );
        assert!(!resolver.is_package_guarded("com.sketchy.market", USER).unwrap());
        assert!(resolver.is_package_guarded("com.app", USER).unwrap());
    }

    #[test]
    fn allowlisted_and_system_packages_never_guarded() {
        let (_, resolver) = fixture(&strict(TrustPolicy::SignatureAllowlist));
        resolver
            .states()
            .set("com.store", USER, EcmState::Guarded)
            .unwrap();
        resolver
            .states()
            .set("com.android.vending", USER, EcmState::Guarded)
            .unwrap();
        assert_eq!(
            resolver.resolve("com.store", USER).unwrap(),
            GuardDecision::Allowlisted
        );
        assert_eq!(
            resolver.resolve("com.android.vending", USER).unwrap(),
            GuardDecision::SystemPackage
        );
    }

    #[test]
    fn missing_package_is_an_argument_error() {
        let (_, resolver) = fixture(&PolicyConfig::default());
        let err = resolver.resolve("com.missing", USER).unwrap_err();
        assert_eq!(err.kind(), crate::error::EcmErrorKind::IllegalArgument);
    }
}

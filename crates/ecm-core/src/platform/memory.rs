//! In-memory platform implementations.
//!
//! Used by tests and, populated from a [`DeviceInventory`], by the daemon.
//! All three types are internally synchronized and cheap to share behind an
//! `Arc`.
//!
//! [`DeviceInventory`]: super::inventory::DeviceInventory

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{PoisonError, RwLock};

use super::{
    AppId, AppOpMode, AppOpsStore, ApplicationInfo, InstallSourceInfo, PackageManager,
    PackageSource, PlatformError, PlatformResult, Uid, UserId, UserManager,
    enforce_app_ops_access,
};
use crate::identity::Binder;
use crate::trust::CertificateDigest;

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Package name.
    pub package_name: String,
    /// App id shared by every user the package is installed for.
    pub app_id: AppId,
    /// Users the package is installed for.
    pub users: BTreeSet<UserId>,
    /// Pre-installed on the system image.
    pub is_system: bool,
    /// Digests of the signing certificates.
    pub signing_certificates: Vec<CertificateDigest>,
    /// Install provenance.
    pub install_source: InstallSourceInfo,
    /// Permissions granted to the package.
    pub granted_permissions: BTreeSet<String>,
}

impl PackageRecord {
    /// A non-system package with no users, certificates or permissions.
    #[must_use]
    pub fn new(package_name: impl Into<String>, app_id: AppId) -> Self {
        Self {
            package_name: package_name.into(),
            app_id,
            users: BTreeSet::new(),
            is_system: false,
            signing_certificates: Vec::new(),
            install_source: InstallSourceInfo::default(),
            granted_permissions: BTreeSet::new(),
        }
    }

    /// Installs the package for `user`.
    #[must_use]
    pub fn for_user(mut self, user: UserId) -> Self {
        self.users.insert(user);
        self
    }

    /// Marks the package as pre-installed.
    #[must_use]
    pub const fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Adds a signing certificate digest.
    #[must_use]
    pub fn signed_with(mut self, digest: CertificateDigest) -> Self {
        self.signing_certificates.push(digest);
        self
    }

    /// Sets the install provenance.
    #[must_use]
    pub fn installed_from(mut self, source: PackageSource, installer: Option<&str>) -> Self {
        self.install_source = InstallSourceInfo {
            package_source: source,
            installing_package: installer.map(ToString::to_string),
        };
        self
    }

    /// Grants a permission.
    #[must_use]
    pub fn granted(mut self, permission: impl Into<String>) -> Self {
        self.granted_permissions.insert(permission.into());
        self
    }

    fn uid_for(&self, user: UserId) -> Option<Uid> {
        if self.users.contains(&user) {
            Uid::of(user, self.app_id)
        } else {
            None
        }
    }
}

/// Package manager over a mutable map of [`PackageRecord`]s.
#[derive(Debug, Default)]
pub struct InMemoryPackageManager {
    packages: RwLock<HashMap<String, PackageRecord>>,
}

impl InMemoryPackageManager {
    /// Creates an empty package manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a package.
    pub fn install(&self, record: PackageRecord) {
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.package_name.clone(), record);
    }

    /// Removes a package. Returns the removed record.
    pub fn uninstall(&self, package: &str) -> Option<PackageRecord> {
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(package)
    }

    /// Number of installed packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no package is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_installed<T>(
        &self,
        package: &str,
        user: UserId,
        f: impl FnOnce(&PackageRecord, Uid) -> T,
    ) -> PlatformResult<T> {
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        packages
            .get(package)
            .and_then(|record| record.uid_for(user).map(|uid| f(record, uid)))
            .ok_or_else(|| PlatformError::PackageNotFound {
                package: package.to_string(),
                user,
            })
    }
}

impl PackageManager for InMemoryPackageManager {
    fn application_info(&self, package: &str, user: UserId) -> PlatformResult<ApplicationInfo> {
        self.with_installed(package, user, |record, uid| ApplicationInfo {
            package_name: record.package_name.clone(),
            uid,
            is_system: record.is_system,
        })
    }

    fn install_source_info(
        &self,
        package: &str,
        user: UserId,
    ) -> PlatformResult<InstallSourceInfo> {
        self.with_installed(package, user, |record, _| record.install_source.clone())
    }

    fn has_signing_certificate(
        &self,
        package: &str,
        user: UserId,
        digest: &CertificateDigest,
    ) -> bool {
        self.with_installed(package, user, |record, _| {
            record.signing_certificates.contains(digest)
        })
        .unwrap_or(false)
    }

    fn check_package_permission(&self, permission: &str, package: &str, user: UserId) -> bool {
        self.with_installed(package, user, |record, _| {
            record.granted_permissions.contains(permission)
        })
        .unwrap_or(false)
    }

    fn check_uid_permission(&self, permission: &str, uid: Uid) -> bool {
        if uid.is_root_or_system() {
            return true;
        }
        let user = uid.user_id();
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|record| {
                record.uid_for(user) == Some(uid) && record.granted_permissions.contains(permission)
            })
    }
}

type OpKey = (Uid, String, String);

/// App-ops ledger held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAppOps {
    modes: RwLock<HashMap<OpKey, AppOpMode>>,
}

impl InMemoryAppOps {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of explicitly set modes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no mode has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AppOpsStore for InMemoryAppOps {
    fn unsafe_check_op_raw(&self, op: &str, uid: Uid, package: &str) -> PlatformResult<AppOpMode> {
        enforce_app_ops_access(Binder::calling_uid(), uid, false)?;
        let modes = self.modes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(modes
            .get(&(uid, package.to_string(), op.to_string()))
            .copied()
            .unwrap_or(AppOpMode::Default))
    }

    fn set_mode(&self, op: &str, uid: Uid, package: &str, mode: AppOpMode) -> PlatformResult<()> {
        enforce_app_ops_access(Binder::calling_uid(), uid, true)?;
        let mut modes = self.modes.write().unwrap_or_else(PoisonError::into_inner);
        let key = (uid, package.to_string(), op.to_string());
        if mode == AppOpMode::Default {
            modes.remove(&key);
        } else {
            modes.insert(key, mode);
        }
        Ok(())
    }
}

/// User manager over a fixed set of users.
#[derive(Debug)]
pub struct InMemoryUserManager {
    users: RwLock<BTreeMap<UserId, BTreeSet<String>>>,
    current: AtomicI32,
}

impl InMemoryUserManager {
    /// Creates a user manager containing only the system user, which is
    /// also the current user.
    #[must_use]
    pub fn new() -> Self {
        let manager = Self {
            users: RwLock::new(BTreeMap::new()),
            current: AtomicI32::new(UserId::SYSTEM.0),
        };
        manager.add_user(UserId::SYSTEM);
        manager
    }

    /// Adds a user with no restrictions. Existing users are left untouched.
    pub fn add_user(&self, user: UserId) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user)
            .or_default();
    }

    /// Removes a user.
    pub fn remove_user(&self, user: UserId) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user);
    }

    /// Adds a restriction to an existing user, creating it if needed.
    pub fn add_restriction(&self, user: UserId, restriction: impl Into<String>) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user)
            .or_default()
            .insert(restriction.into());
    }

    /// Switches the current user.
    pub fn set_current_user(&self, user: UserId) {
        self.current.store(user.0, Ordering::SeqCst);
    }
}

impl Default for InMemoryUserManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UserManager for InMemoryUserManager {
    fn user_exists(&self, user: UserId) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&user)
    }

    fn has_user_restriction(&self, restriction: &str, user: UserId) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .is_some_and(|restrictions| restrictions.contains(restriction))
    }

    fn current_user(&self) -> UserId {
        UserId(self.current.load(Ordering::SeqCst))
    }
}

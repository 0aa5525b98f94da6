//! Platform collaborator seam.
//!
//! The ECM engine never talks to the OS directly. Everything it needs from
//! the package manager, the app-ops ledger and the user manager goes through
//! the traits in this module, so the same policy code runs against the
//! in-memory platform used in tests and against the durable stores wired up
//! by the daemon.
//!
//! # Identifiers
//!
//! Android multiplexes users into the uid space: every user owns a block of
//! [`PER_USER_RANGE`] uids and an app keeps the same [`AppId`] in every user
//! it is installed for.
//!
//! ```text
//! uid = user_id * PER_USER_RANGE + app_id
//! ```

pub mod inventory;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trust::CertificateDigest;

/// Number of uids reserved for each user.
pub const PER_USER_RANGE: u32 = 100_000;

/// Permission a caller needs to reach any ECM entry point.
pub const MANAGE_ENHANCED_CONFIRMATION_STATES: &str =
    "android.permission.MANAGE_ENHANCED_CONFIRMATION_STATES";

/// Permission allowing a caller to act on behalf of other users.
pub const INTERACT_ACROSS_USERS: &str = "android.permission.INTERACT_ACROSS_USERS";

/// Stronger variant of [`INTERACT_ACROSS_USERS`].
pub const INTERACT_ACROSS_USERS_FULL: &str = "android.permission.INTERACT_ACROSS_USERS_FULL";

/// Permission held by packages allowed to install other packages.
pub const INSTALL_PACKAGES: &str = "android.permission.INSTALL_PACKAGES";

/// User restriction that blocks the shell from acting on a user.
pub const DISALLOW_DEBUGGING_FEATURES: &str = "no_debugging_features";

/// A Linux/Android uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    /// The superuser.
    pub const ROOT: Self = Self(0);
    /// The system server.
    pub const SYSTEM: Self = Self(1000);
    /// The adb shell.
    pub const SHELL: Self = Self(2000);

    /// Builds the uid an app id runs under for a given user.
    ///
    /// Returns `None` for negative (pseudo) users or if the uid would not fit.
    #[must_use]
    pub fn of(user: UserId, app: AppId) -> Option<Self> {
        let user = u32::try_from(user.0).ok()?;
        user.checked_mul(PER_USER_RANGE)
            .and_then(|base| base.checked_add(app.0 % PER_USER_RANGE))
            .map(Self)
    }

    /// The user this uid belongs to.
    #[must_use]
    pub fn user_id(self) -> UserId {
        // u32 / 100_000 always fits in an i32.
        UserId(i32::try_from(self.0 / PER_USER_RANGE).unwrap_or(i32::MAX))
    }

    /// The app id part of this uid.
    #[must_use]
    pub const fn app_id(self) -> AppId {
        AppId(self.0 % PER_USER_RANGE)
    }

    /// Whether this uid is implicitly granted every permission.
    #[must_use]
    pub fn is_root_or_system(self) -> bool {
        let app = self.app_id();
        app == Self::ROOT.app_id() || app == Self::SYSTEM.app_id()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user id. Negative values are pseudo users. Defaults to the system user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i32);

impl UserId {
    /// The device owner / first user.
    pub const SYSTEM: Self = Self(0);
    /// Pseudo user resolved to the current foreground user.
    pub const CURRENT: Self = Self(-2);

    /// Whether this id names a concrete user.
    #[must_use]
    pub const fn is_concrete(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user-independent part of a uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

/// Facts about an installed package for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Package name.
    pub package_name: String,
    /// Uid the package runs under for the queried user.
    pub uid: Uid,
    /// Whether the package is pre-installed on the system image.
    pub is_system: bool,
}

/// Where an install came from, as reported by the package installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
    /// Installer did not say.
    #[default]
    Unspecified,
    /// Something other than the listed sources.
    Other,
    /// An app store.
    Store,
    /// A file already on the device.
    LocalFile,
    /// A file downloaded from the internet.
    DownloadedFile,
}

impl PackageSource {
    /// Numeric value used by the platform installer API.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Other => 1,
            Self::Store => 2,
            Self::LocalFile => 3,
            Self::DownloadedFile => 4,
        }
    }

    /// Whether the package arrived as a side-loaded file.
    #[must_use]
    pub const fn is_file_based(self) -> bool {
        matches!(self, Self::LocalFile | Self::DownloadedFile)
    }
}

/// Install provenance of a package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallSourceInfo {
    /// Reported package source.
    pub package_source: PackageSource,
    /// The package that performed the install, if known.
    pub installing_package: Option<String>,
}

/// Errors raised by platform collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlatformError {
    /// The package is not installed for the user.
    #[error("package {package} not found for user {user}")]
    PackageNotFound {
        /// Package that was looked up.
        package: String,
        /// User the lookup was made for.
        user: UserId,
    },

    /// The calling identity is not allowed to perform the operation.
    #[error("uid {uid} is not allowed to {operation}")]
    PermissionDenied {
        /// What was attempted.
        operation: String,
        /// Calling uid at the time of the attempt.
        uid: Uid,
    },

    /// A stored value could not be interpreted.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result alias for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Read-only view of installed packages.
pub trait PackageManager: Send + Sync {
    /// Looks up a package installed for `user`.
    ///
    /// # Errors
    ///
    /// [`PlatformError::PackageNotFound`] if the package is not installed for
    /// that user.
    fn application_info(&self, package: &str, user: UserId) -> PlatformResult<ApplicationInfo>;

    /// Returns the install provenance of a package.
    ///
    /// # Errors
    ///
    /// [`PlatformError::PackageNotFound`] if the package is not installed for
    /// that user.
    fn install_source_info(&self, package: &str, user: UserId)
    -> PlatformResult<InstallSourceInfo>;

    /// Whether the package is signed with a certificate whose SHA-256 digest
    /// is `digest`. Unknown packages are never signed.
    fn has_signing_certificate(&self, package: &str, user: UserId, digest: &CertificateDigest)
    -> bool;

    /// Whether `package` holds `permission` for `user`.
    fn check_package_permission(&self, permission: &str, package: &str, user: UserId) -> bool;

    /// Whether `uid` holds `permission`. Root and system hold everything.
    fn check_uid_permission(&self, permission: &str, uid: Uid) -> bool;
}

/// Modes an app op can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppOpMode {
    /// Operation allowed.
    Allowed,
    /// Operation silently ignored.
    Ignored,
    /// Operation rejected with an error.
    Errored,
    /// No explicit mode recorded.
    Default,
    /// Allowed only while in the foreground.
    Foreground,
}

impl AppOpMode {
    /// Platform numeric value of the mode.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Allowed => 0,
            Self::Ignored => 1,
            Self::Errored => 2,
            Self::Default => 3,
            Self::Foreground => 4,
        }
    }
}

impl TryFrom<i32> for AppOpMode {
    type Error = PlatformError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Allowed),
            1 => Ok(Self::Ignored),
            2 => Ok(Self::Errored),
            3 => Ok(Self::Default),
            4 => Ok(Self::Foreground),
            other => Err(PlatformError::Corrupt(format!("unknown app-op mode {other}"))),
        }
    }
}

/// The per-(uid, package, op) mode ledger.
///
/// Implementations must enforce the platform's access rule: a caller may
/// read its own modes, and only root or system may read other uids' modes or
/// write any mode. The calling uid is taken from
/// [`Binder::calling_uid`](crate::identity::Binder::calling_uid).
pub trait AppOpsStore: Send + Sync {
    /// Reads the mode of `op` for `(uid, package)`; unset keys read as
    /// [`AppOpMode::Default`].
    ///
    /// # Errors
    ///
    /// [`PlatformError::PermissionDenied`] if the calling identity may not
    /// read the key, or a storage error.
    fn unsafe_check_op_raw(&self, op: &str, uid: Uid, package: &str) -> PlatformResult<AppOpMode>;

    /// Writes the mode of `op` for `(uid, package)`.
    ///
    /// # Errors
    ///
    /// [`PlatformError::PermissionDenied`] if the calling identity may not
    /// change modes, or a storage error.
    fn set_mode(&self, op: &str, uid: Uid, package: &str, mode: AppOpMode) -> PlatformResult<()>;
}

/// Users on the device.
pub trait UserManager: Send + Sync {
    /// Whether the user exists.
    fn user_exists(&self, user: UserId) -> bool;

    /// Whether the user carries the named restriction.
    fn has_user_restriction(&self, restriction: &str, user: UserId) -> bool;

    /// The current foreground user.
    fn current_user(&self) -> UserId;
}

/// The set of collaborators the engine runs against.
#[derive(Clone)]
pub struct Platform {
    /// Package manager.
    pub packages: Arc<dyn PackageManager>,
    /// App-ops ledger.
    pub app_ops: Arc<dyn AppOpsStore>,
    /// User manager.
    pub users: Arc<dyn UserManager>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

/// Access rule shared by app-op store implementations.
///
/// # Errors
///
/// [`PlatformError::PermissionDenied`] when `caller` is neither root/system
/// nor, for reads, the owner of `target`.
pub fn enforce_app_ops_access(caller: Uid, target: Uid, write: bool) -> PlatformResult<()> {
    if caller.is_root_or_system() || (!write && caller == target) {
        return Ok(());
    }
    Err(PlatformError::PermissionDenied {
        operation: if write {
            "change app-op modes".to_string()
        } else {
            format!("read app-op modes of uid {target}")
        },
        uid: caller,
    })
}

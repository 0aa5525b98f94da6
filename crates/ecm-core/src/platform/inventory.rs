//! Device inventory file.
//!
//! Describes the users and installed packages of a device in TOML. The daemon
//! loads it at start to populate the in-memory package and user managers.
//!
//! ```toml
//! current_user = 0
//!
//! [[users]]
//! id = 0
//!
//! [[users]]
//! id = 10
//! restrictions = ["no_debugging_features"]
//!
//! [[packages]]
//! name = "com.example.app"
//! app_id = 10123
//! users = [0, 10]
//! package_source = "downloaded_file"
//! installing_package = "com.android.chrome"
//! signing_certificates = ["<64 hex chars>"]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::memory::{InMemoryPackageManager, InMemoryUserManager, PackageRecord};
use super::{AppId, InstallSourceInfo, PER_USER_RANGE, PackageSource, UserId};
use crate::trust::CertificateDigest;

/// Inventory errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// I/O error reading the file.
    #[error("failed to read inventory: {0}")]
    Io(#[source] std::io::Error),

    /// Parse error.
    #[error("failed to parse inventory: {0}")]
    Parse(#[source] toml::de::Error),

    /// Semantic error.
    #[error("invalid inventory: {0}")]
    Validation(String),
}

/// A user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    /// User id.
    pub id: UserId,
    /// User restrictions in effect.
    #[serde(default)]
    pub restrictions: BTreeSet<String>,
}

/// A package entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageEntry {
    /// Package name.
    pub name: String,
    /// App id, below 100000.
    pub app_id: AppId,
    /// Users the package is installed for.
    pub users: BTreeSet<UserId>,
    /// Pre-installed on the system image.
    #[serde(default)]
    pub system: bool,
    /// Install source.
    #[serde(default)]
    pub package_source: PackageSource,
    /// Installing package.
    #[serde(default)]
    pub installing_package: Option<String>,
    /// SHA-256 digests of the signing certificates.
    #[serde(default)]
    pub signing_certificates: Vec<CertificateDigest>,
    /// Granted permissions.
    #[serde(default)]
    pub granted_permissions: BTreeSet<String>,
}

/// Parsed inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceInventory {
    /// Current foreground user.
    #[serde(default)]
    pub current_user: UserId,
    /// Users on the device.
    #[serde(default)]
    pub users: Vec<UserEntry>,
    /// Installed packages.
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
}

impl DeviceInventory {
    /// Loads an inventory from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path).map_err(InventoryError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses an inventory from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the inventory is
    /// inconsistent.
    pub fn from_toml(content: &str) -> Result<Self, InventoryError> {
        let inventory: Self = toml::from_str(content).map_err(InventoryError::Parse)?;
        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> Result<(), InventoryError> {
        let mut user_ids = BTreeSet::new();
        for user in &self.users {
            if !user.id.is_concrete() {
                return Err(InventoryError::Validation(format!(
                    "user id {} is not a concrete user",
                    user.id
                )));
            }
            if !user_ids.insert(user.id) {
                return Err(InventoryError::Validation(format!(
                    "user {} listed twice",
                    user.id
                )));
            }
        }
        if user_ids.is_empty() {
            user_ids.insert(UserId::SYSTEM);
        }
        if !user_ids.contains(&self.current_user) {
            return Err(InventoryError::Validation(format!(
                "current user {} is not listed",
                self.current_user
            )));
        }

        let mut names = BTreeSet::new();
        for package in &self.packages {
            if package.name.trim().is_empty() {
                return Err(InventoryError::Validation(
                    "package name must not be empty".to_string(),
                ));
            }
            if !names.insert(package.name.as_str()) {
                return Err(InventoryError::Validation(format!(
                    "package {} listed twice",
                    package.name
                )));
            }
            if package.app_id.0 >= PER_USER_RANGE {
                return Err(InventoryError::Validation(format!(
                    "package {}: app_id {} must be below {PER_USER_RANGE}",
                    package.name, package.app_id.0
                )));
            }
            if let Some(user) = package.users.iter().find(|u| !user_ids.contains(*u)) {
                return Err(InventoryError::Validation(format!(
                    "package {} installed for unknown user {user}",
                    package.name
                )));
            }
        }
        Ok(())
    }

    /// Builds the in-memory user manager described by the inventory. An
    /// inventory with no users yields just the system user.
    #[must_use]
    pub fn user_manager(&self) -> InMemoryUserManager {
        let manager = InMemoryUserManager::new();
        for user in &self.users {
            manager.add_user(user.id);
            for restriction in &user.restrictions {
                manager.add_restriction(user.id, restriction.clone());
            }
        }
        manager.set_current_user(self.current_user);
        manager
    }

    /// Builds the in-memory package manager described by the inventory.
    #[must_use]
    pub fn package_manager(&self) -> InMemoryPackageManager {
        let manager = InMemoryPackageManager::new();
        for entry in &self.packages {
            manager.install(PackageRecord {
                package_name: entry.name.clone(),
                app_id: entry.app_id,
                users: entry.users.clone(),
                is_system: entry.system,
                signing_certificates: entry.signing_certificates.clone(),
                install_source: InstallSourceInfo {
                    package_source: entry.package_source,
                    installing_package: entry.installing_package.clone(),
                },
                granted_permissions: entry.granted_permissions.clone(),
            });
        }
        manager
    }
}

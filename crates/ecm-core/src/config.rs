//! Configuration parsing and management.
//!
//! The service reads one TOML file at start. It describes the device form
//! factor, which revision of the protection and trust policies to apply, the
//! signer allowlists, and where the daemon keeps its socket and databases.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trust::SignedPackage;

/// Top-level ECM configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcmConfig {
    /// Device description.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Policy selection.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Packages trusted outright when signed with the listed certificate.
    #[serde(default)]
    pub trusted_packages: Vec<SignedPackage>,

    /// Installers trusted to vouch for what they install.
    #[serde(default)]
    pub trusted_installers: Vec<SignedPackage>,

    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl EcmConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a signer entry names an
    /// empty package.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, entries) in [
            ("trusted_packages", &self.trusted_packages),
            ("trusted_installers", &self.trusted_installers),
        ] {
            if let Some(index) = entries.iter().position(|e| e.package_name.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{section}[{index}]: package_name must not be empty"
                )));
            }
        }
        if self
            .policy
            .additional_protected_settings
            .iter()
            .any(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "policy.additional_protected_settings must not contain empty identifiers"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Device form factor. ECM applies to handhelds only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    /// Phones and tablets.
    #[default]
    Handheld,
    /// Television.
    Tv,
    /// Watch.
    Wear,
    /// Car head unit.
    Automotive,
}

impl FormFactor {
    /// Whether ECM guarding applies on this form factor.
    #[must_use]
    pub const fn supports_ecm(self) -> bool {
        matches!(self, Self::Handheld)
    }
}

/// Device description.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Form factor of the device.
    #[serde(default)]
    pub form_factor: FormFactor,
}

/// Membership policy of the protected-settings set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionPolicy {
    /// Fixed app ops plus default-app roles.
    #[default]
    RolesAndOps,
    /// Fixed app ops, roles, and an explicit list of runtime permissions.
    ExplicitPermissions,
}

/// How trusted installers are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Installer must be signed with a digest from the installer allowlist.
    #[default]
    SignatureAllowlist,
    /// Installer must be a pre-installed package holding `INSTALL_PACKAGES`.
    InstallPermission,
}

/// Policy selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Protected-set membership policy.
    #[serde(default)]
    pub protected_settings: ProtectionPolicy,

    /// Trusted-installer recognition policy.
    #[serde(default)]
    pub trust: TrustPolicy,

    /// Treat packages whose installer is not allowlisted as trusted, as long
    /// as they were not side-loaded from a file.
    #[serde(default = "default_trust_unlisted_installers")]
    pub trust_unlisted_installers: bool,

    /// Extra identifiers added to the protected set.
    #[serde(default)]
    pub additional_protected_settings: Vec<String>,
}

const fn default_trust_unlisted_installers() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            protected_settings: ProtectionPolicy::default(),
            trust: TrustPolicy::default(),
            trust_unlisted_installers: default_trust_unlisted_installers(),
            additional_protected_settings: Vec::new(),
        }
    }
}

/// Daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Path of the service socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Permission bits applied to the socket file.
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,

    /// Path of the app-ops database.
    #[serde(default = "default_app_ops_db")]
    pub app_ops_db: PathBuf,

    /// Path of the device inventory.
    #[serde(default = "default_inventory")]
    pub inventory: PathBuf,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/ecm/ecm.sock")
}

const fn default_socket_mode() -> u32 {
    0o666
}

fn default_app_ops_db() -> PathBuf {
    PathBuf::from("/var/lib/ecm/appops.db")
}

fn default_inventory() -> PathBuf {
    PathBuf::from("/etc/ecm/inventory.toml")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            socket_mode: default_socket_mode(),
            app_ops_db: default_app_ops_db(),
            inventory: default_inventory(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),

    /// Parse error.
    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    /// Serialization error.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),

    /// Validation error.
    #[error("invalid config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    #[test]
    fn empty_config_uses_defaults() {
        let config = EcmConfig::from_toml("").unwrap();
        assert_eq!(config.device.form_factor, FormFactor::Handheld);
        assert_eq!(config.policy, PolicyConfig::default());
        assert!(config.policy.trust_unlisted_installers);
        assert!(config.trusted_packages.is_empty());
        assert_eq!(config.daemon, DaemonConfig::default());
    }

    #[test]
    fn parses_full_config() {
        let toml = format!(
            r#"
            [device]
            form_factor = "wear"

            [policy]
            protected_settings = "explicit_permissions"
            trust = "install_permission"
            trust_unlisted_installers = false
            additional_protected_settings = ["android.permission.READ_CONTACTS"]

            [[trusted_installers]]
            package_name = "com.android.vending"
            certificate_digest = "{DIGEST}"

            [daemon]
            socket_path = "/tmp/ecm.sock"
            socket_mode = 432
            app_ops_db = "/tmp/appops.db"
            inventory = "/tmp/inventory.toml"
            "#
        );
        let config = EcmConfig::from_toml(&toml).unwrap();
        assert_eq!(config.device.form_factor, FormFactor::Wear);
        assert_eq!(
            config.policy.protected_settings,
            ProtectionPolicy::ExplicitPermissions
        );
        assert_eq!(config.policy.trust, TrustPolicy::InstallPermission);
        assert!(!config.policy.trust_unlisted_installers);
        assert_eq!(config.trusted_installers.len(), 1);
        assert_eq!(
            config.trusted_installers[0].certificate_digest.to_hex(),
            DIGEST
        );
        assert_eq!(config.daemon.socket_mode, 0o660);
    }

    #[test]
    fn rejects_unknown_policy_keys() {
        let err = EcmConfig::from_toml("[policy]\ntrust_everything = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_malformed_digest() {
        let err = EcmConfig::from_toml(
            "[[trusted_packages]]\npackage_name = \"a\"\ncertificate_digest = \"abcd\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_empty_signer_name() {
        let toml = format!(
            "[[trusted_packages]]\npackage_name = \" \"\ncertificate_digest = \"{DIGEST}\"\n"
        );
        let err = EcmConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("trusted_packages[0]")));
    }

    #[test]
    fn only_handhelds_support_ecm() {
        assert!(FormFactor::Handheld.supports_ecm());
        assert!(!FormFactor::Tv.supports_ecm());
        assert!(!FormFactor::Wear.supports_ecm());
        assert!(!FormFactor::Automotive.supports_ecm());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = EcmConfig::default();
        config.policy.trust = TrustPolicy::InstallPermission;
        let text = config.to_toml().unwrap();
        let parsed = EcmConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.policy, config.policy);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecm.toml");
        std::fs::write(
            &path,
            "[device]\nform_factor = \"tv\"\n[daemon]\nsocket_path = \"/tmp/ecm.sock\"\n",
        )
        .unwrap();
        let config = EcmConfig::from_file(&path).unwrap();
        assert_eq!(config.device.form_factor, FormFactor::Tv);
        assert_eq!(config.daemon.socket_path, PathBuf::from("/tmp/ecm.sock"));

        assert!(matches!(
            EcmConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}

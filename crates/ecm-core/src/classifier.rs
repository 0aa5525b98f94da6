//! Restriction classifier.
//!
//! Decides whether a setting is eligible for ECM guarding at all. The answer
//! depends only on static configuration: the device form factor and the
//! protected-settings set.

use std::collections::HashSet;

use tracing::debug;

use crate::config::{FormFactor, PolicyConfig, ProtectionPolicy};
use crate::setting::{PROTECTED_APP_OPS, PROTECTED_PERMISSIONS, PROTECTED_ROLES, SettingKind};

/// Immutable set of guard-eligible setting identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSettings {
    members: HashSet<String>,
}

impl ProtectedSettings {
    /// Builds the set for a membership policy.
    #[must_use]
    pub fn for_policy(policy: ProtectionPolicy) -> Self {
        let mut members: HashSet<String> = PROTECTED_APP_OPS
            .iter()
            .chain(PROTECTED_ROLES)
            .map(ToString::to_string)
            .collect();
        if policy == ProtectionPolicy::ExplicitPermissions {
            members.extend(PROTECTED_PERMISSIONS.iter().map(ToString::to_string));
        }
        Self { members }
    }

    /// Builds the set described by the policy section of the config.
    #[must_use]
    pub fn from_config(policy: &PolicyConfig) -> Self {
        let mut set = Self::for_policy(policy.protected_settings);
        set.members
            .extend(policy.additional_protected_settings.iter().cloned());
        set
    }

    /// Whether `setting` is a member.
    #[must_use]
    pub fn contains(&self, setting: &str) -> bool {
        self.members.contains(setting)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Decides guard eligibility of settings.
#[derive(Debug, Clone)]
pub struct RestrictionClassifier {
    form_factor: FormFactor,
    protected: ProtectedSettings,
}

impl RestrictionClassifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new(form_factor: FormFactor, protected: ProtectedSettings) -> Self {
        Self {
            form_factor,
            protected,
        }
    }

    /// The form factor the classifier was built for.
    #[must_use]
    pub const fn form_factor(&self) -> FormFactor {
        self.form_factor
    }

    /// The protected set in use.
    #[must_use]
    pub const fn protected_settings(&self) -> &ProtectedSettings {
        &self.protected
    }

    /// Whether `setting` is guard-eligible on this device.
    #[must_use]
    pub fn is_setting_protected(&self, setting: &str) -> bool {
        if !self.form_factor.supports_ecm() {
            return false;
        }
        let protected = self.protected.contains(setting);
        debug!(
            setting,
            kind = %SettingKind::of(setting),
            protected,
            "classified setting"
        );
        protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setting::{OPSTR_ACCESS_NOTIFICATIONS, OPSTR_BIND_ACCESSIBILITY_SERVICE};

    fn handheld(policy: ProtectionPolicy) -> RestrictionClassifier {
        RestrictionClassifier::new(FormFactor::Handheld, ProtectedSettings::for_policy(policy))
    }

    #[test]
    fn ops_and_roles_are_protected_under_both_policies() {
        for policy in [
            ProtectionPolicy::RolesAndOps,
            ProtectionPolicy::ExplicitPermissions,
        ] {
            let classifier = handheld(policy);
            assert!(classifier.is_setting_protected(OPSTR_BIND_ACCESSIBILITY_SERVICE));
            assert!(classifier.is_setting_protected(OPSTR_ACCESS_NOTIFICATIONS));
            assert!(classifier.is_setting_protected("android.app.role.SMS"));
            assert!(classifier.is_setting_protected("android.app.role.WALLET"));
        }
    }

    #[test]
    fn runtime_permissions_depend_on_policy() {
        assert!(
            !handheld(ProtectionPolicy::RolesAndOps)
                .is_setting_protected("android.permission.READ_SMS")
        );
        assert!(
            handheld(ProtectionPolicy::ExplicitPermissions)
                .is_setting_protected("android.permission.READ_SMS")
        );
        assert!(
            handheld(ProtectionPolicy::ExplicitPermissions)
                .is_setting_protected("android.permission-group.CALL_LOG")
        );
    }

    #[test]
    fn unlisted_settings_are_not_protected() {
        let classifier = handheld(ProtectionPolicy::ExplicitPermissions);
        assert!(!classifier.is_setting_protected("android.permission.CAMERA"));
        assert!(!classifier.is_setting_protected("android.app.role.EMERGENCY"));
        assert!(!classifier.is_setting_protected("some_other_setting"));
        assert!(!classifier.is_setting_protected(""));
    }

    #[test]
    fn non_handheld_devices_never_protect() {
        for form_factor in [FormFactor::Tv, FormFactor::Wear, FormFactor::Automotive] {
            let classifier = RestrictionClassifier::new(
                form_factor,
                ProtectedSettings::for_policy(ProtectionPolicy::ExplicitPermissions),
            );
            let settings = PROTECTED_APP_OPS
                .iter()
                .chain(PROTECTED_ROLES)
                .chain(PROTECTED_PERMISSIONS);
            for setting in settings {
                assert!(
                    !classifier.is_setting_protected(setting),
                    "{setting} on {form_factor:?}"
                );
            }
        }
    }

    #[test]
    fn config_can_add_members() {
        let policy = PolicyConfig {
            additional_protected_settings: vec!["android.permission.READ_CONTACTS".into()],
            ..PolicyConfig::default()
        };
        let set = ProtectedSettings::from_config(&policy);
        assert!(set.contains("android.permission.READ_CONTACTS"));
        assert_eq!(
            set.len(),
            ProtectedSettings::for_policy(ProtectionPolicy::RolesAndOps).len() + 1
        );
    }
}

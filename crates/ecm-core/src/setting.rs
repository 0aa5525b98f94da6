//! Setting identifiers and well-known members of the protected set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of runtime and install-time permission names.
pub const PERMISSION_PREFIX: &str = "android.permission.";
/// Prefix of permission group names.
pub const PERMISSION_GROUP_PREFIX: &str = "android.permission-group.";
/// Prefix of app-op strings.
pub const APP_OP_PREFIX: &str = "android:";
/// Prefix of role names.
pub const ROLE_PREFIX: &str = "android.app.role.";

/// App op guarding accessibility service binding.
pub const OPSTR_BIND_ACCESSIBILITY_SERVICE: &str = "android:bind_accessibility_service";
/// App op guarding notification listener access.
pub const OPSTR_ACCESS_NOTIFICATIONS: &str = "android:access_notifications";

/// App ops guarded under every protection policy.
pub const PROTECTED_APP_OPS: &[&str] =
    &[OPSTR_BIND_ACCESSIBILITY_SERVICE, OPSTR_ACCESS_NOTIFICATIONS];

/// Default-app roles guarded under every protection policy.
pub const PROTECTED_ROLES: &[&str] = &[
    "android.app.role.ASSISTANT",
    "android.app.role.BROWSER",
    "android.app.role.CALL_REDIRECTION",
    "android.app.role.CALL_SCREENING",
    "android.app.role.DIALER",
    "android.app.role.HOME",
    "android.app.role.SMS",
    "android.app.role.WALLET",
];

/// Permissions and groups guarded only by the explicit-permission policy.
pub const PROTECTED_PERMISSIONS: &[&str] = &[
    "android.permission.SEND_SMS",
    "android.permission.RECEIVE_SMS",
    "android.permission.READ_SMS",
    "android.permission.RECEIVE_MMS",
    "android.permission.RECEIVE_WAP_PUSH",
    "android.permission.READ_CELL_BROADCASTS",
    "android.permission.READ_CALL_LOG",
    "android.permission.WRITE_CALL_LOG",
    "android.permission.PROCESS_OUTGOING_CALLS",
    "android.permission.READ_PHONE_STATE",
    "android.permission.CALL_PHONE",
    "android.permission.ANSWER_PHONE_CALLS",
    "android.permission.BIND_DEVICE_ADMIN",
    "android.permission-group.SMS",
    "android.permission-group.CALL_LOG",
    "android.permission-group.PHONE",
];

/// What kind of setting an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// A permission name.
    Permission,
    /// A permission group name.
    PermissionGroup,
    /// An app-op string.
    AppOp,
    /// A role name.
    Role,
    /// Anything else.
    Other,
}

impl SettingKind {
    /// Classifies an identifier by its namespace prefix.
    #[must_use]
    pub fn of(identifier: &str) -> Self {
        // The group prefix is not a prefix of the permission prefix, but
        // check it first anyway so the longest match wins.
        if identifier.starts_with(PERMISSION_GROUP_PREFIX) {
            Self::PermissionGroup
        } else if identifier.starts_with(PERMISSION_PREFIX) {
            Self::Permission
        } else if identifier.starts_with(ROLE_PREFIX) {
            Self::Role
        } else if identifier.starts_with(APP_OP_PREFIX) {
            Self::AppOp
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Permission => "permission",
            Self::PermissionGroup => "permission_group",
            Self::AppOp => "app_op",
            Self::Role => "role",
            Self::Other => "other",
        })
    }
}

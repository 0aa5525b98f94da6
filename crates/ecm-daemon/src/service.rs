//! The Enhanced Confirmation Mode service surface.
//!
//! Every entry point checks its caller before touching the engine. The
//! caller is whoever [`Binder::calling_uid`] reports on the current thread;
//! the IPC layer sets it from the peer credentials of the connection.
//!
//! # Check order
//!
//! ```text
//! cross-user ──▶ MANAGE_ENHANCED_CONFIRMATION_STATES ──▶ user exists
//!            ──▶ arguments ──▶ engine
//! ```
//!
//! The first failing check decides the error. Nothing is retried.

use ecm_core::config::{ConfigError, EcmConfig};
use ecm_core::engine::EcmEngine;
use ecm_core::error::{EcmError, EcmResult};
use ecm_core::identity::Binder;
use ecm_core::platform::{
    DISALLOW_DEBUGGING_FEATURES, INTERACT_ACROSS_USERS, INTERACT_ACROSS_USERS_FULL,
    MANAGE_ENHANCED_CONFIRMATION_STATES, Platform, Uid, UserId,
};
use tracing::{debug, info, warn};

/// Caller-checked front end of the ECM engine.
#[derive(Debug, Clone)]
pub struct EnhancedConfirmationService {
    engine: EcmEngine,
    platform: Platform,
}

impl EnhancedConfirmationService {
    /// Validates `config`, builds the engine and logs the effective policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the configuration is
    /// inconsistent.
    pub fn start(config: &EcmConfig, platform: Platform) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = EcmEngine::from_config(config, platform.clone());
        info!(
            form_factor = ?config.device.form_factor,
            protected_settings = ?config.policy.protected_settings,
            protected_count = engine.classifier().protected_settings().len(),
            trust = ?config.policy.trust,
            trust_unlisted_installers = config.policy.trust_unlisted_installers,
            trusted_packages = engine.trust_registry().trusted_package_count(),
            trusted_installers = engine.trust_registry().trusted_installer_count(),
            "enhanced confirmation service started"
        );
        Ok(Self { engine, platform })
    }

    /// The engine behind the service.
    #[must_use]
    pub const fn engine(&self) -> &EcmEngine {
        &self.engine
    }

    /// Whether changing `setting` for `package_name` in `user` is blocked.
    ///
    /// # Errors
    ///
    /// Security errors for unauthorized callers, illegal-argument errors
    /// for bad users, empty arguments or unknown packages.
    pub fn is_restricted(
        &self,
        package_name: &str,
        setting: &str,
        user: UserId,
    ) -> EcmResult<bool> {
        let user = self.enforce_caller(user, "is_restricted")?;
        require_non_empty("package_name", package_name)?;
        require_non_empty("setting_identifier", setting)?;
        self.engine.is_restricted(package_name, setting, user)
    }

    /// Lifts an acknowledged restriction.
    ///
    /// # Errors
    ///
    /// As [`Self::is_restricted`], plus illegal-state if the restriction was
    /// not acknowledged.
    pub fn clear_restriction(&self, package_name: &str, user: UserId) -> EcmResult<()> {
        let user = self.enforce_caller(user, "clear_restriction")?;
        require_non_empty("package_name", package_name)?;
        self.engine.clear_restriction(package_name, user)
    }

    /// Whether the restriction has been acknowledged and may be cleared.
    ///
    /// # Errors
    ///
    /// As [`Self::is_restricted`].
    pub fn is_clear_restriction_allowed(
        &self,
        package_name: &str,
        user: UserId,
    ) -> EcmResult<bool> {
        let user = self.enforce_caller(user, "is_clear_restriction_allowed")?;
        require_non_empty("package_name", package_name)?;
        self.engine.is_clear_restriction_allowed(package_name, user)
    }

    /// Records that the user saw the restriction dialog.
    ///
    /// # Errors
    ///
    /// As [`Self::is_restricted`].
    pub fn set_clear_restriction_allowed(&self, package_name: &str, user: UserId) -> EcmResult<()> {
        let user = self.enforce_caller(user, "set_clear_restriction_allowed")?;
        require_non_empty("package_name", package_name)?;
        self.engine.set_clear_restriction_allowed(package_name, user)
    }

    /// Cross-user, permission and user-existence checks. Returns the
    /// concrete target user.
    fn enforce_caller(&self, user: UserId, method: &'static str) -> EcmResult<UserId> {
        let caller = Binder::calling_uid();
        let result = self
            .enforce_cross_user(caller, user)
            .and_then(|user| self.enforce_permission(caller).map(|()| user))
            .and_then(|user| {
                if self.platform.users.user_exists(user) {
                    Ok(user)
                } else {
                    Err(EcmError::invalid_argument(
                        "user_id",
                        format!("user {user} does not exist"),
                    ))
                }
            });
        match &result {
            Ok(target) => debug!(method, %caller, user = %target, "caller checks passed"),
            Err(err) => warn!(method, %caller, %user, error = %err, "call rejected"),
        }
        result
    }

    fn enforce_cross_user(&self, caller: Uid, user: UserId) -> EcmResult<UserId> {
        let target = if user == UserId::CURRENT {
            self.platform.users.current_user()
        } else if user.is_concrete() {
            user
        } else {
            return Err(EcmError::invalid_argument(
                "user_id",
                format!("invalid user {user}"),
            ));
        };

        if caller.user_id() != target && !caller.is_root_or_system() {
            let packages = &self.platform.packages;
            if !packages.check_uid_permission(INTERACT_ACROSS_USERS, caller)
                && !packages.check_uid_permission(INTERACT_ACROSS_USERS_FULL, caller)
            {
                return Err(EcmError::security(format!(
                    "uid {caller} needs {INTERACT_ACROSS_USERS} or {INTERACT_ACROSS_USERS_FULL} \
                     to act on user {target}"
                )));
            }
        }

        if caller.app_id() == Uid::SHELL.app_id()
            && self
                .platform
                .users
                .has_user_restriction(DISALLOW_DEBUGGING_FEATURES, target)
        {
            return Err(EcmError::security(format!(
                "shell is not allowed to act on user {target}"
            )));
        }
        Ok(target)
    }

    fn enforce_permission(&self, caller: Uid) -> EcmResult<()> {
        if self
            .platform
            .packages
            .check_uid_permission(MANAGE_ENHANCED_CONFIRMATION_STATES, caller)
        {
            Ok(())
        } else {
            Err(EcmError::security(format!(
                "uid {caller} does not hold {MANAGE_ENHANCED_CONFIRMATION_STATES}"
            )))
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> EcmResult<()> {
    if value.is_empty() {
        Err(EcmError::invalid_argument(field, "must not be empty"))
    } else {
        Ok(())
    }
}

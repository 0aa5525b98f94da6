//! Error types for ECM operations.
//!
//! Every failure is terminal for the call that produced it; nothing here is
//! retried. [`EcmError::kind`] collapses the variants into the coarse
//! categories callers branch on.

use std::fmt;

use thiserror::Error;

use crate::platform::{PlatformError, UserId};

/// Coarse failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcmErrorKind {
    /// The caller passed a bad argument (empty string, unknown user or
    /// package).
    IllegalArgument,
    /// The caller lacks a required permission.
    Security,
    /// The requested transition is not legal from the current state.
    IllegalState,
    /// A collaborator failed.
    Internal,
}

impl fmt::Display for EcmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IllegalArgument => "illegal argument",
            Self::Security => "security",
            Self::IllegalState => "illegal state",
            Self::Internal => "internal",
        })
    }
}

/// Errors that can occur during ECM operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EcmError {
    /// An argument failed validation.
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The package is not installed for the user.
    #[error("couldn't find package {package} for user {user}")]
    PackageNotFound {
        /// Package that was looked up.
        package: String,
        /// User the lookup was made for.
        user: UserId,
    },

    /// The caller is not allowed to make this call.
    #[error("permission denial: {reason}")]
    Security {
        /// Description of the missing grant.
        reason: String,
    },

    /// The call is not legal in the current ECM state.
    #[error("illegal state: {reason}")]
    IllegalState {
        /// Description of the violated precondition.
        reason: String,
    },

    /// A platform collaborator failed.
    #[error("platform failure: {0}")]
    Platform(#[source] PlatformError),
}

impl EcmError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a security error.
    #[must_use]
    pub fn security(reason: impl Into<String>) -> Self {
        Self::Security {
            reason: reason.into(),
        }
    }

    /// Creates an illegal state error.
    #[must_use]
    pub fn illegal_state(reason: impl Into<String>) -> Self {
        Self::IllegalState {
            reason: reason.into(),
        }
    }

    /// The coarse category of this error.
    #[must_use]
    pub const fn kind(&self) -> EcmErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::PackageNotFound { .. } => {
                EcmErrorKind::IllegalArgument
            },
            Self::Security { .. } => EcmErrorKind::Security,
            Self::IllegalState { .. } => EcmErrorKind::IllegalState,
            Self::Platform(_) => EcmErrorKind::Internal,
        }
    }
}

impl From<PlatformError> for EcmError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PackageNotFound { package, user } => {
                Self::PackageNotFound { package, user }
            },
            other => Self::Platform(other),
        }
    }
}

/// Result alias for ECM operations.
pub type EcmResult<T> = Result<T, EcmError>;

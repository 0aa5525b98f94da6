//! Request and response messages.
//!
//! Payloads are JSON objects. Requests carry a `method` tag, responses a
//! `status` tag:
//!
//! ```json
//! {"method":"is_restricted","package_name":"com.example",
//!  "setting":"android:bind_accessibility_service","user_id":0}
//! {"status":"ok","value":true}
//! {"status":"error","code":"security","message":"..."}
//! ```

use ecm_core::error::{EcmError, EcmErrorKind};
use ecm_core::platform::UserId;
use serde::{Deserialize, Serialize};

/// A call to one of the service entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EcmRequest {
    /// Whether `setting` is blocked for the package.
    IsRestricted {
        /// Target package.
        package_name: String,
        /// Setting identifier.
        setting: String,
        /// Target user.
        user_id: UserId,
    },
    /// Lift an acknowledged restriction.
    ClearRestriction {
        /// Target package.
        package_name: String,
        /// Target user.
        user_id: UserId,
    },
    /// Whether the restriction may be cleared.
    IsClearRestrictionAllowed {
        /// Target package.
        package_name: String,
        /// Target user.
        user_id: UserId,
    },
    /// Record that the user saw the restriction dialog.
    SetClearRestrictionAllowed {
        /// Target package.
        package_name: String,
        /// Target user.
        user_id: UserId,
    },
}

impl EcmRequest {
    /// Wire name of the method.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::IsRestricted { .. } => "is_restricted",
            Self::ClearRestriction { .. } => "clear_restriction",
            Self::IsClearRestrictionAllowed { .. } => "is_clear_restriction_allowed",
            Self::SetClearRestrictionAllowed { .. } => "set_clear_restriction_allowed",
        }
    }
}

/// Error category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Bad user, empty argument or unknown package.
    IllegalArgument,
    /// Caller lacks a permission.
    Security,
    /// Operation not legal in the current state.
    IllegalState,
    /// Platform failure.
    Internal,
    /// Payload was not a valid request.
    MalformedRequest,
}

impl From<EcmErrorKind> for ErrorCode {
    fn from(kind: EcmErrorKind) -> Self {
        match kind {
            EcmErrorKind::IllegalArgument => Self::IllegalArgument,
            EcmErrorKind::Security => Self::Security,
            EcmErrorKind::IllegalState => Self::IllegalState,
            EcmErrorKind::Internal => Self::Internal,
        }
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EcmResponse {
    /// The call succeeded. Queries carry their answer in `value`.
    Ok {
        /// Boolean result of a query.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<bool>,
    },
    /// The call failed.
    Error {
        /// Error category.
        code: ErrorCode,
        /// Human-readable reason.
        message: String,
    },
}

impl EcmResponse {
    /// Success with a boolean answer.
    #[must_use]
    pub const fn value(value: bool) -> Self {
        Self::Ok { value: Some(value) }
    }

    /// Success without a value.
    #[must_use]
    pub const fn done() -> Self {
        Self::Ok { value: None }
    }

    /// Failure with an explicit code.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<&EcmError> for EcmResponse {
    fn from(err: &EcmError) -> Self {
        Self::error(err.kind().into(), err.to_string())
    }
}

//! ECM guard state and its app-op encoding.
//!
//! The state of a package is stored as the mode of a single app op,
//! [`OPSTR_ACCESS_RESTRICTED_SETTINGS`], keyed by the package's uid and name.
//!
//! ```text
//! IMPLICIT | GUARDED --set_clear_restriction_allowed--> GUARDED_AND_ACKNOWLEDGED
//!                        (only while guarded)
//! GUARDED_AND_ACKNOWLEDGED --clear_restriction--> NOT_GUARDED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EcmError, EcmResult};
use crate::platform::AppOpMode;

/// App op whose mode carries the ECM state.
pub const OPSTR_ACCESS_RESTRICTED_SETTINGS: &str = "android:access_restricted_settings";

/// Persistent guard state of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EcmState {
    /// The restriction does not apply.
    NotGuarded,
    /// The restriction applies until the user confirms.
    Guarded,
    /// The user has seen the confirmation dialog and may clear the
    /// restriction.
    GuardedAndAcknowledged,
    /// Nothing recorded; guard status comes from install provenance.
    Implicit,
}

impl EcmState {
    /// The app-op mode that stores this state.
    #[must_use]
    pub const fn to_mode(self) -> AppOpMode {
        match self {
            Self::NotGuarded => AppOpMode::Allowed,
            Self::GuardedAndAcknowledged => AppOpMode::Ignored,
            Self::Guarded => AppOpMode::Errored,
            Self::Implicit => AppOpMode::Default,
        }
    }

    /// Decodes a stored app-op mode.
    ///
    /// # Errors
    ///
    /// [`EcmError::IllegalState`] for modes that do not encode an ECM state.
    pub fn from_mode(mode: AppOpMode) -> EcmResult<Self> {
        match mode {
            AppOpMode::Allowed => Ok(Self::NotGuarded),
            AppOpMode::Ignored => Ok(Self::GuardedAndAcknowledged),
            AppOpMode::Errored => Ok(Self::Guarded),
            AppOpMode::Default => Ok(Self::Implicit),
            AppOpMode::Foreground => Err(EcmError::illegal_state(format!(
                "app-op mode {} does not encode an ECM state",
                mode.as_i32()
            ))),
        }
    }

    /// Whether this explicit state guards the package.
    #[must_use]
    pub const fn is_explicitly_guarded(self) -> bool {
        matches!(self, Self::Guarded | Self::GuardedAndAcknowledged)
    }
}

impl fmt::Display for EcmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotGuarded => "NOT_GUARDED",
            Self::Guarded => "GUARDED",
            Self::GuardedAndAcknowledged => "GUARDED_AND_ACKNOWLEDGED",
            Self::Implicit => "IMPLICIT",
        })
    }
}

//! # ecm-core
//!
//! Enhanced Confirmation Mode (ECM) restriction engine.
//!
//! ECM blocks security-sensitive settings (accessibility binding,
//! notification access, default-app roles, ...) for apps that arrived
//! through an untrusted install path, until the user explicitly re-confirms.
//! This crate holds the policy: which settings are protected, which packages
//! are guarded, and how a package's persisted guard state may change.
//!
//! ## Components
//!
//! - [`trust`]: signer allowlists for trusted packages and installers
//! - [`classifier`]: guard eligibility of settings
//! - [`resolver`]: guard status of packages
//! - [`mutator`]: guard state transitions
//! - [`engine`]: the three wired together
//! - [`platform`]: traits for the package manager, app ops and users, plus
//!   in-memory implementations and the device inventory loader
//! - [`identity`]: per-thread calling identity with clear/restore
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ecm_core::config::EcmConfig;
//! use ecm_core::engine::EcmEngine;
//! use ecm_core::platform::memory::{
//!     InMemoryAppOps, InMemoryPackageManager, InMemoryUserManager, PackageRecord,
//! };
//! use ecm_core::platform::{AppId, PackageSource, Platform, UserId};
//! use ecm_core::setting::OPSTR_BIND_ACCESSIBILITY_SERVICE;
//!
//! let packages = InMemoryPackageManager::new();
//! packages.install(
//!     PackageRecord::new("com.example.sideloaded", AppId(10_123))
//!         .for_user(UserId(0))
//!         .installed_from(PackageSource::DownloadedFile, Some("com.android.chrome")),
//! );
//! let platform = Platform {
//!     packages: Arc::new(packages),
//!     app_ops: Arc::new(InMemoryAppOps::new()),
//!     users: Arc::new(InMemoryUserManager::new()),
//! };
//! let engine = EcmEngine::from_config(&EcmConfig::default(), platform);
//!
//! let pkg = "com.example.sideloaded";
//! assert!(engine.is_restricted(pkg, OPSTR_BIND_ACCESSIBILITY_SERVICE, UserId(0))?);
//! engine.set_clear_restriction_allowed(pkg, UserId(0))?;
//! engine.clear_restriction(pkg, UserId(0))?;
//! assert!(!engine.is_restricted(pkg, OPSTR_BIND_ACCESSIBILITY_SERVICE, UserId(0))?);
//! # Ok::<(), ecm_core::error::EcmError>(())
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod mutator;
pub mod platform;
pub mod resolver;
pub mod setting;
pub mod state;
pub mod store;
pub mod trust;

pub use engine::EcmEngine;
pub use error::{EcmError, EcmErrorKind, EcmResult};
pub use state::EcmState;

//! ecm-daemon - Enhanced Confirmation Mode service daemon.
//!
//! Serves the ECM entry points on a Unix socket. The package and user state
//! of the device comes from a TOML inventory; ECM state is persisted in a
//! SQLite app-ops ledger.
//!
//! # Modules
//!
//! - [`service`]: caller-checked entry points over [`ecm_core::EcmEngine`]
//! - [`app_ops_db`]: durable app-ops ledger
//! - [`protocol`]: framing, messages, dispatch, server and client

pub mod app_ops_db;
pub mod protocol;
pub mod service;

use std::sync::Arc;

use ecm_core::platform::inventory::DeviceInventory;
use ecm_core::platform::{AppOpsStore, Platform};

pub use service::EnhancedConfirmationService;

/// Platform backed by `inventory` for packages and users and by `app_ops`
/// for ECM state.
#[must_use]
pub fn platform_from_inventory(
    inventory: &DeviceInventory,
    app_ops: Arc<dyn AppOpsStore>,
) -> Platform {
    Platform {
        packages: Arc::new(inventory.package_manager()),
        app_ops,
        users: Arc::new(inventory.user_manager()),
    }
}

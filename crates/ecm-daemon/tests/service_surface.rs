//! Caller checks and end-to-end behaviour of the service surface.
//!
//! Calls are made as specific uids through [`CallingScope`], the way the
//! socket dispatcher makes them.

use std::sync::Arc;

use ecm_core::config::EcmConfig;
use ecm_core::error::{EcmError, EcmErrorKind};
use ecm_core::identity::{CallingScope, Identity};
use ecm_core::platform::inventory::DeviceInventory;
use ecm_core::platform::{AppOpMode, AppOpsStore, Uid, UserId};
use ecm_core::setting::OPSTR_BIND_ACCESSIBILITY_SERVICE;
use ecm_core::state::OPSTR_ACCESS_RESTRICTED_SETTINGS;
use ecm_daemon::app_ops_db::SqliteAppOpsStore;
use ecm_daemon::{EnhancedConfirmationService, platform_from_inventory};

const INVENTORY: &str = r#"
current_user = 0

[[users]]
id = 0

[[users]]
id = 10
restrictions = ["no_debugging_features"]

[[packages]]
name = "com.android.permissioncontroller"
app_id = 10001
users = [0, 10]
granted_permissions = ["android.permission.MANAGE_ENHANCED_CONFIRMATION_STATES"]

[[packages]]
name = "com.example.crossuser"
app_id = 10002
users = [0]
granted_permissions = [
    "android.permission.MANAGE_ENHANCED_CONFIRMATION_STATES",
    "android.permission.INTERACT_ACROSS_USERS_FULL",
]

[[packages]]
name = "com.android.shell"
app_id = 2000
users = [0, 10]
granted_permissions = [
    "android.permission.MANAGE_ENHANCED_CONFIRMATION_STATES",
    "android.permission.INTERACT_ACROSS_USERS",
]

[[packages]]
name = "com.example.nopermission"
app_id = 10003
users = [0]

[[packages]]
name = "com.example.sideloaded"
app_id = 10100
users = [0, 10]
package_source = "downloaded_file"
installing_package = "com.android.chrome"

[[packages]]
name = "com.example.fromstore"
app_id = 10101
users = [0]
package_source = "store"
installing_package = "com.android.vending"
"#;

const CONTROLLER: Uid = Uid(10_001);
const CROSS_USER: Uid = Uid(10_002);
const NO_PERMISSION: Uid = Uid(10_003);
const SIDELOADED: &str = "com.example.sideloaded";
const ACCESSIBILITY: &str = OPSTR_BIND_ACCESSIBILITY_SERVICE;

struct Fixture {
    app_ops: Arc<SqliteAppOpsStore>,
    service: EnhancedConfirmationService,
}

fn fixture() -> Fixture {
    let inventory = DeviceInventory::from_toml(INVENTORY).unwrap();
    let app_ops = Arc::new(SqliteAppOpsStore::in_memory().unwrap());
    let platform = platform_from_inventory(&inventory, app_ops.clone());
    let service = EnhancedConfirmationService::start(&EcmConfig::default(), platform).unwrap();
    Fixture { app_ops, service }
}

fn as_uid(uid: Uid) -> CallingScope {
    CallingScope::enter(Identity::new(uid, 100))
}

fn kind<T: std::fmt::Debug>(result: Result<T, EcmError>) -> EcmErrorKind {
    result.unwrap_err().kind()
}

#[test]
fn sideloaded_app_lifecycle() {
    let f = fixture();
    let user = UserId(0);
    {
        let _caller = as_uid(CONTROLLER);
        assert!(f.service.is_restricted(SIDELOADED, ACCESSIBILITY, user).unwrap());
        assert!(!f.service.is_clear_restriction_allowed(SIDELOADED, user).unwrap());
        assert_eq!(
            kind(f.service.clear_restriction(SIDELOADED, user)),
            EcmErrorKind::IllegalState
        );

        f.service.set_clear_restriction_allowed(SIDELOADED, user).unwrap();
        assert!(f.service.is_clear_restriction_allowed(SIDELOADED, user).unwrap());
        f.service.clear_restriction(SIDELOADED, user).unwrap();
        assert!(!f.service.is_restricted(SIDELOADED, ACCESSIBILITY, user).unwrap());
    }

    // Other users keep their own state.
    let _system = as_uid(Uid::SYSTEM);
    assert!(
        f.service
            .is_restricted(SIDELOADED, ACCESSIBILITY, UserId(10))
            .unwrap()
    );
}

#[test]
fn store_app_is_not_restricted() {
    let f = fixture();
    let _caller = as_uid(CONTROLLER);
    let pkg = "com.example.fromstore";
    assert!(!f.service.is_restricted(pkg, ACCESSIBILITY, UserId(0)).unwrap());
    assert!(!f.service.is_clear_restriction_allowed(pkg, UserId(0)).unwrap());
    f.service.set_clear_restriction_allowed(pkg, UserId(0)).unwrap();
    assert!(f.app_ops.is_empty().unwrap());
}

#[test]
fn state_writes_are_attributed_to_the_service() {
    let f = fixture();
    let _caller = as_uid(CONTROLLER);
    f.service
        .set_clear_restriction_allowed(SIDELOADED, UserId(0))
        .unwrap();
    assert_eq!(
        f.app_ops
            .modified_by(OPSTR_ACCESS_RESTRICTED_SETTINGS, Uid(10_100), SIDELOADED)
            .unwrap(),
        Some(Uid::SYSTEM)
    );
    // The caller itself still cannot write app ops.
    assert!(
        f.app_ops
            .set_mode(
                OPSTR_ACCESS_RESTRICTED_SETTINGS,
                Uid(10_100),
                SIDELOADED,
                AppOpMode::Allowed,
            )
            .is_err()
    );
}

#[test]
fn caller_without_permission_is_rejected_first() {
    let f = fixture();
    let _caller = as_uid(NO_PERMISSION);
    assert_eq!(
        kind(f.service.is_restricted(SIDELOADED, ACCESSIBILITY, UserId(0))),
        EcmErrorKind::Security
    );
    // Permission is checked before arguments and user existence.
    assert_eq!(
        kind(f.service.is_restricted("", "", UserId(0))),
        EcmErrorKind::Security
    );
    assert_eq!(
        kind(f.service.clear_restriction(SIDELOADED, UserId(0))),
        EcmErrorKind::Security
    );
}

#[test]
fn cross_user_calls_need_interact_across_users() {
    let f = fixture();
    {
        let _caller = as_uid(CONTROLLER);
        assert_eq!(
            kind(f.service.is_restricted(SIDELOADED, ACCESSIBILITY, UserId(10))),
            EcmErrorKind::Security
        );
    }
    {
        let _caller = as_uid(CROSS_USER);
        assert!(
            f.service
                .is_restricted(SIDELOADED, ACCESSIBILITY, UserId(10))
                .unwrap()
        );
    }
    {
        let _caller = as_uid(Uid(1_010_001));
        assert!(
            f.service
                .is_restricted(SIDELOADED, ACCESSIBILITY, UserId(10))
                .unwrap()
        );
    }
}

#[test]
fn shell_is_blocked_on_debug_restricted_users() {
    let f = fixture();
    let _shell = as_uid(Uid::SHELL);
    assert!(
        f.service
            .is_restricted(SIDELOADED, ACCESSIBILITY, UserId(0))
            .unwrap()
    );
    assert_eq!(
        kind(f.service.is_restricted(SIDELOADED, ACCESSIBILITY, UserId(10))),
        EcmErrorKind::Security
    );
}

#[test]
fn bad_users_and_arguments() {
    let f = fixture();
    let _caller = as_uid(Uid::SYSTEM);
    assert_eq!(
        kind(f.service.is_restricted(SIDELOADED, ACCESSIBILITY, UserId(-7))),
        EcmErrorKind::IllegalArgument
    );
    assert!(matches!(
        f.service.is_restricted(SIDELOADED, ACCESSIBILITY, UserId(42)),
        Err(EcmError::InvalidArgument { field: "user_id", .. })
    ));
    assert!(matches!(
        f.service.set_clear_restriction_allowed("", UserId(0)),
        Err(EcmError::InvalidArgument {
            field: "package_name",
            ..
        })
    ));
    assert!(matches!(
        f.service.is_clear_restriction_allowed("com.not.installed", UserId(0)),
        Err(EcmError::PackageNotFound { .. })
    ));
}

#[test]
fn current_user_alias_resolves() {
    let inventory = DeviceInventory::from_toml(&INVENTORY.replace(
        "current_user = 0",
        "current_user = 10",
    ))
    .unwrap();
    let platform = platform_from_inventory(
        &inventory,
        Arc::new(SqliteAppOpsStore::in_memory().unwrap()),
    );
    let service = EnhancedConfirmationService::start(&EcmConfig::default(), platform).unwrap();
    let _caller = as_uid(Uid(1_010_001));
    service
        .set_clear_restriction_allowed(SIDELOADED, UserId::CURRENT)
        .unwrap();
    assert!(
        service
            .is_clear_restriction_allowed(SIDELOADED, UserId(10))
            .unwrap()
    );
}

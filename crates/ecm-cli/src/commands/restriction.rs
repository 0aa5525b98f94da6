//! Restriction commands.
//!
//! Each command opens one connection, sends one request and prints the
//! answer. Error responses from the daemon become command failures.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ecm_core::platform::UserId;
use ecm_daemon::protocol::{EcmClient, EcmRequest, EcmResponse};
use tracing::debug;

fn call(socket_path: &Path, request: &EcmRequest) -> Result<Option<bool>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(async {
        let mut client = EcmClient::connect(socket_path).await.with_context(|| {
            format!("failed to connect to daemon at {}", socket_path.display())
        })?;
        debug!(method = request.method(), "sending request");
        match client
            .call(request)
            .await
            .with_context(|| format!("{} failed", request.method()))?
        {
            EcmResponse::Ok { value } => Ok(value),
            EcmResponse::Error { code, message } => bail!("{code:?}: {message}"),
        }
    })
}

fn expect_value(method: &str, value: Option<bool>) -> Result<bool> {
    value.with_context(|| format!("daemon returned no value for {method}"))
}

/// Prints whether `setting` is restricted for the package.
///
/// # Errors
///
/// Connection failures and daemon error responses.
pub fn is_restricted(
    socket_path: &Path,
    package: &str,
    setting: &str,
    user: UserId,
) -> Result<()> {
    let value = call(socket_path, &EcmRequest::IsRestricted {
        package_name: package.to_string(),
        setting: setting.to_string(),
        user_id: user,
    })?;
    println!("{}", expect_value("is_restricted", value)?);
    Ok(())
}

/// Clears an acknowledged restriction.
///
/// # Errors
///
/// Connection failures and daemon error responses.
pub fn clear_restriction(socket_path: &Path, package: &str, user: UserId) -> Result<()> {
    call(socket_path, &EcmRequest::ClearRestriction {
        package_name: package.to_string(),
        user_id: user,
    })?;
    println!("Restriction cleared for '{package}'");
    Ok(())
}

/// Prints whether the restriction may be cleared.
///
/// # Errors
///
/// Connection failures and daemon error responses.
pub fn is_clear_restriction_allowed(
    socket_path: &Path,
    package: &str,
    user: UserId,
) -> Result<()> {
    let value = call(socket_path, &EcmRequest::IsClearRestrictionAllowed {
        package_name: package.to_string(),
        user_id: user,
    })?;
    println!("{}", expect_value("is_clear_restriction_allowed", value)?);
    Ok(())
}

/// Records that the restriction dialog was shown, then reports whether the
/// restriction is now clearable.
///
/// The daemon ignores the acknowledgement for packages that are not guarded,
/// so the outcome is read back rather than assumed.
///
/// # Errors
///
/// Connection failures and daemon error responses.
pub fn set_clear_restriction_allowed(
    socket_path: &Path,
    package: &str,
    user: UserId,
) -> Result<()> {
    call(socket_path, &EcmRequest::SetClearRestrictionAllowed {
        package_name: package.to_string(),
        user_id: user,
    })?;
    let value = call(socket_path, &EcmRequest::IsClearRestrictionAllowed {
        package_name: package.to_string(),
        user_id: user,
    })?;
    let clearable = expect_value("is_clear_restriction_allowed", value)?;
    println!("{}", acknowledgement_message(package, clearable));
    Ok(())
}

fn acknowledgement_message(package: &str, clearable: bool) -> String {
    if clearable {
        format!("Restriction acknowledged for '{package}'; it can now be cleared")
    } else {
        format!("'{package}' is not restricted; nothing to acknowledge")
    }
}

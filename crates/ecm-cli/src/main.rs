//! ecmctl - Enhanced Confirmation Mode client
//!
//! Queries and changes ECM restrictions through the ECM daemon socket.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ecm_core::config::EcmConfig;
use ecm_core::platform::UserId;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// ecmctl - Enhanced Confirmation Mode client
#[derive(Parser, Debug)]
#[command(name = "ecmctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the ECM configuration file (for the socket path)
    #[arg(short, long, default_value = "/etc/ecm/ecm.toml")]
    config: PathBuf,

    /// Path to Unix socket
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Package and user a command targets.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct Target {
    /// Package name
    #[arg(short, long)]
    package: String,

    /// User id; -2 targets the current user
    #[arg(short, long, default_value = "-2", allow_hyphen_values = true)]
    user: i32,
}

impl Target {
    const fn user_id(&self) -> UserId {
        UserId(self.user)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a setting is restricted for a package
    IsRestricted {
        #[command(flatten)]
        target: Target,

        /// Setting identifier (permission, app op or role)
        #[arg(short, long)]
        setting: String,
    },

    /// Clear an acknowledged restriction
    ClearRestriction {
        #[command(flatten)]
        target: Target,
    },

    /// Check whether a restriction may be cleared
    IsClearRestrictionAllowed {
        #[command(flatten)]
        target: Target,
    },

    /// Record that the user acknowledged the restriction
    SetClearRestrictionAllowed {
        #[command(flatten)]
        target: Target,
    },
}

/// `--socket` if given, else the socket named by the config file, else the
/// default. A config file that exists but does not load is an error.
fn socket_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(socket) = &cli.socket {
        return Ok(socket.clone());
    }
    if !cli.config.exists() {
        return Ok(EcmConfig::default().daemon.socket_path);
    }
    let config = EcmConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    Ok(config.daemon.socket_path)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let socket_path = socket_path(&cli)?;
    match &cli.command {
        Commands::IsRestricted { target, setting } => commands::restriction::is_restricted(
            &socket_path,
            &target.package,
            setting,
            target.user_id(),
        ),
        Commands::ClearRestriction { target } => {
            commands::restriction::clear_restriction(
                &socket_path,
                &target.package,
                target.user_id(),
            )
        },
        Commands::IsClearRestrictionAllowed { target } => {
            commands::restriction::is_clear_restriction_allowed(
                &socket_path,
                &target.package,
                target.user_id(),
            )
        },
        Commands::SetClearRestrictionAllowed { target } => {
            commands::restriction::set_clear_restriction_allowed(
                &socket_path,
                &target.package,
                target.user_id(),
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::CommandFactory;
    use tempfile::TempDir;

    use super::*;

    fn parse_with_config(config: &Path) -> Cli {
        let config = config.to_str().unwrap();
        Cli::try_parse_from([
            "ecmctl",
            "--config",
            config,
            "is-clear-restriction-allowed",
            "-p",
            "com.example",
        ])
        .unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_is_restricted() {
        let cli = Cli::try_parse_from([
            "ecmctl",
            "is-restricted",
            "--package",
            "com.example",
            "--setting",
            "android:bind_accessibility_service",
            "--user",
            "10",
        ])
        .unwrap();
        let Commands::IsRestricted { target, setting } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(target.user_id(), UserId(10));
        assert_eq!(target.package, "com.example");
        assert_eq!(setting, "android:bind_accessibility_service");
    }

    #[test]
    fn user_defaults_to_current() {
        let cli =
            Cli::try_parse_from(["ecmctl", "clear-restriction", "-p", "com.example"]).unwrap();
        let Commands::ClearRestriction { target } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(target.user_id(), UserId::CURRENT);
    }

    #[test]
    fn socket_flag_overrides_config() {
        let cli = Cli::try_parse_from([
            "ecmctl",
            "--socket",
            "/tmp/ecm-test.sock",
            "is-clear-restriction-allowed",
            "-p",
            "com.example",
        ])
        .unwrap();
        assert_eq!(
            socket_path(&cli).unwrap(),
            PathBuf::from("/tmp/ecm-test.sock")
        );
    }

    #[test]
    fn socket_path_read_from_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("ecm.toml");
        std::fs::write(&config, "[daemon]\nsocket_path = \"/run/ecm/test.sock\"\n").unwrap();
        let cli = parse_with_config(&config);
        assert_eq!(
            socket_path(&cli).unwrap(),
            PathBuf::from("/run/ecm/test.sock")
        );
    }

    #[test]
    fn missing_config_falls_back_to_default_socket() {
        let dir = TempDir::new().unwrap();
        let cli = parse_with_config(&dir.path().join("absent.toml"));
        assert_eq!(
            socket_path(&cli).unwrap(),
            EcmConfig::default().daemon.socket_path
        );
    }

    #[test]
    fn unreadable_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("ecm.toml");
        std::fs::write(&config, "[daemon\nsocket_path = 3").unwrap();
        let cli = parse_with_config(&config);
        let err = socket_path(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn package_is_required() {
        assert!(Cli::try_parse_from(["ecmctl", "set-clear-restriction-allowed"]).is_err());
    }
}

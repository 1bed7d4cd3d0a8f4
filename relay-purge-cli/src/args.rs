use std::path::PathBuf;

use clap::{ArgAction, Parser};
use relay_purge_config::ConfigOverrides;

/// Command-line arguments of the relay-purge binary.
///
/// Short flags follow the MySQL client conventions, which is why `-h` is the host and help is
/// only available as `--help`.
#[derive(Debug, Parser)]
#[command(
    name = "relay-purge",
    about = "Safely purges relay logs on a MySQL replica",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct AppArgs {
    /// MySQL database name
    #[arg(short = 'd')]
    pub database: Option<String>,

    /// MySQL host
    #[arg(short = 'h')]
    pub host: Option<String>,

    /// MySQL unix socket
    #[arg(short = 'S')]
    pub socket: Option<String>,

    /// MySQL user name
    #[arg(short = 'u')]
    pub user: Option<String>,

    /// MySQL user password
    #[arg(short = 'p')]
    pub password: Option<String>,

    /// MySQL port
    #[arg(short = 'P')]
    pub port: Option<u16>,

    /// Only read default options from the given file
    #[arg(long = "defaults-file")]
    pub defaults_file: Option<PathBuf>,

    /// Seconds to wait between the first relay-log flush and the replication re-check
    #[arg(long)]
    pub delay: Option<u64>,

    /// Purge relay logs. Without this flag the tool runs in dry-run mode
    #[arg(long)]
    pub go: bool,

    /// Print version information and exit
    #[arg(long)]
    pub version: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    #[allow(dead_code)]
    help: Option<bool>,
}

impl AppArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database: self.database.clone(),
            host: self.host.clone(),
            socket: self.socket.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            port: self.port,
            defaults_file: self.defaults_file.clone(),
            purge_delay_seconds: self.delay,
            go: self.go,
        }
    }
}

/// Returns the string printed by `--version`.
pub fn version_string() -> String {
    format!(
        "relay-purge version {} built for {} {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_flags() {
        let args = AppArgs::try_parse_from([
            "relay-purge",
            "-u",
            "root",
            "-p",
            "pass",
            "-h",
            "localhost",
            "-P",
            "13306",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.user.as_deref(), Some("root"));
        assert_eq!(overrides.password.as_deref(), Some("pass"));
        assert_eq!(overrides.host.as_deref(), Some("localhost"));
        assert_eq!(overrides.port, Some(13306));
        assert_eq!(overrides.purge_delay_seconds, None);
        assert!(!overrides.go);
    }

    #[test]
    fn test_purge_flags() {
        let args = AppArgs::try_parse_from([
            "relay-purge",
            "--defaults-file",
            "./my.cnf",
            "--delay",
            "5",
            "--go",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.defaults_file, Some(PathBuf::from("./my.cnf")));
        assert_eq!(overrides.purge_delay_seconds, Some(5));
        assert!(overrides.go);
        assert!(!args.version);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let err = AppArgs::try_parse_from(["relay-purge", "-g", "nihaha"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(AppArgs::try_parse_from(["relay-purge", "-P", "abc"]).is_err());
    }

    #[test]
    fn test_version_flag() {
        let args = AppArgs::try_parse_from(["relay-purge", "--version"]).unwrap();
        assert!(args.version);
        assert!(version_string().starts_with("relay-purge version "));
    }

    #[test]
    fn test_command_is_consistent() {
        use clap::CommandFactory;

        AppArgs::command().debug_assert();
    }
}

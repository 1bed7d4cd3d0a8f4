use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("`port` cannot be zero")]
    PortZero,
}

/// Resolved configuration of a purge run.
///
/// This intentionally does not implement `Serialize` to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeConfig {
    pub host: String,
    /// Unix socket path. When set, it is used instead of `host` and `port`.
    #[serde(default)]
    pub socket: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    /// Seconds to wait between the first relay-log flush and the replication re-check.
    pub purge_delay_seconds: u64,
    /// When true, checks run but no statement mutating the server is executed.
    pub dry_run: bool,
}

impl PurgeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::PortZero);
        }

        Ok(())
    }

    pub fn socket(&self) -> Option<&str> {
        self.socket.as_deref().filter(|socket| !socket.is_empty())
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref().filter(|database| !database.is_empty())
    }

    /// Creates the connection options for the target server.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new().username(&self.user);

        options = match self.socket() {
            Some(socket) => options.socket(socket),
            None => options.host(&self.host).port(self.port),
        };

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        if let Some(database) = self.database() {
            options = options.database(database);
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn config() -> PurgeConfig {
        PurgeConfig {
            host: "db.internal".to_string(),
            socket: None,
            user: "purger".to_string(),
            password: Some(SecretString::new("secret".to_string())),
            port: 13306,
            database: Some(String::new()),
            purge_delay_seconds: 7,
            dry_run: true,
        }
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = config();
        assert!(config.validate().is_ok());

        config.port = 0;
        assert!(matches!(config.validate(), Err(ValidationError::PortZero)));
    }

    #[test]
    fn test_connect_options_over_tcp() {
        let options = config().connect_options();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 13306);
        assert_eq!(options.get_username(), "purger");
        assert_eq!(options.get_socket(), None);
        assert_eq!(options.get_database(), None);
    }

    #[test]
    fn test_connect_options_prefer_socket() {
        let mut config = config();
        config.socket = Some("/var/run/mysqld/mysqld.sock".to_string());
        config.database = Some("app".to_string());

        let options = config.connect_options();

        assert_eq!(
            options.get_socket(),
            Some(Path::new("/var/run/mysqld/mysqld.sock").to_path_buf()).as_ref()
        );
        assert_eq!(options.get_database(), Some("app"));
    }

    #[test]
    fn test_empty_socket_is_ignored() {
        let mut config = config();
        config.socket = Some(String::new());

        assert_eq!(config.socket(), None);
    }
}

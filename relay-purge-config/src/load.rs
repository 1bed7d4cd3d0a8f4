use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use config::{ConfigError, FileFormat, Map};
use thiserror::Error;

use crate::environment::{LayerSource, mysql_environment};
use crate::purge::{PurgeConfig, ValidationError};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_PURGE_DELAY_SECONDS: u64 = 7;

/// Section of the MySQL defaults file read by MySQL client programs.
const CLIENT_SECTION: &str = "client";

/// Keys of the `[client]` section that are taken into account.
const DEFAULTS_FILE_KEYS: &[&str] = &["user", "password", "socket", "host", "port", "database"];

/// Values given explicitly on the command line.
///
/// Every value set here takes precedence over the environment and the defaults file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<String>,
    pub host: Option<String>,
    pub socket: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub defaults_file: Option<PathBuf>,
    pub purge_delay_seconds: Option<u64>,
    /// Actually purges relay logs instead of running in dry-run mode.
    pub go: bool,
}

/// Errors that can occur while resolving the configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The defaults file given on the command line does not exist.
    #[error("defaults file `{0}` does not exist")]
    DefaultsFileMissing(PathBuf),

    /// The defaults file exists but could not be parsed.
    #[error("failed to load defaults file `{path}`: {source}")]
    DefaultsFileLoad {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// A default or an override could not be registered.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] ConfigError),

    /// The merged values could not be deserialized, for example a non numeric port.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Resolves the configuration from the process environment and `overrides`.
pub fn load_purge_config(overrides: &ConfigOverrides) -> Result<PurgeConfig, LoadConfigError> {
    load_purge_config_from(overrides, &mysql_environment())
}

/// Resolves the configuration from the given MySQL environment variables and `overrides`.
///
/// Layers are applied in this order, each one overriding the previous:
/// 1. built-in defaults,
/// 2. `MYSQL_HOST`, `MYSQL_PWD`, `MYSQL_TCP_PORT` and `MYSQL_UNIX_PORT`,
/// 3. the `[client]` section of the defaults file, if one is given,
/// 4. the command-line overrides.
pub fn load_purge_config_from(
    overrides: &ConfigOverrides,
    env: &HashMap<String, String>,
) -> Result<PurgeConfig, LoadConfigError> {
    let mut builder = defaults()
        .map_err(LoadConfigError::Builder)?
        .add_source(LayerSource::from_mysql_environment(env));

    if let Some(defaults_file) = &overrides.defaults_file {
        builder = builder.add_source(load_defaults_file(defaults_file)?);
    }

    let builder = apply_overrides(builder, overrides).map_err(LoadConfigError::Builder)?;

    let config = builder
        .build()
        .and_then(|settings| settings.try_deserialize::<PurgeConfig>())
        .map_err(LoadConfigError::Deserialization)?;
    config.validate()?;

    Ok(config)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("user", "")?
        .set_default("purge_delay_seconds", DEFAULT_PURGE_DELAY_SECONDS)?
        .set_default("dry_run", true)
}

fn apply_overrides(
    builder: ConfigBuilder<DefaultState>,
    overrides: &ConfigOverrides,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder
        .set_override_option("database", overrides.database.clone())?
        .set_override_option("host", overrides.host.clone())?
        .set_override_option("socket", overrides.socket.clone())?
        .set_override_option("user", overrides.user.clone())?
        .set_override_option("password", overrides.password.clone())?
        .set_override_option("port", overrides.port.map(i64::from))?
        .set_override_option("purge_delay_seconds", overrides.purge_delay_seconds)?;

    if overrides.go {
        return builder.set_override("dry_run", false);
    }

    Ok(builder)
}

/// Reads the `[client]` section of a MySQL defaults file.
fn load_defaults_file(path: &Path) -> Result<LayerSource, LoadConfigError> {
    if !path.is_file() {
        return Err(LoadConfigError::DefaultsFileMissing(path.to_path_buf()));
    }

    let load_error = |source| LoadConfigError::DefaultsFileLoad {
        path: path.to_path_buf(),
        source,
    };

    let file = config::Config::builder()
        .add_source(config::File::from(path).format(FileFormat::Ini))
        .build()
        .map_err(load_error)?;

    let client = match file.get_table(CLIENT_SECTION) {
        Ok(client) => client,
        Err(ConfigError::NotFound(_)) => Map::new(),
        Err(source) => return Err(load_error(source)),
    };

    let values = client
        .into_iter()
        .filter(|(key, _)| DEFAULTS_FILE_KEYS.contains(&key.as_str()))
        .collect();

    Ok(LayerSource::new(values))
}

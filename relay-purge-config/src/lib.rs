//! Configuration of the relay-purge tool.
//!
//! Values are resolved from built-in defaults, the standard MySQL client environment variables,
//! an optional MySQL defaults file and command-line overrides, in increasing order of precedence.

mod environment;
mod load;
mod purge;

pub use environment::mysql_environment;
pub use load::{ConfigOverrides, LoadConfigError, load_purge_config, load_purge_config_from};
pub use purge::{PurgeConfig, ValidationError};

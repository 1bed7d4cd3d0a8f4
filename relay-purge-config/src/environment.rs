use std::collections::HashMap;

use config::{ConfigError, Map, Source, Value};

/// MySQL client environment variables and the configuration keys they set.
///
/// See <https://dev.mysql.com/doc/refman/8.0/en/environment-variables.html>.
const MYSQL_ENV_KEYS: &[(&str, &str)] = &[
    ("MYSQL_HOST", "host"),
    ("MYSQL_PWD", "password"),
    ("MYSQL_TCP_PORT", "port"),
    ("MYSQL_UNIX_PORT", "socket"),
];

/// Returns the MySQL client variables set in the process environment.
pub fn mysql_environment() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(name, _)| MYSQL_ENV_KEYS.iter().any(|(env_name, _)| env_name == name))
        .collect()
}

/// Fixed set of configuration values contributed by one layer.
#[derive(Debug, Clone)]
pub(crate) struct LayerSource {
    values: Map<String, Value>,
}

impl LayerSource {
    pub(crate) fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Builds the layer of the MySQL client environment variables found in `env`.
    ///
    /// Variables set to an empty string are ignored.
    pub(crate) fn from_mysql_environment(env: &HashMap<String, String>) -> Self {
        let origin = "environment".to_string();

        let values = MYSQL_ENV_KEYS
            .iter()
            .filter_map(|(env_name, key)| {
                let value = env.get(*env_name).filter(|value| !value.is_empty())?;
                Some((key.to_string(), Value::new(Some(&origin), value.clone())))
            })
            .collect();

        Self::new(values)
    }
}

impl Source for LayerSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_layer_maps_mysql_variables() {
        let env = HashMap::from([
            ("MYSQL_HOST".to_string(), "10.0.10.5".to_string()),
            ("MYSQL_PWD".to_string(), "secret".to_string()),
            ("MYSQL_TCP_PORT".to_string(), "13306".to_string()),
            ("MYSQL_UNIX_PORT".to_string(), String::new()),
            ("HOME".to_string(), "/root".to_string()),
        ]);

        let values = LayerSource::from_mysql_environment(&env).collect().unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values["host"].clone().into_string().unwrap(), "10.0.10.5");
        assert_eq!(values["password"].clone().into_string().unwrap(), "secret");
        assert_eq!(values["port"].clone().into_int().unwrap(), 13306);
        assert!(!values.contains_key("socket"));
    }
}

//! Service configuration, layered: built-in defaults, then an optional
//! `Piatto.toml`, then `PIATTO_*` environment overrides.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub log_filter: String,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("database_url", "postgres://localhost/piatto")?
            .set_default("max_connections", 5)?
            .set_default("log_filter", "info")?
            .add_source(config::File::with_name("Piatto").required(false))
            .add_source(config::Environment::with_prefix("PIATTO"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_file_or_env() {
        let config = ServiceConfig::load().unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.log_filter, "info");
    }
}

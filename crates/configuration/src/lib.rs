use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{ConnectionStrategy, Settings};

/// Loads the gateway configuration.
///
/// This function is the primary entry point for this crate. Sources are
/// layered: hard defaults first, then an optional `config.toml` file, then
/// environment variables (`APP_NAME`, `APP_VERSION`, `DEPLOY_REGION`, `PORT`,
/// `DATABASE_URL`, `CONNECTION_STRATEGY`). Environment variables always win.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_from(config::Environment::default().try_parsing(true))
}

/// Builds `Settings` from default values, the optional config file, and the
/// given environment source. Split out so tests can inject a fake environment.
fn load_from(env: config::Environment) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .set_default("app_name", "Unknown App")?
        .set_default("app_version", "0.0.0")?
        .set_default("deploy_region", "unknown-region")?
        .set_default("port", 5001)?
        .set_default("database_url", "")?
        .set_default("connection_strategy", "pooled")?
        // The file is optional; deployments that configure everything through
        // the environment do not need it.
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(env)
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.database_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "DATABASE_URL must be set to a PostgreSQL connection string".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConnectionStrategy;
    use std::collections::HashMap;

    fn fake_env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default()
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn defaults_apply_when_only_the_database_url_is_set() {
        let settings =
            load_from(fake_env(&[("DATABASE_URL", "postgres://app@localhost/app")])).unwrap();

        assert_eq!(settings.app_name, "Unknown App");
        assert_eq!(settings.app_version, "0.0.0");
        assert_eq!(settings.deploy_region, "unknown-region");
        assert_eq!(settings.port, 5001);
        assert_eq!(settings.connection_strategy, ConnectionStrategy::Pooled);
    }

    #[test]
    fn environment_variables_override_defaults() {
        let settings = load_from(fake_env(&[
            ("DATABASE_URL", "postgres://app@localhost/app"),
            ("APP_NAME", "Order Service"),
            ("APP_VERSION", "2.4.1"),
            ("DEPLOY_REGION", "eu-west-1"),
            ("PORT", "9998"),
            ("CONNECTION_STRATEGY", "singleton"),
        ]))
        .unwrap();

        assert_eq!(settings.app_name, "Order Service");
        assert_eq!(settings.app_version, "2.4.1");
        assert_eq!(settings.deploy_region, "eu-west-1");
        assert_eq!(settings.port, 9998);
        assert_eq!(settings.connection_strategy, ConnectionStrategy::Singleton);
    }

    #[test]
    fn missing_database_url_is_a_validation_error() {
        let err = load_from(fake_env(&[])).unwrap_err();
        match err {
            ConfigError::ValidationError(message) => {
                assert!(message.contains("DATABASE_URL"));
            }
            other => panic!("expected a validation error, got: {other}"),
        }
    }

    #[test]
    fn blank_database_url_is_a_validation_error() {
        let err = load_from(fake_env(&[("DATABASE_URL", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_strategy_is_rejected_at_load_time() {
        let err = load_from(fake_env(&[
            ("DATABASE_URL", "postgres://app@localhost/app"),
            ("CONNECTION_STRATEGY", "sharded"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("sharded"));
    }
}

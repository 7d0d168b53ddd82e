mod env;

pub use env::{Environment, MapEnvironment, ProcessEnvironment};

use crate::error::AppError;
use config::{Config as Cfg, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Settings common to every service binary.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_service_name() -> String {
    "crud-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            service_name: default_service_name(),
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

/// Layered configuration: an optional `configuration` file overridden by
/// `APP__SECTION__KEY` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    inner: Cfg,
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let inner = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self { inner })
    }

    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let inner = Cfg::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;

        Ok(Self { inner })
    }

    /// Deserializes a required section, failing with an explicit error when it is absent.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<T, AppError> {
        self.optional_section(name)?.ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "Missing required configuration section '{}'",
                name
            ))
        })
    }

    pub fn optional_section<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.inner.get::<T>(name) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(err) => Err(AppError::ConfigError(anyhow::anyhow!(
                "Invalid configuration section '{}': {}",
                name,
                err
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct JwtSection {
        issuer: String,
        access_token_expires: i64,
    }

    #[test]
    fn test_reads_present_section() -> Result<(), AppError> {
        let settings = Settings::from_toml(
            r#"
            [jwt]
            issuer = "notes"
            access_token_expires = 15
            "#,
        )?;

        let jwt: JwtSection = settings.section("jwt")?;
        assert_eq!(jwt.issuer, "notes");
        assert_eq!(jwt.access_token_expires, 15);
        Ok(())
    }

    #[test]
    fn test_missing_section_fails_fast() -> Result<(), AppError> {
        let settings = Settings::from_toml("[service]\nport = 9000\n")?;

        let err = settings
            .section::<JwtSection>("jwt")
            .expect_err("jwt section is absent");
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("'jwt'"));
        Ok(())
    }

    #[test]
    fn test_service_defaults() -> Result<(), AppError> {
        let settings = Settings::from_toml("[service]\nservice_name = \"notes\"\n")?;
        let service: ServiceConfig = settings.section("service")?;
        assert_eq!(service.port, 8080);
        assert_eq!(service.service_name, "notes");
        assert_eq!(service.log_level, "info");
        assert!(service.otlp_endpoint.is_none());
        Ok(())
    }
}

use crud_kit::auth::{grantable_roles, AuthCollections, JwtConfig};
use crud_kit::Role;
use serde::Deserialize;
use service_core::config::{ServiceConfig, Settings};
use service_core::error::AppError;
use validator::Validate;

#[derive(Debug, Clone)]
pub struct NotesConfig {
    pub service: ServiceConfig,
    pub jwt: JwtConfig,
    pub api_key: ApiKeyConfig,
    pub database: DatabaseConfig,
    pub health: HealthConfig,
    pub bootstrap: Option<BootstrapConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    /// Environment variable holding the expected `x-api-key` value.
    pub key_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: Backend,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default)]
    pub collections: Collections,
}

fn default_database_name() -> String {
    "notes".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collections {
    #[serde(default = "default_notes_collection")]
    pub notes: String,
    #[serde(flatten)]
    pub auth: AuthCollections,
}

fn default_notes_collection() -> String {
    "notes".to_string()
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            notes: default_notes_collection(),
            auth: AuthCollections::default(),
        }
    }
}

impl Collections {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.notes.clone(),
            self.auth.users.clone(),
            self.auth.invitations.clone(),
            self.auth.tokens.clone(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_route")]
    pub route: String,
}

fn default_health_route() -> String {
    "/health".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            route: default_health_route(),
        }
    }
}

/// First invitation seeded at startup, so a fresh deployment can sign up
/// its first administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BootstrapConfig {
    /// Environment variable holding the invitation code.
    #[validate(length(min = 1))]
    pub invitation_key_name: String,
    #[serde(default = "default_bootstrap_roles")]
    #[validate(length(min = 1), custom(function = "grantable_roles"))]
    pub roles: Vec<Role>,
}

fn default_bootstrap_roles() -> Vec<Role> {
    vec![Role::ADMIN]
}

impl NotesConfig {
    /// Reads `configuration.toml` and `APP__*` variables.
    pub fn load() -> Result<Self, AppError> {
        Self::from_settings(&Settings::load()?)
    }

    /// Every section except `health` is required; a missing one aborts startup.
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let service: ServiceConfig = settings.section("service")?;
        let jwt: JwtConfig = settings.section("jwt")?;
        let api_key: ApiKeyConfig = settings.section("api_key")?;
        let database: DatabaseConfig = settings.section("database")?;
        let health: HealthConfig = settings.optional_section("health")?.unwrap_or_default();
        let bootstrap: Option<BootstrapConfig> = settings.optional_section("bootstrap")?;

        jwt.validate().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid configuration section 'jwt': {}", e))
        })?;

        if let Some(bootstrap) = &bootstrap {
            bootstrap.validate().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Invalid configuration section 'bootstrap': {}",
                    e
                ))
            })?;
        }

        if database.backend == Backend::Mongo && database.connection_string.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "database.connection_string is required for the mongo backend"
            )));
        }

        if !health.route.starts_with('/') {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "health.route must start with '/', got '{}'",
                health.route
            )));
        }

        Ok(Self {
            service,
            jwt,
            api_key,
            database,
            health,
            bootstrap,
        })
    }
}

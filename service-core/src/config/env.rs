use crate::error::AppError;
use std::collections::HashMap;

/// Access to secret values held outside configuration files.
pub trait Environment: Send + Sync {
    /// Returns the value of `key`, failing when it is not set.
    fn get(&self, key: &str) -> Result<String, AppError>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn get(&self, key: &str) -> Result<String, AppError> {
        std::env::var(key).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set in the environment",
                key
            ))
        })
    }
}

/// Fixed key/value environment, used by tests and embedded setups.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Result<String, AppError> {
        self.values.get(key).cloned().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
        })
    }
}

use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::repositories::StorageMode;

/// Signing secret shipped as a default. Refused in production.
pub const PLACEHOLDER_JWT_SECRET: &str = "your-secret-key";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub mode: StorageMode,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub environment: RunEnvironment,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// Deployment environment the service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    Development,
    Test,
    Production,
}

impl RunEnvironment {
    /// Strict environments never fall back to in-memory storage and never
    /// expose internal error detail.
    pub fn is_strict(&self) -> bool {
        matches!(self, RunEnvironment::Production)
    }
}

impl JwtConfig {
    pub fn uses_placeholder_secret(&self) -> bool {
        self.secret == PLACEHOLDER_JWT_SECRET
    }
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, SERVER__HTTP_PORT, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{RUN_MODE}.toml)
    /// 3. Default config file (config/default.toml)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .set_default("server.http_port", 3000)?
            .set_default("server.environment", run_mode.as_str())?
            .set_default("database.url", "postgres://localhost:5432/users")?
            .set_default("database.mode", "persistent")?
            .set_default("database.max_connections", 5)?
            .set_default("jwt.secret", PLACEHOLDER_JWT_SECRET)?
            .set_default("jwt.expiration_hours", 168)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // DATABASE__URL=postgres://... overrides database.url
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        if config.server.environment.is_strict() && config.jwt.uses_placeholder_secret() {
            return Err(ConfigError::Message(
                "jwt.secret must be set to a non-default value in production".to_string(),
            ));
        }

        Ok(config)
    }
}

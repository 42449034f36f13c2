//! Layered settings: built-in defaults, an optional file, then `ITRACK__*`
//! environment variables.

use crate::error::Result;
use crate::logging::LogConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "ITRACK";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_DB_PATH: &str = "itrack.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Settings {
    /// Load settings. A missing `file` is an error only when one was named.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn load_with_env(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.bind", DEFAULT_BIND)?
            .set_default("database.path", DEFAULT_DB_PATH)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }
}

use jobgate_auth::config::AuthConfig;
use jobgate_core::parse_bool_flag;
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Administrator roles, permission caches and authority endpoints
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Endpoints handed to the collaborator constructors
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Development output. Without it only warnings and errors are emitted.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub debug: bool,
    /// Explicit filter directive, wins over `debug` when set.
    #[serde(default)]
    pub level: Option<String>,
}

impl LoggingConfig {
    /// Effective filter directive for the subscriber.
    pub fn effective_level(&self) -> &str {
        match (&self.level, self.debug) {
            (Some(level), _) if !level.trim().is_empty() => level,
            (_, true) => "debug",
            _ => "warn",
        }
    }
}

/// Locations of the out-of-scope subsystems. Opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub scheduler_url: Option<String>,
    #[serde(default)]
    pub log_store_url: Option<String>,
    #[serde(default)]
    pub kafka_host: Option<String>,
    #[serde(default)]
    pub slack_token: Option<String>,
}

/// Accept booleans, native integers (non-zero is true) and the strings
/// `true`/`false`. Numeric strings are rejected.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(i) => Ok(i != 0),
        Flag::Text(s) => parse_bool_flag(&s).map_err(serde::de::Error::custom),
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.auth.validate().map_err(|e| e.to_string())?;
        if let Some(level) = &self.logging.level {
            tracing_subscriber::EnvFilter::try_new(level)
                .map_err(|e| format!("logging.level '{level}' is not a valid filter: {e}"))?;
        }
        Ok(())
    }
}

pub mod loader {
    use super::EngineConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "jobgate.toml";

    /// Prefix of environment overrides, e.g. `JOBGATE__AUTH__CACHE__CAPACITY=1000`.
    pub const ENV_PREFIX: &str = "JOBGATE";

    pub fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                } else {
                    tracing::warn!(path = p, "Configuration file not found, using defaults");
                }
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: EngineConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

//! Validate a gateway configuration and report the effective settings.
//!
//! Usage: `jobgate-check [--config <path>]`

use std::env;

use jobgate_engine::{CollaboratorFactory, bootstrap};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From JOBGATE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (jobgate.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (JOBGATE_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

fn resolve_config_path() -> (Option<String>, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (Some(path), ConfigSource::CliArgument);
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return (Some(path.to_string()), ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("JOBGATE_CONFIG") {
        return (Some(path), ConfigSource::EnvironmentVariable);
    }

    (None, ConfigSource::Default)
}

fn main() {
    let (path, source) = resolve_config_path();

    let gateway = match bootstrap(path.as_deref(), CollaboratorFactory::default()) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            std::process::exit(2);
        }
    };

    let config = gateway.config();
    let auth = &config.auth;
    println!("configuration source: {source}");
    println!("admin roles: read={} write={}", auth.admin_read_role, auth.admin_write_role);
    println!(
        "permission caches: capacity={} ttl={}s",
        auth.cache.capacity,
        auth.cache.ttl.as_secs()
    );
    println!("authority timeout: {}ms", auth.authority_timeout.as_millis());
    println!(
        "workspace authority: {}",
        auth.workspace_url.as_deref().unwrap_or("<not configured>")
    );
    println!(
        "role authority: {}",
        auth.auth_url.as_deref().unwrap_or("<not configured>")
    );
    println!("log level: {}", config.logging.effective_level());
}

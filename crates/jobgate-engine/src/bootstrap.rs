//! Process startup: environment, configuration, logging and the shared
//! permission caches.

use std::sync::Arc;

use anyhow::Context;
use jobgate_auth::AuthCaches;

use crate::collaborators::CollaboratorFactory;
use crate::config::EngineConfig;
use crate::config::loader::load_config;
use crate::context::RequestContext;
use crate::observability;
use jobgate_core::CallerIdentity;

/// Process-wide state every request context is built from.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<EngineConfig>,
    caches: Arc<AuthCaches>,
    factory: Arc<CollaboratorFactory>,
}

impl Gateway {
    /// Assemble a gateway from an already loaded configuration.
    ///
    /// The permission caches are process-wide: the first gateway built in a
    /// process decides their capacity and TTL.
    pub fn new(config: EngineConfig, factory: CollaboratorFactory) -> anyhow::Result<Self> {
        let caches = AuthCaches::init_global(&config.auth.cache)
            .context("failed to initialize permission caches")?;
        Ok(Self::with_caches(config, caches, factory))
    }

    /// Assemble a gateway around caches owned by the caller.
    pub fn with_caches(
        config: EngineConfig,
        caches: Arc<AuthCaches>,
        factory: CollaboratorFactory,
    ) -> Self {
        Self {
            config: Arc::new(config),
            caches,
            factory: Arc::new(factory),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<AuthCaches> {
        &self.caches
    }

    /// Fresh context for one inbound call.
    pub fn context(&self, identity: CallerIdentity) -> RequestContext {
        RequestContext::new(
            Arc::clone(&self.config),
            identity,
            Arc::clone(&self.caches),
            Arc::clone(&self.factory),
        )
    }
}

/// Load `.env`, the configuration and logging, then build the gateway.
pub fn bootstrap(config_path: Option<&str>, factory: CollaboratorFactory) -> anyhow::Result<Gateway> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is fine
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let config = load_config(config_path)
        .map_err(anyhow::Error::msg)
        .context("failed to load configuration")?;
    observability::apply_logging_config(&config.logging);

    tracing::info!(
        capacity = config.auth.cache.capacity,
        ttl_secs = config.auth.cache.ttl.as_secs(),
        authority_timeout_ms = config.auth.authority_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    Gateway::new(config, factory)
}

//! Application context providing the dependency injection root.

use std::sync::Arc;

use crate::backend::{FlowBackend, HttpBackend, PostgresBackend};
use crate::config::Config;
use crate::di::FromRef;
use crate::error::AppError;

/// Shared backend handle.
pub type AppBackend = Arc<dyn FlowBackend>;

/// Root application context.
///
/// Holds the shared dependencies every service is built from.
#[derive(Clone)]
pub struct Context {
    /// Chain and canvas storage.
    pub backend: AppBackend,
    /// Application configuration.
    pub config: Arc<Config>,
}

impl Context {
    /// Creates a new context with the given dependencies.
    pub fn new(backend: impl FlowBackend + 'static, config: Config) -> Self {
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
        }
    }

    /// Build the context the configuration asks for.
    ///
    /// PostgreSQL takes precedence over the REST API when both are set.
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        if let Some(postgres) = &config.postgres {
            tracing::info!("Using PostgreSQL backend");
            let backend = PostgresBackend::connect(&postgres.uri, postgres.pool_size).await?;
            return Ok(Self::new(backend, config));
        }

        if let Some(api) = &config.api {
            tracing::info!("Using portal API at {}", api.base_url);
            let backend = HttpBackend::new(api)?;
            return Ok(Self::new(backend, config));
        }

        Err(AppError::NotConfigured)
    }
}

impl FromRef<Context> for AppBackend {
    fn from_ref(ctx: &Context) -> Self {
        ctx.backend.clone()
    }
}

impl FromRef<Context> for Arc<Config> {
    fn from_ref(ctx: &Context) -> Self {
        ctx.config.clone()
    }
}

//! Init command handler.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::backend::PostgresBackend;
use crate::config::Config;
use crate::migrations::run_migrations;

use super::App;

impl App {
    /// Run the init command to create the database schema.
    pub async fn run_init(&self) -> Result<()> {
        let config = Config::load()?;
        let postgres = config
            .postgres
            .as_ref()
            .ok_or_else(|| eyre!("init requires [postgres] uri to be configured"))?;

        tracing::info!("Connecting to PostgreSQL at {}", postgres.uri);
        let backend = PostgresBackend::connect(&postgres.uri, postgres.pool_size).await?;

        let result = run_migrations(&backend).await?;
        if result.applied_migrations.is_empty() {
            tracing::info!(
                "Database already at v{}, no migrations needed",
                result.current_version
            );
        } else {
            tracing::info!(
                "Migrations complete: v{} -> v{}, applied: {:?}",
                result.previous_version,
                result.current_version,
                result.applied_migrations
            );
        }

        Ok(())
    }
}

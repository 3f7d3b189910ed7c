//! Schema migrations for the PostgreSQL backend with version tracking.
//!
//! Migrations are:
//! - **Idempotent**: Use `IF NOT EXISTS` - required for safe retries
//! - **Additive-only**: Never drop columns or tables
//! - **Forward-only**: No rollback support - create compensating migrations if needed
//! - **Version-tracked**: Schema version stored in the `schema_version` table

mod m001_flow_schema;
mod m002_canvas_state;

use crate::backend::PostgresBackend;
use crate::error::AppError;

/// Result of running migrations.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Schema version before migrations ran.
    pub previous_version: u32,
    /// Schema version after migrations ran.
    pub current_version: u32,
    /// List of migration IDs that were applied.
    pub applied_migrations: Vec<String>,
}

/// Migration metadata entry.
struct MigrationEntry {
    id: &'static str,
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in version order.
const MIGRATIONS: &[MigrationEntry] = &[
    MigrationEntry {
        id: "m001_flow_schema",
        version: 1,
        description: "Chain tables (items, nodes, edges)",
        sql: m001_flow_schema::SQL,
    },
    MigrationEntry {
        id: "m002_canvas_state",
        version: 2,
        description: "Versioned canvas documents",
        sql: m002_canvas_state::SQL,
    },
];

/// SQL to create the schema_version table.
const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY DEFAULT 1 CHECK (id = 1),
    version INTEGER NOT NULL DEFAULT 0,
    applied_migrations TEXT[] NOT NULL DEFAULT '{}',
    last_applied_at TIMESTAMPTZ DEFAULT NOW()
);

-- Ensure exactly one row exists
INSERT INTO schema_version (id, version)
VALUES (1, 0)
ON CONFLICT (id) DO NOTHING;
"#;

/// Run all pending migrations.
///
/// Only migrations with a version higher than the stored schema version are
/// applied. Each migration and its version bump run in one transaction, so a
/// failed migration leaves both the schema and the version untouched.
pub async fn run_migrations(backend: &PostgresBackend) -> Result<MigrationResult, AppError> {
    let mut conn = backend.connection().await?;
    conn.batch_execute(CREATE_SCHEMA_VERSION_TABLE).await?;

    let previous_version: i32 = conn
        .query_one("SELECT version FROM schema_version WHERE id = 1", &[])
        .await?
        .try_get(0)?;
    let previous_version = u32::try_from(previous_version).unwrap_or(0);

    let mut current_version = previous_version;
    let mut applied = vec![];

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tracing::info!(
            "Applying migration {} (v{}): {}",
            migration.id,
            migration.version,
            migration.description
        );

        let tx = conn.transaction().await?;
        let outcome = async {
            tx.batch_execute(migration.sql).await?;
            tx.execute(
                "UPDATE schema_version \
                 SET version = $1, \
                     applied_migrations = array_append(applied_migrations, $2), \
                     last_applied_at = NOW() \
                 WHERE id = 1",
                &[&(migration.version as i32), &migration.id],
            )
            .await?;
            Ok::<(), AppError>(())
        }
        .await;

        match outcome {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                tracing::error!("Migration {} failed, rolling back: {}", migration.id, e);
                tx.rollback().await?;
                return Err(e);
            }
        }

        current_version = migration.version;
        applied.push(migration.id.to_string());
    }

    Ok(MigrationResult {
        previous_version,
        current_version,
        applied_migrations: applied,
    })
}

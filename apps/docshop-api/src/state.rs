//! Application state for the docshop server

use std::str::FromStr;
use std::sync::Arc;

use analysis_client::{AnalysisApi, HttpAnalysisClient};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub analysis: Arc<dyn AnalysisApi>,
}

impl AppState {
    /// Connect, migrate and build the HTTP analysis client
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);
        let db = connect(&config.database_url, config.db_max_connections).await?;
        run_migrations(&db).await?;

        let client = HttpAnalysisClient::new(config.analysis_client_config())
            .context("failed to build analysis client")?;
        tracing::info!(base_url = client.base_url(), "Analysis service configured");

        Ok(Self::with_parts(db, config, Arc::new(client)))
    }

    pub fn with_parts(db: SqlitePool, config: Config, analysis: Arc<dyn AnalysisApi>) -> Self {
        Self {
            db,
            config,
            analysis,
        }
    }
}

/// Open a pool with foreign keys enforced on every connection
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_staff INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS price_rules (
            file_extension TEXT PRIMARY KEY,
            price_per_unit TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            size_kb INTEGER NOT NULL,
            payment_status INTEGER NOT NULL DEFAULT 0,
            analysis_done INTEGER NOT NULL DEFAULT 0,
            extracted_text TEXT,
            remote_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cart_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            order_price TEXT NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
        // One open entry per (user, document)
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_cart_open_entry
            ON cart_entries(user_id, document_id) WHERE paid = 0
        "#,
        "CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<String> = tables.into_iter().map(|(n,)| n).collect();
        assert_eq!(
            names,
            vec!["cart_entries", "documents", "price_rules", "sessions", "users"]
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO documents (user_id, file_path, file_name, size_kb, remote_id, created_at)
             VALUES (999, 'p', 'n.pdf', 1, 1, '2024-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}

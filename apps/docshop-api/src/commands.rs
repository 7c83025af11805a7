//! Management subcommands

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::services::{auth, pricing};
use crate::state;

/// Upsert the default price table
pub async fn init_prices(config: &Config) -> Result<()> {
    let pool = state::connect(&config.database_url, config.db_max_connections).await?;
    state::run_migrations(&pool).await?;

    let installed = pricing::install_defaults(&pool)
        .await
        .context("failed to install price rules")?;
    info!("Installed {} default price rules", installed.len());

    for rule in pricing::list_rules(&pool).await? {
        info!(
            extension = %rule.file_extension,
            price = %rule.price_per_unit,
            "Price rule"
        );
    }
    Ok(())
}

pub async fn create_user(config: &Config, username: &str, password: &str, staff: bool) -> Result<()> {
    let pool = state::connect(&config.database_url, config.db_max_connections).await?;
    state::run_migrations(&pool).await?;

    let user = auth::create_user(&pool, username, password, staff)
        .await
        .with_context(|| format!("failed to create user {}", username))?;
    info!(user_id = user.id, username = %user.username, staff = user.is_staff, "User created");
    Ok(())
}

/// Try to connect once per second until the database answers
pub async fn wait_for_db(config: &Config, attempts: u32) -> Result<()> {
    for attempt in 1..=attempts.max(1) {
        match state::connect(&config.database_url, 1).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => {
                    info!(attempt, "Database available");
                    return Ok(());
                }
                Err(e) => warn!(attempt, "Database not ready: {}", e),
            },
            Err(e) => warn!(attempt, "Database unavailable, waiting 1 second: {:#}", e),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    bail!("database not available after {} attempts", attempts.max(1))
}

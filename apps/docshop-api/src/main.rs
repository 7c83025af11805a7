//! docshop API server
//!
//! Users upload images and PDFs, pay for them through a cart and then have
//! them analyzed by an external analysis service. Provides:
//! - Session-cookie accounts (register, login, logout)
//! - Document upload, analysis, text retrieval and deletion
//! - Cart pricing and payment confirmation
//! - Management subcommands (price table, users, database wait)

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod commands;
mod config;
mod error;
mod flash;
mod handlers;
mod middleware;
mod models;
mod password;
mod router;
mod services;
mod session;
mod signing;
mod state;

#[cfg(test)]
mod test_support;

use config::{Cli, Command, Config};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docshop_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = cli.config.validated()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::InitPrices => commands::init_prices(&config).await,
        Command::CreateUser {
            username,
            password,
            staff,
        } => commands::create_user(&config, &username, &password, staff).await,
        Command::WaitForDb { attempts } => commands::wait_for_db(&config, attempts).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Initializing docshop API...");
    let addr = config.bind_addr()?;
    tokio::fs::create_dir_all(&config.media_root).await?;

    let state = Arc::new(AppState::new(config).await?);
    let app = router::build_router(state);

    info!("Starting docshop API on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

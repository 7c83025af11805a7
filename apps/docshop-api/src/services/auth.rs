//! Accounts and login sessions

use chrono::Utc;
use shared_types::User;
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::models::{DbSession, DbUser};
use crate::password;
use crate::session::session_ttl;
use crate::signing;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

fn internal(message: String) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!(message))
}

/// Argon2 runs on the blocking pool
async fn hash_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(internal)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ServiceError> {
    let matches = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    Ok(matches)
}

pub async fn create_user(
    db: &SqlitePool,
    username: &str,
    raw_password: &str,
    is_staff: bool,
) -> Result<User, ServiceError> {
    let username = username.trim();
    password::validate_username(username).map_err(ServiceError::Validation)?;
    password::validate_password(raw_password, username).map_err(ServiceError::Validation)?;

    let hash = hash_blocking(raw_password.to_string()).await?;
    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, is_staff, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&hash)
    .bind(is_staff)
    .bind(Utc::now())
    .execute(db)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ServiceError::validation(USERNAME_TAKEN));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = id, username, is_staff, "User created");
    find_user(db, id).await
}

pub async fn find_user(db: &SqlitePool, id: i64) -> Result<User, ServiceError> {
    let row: Option<DbUser> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    row.map(User::from)
        .ok_or_else(|| ServiceError::not_found(format!("User {} not found.", id)))
}

/// Self-service signup; never grants staff
pub async fn register(
    db: &SqlitePool,
    username: &str,
    password: &str,
    password_confirm: &str,
) -> Result<User, ServiceError> {
    if password != password_confirm {
        return Err(ServiceError::validation(PASSWORD_MISMATCH));
    }
    create_user(db, username, password, false).await
}

/// Check credentials and open a session; returns the user and the cookie token
pub async fn login(
    db: &SqlitePool,
    secret: &str,
    username: &str,
    password: &str,
) -> Result<(User, String), ServiceError> {
    let row: Option<DbUser> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(db)
        .await?;

    let Some(row) = row else {
        verify_blocking(password.to_string(), password::DUMMY_HASH.to_string()).await?;
        return Err(ServiceError::validation(INVALID_CREDENTIALS));
    };
    if !verify_blocking(password.to_string(), row.password_hash.clone()).await? {
        tracing::info!(username = %row.username, "Failed login attempt");
        return Err(ServiceError::validation(INVALID_CREDENTIALS));
    }

    let token = signing::new_token();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(signing::hash_token(&token, secret).map_err(internal)?)
    .bind(row.id)
    .bind(now)
    .bind(now + session_ttl())
    .execute(db)
    .await?;

    tracing::info!(user_id = row.id, "User logged in");
    Ok((User::from(row), token))
}

pub async fn logout(db: &SqlitePool, secret: &str, token: &str) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(signing::hash_token(token, secret).map_err(internal)?)
        .execute(db)
        .await?;
    Ok(())
}

/// User behind a session token; expired sessions are removed on sight
pub async fn user_for_session(
    db: &SqlitePool,
    token: &str,
    secret: &str,
) -> Result<Option<User>, ServiceError> {
    let token_hash = signing::hash_token(token, secret).map_err(internal)?;
    let session: Option<DbSession> = sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
        .bind(&token_hash)
        .fetch_optional(db)
        .await?;

    let Some(session) = session else {
        return Ok(None);
    };
    if session.expires_at <= Utc::now() {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(db)
            .await?;
        return Ok(None);
    }

    let row: Option<DbUser> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(session.user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(User::from))
}

//! Fixtures shared by the unit and router tests

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use analysis_client::{AnalysisApi, AnalysisError};
use async_trait::async_trait;
use chrono::Utc;
use shared_types::{Document, User};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::Config;
use crate::models::{DbDocument, DbUser};
use crate::services::pricing;
use crate::state::{self, AppState};

/// A call made against [`FakeAnalysis`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Upload(String),
    Analyze(i64),
    FetchText(i64),
    Delete(i64),
}

impl Op {
    fn kind(&self) -> Fail {
        match self {
            Op::Upload(_) => Fail::Upload,
            Op::Analyze(_) => Fail::Analyze,
            Op::FetchText(_) => Fail::FetchText,
            Op::Delete(_) => Fail::Delete,
        }
    }
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Upload,
    Analyze,
    FetchText,
    Delete,
}

/// In-memory stand-in for the analysis service
#[derive(Clone)]
pub struct FakeAnalysis {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    calls: Mutex<Vec<Op>>,
    failing: Mutex<Vec<(Fail, usize)>>,
    text: Mutex<Option<String>>,
    next_id: AtomicI64,
}

impl Default for FakeAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAnalysis {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakeInner {
                calls: Mutex::new(Vec::new()),
                failing: Mutex::new(Vec::new()),
                text: Mutex::new(Some("extracted text".to_string())),
                next_id: AtomicI64::new(1000),
            }),
        }
    }

    pub fn fail(&self, op: Fail) {
        self.fail_after(op, 0);
    }

    /// Let `successes` calls of `op` through, then fail the rest
    pub fn fail_after(&self, op: Fail, successes: usize) {
        self.inner.failing.lock().unwrap().push((op, successes));
    }

    pub fn set_text(&self, text: Option<&str>) {
        *self.inner.text.lock().unwrap() = text.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<Op> {
        self.inner.calls.lock().unwrap().clone()
    }

    fn record(&self, op: Op, kind: Fail) -> Result<(), AnalysisError> {
        let earlier = {
            let mut calls = self.inner.calls.lock().unwrap();
            let earlier = calls.iter().filter(|c| c.kind() == kind).count();
            calls.push(op);
            earlier
        };
        let failing = self.inner.failing.lock().unwrap();
        if failing.iter().any(|&(f, successes)| f == kind && earlier >= successes) {
            return Err(AnalysisError::Status {
                status: 500,
                message: "fake failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisApi for FakeAnalysis {
    async fn upload_document(&self, file_name: &str, _bytes: Vec<u8>) -> Result<i64, AnalysisError> {
        self.record(Op::Upload(file_name.to_string()), Fail::Upload)?;
        Ok(self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn analyze_document(&self, remote_id: i64) -> Result<(), AnalysisError> {
        self.record(Op::Analyze(remote_id), Fail::Analyze)
    }

    async fn fetch_text(&self, remote_id: i64) -> Result<Option<String>, AnalysisError> {
        self.record(Op::FetchText(remote_id), Fail::FetchText)?;
        Ok(self.inner.text.lock().unwrap().clone())
    }

    async fn delete_document(&self, remote_id: i64) -> Result<(), AnalysisError> {
        self.record(Op::Delete(remote_id), Fail::Delete)
    }
}

/// Fresh migrated in-memory database
pub async fn memory_pool() -> SqlitePool {
    let pool = state::connect("sqlite::memory:", 1).await.unwrap();
    state::run_migrations(&pool).await.unwrap();
    pool
}

/// [`memory_pool`] with the default price table installed
pub async fn priced_pool() -> SqlitePool {
    let pool = memory_pool().await;
    pricing::install_defaults(&pool).await.unwrap();
    pool
}

/// App state over a priced in-memory database and a temporary media root
pub async fn test_state(fake: FakeAnalysis) -> (AppState, TempDir) {
    let media = tempfile::tempdir().unwrap();
    let config = Config::for_tests(media.path().to_path_buf());
    let state = AppState::with_parts(priced_pool().await, config, Arc::new(fake));
    (state, media)
}

/// Insert a user directly; the stored hash is not a valid password
pub async fn insert_user(db: &SqlitePool, username: &str, is_staff: bool) -> User {
    let id = sqlx::query(
        "INSERT INTO users (username, password_hash, is_staff, created_at) VALUES (?, 'x', ?, ?)",
    )
    .bind(username)
    .bind(is_staff)
    .bind(Utc::now())
    .execute(db)
    .await
    .unwrap()
    .last_insert_rowid();

    let row: DbUser = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await
        .unwrap();
    row.into()
}

/// Insert an unpaid document record with no file behind it
pub async fn insert_document(db: &SqlitePool, user: &User, file_name: &str, size_kb: i64) -> Document {
    let id = sqlx::query(
        r#"
        INSERT INTO documents (user_id, file_path, file_name, size_kb, remote_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(format!("uploads/fixture_{}", file_name))
    .bind(file_name)
    .bind(size_kb)
    .bind(500)
    .bind(Utc::now())
    .execute(db)
    .await
    .unwrap()
    .last_insert_rowid();

    sqlx::query("UPDATE documents SET remote_id = ? WHERE id = ?")
        .bind(500 + id)
        .bind(id)
        .execute(db)
        .await
        .unwrap();

    let row: DbDocument = sqlx::query_as("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await
        .unwrap();
    row.into()
}

pub async fn mark_paid(db: &SqlitePool, doc_id: i64) {
    sqlx::query("UPDATE documents SET payment_status = 1 WHERE id = ?")
        .bind(doc_id)
        .execute(db)
        .await
        .unwrap();
}

//! Cart and payment workflow

use chrono::Utc;
use shared_types::{order_price, CartEntry, CartSummary, Document, DocumentId, User};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ServiceError;
use crate::models::{DbCartEntry, DbDocument};
use crate::services::pricing;

pub const DOCUMENT_NOT_OWNED: &str = "Document not found or you do not have access to it.";
pub const ALREADY_PAID: &str = "This document has already been paid for.";
pub const NOT_IN_CART: &str = "Document not found in cart.";

/// Result of [`add`]
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Created(CartEntry),
    /// The document already had an open entry; nothing changed
    Existing(CartEntry),
}

impl AddOutcome {
    pub fn entry(&self) -> &CartEntry {
        match self {
            AddOutcome::Created(entry) | AddOutcome::Existing(entry) => entry,
        }
    }
}

const ENTRY_COLUMNS: &str = "id, user_id, document_id, order_price, paid, created_at";

async fn owned_document(
    conn: &mut SqliteConnection,
    user: &User,
    doc_id: DocumentId,
) -> Result<Document, ServiceError> {
    let row: Option<DbDocument> =
        sqlx::query_as("SELECT * FROM documents WHERE id = ? AND user_id = ?")
            .bind(doc_id)
            .bind(user.id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(Document::from)
        .ok_or_else(|| ServiceError::not_found(DOCUMENT_NOT_OWNED))
}

async fn open_entry(
    conn: &mut SqliteConnection,
    user: &User,
    doc_id: DocumentId,
) -> Result<Option<CartEntry>, ServiceError> {
    let row: Option<DbCartEntry> = sqlx::query_as(&format!(
        "SELECT {} FROM cart_entries WHERE user_id = ? AND document_id = ? AND paid = 0",
        ENTRY_COLUMNS
    ))
    .bind(user.id)
    .bind(doc_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(CartEntry::try_from).transpose()?)
}

/// Put an owned, unpaid document in the cart. The price is computed only
/// when the entry is first created.
pub async fn add(
    db: &SqlitePool,
    user: &User,
    doc_id: DocumentId,
) -> Result<AddOutcome, ServiceError> {
    let mut tx = db.begin().await?;

    let document = owned_document(&mut tx, user, doc_id).await?;
    if document.payment_status {
        return Err(ServiceError::AlreadyInState(ALREADY_PAID.to_string()));
    }

    if let Some(entry) = open_entry(&mut tx, user, doc_id).await? {
        return Ok(AddOutcome::Existing(entry));
    }

    let extension = document.extension().ok_or_else(|| {
        ServiceError::not_found(format!("Document {} has no file type.", document.id))
    })?;
    let unit = pricing::price_per_unit(&mut tx, &extension).await?;
    let price = order_price(document.size_kb, unit);

    let inserted = sqlx::query(
        r#"
        INSERT INTO cart_entries (user_id, document_id, order_price, paid, created_at)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user.id)
    .bind(doc_id)
    .bind(price.to_string())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    let entry = open_entry(&mut tx, user, doc_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("cart entry for document {} vanished", doc_id))?;
    tx.commit().await?;

    if inserted.rows_affected() == 0 {
        return Ok(AddOutcome::Existing(entry));
    }
    tracing::info!(user_id = user.id, doc_id, price = %entry.order_price, "Added to cart");
    Ok(AddOutcome::Created(entry))
}

pub async fn remove(db: &SqlitePool, user: &User, doc_id: DocumentId) -> Result<(), ServiceError> {
    let result = sqlx::query(
        "DELETE FROM cart_entries WHERE user_id = ? AND document_id = ? AND paid = 0",
    )
    .bind(user.id)
    .bind(doc_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(NOT_IN_CART));
    }
    tracing::info!(user_id = user.id, doc_id, "Removed from cart");
    Ok(())
}

/// Mark one document paid and drop its cart entry
pub async fn confirm_one(
    db: &SqlitePool,
    user: &User,
    doc_id: DocumentId,
) -> Result<(), ServiceError> {
    let mut tx = db.begin().await?;

    let updated = sqlx::query("UPDATE documents SET payment_status = 1 WHERE id = ? AND user_id = ?")
        .bind(doc_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ServiceError::not_found(DOCUMENT_NOT_OWNED));
    }

    sqlx::query("DELETE FROM cart_entries WHERE user_id = ? AND document_id = ? AND paid = 0")
        .bind(user.id)
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(user_id = user.id, doc_id, "Payment confirmed");
    Ok(())
}

/// Pay for everything in the cart; returns how many entries were settled
pub async fn confirm_all(db: &SqlitePool, user: &User) -> Result<u64, ServiceError> {
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        UPDATE documents SET payment_status = 1
        WHERE user_id = ?
          AND id IN (SELECT document_id FROM cart_entries WHERE user_id = ? AND paid = 0)
        "#,
    )
    .bind(user.id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;

    let settled = sqlx::query("UPDATE cart_entries SET paid = 1 WHERE user_id = ? AND paid = 0")
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    tracing::info!(user_id = user.id, settled, "Cart paid");
    Ok(settled)
}

pub async fn list_unpaid(db: &SqlitePool, user: &User) -> Result<CartSummary, ServiceError> {
    let rows: Vec<DbCartEntry> = sqlx::query_as(&format!(
        "SELECT {} FROM cart_entries WHERE user_id = ? AND paid = 0 ORDER BY created_at, id",
        ENTRY_COLUMNS
    ))
    .bind(user.id)
    .fetch_all(db)
    .await?;

    let entries = rows
        .into_iter()
        .map(CartEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CartSummary::new(entries))
}

/// Ids of the user's documents that have an open cart entry
pub async fn document_ids_in_cart(
    db: &SqlitePool,
    user: &User,
) -> Result<Vec<DocumentId>, ServiceError> {
    let ids: Vec<(i64,)> = sqlx::query_as(
        "SELECT document_id FROM cart_entries WHERE user_id = ? AND paid = 0 ORDER BY document_id",
    )
    .bind(user.id)
    .fetch_all(db)
    .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

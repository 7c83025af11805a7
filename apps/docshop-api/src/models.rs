//! Data models for the docshop server

use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared_types::{CartEntry, Document, PriceRule, User};
use sqlx::FromRow;

use crate::flash::FlashMessage;

/// Account row, including the password hash
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            username: row.username,
            is_staff: row.is_staff,
            created_at: row.created_at,
        }
    }
}

/// Login session stored in database
#[derive(Debug, Clone, FromRow)]
pub struct DbSession {
    pub token_hash: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: i64,
    pub user_id: i64,
    pub file_path: String,
    pub file_name: String,
    pub size_kb: i64,
    pub payment_status: bool,
    pub analysis_done: bool,
    pub extracted_text: Option<String>,
    pub remote_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbDocument> for Document {
    fn from(row: DbDocument) -> Self {
        Document {
            id: row.id,
            owner_id: row.user_id,
            file_path: row.file_path,
            file_name: row.file_name,
            size_kb: row.size_kb,
            payment_status: row.payment_status,
            analysis_done: row.analysis_done,
            extracted_text: row.extracted_text,
            remote_id: row.remote_id,
            created_at: row.created_at,
        }
    }
}

/// Cart row; the price is kept as decimal text
#[derive(Debug, Clone, FromRow)]
pub struct DbCartEntry {
    pub id: i64,
    pub user_id: i64,
    pub document_id: i64,
    pub order_price: String,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbCartEntry> for CartEntry {
    type Error = anyhow::Error;

    fn try_from(row: DbCartEntry) -> Result<Self, Self::Error> {
        let order_price = Decimal::from_str(&row.order_price)
            .with_context(|| format!("cart entry {} has bad price {:?}", row.id, row.order_price))?;
        Ok(CartEntry {
            id: row.id,
            owner_id: row.user_id,
            document_id: row.document_id,
            order_price,
            paid: row.paid,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPriceRule {
    pub file_extension: String,
    pub price_per_unit: String,
}

impl TryFrom<DbPriceRule> for PriceRule {
    type Error = anyhow::Error;

    fn try_from(row: DbPriceRule) -> Result<Self, Self::Error> {
        let price_per_unit = Decimal::from_str(&row.price_per_unit).with_context(|| {
            format!(
                "price rule {} has bad price {:?}",
                row.file_extension, row.price_per_unit
            )
        })?;
        Ok(PriceRule {
            file_extension: row.file_extension,
            price_per_unit,
        })
    }
}

/// Pagination info for the documents page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: i64,
    pub num_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub total: i64,
}

/// One page of the user's documents
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub page: PageInfo,
    /// Ids of documents with an open cart entry
    pub cart_document_ids: Vec<i64>,
}

/// Main page response
#[derive(Debug, Serialize)]
pub struct MainPageResponse {
    pub user: User,
    #[serde(flatten)]
    pub page: DocumentPage,
    pub messages: Vec<FlashMessage>,
}

/// Upload form context
#[derive(Debug, Serialize)]
pub struct UploadPageResponse {
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: u64,
    pub messages: Vec<FlashMessage>,
}

/// Cart page response
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartEntry>,
    pub total: Decimal,
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub doc_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::cart_total;
use crate::upload::file_extension;

pub type UserId = i64;
pub type DocumentId = i64;

/// Account as seen by the workflow layer (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file with its payment and analysis state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: UserId,
    /// Path relative to the media root, e.g. `uploads/<uuid>_scan.pdf`
    pub file_path: String,
    /// Name the file was uploaded with
    pub file_name: String,
    /// Size in kilobytes (bytes / 1024, rounded down)
    pub size_kb: i64,
    pub payment_status: bool,
    pub analysis_done: bool,
    pub extracted_text: Option<String>,
    /// Id assigned by the analysis service on upload
    pub remote_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Lowercased extension of the stored file, used for the price lookup
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.file_name).or_else(|| file_extension(&self.file_path))
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}

/// A priced association between a user and a document awaiting payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: i64,
    pub owner_id: UserId,
    pub document_id: DocumentId,
    pub order_price: Decimal,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-KB price for one file type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRule {
    pub file_extension: String,
    pub price_per_unit: Decimal,
}

/// Unpaid cart contents with their summed price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub entries: Vec<CartEntry>,
    pub total: Decimal,
}

impl CartSummary {
    pub fn new(entries: Vec<CartEntry>) -> Self {
        let total = cart_total(&entries);
        Self { entries, total }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

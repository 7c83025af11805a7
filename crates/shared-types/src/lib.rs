//! Domain records and business rules shared by the docshop crates.
//!
//! Nothing in here touches the network or the database: the server app
//! and the analysis client both build on these types.

pub mod pricing;
pub mod types;
pub mod upload;

pub use pricing::{cart_total, default_price_rules, normalize_extension, order_price};
pub use types::{CartEntry, CartSummary, Document, DocumentId, PriceRule, User, UserId};
pub use upload::{size_in_kb, validate_upload, UploadError, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES};

//! Workflow services
//!
//! Each operation runs inside one request, validates locally first and only
//! then touches the database or the analysis service.

pub mod auth;
pub mod cart;
pub mod docs;
pub mod pricing;

//! Cart page and cart actions

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
};

use super::flash_failure;
use crate::error::ApiError;
use crate::flash::Flash;
use crate::models::CartResponse;
use crate::services::cart::{self, AddOutcome};
use crate::session::CurrentUser;
use crate::state::AppState;

pub const CART_PATH: &str = "/cart/";
pub const UNSUPPORTED_ACTION: &str = "Action not supported or doc_id missing.";

/// Actions accepted under `/cart/:action/...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    Add,
    Remove,
    Confirm,
    ConfirmAll,
}

impl FromStr for CartAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(CartAction::Add),
            "remove" => Ok(CartAction::Remove),
            "confirm" | "confirm-payment" => Ok(CartAction::Confirm),
            "confirm_all" => Ok(CartAction::ConfirmAll),
            _ => Err(()),
        }
    }
}

impl CartAction {
    fn name(self) -> &'static str {
        match self {
            CartAction::Add => "add to cart",
            CartAction::Remove => "remove from cart",
            CartAction::Confirm => "confirm payment",
            CartAction::ConfirmAll => "confirm all payments",
        }
    }
}

/// GET /cart/
pub async fn cart_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
) -> Result<Response, ApiError> {
    let summary = cart::list_unpaid(&state.db, &user).await.map_err(|e| {
        e.log("view cart");
        ApiError::from(e)
    })?;

    Ok(flash.render(|messages| CartResponse {
        items: summary.entries,
        total: summary.total,
        messages,
    }))
}

async fn run_action(
    state: &AppState,
    user: &shared_types::User,
    flash: Flash,
    action: Option<CartAction>,
    doc_id: Option<i64>,
) -> Response {
    let result = match (action, doc_id) {
        (Some(CartAction::Add), Some(id)) => cart::add(&state.db, user, id).await.map(|outcome| {
            match outcome {
                AddOutcome::Created(_) => "Document added to cart.",
                AddOutcome::Existing(_) => "Document is already in the cart.",
            }
        }),
        (Some(CartAction::Remove), Some(id)) => cart::remove(&state.db, user, id)
            .await
            .map(|()| "Document removed from cart."),
        (Some(CartAction::Confirm), Some(id)) => cart::confirm_one(&state.db, user, id)
            .await
            .map(|()| "Payment completed successfully!"),
        (Some(CartAction::ConfirmAll), _) => cart::confirm_all(&state.db, user)
            .await
            .map(|_| "All documents paid successfully!"),
        _ => return flash.error(CART_PATH, UNSUPPORTED_ACTION),
    };

    match result {
        Ok(message) => flash.success(CART_PATH, message),
        Err(e) => {
            let operation = action.map(CartAction::name).unwrap_or("cart action");
            flash_failure(flash, CART_PATH, operation, e)
        }
    }
}

/// POST /cart/:action/:doc_id/
pub async fn document_action(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Path((action, doc_id)): Path<(String, i64)>,
) -> Response {
    run_action(&state, &user, flash, action.parse().ok(), Some(doc_id)).await
}

/// POST /cart/:action/
pub async fn cart_action(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Path(action): Path<String>,
) -> Response {
    run_action(&state, &user, flash, action.parse().ok(), None).await
}

//! Boundary Contracts
//!
//! The wire shapes of the order creation and cancellation boundaries.
//! Input-shape problems (malformed dish id; a non-array ingredient list is a
//! serde failure upstream) are rejected before any resolver logic runs.
//! Constraint violations serialize with their `constraintViolation` tag from
//! `piatto_core::violation`; cancellation failures carry a kebab-case
//! `reason` tag.

use crate::orders::{CancelOrderError, OrderReceipt};
use piatto_core::catalog::{DishId, DishIdParseError, IngredientId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input of the order creation boundary:
/// `{"dishId": "<baseDishId>_<sizeId>", "ingredientIds": [..]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub dish_id: String,
    pub ingredient_ids: Vec<IngredientId>,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error(transparent)]
    MalformedDishId(#[from] DishIdParseError),
}

impl CreateOrderRequest {
    /// Parse the composite dish id, rejecting malformed input before any
    /// validation runs.
    pub fn dish(&self) -> Result<DishId, InputError> {
        Ok(self.dish_id.parse::<DishId>()?)
    }
}

/// Success output of the order creation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub id: Uuid,
    pub dish_id: String,
    pub ingredient_ids: Vec<IngredientId>,
    pub total_price: Decimal,
}

impl From<OrderReceipt> for CreateOrderResponse {
    fn from(receipt: OrderReceipt) -> Self {
        CreateOrderResponse {
            id: receipt.id,
            dish_id: receipt.dish_id.to_string(),
            ingredient_ids: receipt.ingredient_ids,
            total_price: receipt.total_price,
        }
    }
}

/// Failure output of the cancellation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum CancelRejection {
    NotAuthenticated,
    MissingSecondFactor,
    NotFoundOrNotCancellable,
    /// Persistence failure; no detail crosses the boundary.
    Internal,
}

impl From<&CancelOrderError> for CancelRejection {
    fn from(err: &CancelOrderError) -> Self {
        match err {
            CancelOrderError::NotAuthenticated => CancelRejection::NotAuthenticated,
            CancelOrderError::MissingSecondFactor => CancelRejection::MissingSecondFactor,
            CancelOrderError::NotFoundOrNotCancellable => {
                CancelRejection::NotFoundOrNotCancellable
            }
            CancelOrderError::Store(_) => CancelRejection::Internal,
        }
    }
}

/// Success output of the cancellation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelConfirmation {
    pub order_id: Uuid,
}

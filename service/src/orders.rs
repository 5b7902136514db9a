//! Order Transaction Manager
//!
//! Orchestrates order creation and cancellation over the store traits.
//! Creation re-validates against a fresh catalog snapshot and relies on the
//! store's conditioned decrement for the last-instant stock check: a
//! `StockConflict` bubbling out of the commit becomes an
//! `availability_changed` rejection here, and nowhere else. No operation is
//! retried automatically; the caller corrects its selection and retries.

use crate::session::Session;
use piatto_core::catalog::{DishId, IngredientId};
use piatto_core::order::Order;
use piatto_core::resolver::validate_full_selection;
use piatto_core::violation::ConstraintViolation;
use piatto_store::{CatalogStore, InsertOutcome, OrderStore, StoreError};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Echo of a committed order: identity, dish, frozen ingredient ids, and the
/// total price frozen at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub id: Uuid,
    pub dish_id: DishId,
    pub ingredient_ids: Vec<IngredientId>,
    pub total_price: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateOrderError {
    /// Constraint violation: recoverable, user-facing, reported untouched.
    #[error("order rejected: {0}")]
    Rejected(ConstraintViolation),

    /// Persistence failure unrelated to stock conditioning. Fatal for this
    /// request, never partially applied.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum CancelOrderError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("second factor not completed for this session")]
    MissingSecondFactor,

    /// Deliberately combined: "belongs to someone else", "already
    /// cancelled", and "does not exist" are indistinguishable to the caller
    /// so order existence never leaks.
    #[error("order not found or not cancellable")]
    NotFoundOrNotCancellable,

    #[error(transparent)]
    Store(StoreError),
}

/// The only component that writes stock, and the only one allowed to turn a
/// zero-rows-affected decrement into a violation.
pub struct OrderService<S> {
    store: Arc<S>,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CatalogStore + OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate → price → persist + decrement, atomically.
    ///
    /// The violation, if any, is returned exactly as the resolver produced
    /// it; no partial writes happen on rejection.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        dish_id: DishId,
        ingredient_ids: &[IngredientId],
    ) -> Result<OrderReceipt, CreateOrderError> {
        let catalog = self.store.snapshot().await?;
        let valid = validate_full_selection(dish_id, ingredient_ids, &catalog)
            .map_err(CreateOrderError::Rejected)?;

        // Freeze a deduplicated copy: the stored list drives the stock
        // decrement, one unit per distinct ingredient.
        let mut frozen: Vec<IngredientId> = Vec::with_capacity(ingredient_ids.len());
        for id in ingredient_ids {
            if !frozen.contains(id) {
                frozen.push(*id);
            }
        }

        let order = Order::confirmed(user_id, dish_id, frozen, valid.total_price);
        match self.store.insert_order(&order).await? {
            InsertOutcome::Committed => {
                tracing::info!(order_id = %order.id, %user_id, total = %order.total_price, "order created");
                Ok(OrderReceipt {
                    id: order.id,
                    dish_id: order.dish_id,
                    ingredient_ids: order.ingredient_ids,
                    total_price: order.total_price,
                })
            }
            InsertOutcome::StockConflict(depleted) => {
                let ingredients = depleted.iter().map(|id| catalog.name_of(*id)).collect();
                tracing::info!(%user_id, ?depleted, "order lost the stock race");
                Err(CreateOrderError::Rejected(
                    ConstraintViolation::AvailabilityChanged { ingredients },
                ))
            }
        }
    }

    /// Cancel a confirmed order and restore its stock, atomically.
    ///
    /// Preconditions in order: authenticated, completed second factor,
    /// order owned by the caller and still confirmed. Constraints are never
    /// re-validated; only these preconditions can block a cancellation.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        session: &Session,
    ) -> Result<(), CancelOrderError> {
        let Some(user_id) = session.user_id else {
            return Err(CancelOrderError::NotAuthenticated);
        };
        if !session.second_factor_verified {
            return Err(CancelOrderError::MissingSecondFactor);
        }

        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(CancelOrderError::Store)?;
        let cancellable = order
            .map(|o| o.user_id == user_id && o.is_cancellable())
            .unwrap_or(false);
        if !cancellable {
            return Err(CancelOrderError::NotFoundOrNotCancellable);
        }

        match self.store.cancel_order(order_id).await {
            Ok(()) => {
                tracing::info!(%order_id, %user_id, "order cancelled");
                Ok(())
            }
            // Lost a cancel/cancel race after the ownership check.
            Err(StoreError::NotFound) => Err(CancelOrderError::NotFoundOrNotCancellable),
            Err(e) => Err(CancelOrderError::Store(e)),
        }
    }

    /// Order history for a user. Read-only, no stock effects.
    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        self.store.orders_for_user(user_id).await
    }
}

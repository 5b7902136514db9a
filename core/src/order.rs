//! Order Records
//!
//! An order is a frozen copy of what was validated at creation time: the
//! ingredient ids and the total price never change afterwards, even when the
//! catalog or stock does. Orders are never hard-deleted and a cancelled order
//! is never re-confirmed.

use crate::catalog::{DishId, IngredientId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dish_id: DishId,
    pub ingredient_ids: Vec<IngredientId>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    /// Whether cancelling this order demands a completed second-factor
    /// session. Always set at creation; kept per order so the policy can be
    /// tightened or relaxed without touching historical rows.
    pub requires_second_factor: bool,
}

impl Order {
    /// A freshly confirmed order.
    pub fn confirmed(
        user_id: Uuid,
        dish_id: DishId,
        ingredient_ids: Vec<IngredientId>,
        total_price: Decimal,
    ) -> Self {
        Order {
            id: Uuid::new_v4(),
            user_id,
            dish_id,
            ingredient_ids,
            total_price,
            created_at: Utc::now(),
            status: OrderStatus::Confirmed,
            requires_second_factor: true,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        self.status == OrderStatus::Confirmed
    }
}

//! In-Memory Store
//!
//! A lock-guarded store with the same conditioned-mutation semantics as the
//! PostgreSQL backend: the decrement checks the counter under the write lock
//! and the whole insert applies or none of it does. Used by tests and local
//! runs; behavioural parity with `PgStore` is what makes the service-level
//! race tests meaningful.

use crate::error::StoreError;
use crate::repo::{CatalogStore, InsertOutcome, OrderStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use piatto_core::catalog::{
    BaseDish, BaseDishId, Catalog, CatalogBuilder, Dish, Ingredient, IngredientId, Size, SizeId,
    Stock,
};
use piatto_core::order::{Order, OrderStatus};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    sizes: BTreeMap<SizeId, Size>,
    base_dishes: BTreeMap<BaseDishId, BaseDish>,
    orders: HashMap<Uuid, Order>,
}

impl Inner {
    fn snapshot(&self) -> Catalog {
        let mut builder = CatalogBuilder::new();
        for ingredient in self.ingredients.values() {
            builder = builder.ingredient(ingredient.clone());
        }
        for size in self.sizes.values() {
            builder = builder.size(size.clone());
        }
        for base in self.base_dishes.values() {
            builder = builder.base_dish(base.clone());
        }
        builder.build()
    }
}

/// In-memory catalog and order store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_ingredient(&self, ingredient: Ingredient) {
        self.inner
            .write()
            .ingredients
            .insert(ingredient.id, ingredient);
    }

    pub fn seed_size(&self, size: Size) {
        self.inner.write().sizes.insert(size.id, size);
    }

    pub fn seed_base_dish(&self, base: BaseDish) {
        self.inner.write().base_dishes.insert(base.id, base);
    }

    /// Current stock of an ingredient; test hook for round-trip assertions.
    pub fn stock_of(&self, ingredient_id: IngredientId) -> Option<Stock> {
        self.inner
            .read()
            .ingredients
            .get(&ingredient_id)
            .map(|i| i.stock)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, StoreError> {
        Ok(self.inner.read().ingredients.values().cloned().collect())
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, StoreError> {
        Ok(self.inner.read().sizes.values().cloned().collect())
    }

    async fn list_base_dishes(&self) -> Result<Vec<BaseDish>, StoreError> {
        Ok(self.inner.read().base_dishes.values().cloned().collect())
    }

    async fn get_dish(&self, base: BaseDishId, size: SizeId) -> Result<Option<Dish>, StoreError> {
        let inner = self.inner.read();
        Ok(match (inner.base_dishes.get(&base), inner.sizes.get(&size)) {
            (Some(b), Some(s)) => Some(Dish {
                base: b.clone(),
                size: s.clone(),
            }),
            _ => None,
        })
    }

    async fn snapshot(&self) -> Result<Catalog, StoreError> {
        Ok(self.inner.read().snapshot())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.write();

        // Condition check first: either every decrement can apply or the
        // insert does not happen at all.
        let depleted: Vec<IngredientId> = order
            .ingredient_ids
            .iter()
            .copied()
            .filter(|id| {
                inner
                    .ingredients
                    .get(id)
                    .map(|i| !i.stock.is_available())
                    .unwrap_or(true)
            })
            .collect();
        if !depleted.is_empty() {
            tracing::warn!(order_id = %order.id, ?depleted, "stock conflict at commit time");
            return Ok(InsertOutcome::StockConflict(depleted));
        }

        for id in &order.ingredient_ids {
            if let Some(ingredient) = inner.ingredients.get_mut(id) {
                if let Stock::Count(n) = ingredient.stock {
                    ingredient.stock = Stock::Count(n - 1);
                }
            }
        }
        inner.orders.insert(order.id, order.clone());
        Ok(InsertOutcome::Committed)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.read().orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .inner
            .read()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let ingredient_ids = match inner.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Confirmed => {
                order.status = OrderStatus::Cancelled;
                order.ingredient_ids.clone()
            }
            _ => return Err(StoreError::NotFound),
        };

        for id in &ingredient_ids {
            if let Some(ingredient) = inner.ingredients.get_mut(id) {
                if let Stock::Count(n) = ingredient.stock {
                    ingredient.stock = Stock::Count(n + 1);
                }
            }
        }
        Ok(())
    }
}

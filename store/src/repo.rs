//! Store Traits
//!
//! `CatalogStore` and `OrderStore` abstract over the concrete backend
//! (PostgreSQL in production, in-memory for tests and local runs), the same
//! way the engine only ever talks to a pool through a trait.

use crate::error::StoreError;
use async_trait::async_trait;
use piatto_core::catalog::{BaseDish, BaseDishId, Catalog, Dish, Ingredient, IngredientId, Size, SizeId};
use piatto_core::order::Order;
use uuid::Uuid;

/// Read access to the catalog. Implementations must reflect current stock at
/// call time; snapshots are only cached within a single request/response
/// cycle by the caller, never by the store.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, StoreError>;

    async fn list_sizes(&self) -> Result<Vec<Size>, StoreError>;

    async fn list_base_dishes(&self) -> Result<Vec<BaseDish>, StoreError>;

    /// Resolve the orderable pairing, or `None` if either half is unknown.
    async fn get_dish(&self, base: BaseDishId, size: SizeId) -> Result<Option<Dish>, StoreError>;

    /// A fresh, fully-indexed snapshot (symmetric incompatibility closure
    /// applied) for the resolver to work on.
    async fn snapshot(&self) -> Result<Catalog, StoreError>;
}

/// Result of the transactional order insert.
///
/// `StockConflict` is the zero-rows-affected case of the conditioned
/// decrement: some ingredient ran out between validation and commit. The
/// whole transaction is rolled back before this is returned, so a conflicting
/// insert leaves no trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Committed,
    StockConflict(Vec<IngredientId>),
}

/// Order persistence with atomic stock effects.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Persist a confirmed order and decrement every finite-stock ingredient
    /// it contains by exactly one, in a single transactional unit. Partial
    /// application is never observable.
    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, StoreError>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;

    /// Flip a confirmed order to cancelled and increment the stock counter of
    /// every finite-stock ingredient it froze, in a single transactional
    /// unit: the exact inverse of [`OrderStore::insert_order`].
    ///
    /// Returns `StoreError::NotFound` when the order is absent or no longer
    /// confirmed (the status condition makes concurrent double-cancels
    /// race-safe: only one caller flips the row).
    async fn cancel_order(&self, order_id: Uuid) -> Result<(), StoreError>;
}

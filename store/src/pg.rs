//! PostgreSQL Store
//!
//! sqlx-backed implementation of the catalog and order stores. All stock
//! mutation goes through a single conditioned `UPDATE`:
//!
//! ```sql
//! UPDATE ingredients SET stock = stock - 1
//! WHERE id = $1 AND (stock IS NULL OR stock > 0)
//! ```
//!
//! Unlimited ingredients have a NULL counter, so `NULL - 1` stays NULL and
//! the row still matches; a depleted finite counter matches nothing and the
//! zero-rows-affected result becomes a `StockConflict`. The counter can never
//! go below zero, no matter how the commit races.

use crate::error::StoreError;
use crate::repo::{CatalogStore, InsertOutcome, OrderStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use piatto_core::catalog::{
    BaseDish, BaseDishId, Catalog, CatalogBuilder, Dish, DishId, Ingredient, IngredientId, Size,
    SizeId, Stock,
};
use piatto_core::order::{Order, OrderStatus};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS base_dishes (
    id      BIGINT PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS sizes (
    id              BIGINT PRIMARY KEY,
    label           TEXT NOT NULL UNIQUE,
    base_price      NUMERIC(10,2) NOT NULL,
    max_ingredients INT NOT NULL CHECK (max_ingredients > 0)
);
CREATE TABLE IF NOT EXISTS ingredients (
    id      BIGINT PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE,
    price   NUMERIC(10,2) NOT NULL CHECK (price >= 0),
    stock   INT NULL CHECK (stock >= 0)
);
CREATE TABLE IF NOT EXISTS ingredient_requirements (
    ingredient_id BIGINT NOT NULL REFERENCES ingredients(id),
    requires_id   BIGINT NOT NULL REFERENCES ingredients(id),
    PRIMARY KEY (ingredient_id, requires_id)
);
CREATE TABLE IF NOT EXISTS ingredient_incompatibilities (
    ingredient_id BIGINT NOT NULL REFERENCES ingredients(id),
    other_id      BIGINT NOT NULL REFERENCES ingredients(id),
    PRIMARY KEY (ingredient_id, other_id)
);
CREATE TABLE IF NOT EXISTS orders (
    id                     UUID PRIMARY KEY,
    user_id                UUID NOT NULL,
    base_dish_id           BIGINT NOT NULL,
    size_id                BIGINT NOT NULL,
    ingredient_ids         JSONB NOT NULL,
    total_price            NUMERIC(10,2) NOT NULL,
    created_at             TIMESTAMPTZ NOT NULL,
    status                 TEXT NOT NULL,
    requires_second_factor BOOLEAN NOT NULL DEFAULT TRUE
);
CREATE INDEX IF NOT EXISTS orders_user_idx ON orders (user_id, created_at DESC);
"#;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    id: i64,
    name: String,
    price: Decimal,
    stock: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    ingredient_id: i64,
    other_id: i64,
}

#[derive(sqlx::FromRow)]
struct SizeRow {
    id: i64,
    label: String,
    base_price: Decimal,
    max_ingredients: i32,
}

#[derive(sqlx::FromRow)]
struct BaseDishRow {
    id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    base_dish_id: i64,
    size_id: i64,
    ingredient_ids: Json<Vec<IngredientId>>,
    total_price: Decimal,
    created_at: DateTime<Utc>,
    status: String,
    requires_second_factor: bool,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            id: row.id,
            name: row.name,
            price: row.price,
            stock: Stock::from(row.stock.map(|n| n.max(0) as u32)),
            requires: Default::default(),
            incompatible_with: Default::default(),
        }
    }
}

impl From<SizeRow> for Size {
    fn from(row: SizeRow) -> Self {
        Size {
            id: row.id,
            label: row.label,
            base_price: row.base_price,
            max_ingredients: row.max_ingredients.max(0) as usize,
        }
    }
}

impl From<BaseDishRow> for BaseDish {
    fn from(row: BaseDishRow) -> Self {
        BaseDish {
            id: row.id,
            name: row.name,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let status = match row.status.as_str() {
            "confirmed" => OrderStatus::Confirmed,
            "cancelled" => OrderStatus::Cancelled,
            other => return Err(StoreError::Decode(format!("unknown order status {other:?}"))),
        };
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            dish_id: DishId {
                base: row.base_dish_id,
                size: row.size_id,
            },
            ingredient_ids: row.ingredient_ids.0,
            total_price: row.total_price,
            created_at: row.created_at,
            status,
            requires_second_factor: row.requires_second_factor,
        })
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Cancelled => "cancelled",
    }
}

impl PgStore {
    /// Connect and return a store over a fresh pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    async fn load_ingredients(&self) -> Result<Vec<Ingredient>, StoreError> {
        let rows: Vec<IngredientRow> =
            sqlx::query_as("SELECT id, name, price, stock FROM ingredients ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let mut ingredients: Vec<Ingredient> = rows.into_iter().map(Into::into).collect();

        let requirements: Vec<EdgeRow> = sqlx::query_as(
            "SELECT ingredient_id, requires_id AS other_id FROM ingredient_requirements",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let incompatibilities: Vec<EdgeRow> = sqlx::query_as(
            "SELECT ingredient_id, other_id FROM ingredient_incompatibilities",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        for ingredient in ingredients.iter_mut() {
            for edge in &requirements {
                if edge.ingredient_id == ingredient.id {
                    ingredient.requires.insert(edge.other_id);
                }
            }
            for edge in &incompatibilities {
                if edge.ingredient_id == ingredient.id {
                    ingredient.incompatible_with.insert(edge.other_id);
                }
            }
        }
        Ok(ingredients)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, StoreError> {
        self.load_ingredients().await
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, StoreError> {
        let rows: Vec<SizeRow> =
            sqlx::query_as("SELECT id, label, base_price, max_ingredients FROM sizes ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_base_dishes(&self) -> Result<Vec<BaseDish>, StoreError> {
        let rows: Vec<BaseDishRow> =
            sqlx::query_as("SELECT id, name FROM base_dishes ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_dish(&self, base: BaseDishId, size: SizeId) -> Result<Option<Dish>, StoreError> {
        let base_row: Option<BaseDishRow> =
            sqlx::query_as("SELECT id, name FROM base_dishes WHERE id = $1")
                .bind(base)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let size_row: Option<SizeRow> = sqlx::query_as(
            "SELECT id, label, base_price, max_ingredients FROM sizes WHERE id = $1",
        )
        .bind(size)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(match (base_row, size_row) {
            (Some(b), Some(s)) => Some(Dish {
                base: b.into(),
                size: s.into(),
            }),
            _ => None,
        })
    }

    async fn snapshot(&self) -> Result<Catalog, StoreError> {
        let mut builder = CatalogBuilder::new();
        for ingredient in self.load_ingredients().await? {
            builder = builder.ingredient(ingredient);
        }
        for size in self.list_sizes().await? {
            builder = builder.size(size);
        }
        for base in self.list_base_dishes().await? {
            builder = builder.base_dish(base);
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::BeginFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO orders \
             (id, user_id, base_dish_id, size_id, ingredient_ids, total_price, created_at, status, requires_second_factor) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.dish_id.base)
        .bind(order.dish_id.size)
        .bind(Json(&order.ingredient_ids))
        .bind(order.total_price)
        .bind(order.created_at)
        .bind(status_str(order.status))
        .bind(order.requires_second_factor)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let mut depleted: Vec<IngredientId> = Vec::new();
        for ingredient_id in &order.ingredient_ids {
            let result = sqlx::query(
                "UPDATE ingredients SET stock = stock - 1 \
                 WHERE id = $1 AND (stock IS NULL OR stock > 0)",
            )
            .bind(ingredient_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            if result.rows_affected() == 0 {
                depleted.push(*ingredient_id);
            }
        }

        if !depleted.is_empty() {
            tx.rollback()
                .await
                .map_err(|e| StoreError::RollbackFailed(e.to_string()))?;
            tracing::warn!(order_id = %order.id, ?depleted, "stock conflict at commit time");
            return Ok(InsertOutcome::StockConflict(depleted));
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::CommitFailed(e.to_string()))?;
        tracing::debug!(order_id = %order.id, "order committed");
        Ok(InsertOutcome::Committed)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, base_dish_id, size_id, ingredient_ids, total_price, \
             created_at, status, requires_second_factor FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, base_dish_id, size_id, ingredient_ids, total_price, \
             created_at, status, requires_second_factor FROM orders \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::BeginFailed(e.to_string()))?;

        // Conditioned flip: only one concurrent cancel can win this row.
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled' WHERE id = $1 AND status = 'confirmed'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| StoreError::RollbackFailed(e.to_string()))?;
            return Err(StoreError::NotFound);
        }

        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, base_dish_id, size_id, ingredient_ids, total_price, \
             created_at, status, requires_second_factor FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::RollbackFailed(e.to_string()))?;
            return Err(StoreError::NotFound);
        };

        for ingredient_id in &row.ingredient_ids.0 {
            sqlx::query(
                "UPDATE ingredients SET stock = stock + 1 WHERE id = $1 AND stock IS NOT NULL",
            )
            .bind(ingredient_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::CommitFailed(e.to_string()))?;
        tracing::debug!(%order_id, "order cancelled, stock restored");
        Ok(())
    }
}

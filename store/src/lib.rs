//! # Piatto Store
//!
//! Persistence boundary for the order engine: read access to the catalog
//! (always reflecting current stock) and the transactional order/stock
//! mutation paths.
//!
//! The stock counter is a single-writer resource: only the order commit
//! paths touch it, and only through a conditioned mutation that can never
//! drive a counter below zero. A conditioned decrement that applies zero
//! rows is reported as a typed [`InsertOutcome::StockConflict`], never
//! silently swallowed; the transaction manager turns it into an
//! `availability_changed` rejection.

pub mod error;
pub mod memory;
pub mod pg;
pub mod repo;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use repo::{CatalogStore, InsertOutcome, OrderStore};

// Prelude module
pub mod prelude {
    pub use crate::error::StoreError;
    pub use crate::memory::MemoryStore;
    pub use crate::pg::PgStore;
    pub use crate::repo::{CatalogStore, InsertOutcome, OrderStore};
}

//! # Piatto Core
//!
//! Catalog snapshots, the constraint resolver, and selection state for the
//! Piatto order-configuration engine.
//!
//! Everything in this crate is pure and synchronous: the resolver operates on
//! an immutable [`Catalog`] snapshot passed in by the caller, so the exact
//! same code serves both the interactive client mirror and the authoritative
//! server-side validation path. Divergence between the two is structurally
//! impossible.

pub mod catalog;
pub mod order;
pub mod resolver;
pub mod selection;
pub mod violation;

pub use catalog::{
    BaseDish, BaseDishId, Catalog, CatalogBuilder, Dish, DishId, DishIdParseError, Ingredient,
    IngredientId, Size, SizeId, Stock,
};
pub use order::{Order, OrderStatus};
pub use resolver::{
    can_add, can_remove, expand_with_requirements, requirement_closure, validate_full_selection,
    ExpandError, ValidOrder,
};
pub use selection::{AddError, Selection, SelectionState};
pub use violation::{AddDecision, ConstraintViolation, DenyReason, RemoveDenied};

// Prelude module
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogBuilder, Dish, DishId, Ingredient, Size, Stock};
    pub use crate::order::{Order, OrderStatus};
    pub use crate::resolver::{
        can_add, can_remove, expand_with_requirements, validate_full_selection,
    };
    pub use crate::selection::SelectionState;
    pub use crate::violation::{AddDecision, ConstraintViolation, DenyReason};
}

//! Violations: Control Flow as Data
//!
//! A rejected order attempt is a value, not a panic and not a transport
//! error. Every rejection carries enough structured detail for the caller to
//! pinpoint the offending ingredient(s) without re-deriving anything, and
//! exactly one violation is reported per attempt (first-found-wins).

use crate::catalog::IngredientId;
use serde::{Deserialize, Serialize};

/// The stable, wire-visible rejection of a full-selection validation.
///
/// Serialized with the `constraintViolation` discriminant required by the
/// order-creation boundary, e.g.
/// `{"constraintViolation":"incompatibility","ingredient":"eggs","conflictsWith":["mushrooms"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "constraintViolation", rename_all = "snake_case")]
pub enum ConstraintViolation {
    /// The base-dish/size pairing does not exist.
    #[error("unknown dish")]
    InvalidDish,

    /// More ingredients than the size allows.
    #[error("too many ingredients: {provided} selected, {max_allowed} allowed")]
    #[serde(rename_all = "camelCase")]
    IngredientCount { max_allowed: usize, provided: usize },

    /// An id that resolves to no known ingredient.
    #[error("unknown ingredient id {ingredient_id}")]
    #[serde(rename_all = "camelCase")]
    InvalidIngredient { ingredient_id: IngredientId },

    /// An ingredient whose stock counter is exhausted.
    #[error("{ingredient} is out of stock")]
    Availability { ingredient: String, stock: u32 },

    /// Two mutually incompatible ingredients selected together.
    #[error("{ingredient} is incompatible with {conflicts_with:?}")]
    #[serde(rename_all = "camelCase")]
    Incompatibility {
        ingredient: String,
        conflicts_with: Vec<String>,
    },

    /// A selected ingredient whose (transitive) requirements are not all in
    /// the selection.
    #[error("{ingredient} requires {missing:?}")]
    Requirements {
        ingredient: String,
        missing: Vec<String>,
    },

    /// Stock ran out between validation and commit; reported by the
    /// transaction manager when the conditioned decrement applies zero rows.
    #[error("availability changed for {ingredients:?}")]
    AvailabilityChanged { ingredients: Vec<String> },
}

/// Outcome of the interactive `can_add` check.
#[derive(Debug, Clone, PartialEq)]
pub enum AddDecision {
    Allowed,
    Denied(DenyReason),
}

impl AddDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AddDecision::Allowed)
    }
}

/// Why an interactive add was denied. Checked in a fixed order; only the
/// first failing reason is ever reported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DenyReason {
    #[error("no size selected")]
    NoSizeSelected,

    /// Post-expansion count (the candidate plus everything its requirement
    /// chain would pull in) would exceed the size cap.
    #[error("capacity exceeded: {attempted} ingredients, {max_ingredients} allowed")]
    CapacityExceeded {
        max_ingredients: usize,
        attempted: usize,
    },

    #[error("{ingredient} is unavailable")]
    Unavailable { ingredient: String },

    #[error("{ingredient} is incompatible with {conflicts_with:?}")]
    Incompatible {
        ingredient: String,
        conflicts_with: Vec<String>,
    },
}

/// Denial of an interactive remove: other selected ingredients still require
/// the one being removed. The resolver never cascades; the caller must remove
/// the dependents first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{ingredient} is still required by {dependents:?}")]
pub struct RemoveDenied {
    pub ingredient: String,
    pub dependents: Vec<String>,
}

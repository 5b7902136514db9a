//! Client-Side Mirror Resolver
//!
//! `SelectionState` drives the interactive ingredient picker: it holds a
//! cached catalog snapshot and a selection under construction, answering
//! add/remove attempts immediately through the exact same resolver functions
//! the server uses. It is a UX layer, not a trust boundary: the server
//! always re-validates from scratch, and when the server rejects, the mirror
//! reconciles its local state to match rather than leaving the UI
//! inconsistent.

use crate::catalog::{Catalog, DishId, IngredientId, Size};
use crate::resolver::{can_add, can_remove, expand_with_requirements, ExpandError};
use crate::violation::{AddDecision, ConstraintViolation, DenyReason, RemoveDenied};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// The candidate (dish, ingredient-set) tuple being assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub dish: Option<DishId>,
    pub ingredients: BTreeSet<IngredientId>,
}

/// Why an interactive add could not be applied to the local selection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddError {
    #[error("unknown ingredient id {0}")]
    UnknownIngredient(IngredientId),
    #[error("{0}")]
    Denied(DenyReason),
    #[error(transparent)]
    Expansion(ExpandError),
}

/// Interactive selection state over a cached snapshot.
#[derive(Debug, Clone)]
pub struct SelectionState {
    catalog: Catalog,
    selection: Selection,
}

impl SelectionState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            selection: Selection::default(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn size(&self) -> Option<&Size> {
        self.selection
            .dish
            .and_then(|dish| self.catalog.size(dish.size))
    }

    /// Pick the dish (base + size). Rejected when the dish is unknown in the
    /// cached snapshot or the held ingredients no longer fit the new cap.
    pub fn choose_dish(&mut self, dish_id: DishId) -> Result<(), DenyReason> {
        let dish = self
            .catalog
            .dish(dish_id)
            .ok_or(DenyReason::NoSizeSelected)?;
        if self.selection.ingredients.len() > dish.size.max_ingredients {
            return Err(DenyReason::CapacityExceeded {
                max_ingredients: dish.size.max_ingredients,
                attempted: self.selection.ingredients.len(),
            });
        }
        self.selection.dish = Some(dish_id);
        Ok(())
    }

    /// Add an ingredient, pulling in its requirement chain, and commit the
    /// expanded set locally if every check passes.
    pub fn try_add(&mut self, ingredient_id: IngredientId) -> Result<(), AddError> {
        let ingredient = self
            .catalog
            .ingredient(ingredient_id)
            .ok_or(AddError::UnknownIngredient(ingredient_id))?;

        let decision = can_add(
            ingredient,
            &self.selection.ingredients,
            self.size(),
            &self.catalog,
        );
        if let AddDecision::Denied(reason) = decision {
            return Err(AddError::Denied(reason));
        }

        // can_add guarantees a size is selected.
        let Some(size) = self.size().cloned() else {
            return Err(AddError::Denied(DenyReason::NoSizeSelected));
        };
        let expanded =
            expand_with_requirements(ingredient_id, &self.selection.ingredients, &size, &self.catalog)
                .map_err(AddError::Expansion)?;
        self.selection.ingredients = expanded;
        Ok(())
    }

    /// Remove an ingredient unless another selected one still requires it.
    /// Never cascades.
    pub fn try_remove(&mut self, ingredient_id: IngredientId) -> Result<(), RemoveDenied> {
        can_remove(ingredient_id, &self.selection.ingredients, &self.catalog)?;
        self.selection.ingredients.remove(&ingredient_id);
        Ok(())
    }

    /// Running total shown before submission: dish price plus selected
    /// ingredient prices. `None` until a dish is chosen.
    pub fn total_price(&self) -> Option<Decimal> {
        let dish = self.catalog.dish(self.selection.dish?)?;
        let total = self
            .selection
            .ingredients
            .iter()
            .filter_map(|id| self.catalog.ingredient(*id))
            .fold(dish.price(), |total, ingredient| total + ingredient.price);
        Some(total)
    }

    /// The tuple submitted to the order boundary, once a dish is chosen.
    pub fn candidate(&self) -> Option<(DishId, Vec<IngredientId>)> {
        let dish = self.selection.dish?;
        Some((dish, self.selection.ingredients.iter().copied().collect()))
    }

    /// Swap in a fresh snapshot (after an order commits, stock has moved) and
    /// re-validate the held selection against it: unknown and depleted
    /// ingredients are dropped, then anything whose requirements are no
    /// longer satisfied.
    pub fn refresh_snapshot(&mut self, catalog: Catalog) {
        self.catalog = catalog;

        let stale: Vec<IngredientId> = self
            .selection
            .ingredients
            .iter()
            .filter(|id| {
                self.catalog
                    .ingredient(**id)
                    .map(|i| !i.stock.is_available())
                    .unwrap_or(true)
            })
            .copied()
            .collect();
        for id in stale {
            self.drop_ingredient(id);
        }

        if let Some(dish) = self.selection.dish {
            if self.catalog.dish(dish).is_none() {
                self.selection.dish = None;
            }
        }
        self.enforce_capacity();
        self.sweep_requirements();
    }

    /// Apply an authoritative server rejection to the local state. The
    /// server's decision wins: the offending ingredient(s) are dropped (along
    /// with anything that required them) so the next submission can succeed.
    pub fn reconcile(&mut self, violation: &ConstraintViolation) {
        match violation {
            ConstraintViolation::InvalidDish => {
                self.selection.dish = None;
            }
            ConstraintViolation::IngredientCount { max_allowed, .. } => {
                while self.selection.ingredients.len() > *max_allowed {
                    let Some(last) = self.selection.ingredients.iter().next_back().copied() else {
                        break;
                    };
                    self.drop_ingredient(last);
                }
            }
            ConstraintViolation::InvalidIngredient { ingredient_id } => {
                self.drop_ingredient(*ingredient_id);
            }
            ConstraintViolation::Availability { ingredient, .. } => {
                self.drop_by_name(ingredient);
            }
            ConstraintViolation::Incompatibility { ingredient, .. }
            | ConstraintViolation::Requirements { ingredient, .. } => {
                self.drop_by_name(ingredient);
            }
            ConstraintViolation::AvailabilityChanged { ingredients } => {
                for name in ingredients {
                    self.drop_by_name(name);
                }
            }
        }
        self.sweep_requirements();
    }

    fn drop_by_name(&mut self, name: &str) {
        if let Some(id) = self.catalog.ingredient_by_name(name).map(|i| i.id) {
            self.drop_ingredient(id);
        }
    }

    fn drop_ingredient(&mut self, id: IngredientId) {
        self.selection.ingredients.remove(&id);
    }

    fn enforce_capacity(&mut self) {
        let Some(cap) = self.size().map(|s| s.max_ingredients) else {
            return;
        };
        while self.selection.ingredients.len() > cap {
            let Some(last) = self.selection.ingredients.iter().next_back().copied() else {
                break;
            };
            self.drop_ingredient(last);
        }
    }

    /// Drop members whose direct requirements are no longer all selected,
    /// repeating until stable (dropping one member can orphan another).
    fn sweep_requirements(&mut self) {
        loop {
            let orphan = self
                .selection
                .ingredients
                .iter()
                .filter_map(|id| self.catalog.ingredient(*id))
                .find(|ingredient| {
                    !ingredient
                        .requires
                        .iter()
                        .all(|req| self.selection.ingredients.contains(req))
                })
                .map(|ingredient| ingredient.id);
            match orphan {
                Some(id) => self.drop_ingredient(id),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseDish, CatalogBuilder, Ingredient, Stock};
    use rust_decimal_macros::dec;

    const MOZZARELLA: IngredientId = 1;
    const TOMATOES: IngredientId = 2;
    const OLIVES: IngredientId = 3;

    fn ingredient(
        id: IngredientId,
        name: &str,
        price: Decimal,
        stock: Stock,
        requires: &[IngredientId],
    ) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            price,
            stock,
            requires: requires.iter().copied().collect(),
            incompatible_with: BTreeSet::new(),
        }
    }

    fn catalog(olive_stock: Stock, mozzarella_stock: Stock) -> Catalog {
        CatalogBuilder::new()
            .base_dish(BaseDish {
                id: 1,
                name: "Margherita".to_string(),
            })
            .size(Size {
                id: 1,
                label: "Small".to_string(),
                base_price: dec!(5.00),
                max_ingredients: 3,
            })
            .ingredient(ingredient(
                MOZZARELLA,
                "mozzarella",
                dec!(1.00),
                mozzarella_stock,
                &[TOMATOES],
            ))
            .ingredient(ingredient(
                TOMATOES,
                "tomatoes",
                dec!(0.50),
                Stock::Unlimited,
                &[OLIVES],
            ))
            .ingredient(ingredient(OLIVES, "olives", dec!(0.70), olive_stock, &[]))
            .build()
    }

    fn dish() -> DishId {
        DishId { base: 1, size: 1 }
    }

    #[test]
    fn test_try_add_expands_and_prices() {
        let mut state = SelectionState::new(catalog(Stock::Unlimited, Stock::Count(3)));
        state.choose_dish(dish()).unwrap();
        state.try_add(MOZZARELLA).unwrap();

        assert_eq!(
            state.selection().ingredients,
            [MOZZARELLA, TOMATOES, OLIVES].into()
        );
        assert_eq!(state.total_price(), Some(dec!(7.20)));
        assert_eq!(
            state.candidate(),
            Some((dish(), vec![MOZZARELLA, TOMATOES, OLIVES]))
        );
    }

    #[test]
    fn test_try_add_without_dish_is_denied() {
        let mut state = SelectionState::new(catalog(Stock::Unlimited, Stock::Count(3)));
        assert_eq!(
            state.try_add(OLIVES),
            Err(AddError::Denied(DenyReason::NoSizeSelected))
        );
    }

    #[test]
    fn test_try_remove_respects_dependents() {
        let mut state = SelectionState::new(catalog(Stock::Unlimited, Stock::Count(3)));
        state.choose_dish(dish()).unwrap();
        state.try_add(MOZZARELLA).unwrap();

        assert!(state.try_remove(TOMATOES).is_err());
        state.try_remove(MOZZARELLA).unwrap();
        state.try_remove(TOMATOES).unwrap();
        assert_eq!(state.selection().ingredients, [OLIVES].into());
    }

    #[test]
    fn test_reconcile_drops_depleted_ingredient() {
        let mut state = SelectionState::new(catalog(Stock::Unlimited, Stock::Count(1)));
        state.choose_dish(dish()).unwrap();
        state.try_add(MOZZARELLA).unwrap();

        // Server lost the race for the last mozzarella.
        state.reconcile(&ConstraintViolation::AvailabilityChanged {
            ingredients: vec!["mozzarella".to_string()],
        });

        assert_eq!(state.selection().ingredients, [TOMATOES, OLIVES].into());
    }

    #[test]
    fn test_refresh_snapshot_cascades_requirement_drops() {
        let mut state = SelectionState::new(catalog(Stock::Count(5), Stock::Count(3)));
        state.choose_dish(dish()).unwrap();
        state.try_add(MOZZARELLA).unwrap();

        // Olives ran out server-side; tomatoes and mozzarella lose their
        // requirement chain and must go too.
        state.refresh_snapshot(catalog(Stock::Count(0), Stock::Count(3)));
        assert!(state.selection().ingredients.is_empty());
        assert_eq!(state.total_price(), Some(dec!(5.00)));
    }
}

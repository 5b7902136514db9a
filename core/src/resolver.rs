//! Constraint Resolver
//!
//! Pure, deterministic constraint checking over a catalog snapshot. Every
//! function here is side-effect free and first-violation-wins: checks run in
//! a fixed order and only the first failure is reported, which keeps
//! rejections reproducible.
//!
//! Requirement edges form a directed graph that may contain cycles in
//! pathological data. All traversals are iterative (explicit worklist plus
//! visited set), so termination does not depend on call-stack depth and a
//! revisited ingredient counts as already satisfied.

use crate::catalog::{Catalog, Dish, DishId, Ingredient, IngredientId, Size};
use crate::violation::{AddDecision, ConstraintViolation, DenyReason, RemoveDenied};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// A selection that passed every check, priced and ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOrder {
    pub dish: Dish,
    pub total_price: Decimal,
}

/// The transitive requirement closure of an ingredient, itself included.
///
/// Unknown required ids are kept in the closure (they can never be satisfied,
/// and dropping them would hide broken catalog data); only known ingredients
/// contribute outgoing edges.
pub fn requirement_closure(ingredient_id: IngredientId, catalog: &Catalog) -> BTreeSet<IngredientId> {
    let mut closure = BTreeSet::new();
    let mut queue = VecDeque::from([ingredient_id]);
    while let Some(id) = queue.pop_front() {
        if !closure.insert(id) {
            continue;
        }
        if let Some(ingredient) = catalog.ingredient(id) {
            for req in &ingredient.requires {
                if !closure.contains(req) {
                    queue.push_back(*req);
                }
            }
        }
    }
    closure
}

/// Interactive check: may `ingredient` join `selection`?
///
/// Checks in order, returning the first failing reason:
/// 1. a size must be selected,
/// 2. the post-expansion count (candidate plus everything its requirement
///    chain pulls in that is not yet selected) must fit the size cap,
/// 3. the candidate must have stock,
/// 4. the candidate must not conflict with anything selected.
pub fn can_add(
    ingredient: &Ingredient,
    selection: &BTreeSet<IngredientId>,
    size: Option<&Size>,
    catalog: &Catalog,
) -> AddDecision {
    let Some(size) = size else {
        return AddDecision::Denied(DenyReason::NoSizeSelected);
    };

    let pulled = requirement_closure(ingredient.id, catalog);
    let attempted = selection.len() + pulled.difference(selection).count();
    if attempted > size.max_ingredients {
        return AddDecision::Denied(DenyReason::CapacityExceeded {
            max_ingredients: size.max_ingredients,
            attempted,
        });
    }

    if !ingredient.stock.is_available() {
        return AddDecision::Denied(DenyReason::Unavailable {
            ingredient: ingredient.name.clone(),
        });
    }

    let conflicts: Vec<String> = ingredient
        .incompatible_with
        .iter()
        .filter(|other| selection.contains(other))
        .map(|other| catalog.name_of(*other))
        .collect();
    if !conflicts.is_empty() {
        return AddDecision::Denied(DenyReason::Incompatible {
            ingredient: ingredient.name.clone(),
            conflicts_with: conflicts,
        });
    }

    AddDecision::Allowed
}

/// Failure inside a requirement expansion, annotated with the chain of
/// ingredients that led to the blocked one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandError {
    /// The ingredient that failed its checks.
    pub ingredient: String,
    /// Names from the requested ingredient down to the failing one.
    pub chain: Vec<String>,
    pub reason: DenyReason,
}

impl fmt::Display for ExpandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain.len() > 1 {
            write!(
                f,
                "cannot add {} (required by chain: {}): {}",
                self.ingredient,
                self.chain.join(" \u{2192} "),
                self.reason
            )
        } else {
            write!(f, "cannot add {}: {}", self.ingredient, self.reason)
        }
    }
}

impl std::error::Error for ExpandError {}

/// Add `ingredient_id` to `selection`, pulling in every directly or
/// transitively required ingredient that is not already present.
///
/// Each pulled-in ingredient passes the same capacity, stock, and
/// incompatibility checks as a direct add; the first failure aborts the whole
/// expansion with its requirement chain. Cyclic `requires` data terminates:
/// an ingredient already expanded or already visited is treated as satisfied.
pub fn expand_with_requirements(
    ingredient_id: IngredientId,
    selection: &BTreeSet<IngredientId>,
    size: &Size,
    catalog: &Catalog,
) -> Result<BTreeSet<IngredientId>, ExpandError> {
    let mut expanded = selection.clone();
    let mut visited: HashSet<IngredientId> = HashSet::new();
    let mut parents: HashMap<IngredientId, IngredientId> = HashMap::new();
    let mut queue = VecDeque::from([ingredient_id]);

    while let Some(id) = queue.pop_front() {
        if expanded.contains(&id) || !visited.insert(id) {
            continue;
        }

        let fail = |reason: DenyReason| ExpandError {
            ingredient: catalog.name_of(id),
            chain: chain_of(ingredient_id, id, &parents, catalog),
            reason,
        };

        let Some(ingredient) = catalog.ingredient(id) else {
            // A required id missing from the snapshot can never be satisfied.
            return Err(fail(DenyReason::Unavailable {
                ingredient: catalog.name_of(id),
            }));
        };

        if expanded.len() + 1 > size.max_ingredients {
            return Err(fail(DenyReason::CapacityExceeded {
                max_ingredients: size.max_ingredients,
                attempted: expanded.len() + 1,
            }));
        }

        if !ingredient.stock.is_available() {
            return Err(fail(DenyReason::Unavailable {
                ingredient: ingredient.name.clone(),
            }));
        }

        let conflicts: Vec<String> = ingredient
            .incompatible_with
            .iter()
            .filter(|other| expanded.contains(other))
            .map(|other| catalog.name_of(*other))
            .collect();
        if !conflicts.is_empty() {
            return Err(fail(DenyReason::Incompatible {
                ingredient: ingredient.name.clone(),
                conflicts_with: conflicts,
            }));
        }

        expanded.insert(id);
        for req in &ingredient.requires {
            if !expanded.contains(req) && !visited.contains(req) {
                parents.entry(*req).or_insert(id);
                queue.push_back(*req);
            }
        }
    }

    Ok(expanded)
}

/// Reconstruct the requirement chain from the requested ingredient down to
/// the one that failed, as display names.
fn chain_of(
    root: IngredientId,
    failing: IngredientId,
    parents: &HashMap<IngredientId, IngredientId>,
    catalog: &Catalog,
) -> Vec<String> {
    let mut ids = vec![failing];
    let mut current = failing;
    while current != root {
        match parents.get(&current) {
            Some(parent) => {
                current = *parent;
                ids.push(current);
            }
            None => break,
        }
    }
    ids.reverse();
    ids.into_iter().map(|id| catalog.name_of(id)).collect()
}

/// Interactive check: may `ingredient_id` leave `selection`?
///
/// Denied when any other selected ingredient lists it directly in its
/// `requires` set. Never cascades: the caller must remove the dependents
/// first (or block the action).
pub fn can_remove(
    ingredient_id: IngredientId,
    selection: &BTreeSet<IngredientId>,
    catalog: &Catalog,
) -> Result<(), RemoveDenied> {
    let dependents: Vec<String> = selection
        .iter()
        .filter(|id| **id != ingredient_id)
        .filter_map(|id| catalog.ingredient(*id))
        .filter(|other| other.requires.contains(&ingredient_id))
        .map(|other| other.name.clone())
        .collect();

    if dependents.is_empty() {
        Ok(())
    } else {
        Err(RemoveDenied {
            ingredient: catalog.name_of(ingredient_id),
            dependents,
        })
    }
}

/// Authoritative, submission-time validation of a complete selection against
/// a fresh catalog snapshot.
///
/// Runs the checks of the order boundary in fixed order and returns the
/// first violation found: dish exists, count within cap, ids known, stock
/// available, no incompatibilities, requirements satisfied. Duplicate ids
/// collapse to one selected ingredient before any check runs.
///
/// The final last-instant stock re-check happens inside the store
/// transaction (conditioned decrement); its failure surfaces as
/// `availability_changed` from the transaction manager, never from here.
pub fn validate_full_selection(
    dish_id: DishId,
    ingredient_ids: &[IngredientId],
    catalog: &Catalog,
) -> Result<ValidOrder, ConstraintViolation> {
    let dish = catalog
        .dish(dish_id)
        .ok_or(ConstraintViolation::InvalidDish)?;

    // Dedupe preserving first-seen order so violations are reported against
    // the caller's ordering.
    let mut selected: BTreeSet<IngredientId> = BTreeSet::new();
    let mut ordered: Vec<IngredientId> = Vec::with_capacity(ingredient_ids.len());
    for id in ingredient_ids {
        if selected.insert(*id) {
            ordered.push(*id);
        }
    }

    if ordered.len() > dish.size.max_ingredients {
        return Err(ConstraintViolation::IngredientCount {
            max_allowed: dish.size.max_ingredients,
            provided: ordered.len(),
        });
    }

    for id in &ordered {
        if catalog.ingredient(*id).is_none() {
            return Err(ConstraintViolation::InvalidIngredient { ingredient_id: *id });
        }
    }

    // Every id resolves from here on.
    for ingredient in ordered.iter().filter_map(|id| catalog.ingredient(*id)) {
        if !ingredient.stock.is_available() {
            return Err(ConstraintViolation::Availability {
                ingredient: ingredient.name.clone(),
                stock: ingredient.stock.remaining().unwrap_or(0),
            });
        }
    }

    for ingredient in ordered.iter().filter_map(|id| catalog.ingredient(*id)) {
        let conflicts: Vec<String> = ingredient
            .incompatible_with
            .iter()
            .filter(|other| selected.contains(other))
            .map(|other| catalog.name_of(*other))
            .collect();
        if !conflicts.is_empty() {
            return Err(ConstraintViolation::Incompatibility {
                ingredient: ingredient.name.clone(),
                conflicts_with: conflicts,
            });
        }
    }

    for ingredient in ordered.iter().filter_map(|id| catalog.ingredient(*id)) {
        let missing: Vec<String> = requirement_closure(ingredient.id, catalog)
            .difference(&selected)
            .map(|m| catalog.name_of(*m))
            .collect();
        if !missing.is_empty() {
            return Err(ConstraintViolation::Requirements {
                ingredient: ingredient.name.clone(),
                missing,
            });
        }
    }

    let total_price = ordered
        .iter()
        .filter_map(|id| catalog.ingredient(*id))
        .fold(dish.price(), |total, ingredient| total + ingredient.price);

    Ok(ValidOrder { dish, total_price })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseDish, CatalogBuilder, Size, Stock};
    use rust_decimal_macros::dec;

    const MOZZARELLA: IngredientId = 1;
    const TOMATOES: IngredientId = 2;
    const OLIVES: IngredientId = 3;
    const HAM: IngredientId = 4;
    const EGGS: IngredientId = 5;
    const MUSHROOMS: IngredientId = 6;

    fn ingredient(
        id: IngredientId,
        name: &str,
        price: Decimal,
        stock: Stock,
        requires: &[IngredientId],
        incompatible: &[IngredientId],
    ) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            price,
            stock,
            requires: requires.iter().copied().collect(),
            incompatible_with: incompatible.iter().copied().collect(),
        }
    }

    fn small() -> Size {
        Size {
            id: 1,
            label: "Small".to_string(),
            base_price: dec!(5.00),
            max_ingredients: 3,
        }
    }

    fn fixture() -> Catalog {
        CatalogBuilder::new()
            .base_dish(BaseDish {
                id: 1,
                name: "Margherita".to_string(),
            })
            .size(small())
            .ingredient(ingredient(
                MOZZARELLA,
                "mozzarella",
                dec!(1.00),
                Stock::Count(3),
                &[TOMATOES],
                &[],
            ))
            .ingredient(ingredient(
                TOMATOES,
                "tomatoes",
                dec!(0.50),
                Stock::Unlimited,
                &[OLIVES],
                &[],
            ))
            .ingredient(ingredient(
                OLIVES,
                "olives",
                dec!(0.70),
                Stock::Unlimited,
                &[],
                &[],
            ))
            .ingredient(ingredient(
                HAM,
                "ham",
                dec!(1.20),
                Stock::Unlimited,
                &[],
                &[],
            ))
            .ingredient(ingredient(
                EGGS,
                "eggs",
                dec!(0.80),
                Stock::Unlimited,
                &[],
                &[MUSHROOMS],
            ))
            .ingredient(ingredient(
                MUSHROOMS,
                "mushrooms",
                dec!(0.90),
                Stock::Unlimited,
                &[],
                &[],
            ))
            .build()
    }

    fn dish() -> DishId {
        DishId { base: 1, size: 1 }
    }

    #[test]
    fn test_incompatibility_denial_is_symmetric() {
        let catalog = fixture();
        let selection: BTreeSet<_> = [MUSHROOMS].into();
        let decision = can_add(
            catalog.ingredient(EGGS).unwrap(),
            &selection,
            Some(&small()),
            &catalog,
        );
        assert_eq!(
            decision,
            AddDecision::Denied(DenyReason::Incompatible {
                ingredient: "eggs".to_string(),
                conflicts_with: vec!["mushrooms".to_string()],
            })
        );

        // The closure is symmetric even though only eggs listed mushrooms.
        let selection: BTreeSet<_> = [EGGS].into();
        let decision = can_add(
            catalog.ingredient(MUSHROOMS).unwrap(),
            &selection,
            Some(&small()),
            &catalog,
        );
        assert!(matches!(
            decision,
            AddDecision::Denied(DenyReason::Incompatible { .. })
        ));
    }

    #[test]
    fn test_no_size_selected_is_checked_first() {
        let catalog = fixture();
        let decision = can_add(
            catalog.ingredient(MOZZARELLA).unwrap(),
            &BTreeSet::new(),
            None,
            &catalog,
        );
        assert_eq!(decision, AddDecision::Denied(DenyReason::NoSizeSelected));
    }

    #[test]
    fn test_expand_pulls_transitive_requirements() {
        let catalog = fixture();
        let expanded =
            expand_with_requirements(MOZZARELLA, &BTreeSet::new(), &small(), &catalog).unwrap();
        assert_eq!(expanded, [MOZZARELLA, TOMATOES, OLIVES].into());
    }

    #[test]
    fn test_expand_reports_blocking_chain() {
        let catalog = CatalogBuilder::new()
            .size(small())
            .ingredient(ingredient(
                MOZZARELLA,
                "mozzarella",
                dec!(1.00),
                Stock::Count(3),
                &[TOMATOES],
                &[],
            ))
            .ingredient(ingredient(
                TOMATOES,
                "tomatoes",
                dec!(0.50),
                Stock::Unlimited,
                &[OLIVES],
                &[],
            ))
            .ingredient(ingredient(
                OLIVES,
                "olives",
                dec!(0.70),
                Stock::Count(0),
                &[],
                &[],
            ))
            .build();

        let err =
            expand_with_requirements(MOZZARELLA, &BTreeSet::new(), &small(), &catalog).unwrap_err();
        assert_eq!(err.chain, vec!["mozzarella", "tomatoes", "olives"]);
        assert_eq!(
            err.reason,
            DenyReason::Unavailable {
                ingredient: "olives".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "cannot add olives (required by chain: mozzarella \u{2192} tomatoes \u{2192} olives): olives is unavailable"
        );
    }

    #[test]
    fn test_expand_terminates_on_cyclic_requirements() {
        let catalog = CatalogBuilder::new()
            .size(small())
            .ingredient(ingredient(
                1,
                "a",
                dec!(0.10),
                Stock::Unlimited,
                &[2],
                &[],
            ))
            .ingredient(ingredient(
                2,
                "b",
                dec!(0.10),
                Stock::Unlimited,
                &[1],
                &[],
            ))
            .build();

        // A requires B requires A: the cycle is mutually satisfied.
        let expanded = expand_with_requirements(1, &BTreeSet::new(), &small(), &catalog).unwrap();
        assert_eq!(expanded, [1, 2].into());
    }

    #[test]
    fn test_capacity_counts_post_expansion() {
        let catalog = fixture();
        let two = Size {
            max_ingredients: 2,
            ..small()
        };
        // Mozzarella alone fits, but its chain pulls three ingredients total.
        let decision = can_add(
            catalog.ingredient(MOZZARELLA).unwrap(),
            &BTreeSet::new(),
            Some(&two),
            &catalog,
        );
        assert_eq!(
            decision,
            AddDecision::Denied(DenyReason::CapacityExceeded {
                max_ingredients: 2,
                attempted: 3,
            })
        );

        let err = expand_with_requirements(MOZZARELLA, &BTreeSet::new(), &two, &catalog)
            .unwrap_err();
        assert!(matches!(err.reason, DenyReason::CapacityExceeded { .. }));
    }

    #[test]
    fn test_add_denied_at_cap() {
        let catalog = fixture();
        let selection: BTreeSet<_> = [MOZZARELLA, TOMATOES, OLIVES].into();
        let decision = can_add(
            catalog.ingredient(HAM).unwrap(),
            &selection,
            Some(&small()),
            &catalog,
        );
        assert_eq!(
            decision,
            AddDecision::Denied(DenyReason::CapacityExceeded {
                max_ingredients: 3,
                attempted: 4,
            })
        );
    }

    #[test]
    fn test_expand_is_a_no_op_for_satisfied_selection() {
        let catalog = fixture();
        let selection: BTreeSet<_> = [MOZZARELLA, TOMATOES, OLIVES].into();
        let expanded =
            expand_with_requirements(MOZZARELLA, &selection, &small(), &catalog).unwrap();
        assert_eq!(expanded, selection);
    }

    #[test]
    fn test_can_remove_blocks_direct_dependents() {
        let catalog = fixture();
        let selection: BTreeSet<_> = [MOZZARELLA, TOMATOES, OLIVES].into();

        let denied = can_remove(TOMATOES, &selection, &catalog).unwrap_err();
        assert_eq!(denied.dependents, vec!["mozzarella"]);

        let denied = can_remove(OLIVES, &selection, &catalog).unwrap_err();
        assert_eq!(denied.dependents, vec!["tomatoes"]);

        // Nothing requires mozzarella itself.
        assert!(can_remove(MOZZARELLA, &selection, &catalog).is_ok());
    }

    #[test]
    fn test_validate_scenario_total_price() {
        let catalog = fixture();
        let valid =
            validate_full_selection(dish(), &[MOZZARELLA, TOMATOES, OLIVES], &catalog).unwrap();
        assert_eq!(valid.total_price, dec!(7.20));
        assert_eq!(valid.dish.size.label, "Small");
    }

    #[test]
    fn test_validate_unknown_dish_wins_over_everything() {
        let catalog = fixture();
        let violation =
            validate_full_selection(DishId { base: 9, size: 9 }, &[99, 98, 97, 96], &catalog)
                .unwrap_err();
        assert_eq!(violation, ConstraintViolation::InvalidDish);
    }

    #[test]
    fn test_validate_count_checked_before_unknown_ids() {
        let catalog = fixture();
        let violation =
            validate_full_selection(dish(), &[MOZZARELLA, TOMATOES, OLIVES, 99], &catalog)
                .unwrap_err();
        assert_eq!(
            violation,
            ConstraintViolation::IngredientCount {
                max_allowed: 3,
                provided: 4,
            }
        );
    }

    #[test]
    fn test_validate_unknown_ingredient() {
        let catalog = fixture();
        let violation = validate_full_selection(dish(), &[MOZZARELLA, 99], &catalog).unwrap_err();
        // Requirements of mozzarella are also unmet, but unknown ids are
        // reported first per the fixed check order.
        assert_eq!(
            violation,
            ConstraintViolation::InvalidIngredient { ingredient_id: 99 }
        );
    }

    #[test]
    fn test_validate_availability() {
        let catalog = CatalogBuilder::new()
            .base_dish(BaseDish {
                id: 1,
                name: "Margherita".to_string(),
            })
            .size(small())
            .ingredient(ingredient(
                MOZZARELLA,
                "mozzarella",
                dec!(1.00),
                Stock::Count(0),
                &[],
                &[],
            ))
            .build();
        let violation = validate_full_selection(dish(), &[MOZZARELLA], &catalog).unwrap_err();
        assert_eq!(
            violation,
            ConstraintViolation::Availability {
                ingredient: "mozzarella".to_string(),
                stock: 0,
            }
        );
    }

    #[test]
    fn test_validate_incompatibility() {
        let catalog = fixture();
        let violation = validate_full_selection(dish(), &[EGGS, MUSHROOMS], &catalog).unwrap_err();
        assert_eq!(
            violation,
            ConstraintViolation::Incompatibility {
                ingredient: "eggs".to_string(),
                conflicts_with: vec!["mushrooms".to_string()],
            }
        );
    }

    #[test]
    fn test_validate_missing_requirements() {
        let catalog = fixture();
        let violation =
            validate_full_selection(dish(), &[MOZZARELLA, TOMATOES], &catalog).unwrap_err();
        assert_eq!(
            violation,
            ConstraintViolation::Requirements {
                ingredient: "mozzarella".to_string(),
                missing: vec!["olives".to_string()],
            }
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let catalog = fixture();
        let first = validate_full_selection(dish(), &[MOZZARELLA, TOMATOES], &catalog);
        let second = validate_full_selection(dish(), &[MOZZARELLA, TOMATOES], &catalog);
        assert_eq!(first, second);

        let first = validate_full_selection(dish(), &[MOZZARELLA, TOMATOES, OLIVES], &catalog);
        let second = validate_full_selection(dish(), &[MOZZARELLA, TOMATOES, OLIVES], &catalog);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_collapses_duplicate_ids() {
        let catalog = fixture();
        let valid = validate_full_selection(
            dish(),
            &[MOZZARELLA, TOMATOES, OLIVES, MOZZARELLA],
            &catalog,
        )
        .unwrap();
        assert_eq!(valid.total_price, dec!(7.20));
    }

    #[test]
    fn test_requirement_closure_is_cycle_safe() {
        let catalog = CatalogBuilder::new()
            .ingredient(ingredient(1, "a", dec!(0.10), Stock::Unlimited, &[2], &[]))
            .ingredient(ingredient(2, "b", dec!(0.10), Stock::Unlimited, &[3], &[]))
            .ingredient(ingredient(3, "c", dec!(0.10), Stock::Unlimited, &[1], &[]))
            .build();
        assert_eq!(requirement_closure(1, &catalog), [1, 2, 3].into());
    }
}

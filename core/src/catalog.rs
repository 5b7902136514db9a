//! Catalog Snapshot Types
//!
//! The catalog is an immutable-per-request snapshot of everything orderable:
//! base dishes, sizes, and ingredients together with their requirement and
//! incompatibility edges and current stock.
//!
//! Snapshots are built through [`CatalogBuilder`], which pre-computes the
//! symmetric closure of the incompatibility relation. Storage may hold either
//! direction of an incompatibility pair (or both); a built snapshot is always
//! symmetric, so the invariant is structural rather than data-entry dependent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub type IngredientId = i64;
pub type SizeId = i64;
pub type BaseDishId = i64;

/// Remaining units of an ingredient, or `Unlimited` if uncapped.
///
/// Serialized as `null` (unlimited) or a non-negative counter, matching the
/// nullable stock column in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Stock {
    Unlimited,
    Count(u32),
}

impl Stock {
    /// True if at least one unit can still be reserved.
    pub fn is_available(&self) -> bool {
        match self {
            Stock::Unlimited => true,
            Stock::Count(n) => *n > 0,
        }
    }

    /// True for counted stock; unlimited ingredients have no counter and are
    /// never decremented.
    pub fn is_finite(&self) -> bool {
        matches!(self, Stock::Count(_))
    }

    /// The counter value, with unlimited reported as `None`.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            Stock::Unlimited => None,
            Stock::Count(n) => Some(*n),
        }
    }
}

impl From<Option<u32>> for Stock {
    fn from(value: Option<u32>) -> Self {
        match value {
            None => Stock::Unlimited,
            Some(n) => Stock::Count(n),
        }
    }
}

impl From<Stock> for Option<u32> {
    fn from(value: Stock) -> Self {
        value.remaining()
    }
}

/// An ingredient with its constraint edges.
///
/// `requires` is directed and may chain or even cycle in pathological data;
/// the resolver is cycle-safe regardless. `incompatible_with` is symmetric
/// once the snapshot is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub price: Decimal,
    pub stock: Stock,
    #[serde(default)]
    pub requires: BTreeSet<IngredientId>,
    #[serde(default)]
    pub incompatible_with: BTreeSet<IngredientId>,
}

/// A dish size: the base price carrier and the ingredient-count cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub label: String,
    pub base_price: Decimal,
    pub max_ingredients: usize,
}

/// A dish category independent of size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDish {
    pub id: BaseDishId,
    pub name: String,
}

/// The orderable unit: a base dish paired with a size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub base: BaseDish,
    pub size: Size,
}

impl Dish {
    pub fn id(&self) -> DishId {
        DishId {
            base: self.base.id,
            size: self.size.id,
        }
    }

    /// The dish price is the size's base price.
    pub fn price(&self) -> Decimal {
        self.size.base_price
    }
}

/// Composite dish identity, `"<baseDishId>_<sizeId>"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DishId {
    pub base: BaseDishId,
    pub size: SizeId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed dish id {input:?}: expected \"<baseDishId>_<sizeId>\"")]
pub struct DishIdParseError {
    pub input: String,
}

impl FromStr for DishId {
    type Err = DishIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DishIdParseError {
            input: s.to_string(),
        };
        let (base, size) = s.split_once('_').ok_or_else(malformed)?;
        Ok(DishId {
            base: base.parse().map_err(|_| malformed())?,
            size: size.parse().map_err(|_| malformed())?,
        })
    }
}

impl fmt::Display for DishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.size)
    }
}

// ============== Catalog ==============

/// Immutable catalog snapshot with id and name indexes.
///
/// A `Catalog` reflects stock at the moment it was read from the store. The
/// authoritative validation path always works on a fresh snapshot; the client
/// mirror works on a cached one and reconciles when the server disagrees.
/// Snapshots cross process boundaries as the catalog-read lists (ingredients,
/// sizes, base dishes) and are rebuilt through [`CatalogBuilder`] on arrival,
/// so the indexes and the symmetric closure never travel in serialized form.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    sizes: BTreeMap<SizeId, Size>,
    base_dishes: BTreeMap<BaseDishId, BaseDish>,
    by_name: HashMap<String, IngredientId>,
}

impl Catalog {
    pub fn ingredient(&self, id: IngredientId) -> Option<&Ingredient> {
        self.ingredients.get(&id)
    }

    pub fn ingredient_by_name(&self, name: &str) -> Option<&Ingredient> {
        self.by_name.get(name).and_then(|id| self.ingredient(*id))
    }

    /// Display name for an ingredient id; falls back to `#<id>` for ids that
    /// are not in this snapshot (error messages must never panic).
    pub fn name_of(&self, id: IngredientId) -> String {
        self.ingredient(id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn size(&self, id: SizeId) -> Option<&Size> {
        self.sizes.get(&id)
    }

    pub fn base_dish(&self, id: BaseDishId) -> Option<&BaseDish> {
        self.base_dishes.get(&id)
    }

    /// Resolve the orderable pairing, or `None` if either half is unknown.
    pub fn dish(&self, id: DishId) -> Option<Dish> {
        let base = self.base_dish(id.base)?.clone();
        let size = self.size(id.size)?.clone();
        Some(Dish { base, size })
    }

    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }

    pub fn sizes(&self) -> impl Iterator<Item = &Size> {
        self.sizes.values()
    }

    pub fn base_dishes(&self) -> impl Iterator<Item = &BaseDish> {
        self.base_dishes.values()
    }
}

// ============== CatalogBuilder ==============

/// Builder that assembles a snapshot and enforces its structural invariants.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    sizes: BTreeMap<SizeId, Size>,
    base_dishes: BTreeMap<BaseDishId, BaseDish>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.insert(ingredient.id, ingredient);
        self
    }

    pub fn size(mut self, size: Size) -> Self {
        self.sizes.insert(size.id, size);
        self
    }

    pub fn base_dish(mut self, base: BaseDish) -> Self {
        self.base_dishes.insert(base.id, base);
        self
    }

    /// Finalize the snapshot.
    ///
    /// Computes the symmetric closure of the incompatibility relation: if A
    /// lists B, B gains A. Requirement edges are left directed as given.
    pub fn build(mut self) -> Catalog {
        let pairs: Vec<(IngredientId, IngredientId)> = self
            .ingredients
            .values()
            .flat_map(|i| i.incompatible_with.iter().map(move |other| (i.id, *other)))
            .collect();
        for (a, b) in pairs {
            if let Some(other) = self.ingredients.get_mut(&b) {
                other.incompatible_with.insert(a);
            }
        }

        let by_name = self
            .ingredients
            .values()
            .map(|i| (i.name.clone(), i.id))
            .collect();

        Catalog {
            ingredients: self.ingredients,
            sizes: self.sizes,
            base_dishes: self.base_dishes,
            by_name,
        }
    }
}

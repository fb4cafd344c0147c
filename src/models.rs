//! Data models for catalogue items, games and crafting trees

use serde::Serialize;

/// Fallback game namespace. The CLI supplies this as the default; the
/// engine itself never guesses a namespace.
pub const UNKNOWN_GAME: &str = "Unknown";

/// Derived classification of an item's role in the recipe graph.
///
/// Tags are never authored directly; the catalogue rewrites them whenever
/// the graph changes. `RawMaterial` and `Ingredient` commonly co-occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Product,
    Ingredient,
    RawMaterial,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Product => "product",
            Tag::Ingredient => "ingredient",
            Tag::RawMaterial => "raw_material",
        }
    }

    pub fn parse(s: &str) -> Option<Tag> {
        match s {
            "product" => Some(Tag::Product),
            "ingredient" => Some(Tag::Ingredient),
            "raw_material" => Some(Tag::RawMaterial),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingredient slot of a recipe: which item, and how many per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: String,
    pub amount: u32,
}

/// A catalogue item. The (id, game) pair is the identity; the same id
/// string may denote unrelated items in two different games.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub game: String,
    pub name: String,
    pub description: String,
    /// Batch output of the item's own recipe.
    pub quantity: u32,
    pub ingredients: Vec<Ingredient>,
    /// Positional stoichiometry: `ratio[0]` = own output per batch,
    /// `ratio[i+1]` = ingredient i consumed per batch. Can drift from
    /// `ingredients` when an edit supplies one without the other; readers
    /// fall back to the ingredient's own `amount`.
    pub ratio: Vec<u32>,
    pub tags: Vec<Tag>,
    /// Number of alternative recipes registered for this item.
    pub alternatives: u32,
}

impl Item {
    /// Batch output quantity, `ratio[0]` with the stored quantity as fallback.
    pub fn output_quantity(&self) -> u32 {
        self.ratio.first().copied().unwrap_or(self.quantity)
    }

    /// Per-batch amount of ingredient `i`, `ratio[i+1]` with the
    /// ingredient's own `amount` as fallback when the two have drifted.
    pub fn ingredient_amount(&self, i: usize) -> u32 {
        self.ratio
            .get(i + 1)
            .copied()
            .unwrap_or(self.ingredients[i].amount)
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// A secondary recipe for an existing item, stored apart from the primary
/// catalogue and never consulted by tree resolution.
#[derive(Debug, Clone)]
pub struct AlternativeRecipe {
    /// Synthesized id, `"<primary id> A<n>"`.
    pub id: String,
    /// Id of the primary item this is an alternative for.
    pub name: String,
    pub game: String,
    pub description: String,
    pub quantity: u32,
    pub ingredients: Vec<Ingredient>,
    pub ratio: Vec<u32>,
    pub tags: Vec<Tag>,
}

/// A game namespace entry.
#[derive(Debug, Clone)]
pub struct Game {
    pub name: String,
    pub description: String,
}

/// One node of a resolved crafting tree.
///
/// `batches` and `produces` are set only on composite nodes of a scaled
/// tree; an unscaled unit tree carries neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    /// Units of this item required by the parent (or requested, at the root).
    pub amount: u32,
    /// Batch output of this node's own recipe (1 for raw materials).
    pub recipe_output: u32,
    pub ingredients: Vec<TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<u32>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Result of a unit-tree resolution.
///
/// Ingredient ids that could not be resolved are omitted from the tree and
/// listed in `missing`, so callers needing strict validation can reject
/// partial data instead of silently under-building.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tree: TreeNode,
    pub missing: Vec<String>,
}

/// Per-ingredient requirement vs. on-hand stock, one level deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientAvailability {
    pub required_per_craft: u32,
    pub available: u32,
}

//! Crafting tree resolution and craftability analysis
//!
//! All operations here are read-only over the catalogue: resolving an
//! ingredient tree, rescaling it to a target quantity with whole-batch
//! rounding, and computing how much of an item the on-hand stock allows.

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;
use thiserror::Error;

use crate::db;
use crate::models::{IngredientAvailability, Resolution, TreeNode};

#[derive(Debug, Error)]
pub enum CalcError {
    #[error("item '{id}' not found in game '{game}'")]
    ItemNotFound { id: String, game: String },
    #[error("cyclic recipe detected at '{id}' in game '{game}'")]
    CyclicRecipe { id: String, game: String },
    #[error("recipe for '{0}' has zero batch output")]
    InvalidRecipeOutput(String),
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// Resolve the ingredient tree required to produce one unit of an item's
/// own batch output.
///
/// Ingredient ids that cannot be resolved are omitted from the tree and
/// reported in [`Resolution::missing`]; a missing root is an error. A cycle
/// anywhere in the expansion fails the whole resolution.
pub fn resolve_unit_tree(conn: &Connection, item_id: &str, game: &str) -> Result<Resolution, CalcError> {
    let mut path = HashSet::new();
    let mut missing = Vec::new();
    let tree = resolve_recursive(conn, item_id, game, &mut path, &mut missing)?.ok_or_else(|| {
        CalcError::ItemNotFound {
            id: item_id.to_string(),
            game: game.to_string(),
        }
    })?;
    Ok(Resolution { tree, missing })
}

fn resolve_recursive(
    conn: &Connection,
    item_id: &str,
    game: &str,
    path: &mut HashSet<String>,
    missing: &mut Vec<String>,
) -> Result<Option<TreeNode>, CalcError> {
    let Some(item) = db::get_item(conn, item_id, game)? else {
        return Ok(None);
    };

    // Revisiting an id still on the current expansion path means the graph
    // has a cycle. Ids are removed on unwind, so the same ingredient may
    // legitimately appear in two sibling branches.
    if !path.insert(item_id.to_string()) {
        return Err(CalcError::CyclicRecipe {
            id: item_id.to_string(),
            game: game.to_string(),
        });
    }

    if item.ingredients.is_empty() {
        path.remove(item_id);
        return Ok(Some(TreeNode {
            id: item.id,
            amount: 1,
            recipe_output: 1,
            ingredients: Vec::new(),
            batches: None,
            produces: None,
        }));
    }

    let mut children = Vec::new();
    for (i, ing) in item.ingredients.iter().enumerate() {
        let needed_per_batch = item.ingredient_amount(i);
        match resolve_recursive(conn, &ing.id, game, path, missing)? {
            Some(mut child) => {
                // The child resolves to one unit of its own output; the
                // parent then overwrites the amount with its per-batch need.
                child.amount = needed_per_batch;
                children.push(child);
            }
            None => missing.push(ing.id.clone()),
        }
    }
    path.remove(item_id);

    Ok(Some(TreeNode {
        id: item.id.clone(),
        amount: 1,
        recipe_output: item.output_quantity(),
        ingredients: children,
        batches: None,
        produces: None,
    }))
}

/// Rescale a resolved unit tree to produce at least `target` units of the
/// root, rounding composite nodes up to whole recipe batches.
///
/// Leaves scale 1:1. For composite nodes `produces >= target` and
/// `produces - recipe_output < target` always hold; children scale with the
/// number of parent batches, not with the raw requested amount.
pub fn scale_tree(tree: &TreeNode, target: u32) -> Result<TreeNode, CalcError> {
    let mut scaled = tree.clone();

    if tree.is_leaf() {
        scaled.amount = target;
        return Ok(scaled);
    }

    if tree.recipe_output == 0 {
        return Err(CalcError::InvalidRecipeOutput(tree.id.clone()));
    }
    let batches = target.div_ceil(tree.recipe_output);

    scaled.amount = target;
    scaled.batches = Some(batches);
    scaled.produces = Some(batches * tree.recipe_output);

    for (i, child) in tree.ingredients.iter().enumerate() {
        scaled.ingredients[i] = scale_tree(child, child.amount * batches)?;
    }
    Ok(scaled)
}

/// Maximum units of an item craftable from the given stock.
///
/// Single-level: only directly available quantities of each immediate
/// ingredient count, never what the stock could craft further down. For a
/// raw material the answer is simply the held quantity.
pub fn max_craftable(
    conn: &Connection,
    item_id: &str,
    available: &HashMap<String, u32>,
    game: &str,
) -> Result<u32, CalcError> {
    let item = db::get_item(conn, item_id, game)?.ok_or_else(|| CalcError::ItemNotFound {
        id: item_id.to_string(),
        game: game.to_string(),
    })?;

    if item.ingredients.is_empty() {
        return Ok(available.get(item_id).copied().unwrap_or(0));
    }

    let mut min_batches: Option<u32> = None;
    for (i, ing) in item.ingredients.iter().enumerate() {
        let needed = item.ingredient_amount(i);
        if needed == 0 {
            // Zero-need ingredients cannot constrain the batch count.
            continue;
        }
        let held = available.get(&ing.id).copied().unwrap_or(0);
        let possible = held / needed;
        min_batches = Some(min_batches.map_or(possible, |m| m.min(possible)));
    }

    Ok(min_batches.unwrap_or(0) * item.output_quantity())
}

/// Per-ingredient requirement vs. on-hand stock for one craft batch,
/// independent of the bottleneck computation.
pub fn ingredient_breakdown(
    conn: &Connection,
    item_id: &str,
    available: &HashMap<String, u32>,
    game: &str,
) -> Result<BTreeMap<String, IngredientAvailability>, CalcError> {
    let item = db::get_item(conn, item_id, game)?.ok_or_else(|| CalcError::ItemNotFound {
        id: item_id.to_string(),
        game: game.to_string(),
    })?;

    let mut breakdown = BTreeMap::new();
    for (i, ing) in item.ingredients.iter().enumerate() {
        breakdown.insert(
            ing.id.clone(),
            IngredientAvailability {
                required_per_craft: item.ingredient_amount(i),
                available: available.get(&ing.id).copied().unwrap_or(0),
            },
        );
    }
    Ok(breakdown)
}

/// Format a crafting tree as a readable indented string
pub fn format_tree(node: &TreeNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    if node.is_leaf() {
        output.push_str(&format!("{}{} x{} (raw)\n", prefix, node.id, node.amount));
    } else {
        match (node.batches, node.produces) {
            (Some(batches), Some(produces)) => {
                output.push_str(&format!(
                    "{}{} x{} ({} batches, makes {})\n",
                    prefix, node.id, node.amount, batches, produces
                ));
            }
            _ => {
                output.push_str(&format!(
                    "{}{} x{} (makes {} per batch)\n",
                    prefix, node.id, node.amount, node.recipe_output
                ));
            }
        }
        for child in &node.ingredients {
            output.push_str(&format_tree(child, indent + 1));
        }
    }

    output
}

/// Summary of a scaled crafting tree
#[derive(Debug)]
pub struct TreeSummary {
    pub root_id: String,
    pub target_amount: u32,
    pub crafting_steps: Vec<(String, u32)>,
    pub raw_totals: Vec<(String, u32)>,
}

/// Aggregate a tree into per-item batch counts and raw-material totals
pub fn summarize_tree(node: &TreeNode) -> TreeSummary {
    let mut steps: HashMap<String, u32> = HashMap::new();
    let mut raw: HashMap<String, u32> = HashMap::new();

    collect_summary(node, &mut steps, &mut raw);

    let mut step_list: Vec<_> = steps.into_iter().collect();
    step_list.sort_by(|a, b| a.0.cmp(&b.0));

    let mut raw_list: Vec<_> = raw.into_iter().collect();
    raw_list.sort_by(|a, b| a.0.cmp(&b.0));

    TreeSummary {
        root_id: node.id.clone(),
        target_amount: node.amount,
        crafting_steps: step_list,
        raw_totals: raw_list,
    }
}

fn collect_summary(node: &TreeNode, steps: &mut HashMap<String, u32>, raw: &mut HashMap<String, u32>) {
    if node.is_leaf() {
        *raw.entry(node.id.clone()).or_default() += node.amount;
    } else {
        *steps.entry(node.id.clone()).or_default() += node.batches.unwrap_or(1);
        for child in &node.ingredients {
            collect_summary(child, steps, raw);
        }
    }
}

impl std::fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Crafting Summary ===")?;
        writeln!(f, "Target: {} x{}", self.root_id, self.target_amount)?;
        writeln!(f)?;

        writeln!(f, "Crafting steps (batches):")?;
        for (id, batches) in &self.crafting_steps {
            writeln!(f, "  {:>4}x {}", batches, id)?;
        }
        writeln!(f)?;

        writeln!(f, "Raw materials required:")?;
        for (id, amount) in &self.raw_totals {
            writeln!(f, "  {:>4}x {}", amount, id)?;
        }

        Ok(())
    }
}

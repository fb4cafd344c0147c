//! Catalogue mutations and derived-tag maintenance
//!
//! Every write to the recipe graph goes through this module so the derived
//! tags (product / raw_material / ingredient) stay consistent and ingredient
//! references never dangle. Reads live in `calculator`.

use rusqlite::Connection;
use thiserror::Error;

use crate::db;
use crate::models::{AlternativeRecipe, Game, Ingredient, Item, Tag, UNKNOWN_GAME};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("item '{id}' already exists in game '{game}'; add an alternative recipe instead")]
    DuplicateItem { id: String, game: String },
    #[error("item '{id}' not found in game '{game}'")]
    ItemNotFound { id: String, game: String },
    #[error("game '{0}' already exists")]
    DuplicateGame(String),
    #[error("game '{0}' not found")]
    GameNotFound(String),
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// Partial update for [`edit_item`]. Fields left as `None` keep their
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<u32>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub ratio: Option<Vec<u32>>,
}

/// Add a new primary item to a game's catalogue.
///
/// Unknown ingredient ids are stubbed as raw materials first, so the graph
/// never holds a dangling reference; an ingredient naming the item's own id
/// is skipped rather than stubbed. Tags are recomputed for the new item and
/// for each of its ingredients.
pub fn add_item(
    conn: &Connection,
    id: &str,
    quantity: u32,
    ingredients: Vec<Ingredient>,
    game: &str,
    description: &str,
) -> Result<(), CatalogError> {
    if db::item_exists(conn, id, game)? {
        return Err(CatalogError::DuplicateItem {
            id: id.to_string(),
            game: game.to_string(),
        });
    }

    stub_missing_ingredients(conn, id, &ingredients, game)?;

    let mut ratio = Vec::with_capacity(1 + ingredients.len());
    ratio.push(quantity);
    ratio.extend(ingredients.iter().map(|ing| ing.amount));

    let tags = if ingredients.is_empty() {
        vec![Tag::RawMaterial]
    } else {
        vec![Tag::Product]
    };

    let item = Item {
        id: id.to_string(),
        game: game.to_string(),
        name: id.to_string(),
        description: description.to_string(),
        quantity,
        ingredients,
        ratio,
        tags,
        alternatives: 0,
    };
    db::insert_item(conn, &item)?;

    recompute_tags(conn, id, game)?;
    for ing in &item.ingredients {
        recompute_tags(conn, &ing.id, game)?;
    }
    Ok(())
}

/// Apply a partial update to an item.
///
/// When `ingredients` is supplied without `ratio`, the ratio is rederived
/// from the effective quantity and the new per-ingredient amounts; supplying
/// `ratio` alone leaves the ingredient list untouched (the tolerated drift
/// window). Newly referenced unknown ingredients are stubbed, and tags are
/// recomputed for the item and every ingredient it now lists.
pub fn edit_item(
    conn: &Connection,
    id: &str,
    patch: ItemPatch,
    game: &str,
) -> Result<(), CatalogError> {
    let mut item = db::get_item(conn, id, game)?.ok_or_else(|| CatalogError::ItemNotFound {
        id: id.to_string(),
        game: game.to_string(),
    })?;

    if let Some(ingredients) = &patch.ingredients {
        stub_missing_ingredients(conn, id, ingredients, game)?;
    }

    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(description) = patch.description {
        item.description = description;
    }
    if let Some(quantity) = patch.quantity {
        item.quantity = quantity;
    }
    let ingredients_changed = patch.ingredients.is_some();
    if let Some(ingredients) = patch.ingredients {
        item.ingredients = ingredients;
    }
    match patch.ratio {
        Some(ratio) => item.ratio = ratio,
        None if ingredients_changed => {
            item.ratio = Vec::with_capacity(1 + item.ingredients.len());
            item.ratio.push(item.quantity);
            item.ratio.extend(item.ingredients.iter().map(|ing| ing.amount));
        }
        None => {}
    }

    db::update_item(conn, &item)?;

    recompute_tags(conn, id, game)?;
    if ingredients_changed {
        for ing in &item.ingredients {
            recompute_tags(conn, &ing.id, game)?;
        }
    }
    Ok(())
}

/// Delete an item and recompute tags for everything the deletion touched:
/// each ingredient of the deleted recipe, and every item that listed the
/// deleted id among its own ingredients.
pub fn delete_item(conn: &Connection, id: &str, game: &str) -> Result<(), CatalogError> {
    let item = db::get_item(conn, id, game)?.ok_or_else(|| CatalogError::ItemNotFound {
        id: id.to_string(),
        game: game.to_string(),
    })?;

    db::delete_item(conn, id, game)?;

    for ing in &item.ingredients {
        recompute_tags(conn, &ing.id, game)?;
    }
    for referrer in db::referencing_item_ids(conn, id, game)? {
        recompute_tags(conn, &referrer, game)?;
    }
    Ok(())
}

/// Recompute one item's derived tag set from the current graph and write it
/// back. Always a full recompute: the item's own ingredient list decides
/// product/raw_material, and a scan of the game namespace decides whether
/// any *other* item lists this id as an ingredient.
///
/// A no-op if the item does not exist (callers cascade over ids that may
/// have been deleted). Idempotent.
pub fn recompute_tags(conn: &Connection, id: &str, game: &str) -> Result<(), CatalogError> {
    let Some(item) = db::get_item(conn, id, game)? else {
        return Ok(());
    };

    let mut tags = Vec::new();
    if !item.ingredients.is_empty() {
        tags.push(Tag::Product);
    }
    let referenced = db::referencing_item_ids(conn, id, game)?
        .iter()
        .any(|referrer| referrer.as_str() != id);
    if referenced {
        tags.push(Tag::Ingredient);
    }
    if item.ingredients.is_empty() {
        tags.push(Tag::RawMaterial);
    }

    db::update_tags(conn, id, game, &tags)?;
    Ok(())
}

/// Register a secondary recipe for an existing item.
///
/// The record gets a synthesized id `"<primary id> A<n>"` from the primary's
/// monotonically increasing counter and lives in its own namespace; tree
/// resolution and craftability analysis do not consult it.
pub fn add_alternative(
    conn: &Connection,
    primary_id: &str,
    quantity: u32,
    ingredients: Vec<Ingredient>,
    game: &str,
    description: &str,
) -> Result<String, CatalogError> {
    let primary = db::get_item(conn, primary_id, game)?.ok_or_else(|| CatalogError::ItemNotFound {
        id: primary_id.to_string(),
        game: game.to_string(),
    })?;

    let count = primary.alternatives + 1;
    let alt_id = format!("{} A{}", primary.id, count);
    db::set_alternatives_count(conn, primary_id, game, count)?;

    let mut ratio = Vec::with_capacity(1 + ingredients.len());
    ratio.push(quantity);
    ratio.extend(ingredients.iter().map(|ing| ing.amount));

    let tags = if ingredients.is_empty() {
        vec![Tag::RawMaterial]
    } else {
        vec![Tag::Product]
    };

    db::insert_alternative(
        conn,
        &AlternativeRecipe {
            id: alt_id.clone(),
            name: primary.id,
            game: game.to_string(),
            description: description.to_string(),
            quantity,
            ingredients,
            ratio,
            tags,
        },
    )?;
    Ok(alt_id)
}

/// Register a game namespace
pub fn add_game(conn: &Connection, name: &str, description: &str) -> Result<(), CatalogError> {
    if db::game_exists(conn, name)? {
        return Err(CatalogError::DuplicateGame(name.to_string()));
    }
    db::insert_game(
        conn,
        &Game {
            name: name.to_string(),
            description: description.to_string(),
        },
    )?;
    Ok(())
}

/// Rename a game; the new name cascades to every item in the namespace.
pub fn edit_game(
    conn: &Connection,
    old_name: &str,
    new_name: &str,
    description: &str,
) -> Result<usize, CatalogError> {
    let updated = db::update_game(conn, old_name, new_name, description)?;
    if updated == 0 {
        return Err(CatalogError::GameNotFound(old_name.to_string()));
    }
    Ok(db::reassign_items_game(conn, old_name, new_name)?)
}

/// Remove a game entry. Its items are not deleted; they move to the
/// fallback namespace instead. Returns the number of items moved.
pub fn delete_game(conn: &Connection, name: &str) -> Result<usize, CatalogError> {
    let removed = db::delete_game(conn, name)?;
    if removed == 0 {
        return Err(CatalogError::GameNotFound(name.to_string()));
    }
    Ok(db::reassign_items_game(conn, name, UNKNOWN_GAME)?)
}

/// Insert a raw-material stub for every referenced ingredient id not yet in
/// the catalogue. Self-references are skipped so a recipe naming its own id
/// cannot recurse into stubbing itself.
fn stub_missing_ingredients(
    conn: &Connection,
    owner_id: &str,
    ingredients: &[Ingredient],
    game: &str,
) -> Result<(), CatalogError> {
    for ing in ingredients {
        if ing.id == owner_id || db::item_exists(conn, &ing.id, game)? {
            continue;
        }
        db::insert_item(
            conn,
            &Item {
                id: ing.id.clone(),
                game: game.to_string(),
                name: ing.id.clone(),
                description: String::new(),
                quantity: 1,
                ingredients: Vec::new(),
                ratio: vec![1],
                tags: vec![Tag::RawMaterial],
                alternatives: 0,
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn ing(id: &str, amount: u32) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            amount,
        }
    }

    #[test]
    fn add_item_stubs_unknown_ingredients() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        let log = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap();
        assert_eq!(log.quantity, 1);
        assert!(log.ingredients.is_empty());
        assert_eq!(log.tags, vec![Tag::Ingredient, Tag::RawMaterial]);

        let plank = db::get_item(&conn, "Plank", "Unknown").unwrap().unwrap();
        assert_eq!(plank.ratio, vec![4, 1]);
        assert_eq!(plank.tags, vec![Tag::Product]);
    }

    #[test]
    fn add_item_rejects_duplicates() {
        let conn = test_conn();
        add_item(&conn, "Log", 1, vec![], "Unknown", "").unwrap();
        let err = add_item(&conn, "Log", 1, vec![], "Unknown", "").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateItem { .. }));
    }

    #[test]
    fn add_item_skips_self_referencing_stub() {
        let conn = test_conn();
        add_item(&conn, "Ouroboros", 1, vec![ing("Ouroboros", 1)], "Unknown", "").unwrap();

        let item = db::get_item(&conn, "Ouroboros", "Unknown").unwrap().unwrap();
        assert_eq!(item.ingredients.len(), 1);
        // Only references from *other* items count towards the ingredient tag.
        assert_eq!(item.tags, vec![Tag::Product]);
    }

    #[test]
    fn recompute_tags_is_idempotent() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        let before = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap().tags;
        recompute_tags(&conn, "Log", "Unknown").unwrap();
        recompute_tags(&conn, "Log", "Unknown").unwrap();
        let after = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap().tags;
        assert_eq!(before, after);
    }

    #[test]
    fn recompute_tags_ignores_missing_items() {
        let conn = test_conn();
        assert!(recompute_tags(&conn, "Ghost", "Unknown").is_ok());
    }

    #[test]
    fn edit_item_rederives_ratio_from_new_ingredients() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        edit_item(
            &conn,
            "Plank",
            ItemPatch {
                ingredients: Some(vec![ing("Driftwood", 2)]),
                ..Default::default()
            },
            "Unknown",
        )
        .unwrap();

        let plank = db::get_item(&conn, "Plank", "Unknown").unwrap().unwrap();
        assert_eq!(plank.ratio, vec![4, 2]);
        assert!(db::get_item(&conn, "Driftwood", "Unknown").unwrap().is_some());
    }

    #[test]
    fn edit_item_ratio_alone_may_drift() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        edit_item(
            &conn,
            "Plank",
            ItemPatch {
                ratio: Some(vec![4]),
                ..Default::default()
            },
            "Unknown",
        )
        .unwrap();

        let plank = db::get_item(&conn, "Plank", "Unknown").unwrap().unwrap();
        assert_eq!(plank.ratio, vec![4]);
        assert_eq!(plank.ingredients.len(), 1);
    }

    #[test]
    fn edit_unknown_item_fails() {
        let conn = test_conn();
        let err = edit_item(&conn, "Ghost", ItemPatch::default(), "Unknown").unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound { .. }));
    }

    #[test]
    fn delete_item_strips_dangling_ingredient_tags() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        delete_item(&conn, "Plank", "Unknown").unwrap();

        // No item references Log anymore, so it is a plain raw material.
        let log = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap();
        assert_eq!(log.tags, vec![Tag::RawMaterial]);
    }

    #[test]
    fn delete_item_keeps_ingredient_tag_while_other_referrers_remain() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();
        add_item(&conn, "Bed", 1, vec![ing("Log", 8)], "Unknown", "").unwrap();

        delete_item(&conn, "Plank", "Unknown").unwrap();

        let log = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap();
        assert!(log.has_tag(Tag::Ingredient));
    }

    #[test]
    fn delete_item_recomputes_referrer_tags() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();
        add_item(&conn, "Chest", 1, vec![ing("Plank", 8)], "Unknown", "").unwrap();

        delete_item(&conn, "Plank", "Unknown").unwrap();

        // Chest still lists the now-dangling Plank id; its own tags are
        // recomputed against the remaining graph.
        let chest = db::get_item(&conn, "Chest", "Unknown").unwrap().unwrap();
        assert_eq!(chest.tags, vec![Tag::Product]);
    }

    #[test]
    fn add_alternative_synthesizes_ids_and_counts() {
        let conn = test_conn();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Unknown", "").unwrap();

        let first = add_alternative(&conn, "Plank", 2, vec![ing("Driftwood", 1)], "Unknown", "").unwrap();
        let second = add_alternative(&conn, "Plank", 1, vec![ing("Bamboo", 3)], "Unknown", "").unwrap();
        assert_eq!(first, "Plank A1");
        assert_eq!(second, "Plank A2");

        let plank = db::get_item(&conn, "Plank", "Unknown").unwrap().unwrap();
        assert_eq!(plank.alternatives, 2);

        let alts = db::alternatives_for(&conn, "Plank", "Unknown").unwrap();
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].ingredients[0].id, "Driftwood");
    }

    #[test]
    fn add_alternative_requires_primary() {
        let conn = test_conn();
        let err = add_alternative(&conn, "Ghost", 1, vec![], "Unknown", "").unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound { .. }));
    }

    #[test]
    fn game_lifecycle_reassigns_items() {
        let conn = test_conn();
        add_game(&conn, "Valheim", "Viking survival").unwrap();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Valheim", "").unwrap();

        assert!(matches!(
            add_game(&conn, "Valheim", "").unwrap_err(),
            CatalogError::DuplicateGame(_)
        ));

        let moved = delete_game(&conn, "Valheim").unwrap();
        assert_eq!(moved, 2);
        assert!(db::get_item(&conn, "Plank", UNKNOWN_GAME).unwrap().is_some());
        assert!(db::get_item(&conn, "Log", UNKNOWN_GAME).unwrap().is_some());
        assert!(!db::game_exists(&conn, "Valheim").unwrap());
    }

    #[test]
    fn edit_game_renames_namespace() {
        let conn = test_conn();
        add_game(&conn, "Valheim", "").unwrap();
        add_item(&conn, "Plank", 4, vec![ing("Log", 1)], "Valheim", "").unwrap();

        let moved = edit_game(&conn, "Valheim", "Valheim 2", "sequel").unwrap();
        assert_eq!(moved, 2);
        assert!(db::get_item(&conn, "Plank", "Valheim 2").unwrap().is_some());

        assert!(matches!(
            edit_game(&conn, "Nope", "Still Nope", "").unwrap_err(),
            CatalogError::GameNotFound(_)
        ));
    }
}

//! Database schema and storage operations
//!
//! This module is the storage seam: everything above it talks to the
//! catalogue through these functions, so swapping the backend means
//! swapping this module. All functions return `rusqlite::Result` and
//! propagate storage errors unchanged; retry policy, if any, belongs here.

use rusqlite::{Connection, OptionalExtension, Result, params};

use crate::models::{AlternativeRecipe, Game, Ingredient, Item, Tag};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One record per primary item, keyed by (id, game)
        CREATE TABLE IF NOT EXISTS items (
            id TEXT NOT NULL,
            game TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 1,
            ratio TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            alternatives INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (id, game)
        );

        -- Ordered ingredient list of an item's recipe
        CREATE TABLE IF NOT EXISTS item_ingredients (
            item_id TEXT NOT NULL,
            game TEXT NOT NULL,
            position INTEGER NOT NULL,
            ingredient_id TEXT NOT NULL,
            amount INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (item_id, game, position)
        );

        -- Secondary recipes, stored apart from the primary catalogue
        CREATE TABLE IF NOT EXISTS alternatives (
            id TEXT NOT NULL,
            game TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 1,
            ratio TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (id, game)
        );

        CREATE TABLE IF NOT EXISTS alternative_ingredients (
            alternative_id TEXT NOT NULL,
            game TEXT NOT NULL,
            position INTEGER NOT NULL,
            ingredient_id TEXT NOT NULL,
            amount INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (alternative_id, game, position)
        );

        CREATE TABLE IF NOT EXISTS games (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT ''
        );

        -- Indexes for common lookups
        CREATE INDEX IF NOT EXISTS idx_items_game ON items(game);
        CREATE INDEX IF NOT EXISTS idx_item_ingredients_item
            ON item_ingredients(item_id, game);
        CREATE INDEX IF NOT EXISTS idx_item_ingredients_ingredient
            ON item_ingredients(ingredient_id, game);
        CREATE INDEX IF NOT EXISTS idx_alternatives_name ON alternatives(name, game);
        "#,
    )?;
    Ok(())
}

fn encode_ratio(ratio: &[u32]) -> String {
    ratio
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_ratio(encoded: &str) -> Vec<u32> {
    encoded
        .split_whitespace()
        .filter_map(|n| n.parse().ok())
        .collect()
}

fn encode_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_tags(encoded: &str) -> Vec<Tag> {
    encoded.split_whitespace().filter_map(Tag::parse).collect()
}

/// Check whether a primary item exists
pub fn item_exists(conn: &Connection, id: &str, game: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE id = ?1 AND game = ?2",
        params![id, game],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert a new item with its ingredient rows
///
/// Fails on a duplicate (id, game); the caller is expected to route
/// duplicates through the alternative-recipe path.
pub fn insert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (id, game, name, description, quantity, ratio, tags, alternatives)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            item.id,
            item.game,
            item.name,
            item.description,
            item.quantity,
            encode_ratio(&item.ratio),
            encode_tags(&item.tags),
            item.alternatives,
        ],
    )?;
    insert_ingredient_rows(conn, "item_ingredients", "item_id", &item.id, &item.game, &item.ingredients)?;
    Ok(())
}

fn insert_ingredient_rows(
    conn: &Connection,
    table: &str,
    key_column: &str,
    owner_id: &str,
    game: &str,
    ingredients: &[Ingredient],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {table} ({key_column}, game, position, ingredient_id, amount)
         VALUES (?1, ?2, ?3, ?4, ?5)"
    );
    let mut stmt = conn.prepare(&sql)?;
    for (position, ing) in ingredients.iter().enumerate() {
        stmt.execute(params![owner_id, game, position as i64, ing.id, ing.amount])?;
    }
    Ok(())
}

fn ingredients_of(conn: &Connection, id: &str, game: &str) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT ingredient_id, amount FROM item_ingredients
         WHERE item_id = ?1 AND game = ?2 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![id, game], |row| {
        Ok(Ingredient {
            id: row.get(0)?,
            amount: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn item_from_row(row: &rusqlite::Row<'_>) -> Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        game: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
        ratio: decode_ratio(&row.get::<_, String>(5)?),
        tags: decode_tags(&row.get::<_, String>(6)?),
        alternatives: row.get(7)?,
        ingredients: Vec::new(),
    })
}

const ITEM_COLUMNS: &str = "id, game, name, description, quantity, ratio, tags, alternatives";

/// Fetch a single item, ingredients included, or None if absent
pub fn get_item(conn: &Connection, id: &str, game: &str) -> Result<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1 AND game = ?2");
    let item = conn
        .query_row(&sql, params![id, game], item_from_row)
        .optional()?;

    match item {
        Some(mut item) => {
            item.ingredients = ingredients_of(conn, id, game)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// List all items in a game namespace, ordered by id
pub fn query_items(conn: &Connection, game: &str) -> Result<Vec<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE game = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![game], item_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    for item in &mut results {
        item.ingredients = ingredients_of(conn, &item.id, &item.game)?;
    }
    Ok(results)
}

/// List every item across all game namespaces
pub fn all_items(conn: &Connection) -> Result<Vec<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY game, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], item_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    for item in &mut results {
        item.ingredients = ingredients_of(conn, &item.id, &item.game)?;
    }
    Ok(results)
}

/// Rewrite an item record in full, ingredients included
pub fn update_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "UPDATE items SET name = ?3, description = ?4, quantity = ?5, ratio = ?6,
                          tags = ?7, alternatives = ?8
         WHERE id = ?1 AND game = ?2",
        params![
            item.id,
            item.game,
            item.name,
            item.description,
            item.quantity,
            encode_ratio(&item.ratio),
            encode_tags(&item.tags),
            item.alternatives,
        ],
    )?;
    conn.execute(
        "DELETE FROM item_ingredients WHERE item_id = ?1 AND game = ?2",
        params![item.id, item.game],
    )?;
    insert_ingredient_rows(conn, "item_ingredients", "item_id", &item.id, &item.game, &item.ingredients)?;
    Ok(())
}

/// Rewrite only an item's tag set
pub fn update_tags(conn: &Connection, id: &str, game: &str, tags: &[Tag]) -> Result<()> {
    conn.execute(
        "UPDATE items SET tags = ?3 WHERE id = ?1 AND game = ?2",
        params![id, game, encode_tags(tags)],
    )?;
    Ok(())
}

/// Set an item's alternative-recipe counter
pub fn set_alternatives_count(conn: &Connection, id: &str, game: &str, count: u32) -> Result<()> {
    conn.execute(
        "UPDATE items SET alternatives = ?3 WHERE id = ?1 AND game = ?2",
        params![id, game, count],
    )?;
    Ok(())
}

/// Delete an item and its ingredient rows
pub fn delete_item(conn: &Connection, id: &str, game: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM item_ingredients WHERE item_id = ?1 AND game = ?2",
        params![id, game],
    )?;
    conn.execute(
        "DELETE FROM items WHERE id = ?1 AND game = ?2",
        params![id, game],
    )?;
    Ok(())
}

/// Ids of all items in a game whose recipe lists the given ingredient
pub fn referencing_item_ids(conn: &Connection, ingredient_id: &str, game: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT item_id FROM item_ingredients
         WHERE ingredient_id = ?1 AND game = ?2 ORDER BY item_id",
    )?;
    let rows = stmt.query_map(params![ingredient_id, game], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Insert an alternative recipe with its ingredient rows
pub fn insert_alternative(conn: &Connection, alt: &AlternativeRecipe) -> Result<()> {
    conn.execute(
        "INSERT INTO alternatives (id, game, name, description, quantity, ratio, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            alt.id,
            alt.game,
            alt.name,
            alt.description,
            alt.quantity,
            encode_ratio(&alt.ratio),
            encode_tags(&alt.tags),
        ],
    )?;
    insert_ingredient_rows(
        conn,
        "alternative_ingredients",
        "alternative_id",
        &alt.id,
        &alt.game,
        &alt.ingredients,
    )?;
    Ok(())
}

/// All alternative recipes registered for a primary item
pub fn alternatives_for(conn: &Connection, name: &str, game: &str) -> Result<Vec<AlternativeRecipe>> {
    let mut stmt = conn.prepare(
        "SELECT id, game, name, description, quantity, ratio, tags
         FROM alternatives WHERE name = ?1 AND game = ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![name, game], |row| {
        Ok(AlternativeRecipe {
            id: row.get(0)?,
            game: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            quantity: row.get(4)?,
            ratio: decode_ratio(&row.get::<_, String>(5)?),
            tags: decode_tags(&row.get::<_, String>(6)?),
            ingredients: Vec::new(),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    for alt in &mut results {
        let mut stmt = conn.prepare(
            "SELECT ingredient_id, amount FROM alternative_ingredients
             WHERE alternative_id = ?1 AND game = ?2 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![alt.id, alt.game], |row| {
            Ok(Ingredient {
                id: row.get(0)?,
                amount: row.get(1)?,
            })
        })?;
        for row in rows {
            alt.ingredients.push(row?);
        }
    }
    Ok(results)
}

/// Check whether a game namespace is registered
pub fn game_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM games WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Register a game namespace
pub fn insert_game(conn: &Connection, game: &Game) -> Result<()> {
    conn.execute(
        "INSERT INTO games (name, description) VALUES (?1, ?2)",
        params![game.name, game.description],
    )?;
    Ok(())
}

/// List all registered games, ordered by name
pub fn list_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare("SELECT name, description FROM games ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Game {
            name: row.get(0)?,
            description: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Rename a game entry and update its description
pub fn update_game(conn: &Connection, old_name: &str, new_name: &str, description: &str) -> Result<usize> {
    conn.execute(
        "UPDATE games SET name = ?2, description = ?3 WHERE name = ?1",
        params![old_name, new_name, description],
    )
}

/// Remove a game entry (items are reassigned separately)
pub fn delete_game(conn: &Connection, name: &str) -> Result<usize> {
    conn.execute("DELETE FROM games WHERE name = ?1", params![name])
}

/// Move every item (and its ingredient rows) from one game namespace to another
///
/// Returns the number of items moved.
pub fn reassign_items_game(conn: &Connection, from: &str, to: &str) -> Result<usize> {
    let moved = conn.execute("UPDATE items SET game = ?2 WHERE game = ?1", params![from, to])?;
    conn.execute(
        "UPDATE item_ingredients SET game = ?2 WHERE game = ?1",
        params![from, to],
    )?;
    conn.execute(
        "UPDATE alternatives SET game = ?2 WHERE game = ?1",
        params![from, to],
    )?;
    conn.execute(
        "UPDATE alternative_ingredients SET game = ?2 WHERE game = ?1",
        params![from, to],
    )?;
    Ok(moved)
}

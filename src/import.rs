//! Recipe file import
//!
//! Parses plain-text recipe lists and loads them into the catalogue through
//! the normal add/edit path, so stub creation and tag maintenance apply to
//! imported data exactly as they do to hand-entered data.
//!
//! File format, one recipe per line:
//!
//! ```text
//! # comment
//! [game: Valheim]
//! Plank x4 = Log x1
//! Iron Ingot x1 = Iron Ore x2 + Coal x1
//! Log
//! ```
//!
//! A bare name declares a raw material. A `[game: ...]` header applies to
//! the lines after it until the next header; files without one use the game
//! passed by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::catalog::{self, CatalogError, ItemPatch};
use crate::db;
use crate::models::Ingredient;

/// One recipe line, parsed but not yet applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecipe {
    pub id: String,
    pub quantity: u32,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    GameHeader(String),
    Recipe(ParsedRecipe),
}

struct LineParser {
    header_re: Regex,
    spec_re: Regex,
}

impl LineParser {
    fn new() -> Result<Self> {
        Ok(Self {
            header_re: Regex::new(r"^\[game:\s*(.+?)\s*\]$")?,
            spec_re: Regex::new(r"^(.+?)\s*[xX]\s*(\d+)$")?,
        })
    }

    /// Parse one line; None for blanks and comments, Err for malformed input
    fn parse(&self, line: &str) -> Result<Option<Line>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if let Some(cap) = self.header_re.captures(line) {
            return Ok(Some(Line::GameHeader(cap[1].to_string())));
        }

        let (lhs, rhs) = match line.split_once('=') {
            Some((lhs, rhs)) => (lhs, Some(rhs)),
            None => (line, None),
        };

        let (id, quantity) = self.item_spec(lhs)?;
        let mut ingredients = Vec::new();
        if let Some(rhs) = rhs {
            for part in rhs.split('+') {
                let (ing_id, amount) = self.item_spec(part)?;
                ingredients.push(Ingredient { id: ing_id, amount });
            }
        }

        Ok(Some(Line::Recipe(ParsedRecipe {
            id,
            quantity,
            ingredients,
        })))
    }

    /// Parse `"Name x4"` or a bare `"Name"` (quantity 1)
    fn item_spec(&self, spec: &str) -> Result<(String, u32)> {
        let spec = spec.trim();
        anyhow::ensure!(!spec.is_empty(), "empty item name");

        if let Some(cap) = self.spec_re.captures(spec) {
            let amount: u32 = cap[2].parse().context("quantity out of range")?;
            return Ok((cap[1].to_string(), amount));
        }
        Ok((spec.to_string(), 1))
    }
}

/// Find all *.recipes files under a directory
pub fn find_recipe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "recipes") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Insert or update one parsed recipe through the catalogue layer.
///
/// Returns true when the item was newly added, false when an existing
/// item's recipe was updated in place.
pub fn apply_recipe(conn: &Connection, recipe: &ParsedRecipe, game: &str) -> Result<bool, CatalogError> {
    if db::item_exists(conn, &recipe.id, game)? {
        catalog::edit_item(
            conn,
            &recipe.id,
            ItemPatch {
                quantity: Some(recipe.quantity),
                ingredients: Some(recipe.ingredients.clone()),
                ..Default::default()
            },
            game,
        )?;
        Ok(false)
    } else {
        catalog::add_item(
            conn,
            &recipe.id,
            recipe.quantity,
            recipe.ingredients.clone(),
            game,
            "",
        )?;
        Ok(true)
    }
}

/// Import every *.recipes file under a directory into the catalogue
pub fn import_directory(conn: &Connection, dir: &Path, default_game: &str) -> Result<ImportStats> {
    let parser = LineParser::new()?;
    let files = find_recipe_files(dir)?;
    let mut stats = ImportStats::default();

    for filepath in &files {
        let content = fs::read_to_string(filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))?;

        let mut game = default_game.to_string();
        let mut parsed_in_file = 0usize;

        for (lineno, raw_line) in content.lines().enumerate() {
            match parser.parse(raw_line) {
                Ok(None) => {}
                Ok(Some(Line::GameHeader(name))) => game = name,
                Ok(Some(Line::Recipe(recipe))) => match apply_recipe(conn, &recipe, &game) {
                    Ok(true) => {
                        stats.added += 1;
                        stats.ingredients += recipe.ingredients.len();
                        parsed_in_file += 1;
                    }
                    Ok(false) => {
                        stats.updated += 1;
                        stats.ingredients += recipe.ingredients.len();
                        parsed_in_file += 1;
                    }
                    Err(e) => {
                        eprintln!("  Error applying {}:{}: {}", filepath.display(), lineno + 1, e);
                        stats.errors += 1;
                    }
                },
                Err(e) => {
                    eprintln!("  Error parsing {}:{}: {}", filepath.display(), lineno + 1, e);
                    stats.errors += 1;
                }
            }
        }

        stats.files += 1;
        println!("  Imported: {} ({} recipes)", filepath.display(), parsed_in_file);
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub added: usize,
    pub updated: usize,
    pub ingredients: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} files: {} items added, {} updated ({} ingredient references). Errors: {}",
            self.files, self.added, self.updated, self.ingredients, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;

    fn parser() -> LineParser {
        LineParser::new().unwrap()
    }

    fn ing(id: &str, amount: u32) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            amount,
        }
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let p = parser();
        assert_eq!(p.parse("").unwrap(), None);
        assert_eq!(p.parse("   ").unwrap(), None);
        assert_eq!(p.parse("# woodworking basics").unwrap(), None);
    }

    #[test]
    fn game_header_switches_namespace() {
        let p = parser();
        assert_eq!(
            p.parse("[game: Valheim]").unwrap(),
            Some(Line::GameHeader("Valheim".to_string()))
        );
    }

    #[test]
    fn bare_name_is_a_raw_material() {
        let p = parser();
        assert_eq!(
            p.parse("Log").unwrap(),
            Some(Line::Recipe(ParsedRecipe {
                id: "Log".to_string(),
                quantity: 1,
                ingredients: vec![],
            }))
        );
    }

    #[test]
    fn recipe_line_parses_quantities_and_ingredients() {
        let p = parser();
        assert_eq!(
            p.parse("Iron Ingot x1 = Iron Ore x2 + Coal").unwrap(),
            Some(Line::Recipe(ParsedRecipe {
                id: "Iron Ingot".to_string(),
                quantity: 1,
                ingredients: vec![ing("Iron Ore", 2), ing("Coal", 1)],
            }))
        );
    }

    #[test]
    fn malformed_lines_are_errors() {
        let p = parser();
        assert!(p.parse("= Log x1").is_err());
        assert!(p.parse("Plank x4 = ").is_err());
    }

    #[test]
    fn apply_recipe_upserts_through_the_catalog() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let recipe = ParsedRecipe {
            id: "Plank".to_string(),
            quantity: 4,
            ingredients: vec![ing("Log", 1)],
        };
        assert!(apply_recipe(&conn, &recipe, "Unknown").unwrap());

        // Stubs and tags came along for the ride.
        let log = db::get_item(&conn, "Log", "Unknown").unwrap().unwrap();
        assert_eq!(log.tags, vec![Tag::Ingredient, Tag::RawMaterial]);

        // Re-importing the same id updates the recipe in place.
        let changed = ParsedRecipe {
            quantity: 2,
            ..recipe
        };
        assert!(!apply_recipe(&conn, &changed, "Unknown").unwrap());
        let plank = db::get_item(&conn, "Plank", "Unknown").unwrap().unwrap();
        assert_eq!(plank.quantity, 2);
        assert_eq!(plank.ratio, vec![2, 1]);
    }
}

//! Craft Calculator
//!
//! A crafting recipe calculator for game production chains.

mod calculator;
mod catalog;
mod db;
mod import;
mod models;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::catalog::ItemPatch;
use crate::models::{Ingredient, Tag};

#[derive(Parser)]
#[command(name = "craft-calculator")]
#[command(about = "Crafting recipe calculator for game production chains")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "crafting.db")]
    database: PathBuf,

    /// Game namespace to operate on
    #[arg(short, long, global = true, default_value = models::UNKNOWN_GAME)]
    game: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item with its recipe
    Add {
        /// Item id (also used as its display name)
        id: String,

        /// Batch output quantity of the recipe
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// Ingredient as NAME=AMOUNT (repeatable; omit for a raw material)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,

        /// Item description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Edit an existing item
    Edit {
        /// Item id
        id: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New batch output quantity
        #[arg(short, long)]
        quantity: Option<u32>,

        /// Replacement ingredient list as NAME=AMOUNT (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,

        /// Replace the ingredient list with an empty one
        #[arg(long)]
        clear_ingredients: bool,

        /// Raw stoichiometry override, e.g. "4 1" (advanced)
        #[arg(long)]
        ratio: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete an item and recompute tags of everything it touched
    Delete {
        /// Item id
        id: String,
    },

    /// Show one item, its recipe and its alternatives
    Show {
        /// Item id
        id: String,
    },

    /// List items in the game namespace
    List {
        /// Only items carrying this tag (product, raw_material, ingredient)
        #[arg(short, long)]
        tag: Option<String>,

        /// List items of every game namespace
        #[arg(long)]
        all_games: bool,
    },

    /// Search items by name substring
    Search {
        /// Case-insensitive name fragment
        query: String,
    },

    /// Resolve the crafting tree for an item
    Tree {
        /// Item id
        id: String,

        /// Target amount to produce
        #[arg(short, long, default_value = "1")]
        amount: u32,

        /// Emit the tree as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compute the maximum craftable amount from on-hand stock
    Max {
        /// Item id
        id: String,

        /// On-hand stock as NAME=AMOUNT (repeatable)
        #[arg(long = "have")]
        have: Vec<String>,
    },

    /// Register an alternative recipe for an existing item
    AddAlt {
        /// Primary item id
        id: String,

        /// Batch output quantity of the alternative recipe
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// Ingredient as NAME=AMOUNT (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,

        /// Recipe description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Import *.recipes files from a directory
    Import {
        /// Directory to scan
        dir: PathBuf,
    },

    /// Register a game namespace
    AddGame {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Rename a game namespace (cascades to its items)
    EditGame {
        old_name: String,
        new_name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a game; its items move to the fallback namespace
    DeleteGame {
        name: String,
    },

    /// List registered games
    ListGames,

    /// Initialize empty database with schema
    Init,

    /// Load a small sample catalogue for testing
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Add {
            id,
            quantity,
            ingredients,
            description,
        } => {
            let ingredients = parse_ingredients(&ingredients)?;
            catalog::add_item(&conn, &id, quantity, ingredients, &cli.game, &description)?;
            println!("Added '{}' to game '{}'", id, cli.game);
        }

        Commands::Edit {
            id,
            name,
            quantity,
            ingredients,
            clear_ingredients,
            ratio,
            description,
        } => {
            let ingredients = if clear_ingredients {
                Some(Vec::new())
            } else if ingredients.is_empty() {
                None
            } else {
                Some(parse_ingredients(&ingredients)?)
            };
            let ratio = ratio.as_deref().map(parse_ratio).transpose()?;

            catalog::edit_item(
                &conn,
                &id,
                ItemPatch {
                    name,
                    description,
                    quantity,
                    ingredients,
                    ratio,
                },
                &cli.game,
            )?;
            println!("Updated '{}'", id);
        }

        Commands::Delete { id } => {
            catalog::delete_item(&conn, &id, &cli.game)?;
            println!("Deleted '{}' from game '{}'", id, cli.game);
        }

        Commands::Show { id } => {
            let Some(item) = db::get_item(&conn, &id, &cli.game)? else {
                println!("Item '{}' not found in game '{}'", id, cli.game);
                return Ok(());
            };

            println!("Item: {}", item.name);
            println!("  ID: {}", item.id);
            println!("  Game: {}", item.game);
            if !item.description.is_empty() {
                println!("  Description: {}", item.description);
            }
            println!("  Batch output: {}", item.output_quantity());
            println!("  Tags: {}", format_tags(&item.tags));
            if !item.ingredients.is_empty() {
                println!("  Ingredients per batch:");
                for (i, ing) in item.ingredients.iter().enumerate() {
                    println!("    {} x{}", ing.id, item.ingredient_amount(i));
                }
            }

            let alts = db::alternatives_for(&conn, &id, &cli.game)?;
            if !alts.is_empty() {
                println!("  Alternative recipes:");
                for alt in alts {
                    let parts: Vec<String> = alt
                        .ingredients
                        .iter()
                        .map(|ing| format!("{} x{}", ing.id, ing.amount))
                        .collect();
                    println!("    {}: makes {} from {}", alt.id, alt.quantity, parts.join(" + "));
                }
            }
        }

        Commands::List { tag, all_games } => {
            let tag = tag
                .as_deref()
                .map(|t| Tag::parse(t).ok_or_else(|| anyhow!("unknown tag '{}'", t)))
                .transpose()?;

            let items = if all_games {
                db::all_items(&conn)?
            } else {
                db::query_items(&conn, &cli.game)?
            };
            let items: Vec<_> = items
                .into_iter()
                .filter(|item| tag.is_none_or(|t| item.has_tag(t)))
                .collect();

            if items.is_empty() {
                println!("No matching items. Run 'add', 'import' or 'load-sample' first.");
            } else {
                println!("{:<24} {:<12} {:>6}  {}", "Item", "Game", "Batch", "Tags");
                println!("{}", "-".repeat(60));
                for item in items {
                    println!(
                        "{:<24} {:<12} {:>6}  {}",
                        item.id,
                        item.game,
                        item.output_quantity(),
                        format_tags(&item.tags)
                    );
                }
            }
        }

        Commands::Search { query } => {
            let needle = query.to_lowercase();
            let items = db::query_items(&conn, &cli.game)?;
            let matches: Vec<_> = items
                .into_iter()
                .filter(|item| item.name.to_lowercase().contains(&needle))
                .collect();

            if matches.is_empty() {
                println!("No items matching '{}' in game '{}'", query, cli.game);
            } else {
                for item in matches {
                    println!("{:<24} {}", item.id, format_tags(&item.tags));
                }
            }
        }

        Commands::Tree { id, amount, json } => {
            let resolution = calculator::resolve_unit_tree(&conn, &id, &cli.game)?;
            if !resolution.missing.is_empty() {
                eprintln!(
                    "warning: ingredients without a catalogue entry were omitted: {}",
                    resolution.missing.join(", ")
                );
            }

            let tree = if amount == 1 {
                resolution.tree
            } else {
                calculator::scale_tree(&resolution.tree, amount)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                println!("Crafting tree:\n");
                print!("{}", calculator::format_tree(&tree, 0));
                if amount != 1 {
                    println!("\n{}", calculator::summarize_tree(&tree));
                }
            }
        }

        Commands::Max { id, have } => {
            let available = parse_stock(&have)?;
            let max = calculator::max_craftable(&conn, &id, &available, &cli.game)?;
            let breakdown = calculator::ingredient_breakdown(&conn, &id, &available, &cli.game)?;

            println!("Max craftable: {} x{}", id, max);
            if !breakdown.is_empty() {
                println!();
                println!("{:<24} {:>10} {:>10}", "Ingredient", "Per batch", "On hand");
                println!("{}", "-".repeat(46));
                for (ing_id, entry) in breakdown {
                    println!(
                        "{:<24} {:>10} {:>10}",
                        ing_id, entry.required_per_craft, entry.available
                    );
                }
            }
        }

        Commands::AddAlt {
            id,
            quantity,
            ingredients,
            description,
        } => {
            let ingredients = parse_ingredients(&ingredients)?;
            let alt_id =
                catalog::add_alternative(&conn, &id, quantity, ingredients, &cli.game, &description)?;
            println!("Added alternative recipe '{}'", alt_id);
        }

        Commands::Import { dir } => {
            let stats = import::import_directory(&conn, &dir, &cli.game)?;
            println!("\n{}", stats);
        }

        Commands::AddGame { name, description } => {
            catalog::add_game(&conn, &name, &description)?;
            println!("Added game '{}'", name);
        }

        Commands::EditGame {
            old_name,
            new_name,
            description,
        } => {
            let moved = catalog::edit_game(&conn, &old_name, &new_name, &description)?;
            println!("Renamed game '{}' to '{}' ({} items moved)", old_name, new_name, moved);
        }

        Commands::DeleteGame { name } => {
            let moved = catalog::delete_game(&conn, &name)?;
            println!(
                "Deleted game '{}' ({} items moved to '{}')",
                name,
                moved,
                models::UNKNOWN_GAME
            );
        }

        Commands::ListGames => {
            let games = db::list_games(&conn)?;
            if games.is_empty() {
                println!("No games registered. Run 'add-game' first.");
            } else {
                for game in games {
                    if game.description.is_empty() {
                        println!("{}", game.name);
                    } else {
                        println!("{:<20} {}", game.name, game.description);
                    }
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn, &cli.game)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

/// Parse repeated NAME=AMOUNT ingredient arguments
fn parse_ingredients(specs: &[String]) -> Result<Vec<Ingredient>> {
    specs
        .iter()
        .map(|spec| {
            let (id, amount) = parse_spec(spec)?;
            Ok(Ingredient { id, amount })
        })
        .collect()
}

/// Parse repeated NAME=AMOUNT stock arguments into an availability map
fn parse_stock(specs: &[String]) -> Result<HashMap<String, u32>> {
    let mut available = HashMap::new();
    for spec in specs {
        let (id, amount) = parse_spec(spec)?;
        available.insert(id, amount);
    }
    Ok(available)
}

fn parse_spec(spec: &str) -> Result<(String, u32)> {
    let Some((id, amount)) = spec.rsplit_once('=') else {
        bail!("expected NAME=AMOUNT, got '{}'", spec);
    };
    let id = id.trim();
    if id.is_empty() {
        bail!("empty item name in '{}'", spec);
    }
    let amount: u32 = amount
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid amount in '{}'", spec))?;
    Ok((id.to_string(), amount))
}

/// Parse a whitespace- or comma-separated ratio override
fn parse_ratio(spec: &str) -> Result<Vec<u32>> {
    spec.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|_| anyhow!("invalid ratio entry '{}'", part))
        })
        .collect()
}

fn format_tags(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "-".to_string();
    }
    tags.iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a small woodworking catalogue for testing without an import file
fn load_sample_data(conn: &Connection, game: &str) -> Result<()> {
    let ing = |id: &str, amount: u32| Ingredient {
        id: id.to_string(),
        amount,
    };

    catalog::add_item(conn, "Plank", 4, vec![ing("Log", 1)], game, "Sawn lumber")?;
    catalog::add_item(conn, "Stick", 4, vec![ing("Plank", 2)], game, "")?;
    catalog::add_item(
        conn,
        "Torch",
        4,
        vec![ing("Stick", 1), ing("Coal", 1)],
        game,
        "Portable light source",
    )?;
    catalog::add_item(conn, "Chest", 1, vec![ing("Plank", 8)], game, "Storage")?;
    catalog::add_item(
        conn,
        "Iron Ingot",
        1,
        vec![ing("Iron Ore", 2), ing("Coal", 1)],
        game,
        "Smelted iron",
    )?;
    catalog::add_item(
        conn,
        "Sword",
        1,
        vec![ing("Iron Ingot", 2), ing("Stick", 1)],
        game,
        "",
    )?;

    // One alternative recipe, so `show Plank` has something to display.
    catalog::add_alternative(conn, "Plank", 2, vec![ing("Driftwood", 1)], game, "Beachcombing")?;

    println!("Loaded {} sample items", db::query_items(conn, game)?.len());
    Ok(())
}

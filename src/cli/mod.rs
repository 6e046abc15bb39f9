//! Command line interface
//!
//! Commands:
//! - `cardspawn serve` - Run the engine for every configured tenant
//! - `cardspawn catalog` - List or search collectibles
//! - `cardspawn series` - Collectible count per series
//! - `cardspawn price` - Rarity and price for a tier at a given circulation
//! - `cardspawn check` - Validate configuration and catalog

pub mod catalog;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::Tier;

#[derive(Parser, Debug)]
#[command(name = "cardspawn")]
#[command(author, version, about = "Collectible card spawn and ownership engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, default_value = "config", env = "CARDSPAWN_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run spawn timers and the sweeper until interrupted
    Serve,

    /// List collectibles
    Catalog {
        /// Only this tier (1-6 or S)
        #[arg(short, long, value_parser = parse_tier)]
        tier: Option<Tier>,
        /// Case-insensitive search over id, name, series and creator
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show how many collectibles each series has
    Series,

    /// Price and rarity table for a tier
    Price {
        #[arg(short, long, value_parser = parse_tier)]
        tier: Tier,
        /// Copies spawned so far
        #[arg(short, long, default_value = "1")]
        spawned: u32,
        /// Override the tier's copy cap
        #[arg(short, long)]
        max: Option<u32>,
    },

    /// Validate configuration and catalog, then exit
    Check,
}

fn parse_tier(raw: &str) -> Result<Tier, String> {
    Tier::try_from(raw)
}

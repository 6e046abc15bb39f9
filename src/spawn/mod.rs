//! Spawn engine: picks what appears in a chat, reserves a copy number,
//! publishes the announcement and opens a claim window.

pub mod caption;
pub mod engine;
pub mod open;
pub mod selection;

pub use engine::{SpawnEngine, SpawnOutcome, SpawnRequest};
pub use open::OpenSpawnTable;
pub use selection::draw_tier;

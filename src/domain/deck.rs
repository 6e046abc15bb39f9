use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named, unbounded, per-owner card list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDeck {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    /// Copy ids in display order
    pub cards: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl CustomDeck {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            cards: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Deck names compare case-insensitively
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

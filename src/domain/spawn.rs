use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published, not yet claimed collectible instance. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSpawn {
    pub collectible_id: String,
    /// Copy number reserved from the scarcity ledger
    pub copy_number: u32,
    pub price: u64,
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OpenSpawn {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

use thiserror::Error;

/// Main error type for the card engine
#[derive(Error, Debug)]
pub enum CardError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    // Scarcity / capacity errors
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("No spawnable collectible: {0}")]
    NoSpawnableCollectible(String),

    #[error("Insufficient copies of {collectible_id}: owned {owned}, need {required}")]
    InsufficientCopies {
        collectible_id: String,
        owned: usize,
        required: usize,
    },

    // Marketplace errors
    #[error("Already listed: {0}")]
    AlreadyListed(String),

    #[error("No active listing: {0}")]
    NoActiveListing(String),

    #[error("Auction already in progress: {0}")]
    AuctionInProgress(String),

    #[error("Bid too low: minimum {minimum}, offered {offered}")]
    BidTooLow { minimum: u64, offered: u64 },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    // Spawn / claim errors
    #[error("No active spawn for {0}")]
    NoActiveSpawn(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    // Deck errors
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Already in a deck: {0}")]
    AlreadyInDeck(String),

    // Authorization errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CardError {
    /// Whether this error is the caller's problem (shown back to them as a reply)
    /// rather than an infrastructure fault worth logging at error level.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            CardError::Config(_)
                | CardError::Database(_)
                | CardError::Migration(_)
                | CardError::Json(_)
                | CardError::Io(_)
                | CardError::Internal(_)
                | CardError::Other(_)
        )
    }
}

/// Result type alias for CardError
pub type Result<T> = std::result::Result<T, CardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_split() {
        assert!(CardError::NoActiveSpawn("1-00001".into()).is_user_facing());
        assert!(CardError::BidTooLow {
            minimum: 10,
            offered: 5
        }
        .is_user_facing());
        assert!(!CardError::Internal("boom".into()).is_user_facing());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = CardError::InsufficientFunds {
            balance: 40,
            required: 100,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: balance 40, required 100"
        );
    }
}

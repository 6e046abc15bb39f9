//! Currency ledger collaborator. Balance storage and transfer belong to the
//! economy system; the card engine only reads balances and moves coins.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CardError, Result};

#[async_trait]
pub trait CurrencyLedger: Send + Sync {
    async fn balance(&self, user_id: &str) -> Result<u64>;

    /// Remove coins; fails with `InsufficientFunds` when the balance is short
    async fn debit(&self, user_id: &str, amount: u64, memo: &str) -> Result<()>;

    async fn credit(&self, user_id: &str, amount: u64, memo: &str) -> Result<()>;
}

/// In-process ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<String, u64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances<I, S>(balances: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            balances: Mutex::new(balances.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl CurrencyLedger for MemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .balances
            .lock()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn debit(&self, user_id: &str, amount: u64, memo: &str) -> Result<()> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(user_id.to_string()).or_insert(0);
        if *balance < amount {
            return Err(CardError::InsufficientFunds {
                balance: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        debug!(user_id, amount, memo, "debit");
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: u64, memo: &str) -> Result<()> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(user_id.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!(user_id, amount, memo, "credit");
        Ok(())
    }
}

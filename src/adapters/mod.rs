pub mod ledger;
pub mod transport;

pub use ledger::{CurrencyLedger, MemoryLedger};
pub use transport::{LogTransport, RecordingTransport, SentMessage, SpawnMedia, Transport};

#[cfg(test)]
pub use transport::MockTransport;

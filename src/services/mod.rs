pub mod card_services;
pub mod metrics;

pub use card_services::CardServices;
pub use metrics::{Metrics, MetricsSnapshot};

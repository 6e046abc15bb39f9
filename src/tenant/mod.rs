//! Per-bot-identity runtime state.

pub mod registry;
pub mod roles;
pub mod runtime;
pub mod timer;

pub use registry::{SweepReport, TenantRegistry};
pub use roles::{Caller, Role, RoleSet};
pub use runtime::TenantRuntime;
pub use timer::SpawnTimer;

pub mod collectible;
pub mod copy;
pub mod deck;
pub mod listing;
pub mod scarcity;
pub mod spawn;

pub use collectible::*;
pub use copy::*;
pub use deck::*;
pub use listing::*;
pub use scarcity::*;
pub use spawn::*;

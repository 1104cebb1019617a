//! Consensus module - Block structure, proof of work, rewards, and chain validation

mod block;
mod rewards;
mod validation;
mod work;

pub use block::*;
pub use rewards::*;
pub use validation::*;
pub use work::*;

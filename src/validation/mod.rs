//! Validation module - Transactions and the balance ledger

mod ledger;
mod transaction;

pub use ledger::*;
pub use transaction::*;

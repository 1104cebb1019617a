//! Wallet module - Node identity, transaction signing, and balances

mod wallet;

pub use wallet::*;

use crate::crypto::is_hex;

/// Check that a string looks like an account address
pub fn is_valid_address(address: &str) -> bool {
    !address.is_empty() && is_hex(address)
}

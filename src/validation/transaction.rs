//! Transaction structure
//!
//! Account-based value transfers. A transaction moves `amount` from the
//! `input` account to the `output` account; an input of `blockReward`
//! mints new value instead.

use serde::{Deserialize, Serialize};

use crate::constants::REWARD_INPUT;
use crate::crypto::{decode_hex_prefix, is_hex, Hash, Hasher};

/// A value transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending address, or `blockReward` for issuance
    pub input: String,
    /// Receiving address
    pub output: String,
    /// Amount in base units
    pub amount: u64,
    /// Hex signature over the transaction hash (carried, never verified)
    pub signature: String,
    /// Hex token keeping otherwise identical rewards distinct
    pub unique: String,
}

impl Transaction {
    /// Create an unsigned transfer
    pub fn new(input: impl Into<String>, output: impl Into<String>, amount: u64) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            amount,
            signature: String::new(),
            unique: String::new(),
        }
    }

    /// Create a block reward transaction
    pub fn block_reward(output: impl Into<String>, amount: u64, unique: impl Into<String>) -> Self {
        Self {
            input: REWARD_INPUT.to_string(),
            output: output.into(),
            amount,
            signature: String::new(),
            unique: unique.into(),
        }
    }

    /// Check if this is a block reward transaction
    pub fn is_block_reward(&self) -> bool {
        self.input == REWARD_INPUT
    }

    /// Calculate transaction hash
    ///
    /// `H(input || output || be64(amount) || unique)` with the string
    /// fields hex-decoded. The signature is not covered.
    pub fn hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher
            .update(&decode_hex_prefix(&self.input))
            .update(&decode_hex_prefix(&self.output))
            .update(&self.amount.to_be_bytes())
            .update(&decode_hex_prefix(&self.unique));
        hasher.finalize()
    }

    /// Hex form of [`Transaction::hash`]
    pub fn hash_hex(&self) -> String {
        self.hash().to_hex()
    }

    /// Check that every hashed field is well-formed hex.
    ///
    /// Returns the name of the first offending field.
    pub fn check_encoding(&self) -> Result<(), &'static str> {
        if !self.is_block_reward() && !is_hex(&self.input) {
            return Err("input");
        }
        if !is_hex(&self.output) {
            return Err("output");
        }
        if !is_hex(&self.unique) {
            return Err("unique");
        }
        Ok(())
    }
}

//! Block structure for the Spindle chain
//!
//! A block links to its parent by hash. Only ancestry and transaction
//! content feed the block hash; the nonce and height do not.

use serde::{Deserialize, Serialize};

use crate::crypto::{decode_hex_prefix, is_hex, Hash, Hasher};
use crate::validation::Transaction;

/// A block of transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hex hash of the parent block
    pub previous: String,
    /// Proof-of-work nonce
    pub work: u64,
    /// Distance from genesis
    pub height: u64,
    /// Ordered transactions
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(previous: impl Into<String>, work: u64, height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            previous: previous.into(),
            work,
            height,
            transactions,
        }
    }

    /// Get the block hash: `H(previous || H(tx_0) || H(tx_1) || ...)`
    pub fn hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(&decode_hex_prefix(&self.previous));
        for tx in &self.transactions {
            hasher.update(tx.hash().as_bytes());
        }
        hasher.finalize()
    }

    /// Hex form of the block hash, used as the storage and wire key
    pub fn hash_hex(&self) -> String {
        self.hash().to_hex()
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.hash() == crate::node::genesis_hash()
    }

    /// Block reward transactions carried by this block
    pub fn rewards(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_block_reward())
    }

    /// Check that every hashed field is well-formed hex
    pub fn check_encoding(&self) -> Result<(), String> {
        if !is_hex(&self.previous) {
            return Err("previous".to_string());
        }
        for (position, tx) in self.transactions.iter().enumerate() {
            tx.check_encoding()
                .map_err(|field| format!("transactions[{position}].{field}"))?;
        }
        Ok(())
    }
}

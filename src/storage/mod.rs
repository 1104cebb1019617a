//! Storage module - Block persistence behind the `BlockStore` interface

pub mod db;
mod memory;

pub use db::SledStore;
pub use memory::MemoryStore;

use std::collections::HashSet;
use thiserror::Error;

use crate::consensus::Block;
use crate::validation::Transaction;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Store corrupt: block stored under {key} hashes to {actual}")]
    Corrupt { key: String, actual: String },
    #[error("Missing highest block")]
    Empty,
}

impl StoreError {
    /// Corruption means the store can no longer be trusted to serve data
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

/// Persistence interface for blocks and the node identity.
///
/// Implementations must store a block together with its transactions so
/// that readers never observe one without the other.
pub trait BlockStore: Send {
    /// Fetch a block by hex hash
    fn fetch_block(&self, hash: &str) -> Result<Option<Block>, StoreError>;

    /// Canonical head: greatest height, ties broken by smallest hex hash
    fn fetch_highest_block(&self) -> Result<Block, StoreError>;

    /// Store a block and its transactions.
    ///
    /// Idempotent; returns `false` when the block was already present.
    fn store_block(&mut self, block: &Block) -> Result<bool, StoreError>;

    /// Transactions touching `address` inside the blocks listed in
    /// `within`, ordered by block height then position
    fn fetch_transactions_for_account(
        &self,
        address: &str,
        within: &HashSet<String>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Number of stored blocks
    fn block_count(&self) -> Result<usize, StoreError>;

    /// Stored private key of the node wallet
    fn load_wallet_key(&self) -> Result<Option<[u8; 32]>, StoreError>;

    /// Persist the private key of the node wallet
    fn store_wallet_key(&mut self, key: &[u8; 32]) -> Result<(), StoreError>;

    /// Check whether a block is already stored
    fn contains_block(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.fetch_block(hash)?.is_some())
    }
}

/// Check that a fetched block still hashes to the key it was stored under
pub(crate) fn verify_fetched(key: &str, block: Block) -> Result<Block, StoreError> {
    let actual = block.hash_hex();
    if actual != key {
        return Err(StoreError::Corrupt {
            key: key.to_string(),
            actual,
        });
    }
    Ok(block)
}

//! In-memory block store
//!
//! Keeps everything in a map; used by tests and throwaway devnet nodes.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use super::{verify_fetched, BlockStore, StoreError};
use crate::consensus::Block;
use crate::node::genesis_block;
use crate::validation::Transaction;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    blocks: HashMap<String, Block>,
    wallet_key: Option<[u8; 32]>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding only the genesis block
    pub fn new() -> Self {
        let genesis = genesis_block();
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash_hex(), genesis);
        Self {
            blocks,
            wallet_key: None,
        }
    }
}

impl BlockStore for MemoryStore {
    fn fetch_block(&self, hash: &str) -> Result<Option<Block>, StoreError> {
        match self.blocks.get(hash) {
            Some(block) => verify_fetched(hash, block.clone()).map(Some),
            None => Ok(None),
        }
    }

    fn fetch_highest_block(&self) -> Result<Block, StoreError> {
        let (key, block) = self
            .blocks
            .iter()
            .max_by(|(ha, a), (hb, b)| (a.height, Reverse(ha)).cmp(&(b.height, Reverse(hb))))
            .ok_or(StoreError::Empty)?;
        verify_fetched(key, block.clone())
    }

    fn store_block(&mut self, block: &Block) -> Result<bool, StoreError> {
        let key = block.hash_hex();
        if self.blocks.contains_key(&key) {
            return Ok(false);
        }
        self.blocks.insert(key, block.clone());
        Ok(true)
    }

    fn fetch_transactions_for_account(
        &self,
        address: &str,
        within: &HashSet<String>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut blocks: Vec<(&String, &Block)> = self
            .blocks
            .iter()
            .filter(|(hash, _)| within.contains(hash.as_str()))
            .collect();
        blocks.sort_by(|(ha, a), (hb, b)| (a.height, ha).cmp(&(b.height, hb)));

        Ok(blocks
            .into_iter()
            .flat_map(|(_, block)| block.transactions.iter())
            .filter(|tx| tx.input == address || tx.output == address)
            .cloned()
            .collect())
    }

    fn block_count(&self) -> Result<usize, StoreError> {
        Ok(self.blocks.len())
    }

    fn load_wallet_key(&self) -> Result<Option<[u8; 32]>, StoreError> {
        Ok(self.wallet_key)
    }

    fn store_wallet_key(&mut self, key: &[u8; 32]) -> Result<(), StoreError> {
        self.wallet_key = Some(*key);
        Ok(())
    }
}

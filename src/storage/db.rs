//! Database persistence layer using Sled
//!
//! Blocks, the height index and the per-account transaction index are
//! written in one multi-tree transaction so a block and its transactions
//! become visible together.

use log::info;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::collections::HashSet;
use std::path::Path;

use super::{verify_fetched, BlockStore, StoreError};
use crate::consensus::Block;
use crate::node::genesis_block;
use crate::validation::Transaction;

const WALLET_KEY: &str = "node_key";
const ACCOUNT_SEPARATOR: u8 = 0x00;

/// Database wrapper
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    blocks_tree: Tree,
    heights_tree: Tree,
    accounts_tree: Tree,
    wallet_tree: Tree,
}

impl SledStore {
    /// Open or create the database, seeding genesis on first use
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway database that is deleted on drop
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let mut store = Self {
            blocks_tree: db.open_tree("blocks")?,
            heights_tree: db.open_tree("heights")?,
            accounts_tree: db.open_tree("accounts")?,
            wallet_tree: db.open_tree("wallet")?,
            db,
        };

        if store.store_block(&genesis_block())? {
            info!("Database was empty, stored genesis block");
        }

        Ok(store)
    }
}

/// `be64(height) || hash`
fn height_key(height: u64, hash: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + hash.len());
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

fn account_prefix(address: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + 1);
    key.extend_from_slice(address.as_bytes());
    key.push(ACCOUNT_SEPARATOR);
    key
}

/// `address || 0x00 || be64(height) || hash || be32(position)`
fn account_key(address: &str, height: u64, hash: &str, position: u32) -> Vec<u8> {
    let mut key = account_prefix(address);
    key.extend_from_slice(&height_key(height, hash));
    key.extend_from_slice(&position.to_be_bytes());
    key
}

/// Index entries for every account a block's transactions touch
fn account_entries(block: &Block, hash: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let mut entries = Vec::new();
    for (position, tx) in block.transactions.iter().enumerate() {
        let value = bincode::serialize(tx)?;
        let mut accounts = vec![tx.output.as_str()];
        if !tx.is_block_reward() && tx.input != tx.output {
            accounts.push(tx.input.as_str());
        }
        for account in accounts {
            let key = account_key(account, block.height, hash, position as u32);
            entries.push((key, value.clone()));
        }
    }
    Ok(entries)
}

impl BlockStore for SledStore {
    fn fetch_block(&self, hash: &str) -> Result<Option<Block>, StoreError> {
        match self.blocks_tree.get(hash.as_bytes())? {
            Some(bytes) => {
                let block: Block = bincode::deserialize(&bytes)?;
                verify_fetched(hash, block).map(Some)
            }
            None => Ok(None),
        }
    }

    fn fetch_highest_block(&self) -> Result<Block, StoreError> {
        let (last, _) = self.heights_tree.last()?.ok_or(StoreError::Empty)?;
        // Keys sort by height then hash: the first key at the top height
        // carries the smallest hash
        let (first, _) = self
            .heights_tree
            .scan_prefix(&last[..8])
            .next()
            .ok_or(StoreError::Empty)??;
        let hash = String::from_utf8_lossy(&first[8..]).into_owned();
        self.fetch_block(&hash)?.ok_or(StoreError::Empty)
    }

    fn store_block(&mut self, block: &Block) -> Result<bool, StoreError> {
        let hash = block.hash_hex();
        if self.blocks_tree.contains_key(hash.as_bytes())? {
            return Ok(false);
        }

        let encoded = bincode::serialize(block)?;
        let index_key = height_key(block.height, &hash);
        let entries = account_entries(block, &hash)?;

        (&self.blocks_tree, &self.heights_tree, &self.accounts_tree)
            .transaction(|(blocks, heights, accounts)| {
                blocks.insert(hash.as_bytes(), encoded.as_slice())?;
                heights.insert(index_key.as_slice(), &[] as &[u8])?;
                for (key, value) in &entries {
                    accounts.insert(key.as_slice(), value.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<sled::Error>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) | TransactionError::Storage(e) => StoreError::Database(e),
            })?;

        self.db.flush()?;
        Ok(true)
    }

    fn fetch_transactions_for_account(
        &self,
        address: &str,
        within: &HashSet<String>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let prefix = account_prefix(address);
        let mut results = Vec::new();

        for item in self.accounts_tree.scan_prefix(&prefix) {
            let (key, value) = item?;
            let hash = &key[prefix.len() + 8..key.len() - 4];
            if within.contains(String::from_utf8_lossy(hash).as_ref()) {
                results.push(bincode::deserialize(&value)?);
            }
        }

        Ok(results)
    }

    fn block_count(&self) -> Result<usize, StoreError> {
        Ok(self.blocks_tree.len())
    }

    fn load_wallet_key(&self) -> Result<Option<[u8; 32]>, StoreError> {
        match self.wallet_tree.get(WALLET_KEY)? {
            Some(bytes) if bytes.len() == 32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                Ok(Some(key))
            }
            _ => Ok(None),
        }
    }

    fn store_wallet_key(&mut self, key: &[u8; 32]) -> Result<(), StoreError> {
        self.wallet_tree.insert(WALLET_KEY, &key[..])?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(parent: &Block, output: &str, unique: &str) -> Block {
        Block::new(
            parent.hash_hex(),
            0,
            parent.height + 1,
            vec![Transaction::block_reward(output, 5000, unique)],
        )
    }

    #[test]
    fn test_store_fetch_genesis() {
        let store = SledStore::temporary().unwrap();
        let genesis = genesis_block();

        let fetched = store.fetch_block(&genesis.hash_hex()).unwrap().unwrap();
        assert_eq!(fetched, genesis);
        assert_eq!(store.fetch_highest_block().unwrap(), genesis);
    }

    #[test]
    fn test_store_is_idempotent() {
        let mut store = SledStore::temporary().unwrap();
        let mut block = child(&genesis_block(), "aa", "01");
        block.transactions.push(Transaction::new("aa", "bb", 5));

        assert!(store.store_block(&block).unwrap());
        assert!(!store.store_block(&block).unwrap());
        assert_eq!(store.block_count().unwrap(), 2);

        let within: HashSet<String> = [block.hash_hex()].into_iter().collect();
        let txs = store.fetch_transactions_for_account("aa", &within).unwrap();
        assert_eq!(txs, block.transactions);
        assert_eq!(store.fetch_transactions_for_account("bb", &within).unwrap().len(), 1);
    }

    #[test]
    fn test_highest_block_prefers_height_then_smallest_hash() {
        let mut store = SledStore::temporary().unwrap();
        let a = child(&genesis_block(), "aa", "01");
        let b = child(&genesis_block(), "aa", "02");
        store.store_block(&a).unwrap();
        store.store_block(&b).unwrap();

        let expected = if a.hash_hex() < b.hash_hex() { &a } else { &b };
        assert_eq!(&store.fetch_highest_block().unwrap(), expected);

        let c = child(&a, "aa", "03");
        store.store_block(&c).unwrap();
        assert_eq!(store.fetch_highest_block().unwrap(), c);
    }

    #[test]
    fn test_account_index_respects_hash_set() {
        let mut store = SledStore::temporary().unwrap();
        let a = child(&genesis_block(), "aa", "01");
        let side = child(&genesis_block(), "aa", "02");
        store.store_block(&a).unwrap();
        store.store_block(&side).unwrap();

        let within: HashSet<String> = [a.hash_hex()].into_iter().collect();
        let txs = store.fetch_transactions_for_account("aa", &within).unwrap();
        assert_eq!(txs, a.transactions);
    }

    #[test]
    fn test_corrupt_block_is_fatal() {
        let store = SledStore::temporary().unwrap();
        let forged = child(&genesis_block(), "aa", "01");
        store
            .blocks_tree
            .insert("deadbeef", bincode::serialize(&forged).unwrap())
            .unwrap();

        let err = store.fetch_block("deadbeef").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reopen_keeps_blocks_and_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let block = child(&genesis_block(), "aa", "01");
        {
            let mut store = SledStore::open(dir.path()).unwrap();
            store.store_block(&block).unwrap();
            store.store_wallet_key(&[9u8; 32]).unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.fetch_highest_block().unwrap(), block);
        assert_eq!(store.load_wallet_key().unwrap(), Some([9u8; 32]));
    }
}

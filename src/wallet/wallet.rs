//! Wallet implementation
//!
//! Holds the node's signing key and answers balance queries by replaying
//! the canonical chain. The wallet does not affect consensus.

use std::collections::HashSet;
use thiserror::Error;

use crate::consensus::{hash_chain, ChainWalk};
use crate::crypto::{PrivateKey, PublicKey, SchnorrSignature};
use crate::storage::{BlockStore, StoreError};
use crate::validation::{LedgerError, Transaction};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid private key")]
    InvalidKey,
    #[error("Canonical chain is missing block {0}")]
    BrokenChain(String),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// A wallet key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private key (for signing)
    private_key: PrivateKey,
    /// Public key
    pub public_key: PublicKey,
    /// Address (derived from public key)
    pub address: String,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    /// Import from private key bytes
    pub fn from_private_key_bytes(bytes: &[u8; 32]) -> Result<Self, WalletError> {
        let private_key = PrivateKey::from_bytes(bytes).map_err(|_| WalletError::InvalidKey)?;
        Ok(Self::from_private_key(private_key))
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = public_key.to_address();
        Self {
            private_key,
            public_key,
            address,
        }
    }

    /// Export private key bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.private_key.to_bytes()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a transaction's hash
    pub fn sign(&self, tx: &Transaction) -> SchnorrSignature {
        self.private_key.sign(&tx.hash())
    }

    /// Attach a hex signature to a transaction
    pub fn sign_transaction(&self, mut tx: Transaction) -> Transaction {
        tx.signature = self.sign(&tx).to_hex();
        tx
    }
}

/// Load the node identity from the store, creating and persisting one on
/// first start
pub fn load_or_create(store: &mut dyn BlockStore) -> Result<KeyPair, WalletError> {
    if let Some(bytes) = store.load_wallet_key()? {
        return KeyPair::from_private_key_bytes(&bytes);
    }

    let keypair = KeyPair::generate();
    store.store_wallet_key(&keypair.private_key_bytes())?;
    Ok(keypair)
}

/// Balance of `address` on the canonical chain
pub fn get_balance(store: &dyn BlockStore, address: &str) -> Result<u64, WalletError> {
    let head = store.fetch_highest_block()?;
    let chain = match hash_chain(&head, store)? {
        ChainWalk::Complete(chain) => chain,
        ChainWalk::Missing(hash) => return Err(WalletError::BrokenChain(hash)),
    };
    let within: HashSet<String> = chain.iter().map(|block| block.hash_hex()).collect();

    let mut balance: u64 = 0;
    for tx in store.fetch_transactions_for_account(address, &within)? {
        if !tx.is_block_reward() && tx.input == address {
            balance = balance
                .checked_sub(tx.amount)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    address: address.to_string(),
                    have: balance,
                    need: tx.amount,
                })?;
        }
        if tx.output == address {
            balance = balance
                .checked_add(tx.amount)
                .ok_or_else(|| LedgerError::Overflow(address.to_string()))?;
        }
    }

    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Block;
    use crate::node::genesis_block;
    use crate::storage::MemoryStore;

    fn child(parent: &Block, transactions: Vec<Transaction>) -> Block {
        Block::new(parent.hash_hex(), 0, parent.height + 1, transactions)
    }

    #[test]
    fn test_keypair_roundtrip() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_private_key_bytes(&keypair.private_key_bytes()).unwrap();
        assert_eq!(restored.address, keypair.address);
        assert_eq!(keypair.address.len(), 64);
    }

    #[test]
    fn test_sign_transaction() {
        let keypair = KeyPair::generate();
        let tx = keypair.sign_transaction(Transaction::new(keypair.address(), "bb", 10));

        let signature = SchnorrSignature::from_hex(&tx.signature).unwrap();
        assert!(keypair.public_key.verify(&tx.hash(), &signature));
    }

    #[test]
    fn test_load_or_create_persists_identity() {
        let mut store = MemoryStore::new();
        let first = load_or_create(&mut store).unwrap();
        let second = load_or_create(&mut store).unwrap();
        assert_eq!(first.address, second.address);
    }

    #[test]
    fn test_balance_follows_canonical_chain() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![Transaction::block_reward("aa", 5000, "01")]);
        let b = child(
            &a,
            vec![
                Transaction::block_reward("cc", 5000, "02"),
                Transaction::new("aa", "bb", 1200),
            ],
        );
        store.store_block(&a).unwrap();
        store.store_block(&b).unwrap();

        assert_eq!(get_balance(&store, "aa").unwrap(), 3800);
        assert_eq!(get_balance(&store, "bb").unwrap(), 1200);
        assert_eq!(get_balance(&store, "cc").unwrap(), 5000);
        assert_eq!(get_balance(&store, "dd").unwrap(), 0);
    }

    #[test]
    fn test_side_chain_not_counted() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![Transaction::block_reward("aa", 5000, "01")]);
        let b = child(&a, vec![Transaction::block_reward("aa", 5000, "02")]);
        let side = child(&genesis_block(), vec![Transaction::block_reward("ee", 5000, "03")]);
        for block in [&a, &b, &side] {
            store.store_block(block).unwrap();
        }

        assert_eq!(get_balance(&store, "aa").unwrap(), 10000);
        assert_eq!(get_balance(&store, "ee").unwrap(), 0);
    }
}

//! Block and chain validation
//!
//! A candidate block is checked on its own first (height, work, reward),
//! then walked back to genesis through the store and the balances along
//! the whole chain are replayed.

use thiserror::Error;

use crate::consensus::{validate_block_reward, Block, ProofOfWork};
use crate::node::GENESIS_PREVIOUS;
use crate::storage::{BlockStore, StoreError};
use crate::validation::{BalanceLedger, LedgerError};

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Only genesis may have height 0")]
    GenesisHeight,
    #[error("Bad work")]
    BadWork,
    #[error("Bad reward")]
    BadReward,
    #[error("Chain does not end at genesis")]
    BadLinkage,
    #[error("Bad height: block at {height} follows parent at {parent_height}")]
    BadHeight { height: u64, parent_height: u64 },
    #[error("Bad amount: {0}")]
    BadAmount(#[from] LedgerError),
}

/// Outcome of validating a candidate block
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The block and its whole ancestry are valid
    Accepted,
    /// An ancestor with this hash is not stored yet
    Incomplete(String),
    /// The block can never become valid
    Rejected(ValidationError),
}

/// Result of walking a block back towards genesis
#[derive(Debug, PartialEq, Eq)]
pub enum ChainWalk {
    /// Every ancestor was found; blocks are ordered oldest first
    Complete(Vec<Block>),
    /// The walk stopped at this missing hash
    Missing(String),
}

/// Walk `previous` links from `block` until the genesis sentinel
pub fn hash_chain(block: &Block, store: &dyn BlockStore) -> Result<ChainWalk, StoreError> {
    let mut previous = block.previous.clone();
    let mut chain = vec![block.clone()];

    while previous != GENESIS_PREVIOUS {
        let Some(parent) = store.fetch_block(&previous)? else {
            return Ok(ChainWalk::Missing(previous));
        };
        previous = parent.previous.clone();
        chain.push(parent);
    }

    chain.reverse();
    Ok(ChainWalk::Complete(chain))
}

/// Checks that need nothing but the block itself
pub fn check_block(block: &Block, pow: &ProofOfWork) -> Result<(), ValidationError> {
    if block.height < 1 {
        return Err(ValidationError::GenesisHeight);
    }

    if !pow.validate_work(block) {
        return Err(ValidationError::BadWork);
    }

    if !validate_block_reward(block) {
        return Err(ValidationError::BadReward);
    }

    Ok(())
}

/// Verify a resolved chain (oldest first) and return the replayed ledger
pub fn verify_chain(chain: &[Block]) -> Result<BalanceLedger, ValidationError> {
    match chain.first() {
        Some(root) if root.is_genesis() => {}
        _ => return Err(ValidationError::BadLinkage),
    }

    for pair in chain.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        if parent.height.checked_add(1) != Some(child.height) {
            return Err(ValidationError::BadHeight {
                height: child.height,
                parent_height: parent.height,
            });
        }
    }

    let mut ledger = BalanceLedger::new();
    ledger.apply_all(chain.iter().flat_map(|block| &block.transactions))?;
    Ok(ledger)
}

/// Validate a candidate block against the stored chain
pub fn validate_block(
    block: &Block,
    store: &dyn BlockStore,
    pow: &ProofOfWork,
) -> Result<Verdict, StoreError> {
    // Always trust the genesis block
    if block.is_genesis() {
        return Ok(Verdict::Accepted);
    }

    if let Err(e) = check_block(block, pow) {
        return Ok(Verdict::Rejected(e));
    }

    let chain = match hash_chain(block, store)? {
        ChainWalk::Complete(chain) => chain,
        ChainWalk::Missing(hash) => return Ok(Verdict::Incomplete(hash)),
    };

    Ok(match verify_chain(&chain) {
        Ok(_) => Verdict::Accepted,
        Err(e) => Verdict::Rejected(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BLOCK_REWARD;
    use crate::node::genesis_block;
    use crate::storage::MemoryStore;
    use crate::validation::Transaction;

    const X: &str = "0a0a";
    const Y: &str = "0b0b";

    fn easy() -> ProofOfWork {
        ProofOfWork::new(0)
    }

    fn solve(mut block: Block) -> Block {
        while !easy().validate_work(&block) {
            block.work += 1;
        }
        block
    }

    fn child(parent: &Block, transactions: Vec<Transaction>) -> Block {
        solve(Block::new(parent.hash_hex(), 0, parent.height + 1, transactions))
    }

    fn reward(to: &str, unique: &str) -> Transaction {
        Transaction::block_reward(to, BLOCK_REWARD, unique)
    }

    #[test]
    fn test_genesis_trusted_regardless_of_work() {
        let store = MemoryStore::new();
        let impossible = ProofOfWork::new(u64::MAX);
        assert_eq!(validate_block(&genesis_block(), &store, &impossible).unwrap(), Verdict::Accepted);
    }

    #[test]
    fn test_height_zero_rejected() {
        let store = MemoryStore::new();
        let mut block = child(&genesis_block(), vec![reward(X, "01")]);
        block.height = 0;
        assert_eq!(
            validate_block(&block, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::GenesisHeight)
        );
    }

    #[test]
    fn test_bad_work_rejected() {
        let store = MemoryStore::new();
        let block = child(&genesis_block(), vec![reward(X, "01")]);
        let impossible = ProofOfWork::new(u64::MAX);
        assert_eq!(
            validate_block(&block, &store, &impossible).unwrap(),
            Verdict::Rejected(ValidationError::BadWork)
        );
    }

    #[test]
    fn test_two_rewards_rejected() {
        let store = MemoryStore::new();
        let block = child(&genesis_block(), vec![reward(X, "01"), reward(Y, "02")]);
        assert_eq!(
            validate_block(&block, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadReward)
        );
    }

    #[test]
    fn test_wrong_reward_amount_rejected() {
        let store = MemoryStore::new();
        let block = child(&genesis_block(), vec![Transaction::block_reward(X, 1, "01")]);
        assert_eq!(
            validate_block(&block, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadReward)
        );
    }

    #[test]
    fn test_missing_parent_is_incomplete() {
        let store = MemoryStore::new();
        let a = child(&genesis_block(), vec![reward(X, "01")]);
        let b = child(&a, vec![reward(X, "02")]);
        assert_eq!(
            validate_block(&b, &store, &easy()).unwrap(),
            Verdict::Incomplete(a.hash_hex())
        );
    }

    #[test]
    fn test_overspend_rejected() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![reward(X, "01")]);
        store.store_block(&a).unwrap();

        let b = child(&a, vec![Transaction::new(X, Y, 6000)]);
        assert!(matches!(
            validate_block(&b, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadAmount(_))
        ));
    }

    #[test]
    fn test_exact_spend_accepted() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![reward(X, "01")]);
        store.store_block(&a).unwrap();

        let b = child(&a, vec![Transaction::new(X, Y, 5000)]);
        assert_eq!(validate_block(&b, &store, &easy()).unwrap(), Verdict::Accepted);

        let ChainWalk::Complete(chain) = hash_chain(&b, &store).unwrap() else {
            panic!("chain should resolve");
        };
        let ledger = verify_chain(&chain).unwrap();
        assert_eq!(ledger.balance(X), 0);
        assert_eq!(ledger.balance(Y), 5000);
    }

    #[test]
    fn test_spend_before_reward_in_same_block_rejected() {
        let store = MemoryStore::new();
        let a = child(&genesis_block(), vec![Transaction::new(X, Y, 1), reward(X, "01")]);
        assert!(matches!(
            validate_block(&a, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadAmount(_))
        ));
    }

    #[test]
    fn test_height_gap_rejected() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![reward(X, "01")]);
        store.store_block(&a).unwrap();

        let mut b = child(&a, vec![reward(X, "02")]);
        b.height = 5;
        assert_eq!(
            validate_block(&b, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadHeight { height: 5, parent_height: 1 })
        );
    }

    #[test]
    fn test_fake_root_rejected() {
        let store = MemoryStore::new();
        let block = solve(Block::new(GENESIS_PREVIOUS, 0, 1, vec![reward(X, "01")]));
        assert_eq!(
            validate_block(&block, &store, &easy()).unwrap(),
            Verdict::Rejected(ValidationError::BadLinkage)
        );
    }

    #[test]
    fn test_hash_chain_oldest_first() {
        let mut store = MemoryStore::new();
        let a = child(&genesis_block(), vec![reward(X, "01")]);
        let b = child(&a, vec![reward(X, "02")]);
        store.store_block(&a).unwrap();
        store.store_block(&b).unwrap();

        assert_eq!(
            hash_chain(&b, &store).unwrap(),
            ChainWalk::Complete(vec![genesis_block(), a, b])
        );
    }
}

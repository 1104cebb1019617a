//! Block miner implementation
//!
//! Assembles candidate blocks and searches for a nonce that solves the
//! proof-of-work puzzle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::consensus::{Block, ProofOfWork};
use crate::constants::{BLOCK_REWARD, CANCEL_POLL_INTERVAL};
use crate::crypto::Hash;
use crate::validation::Transaction;

/// Mining result
#[derive(Debug, PartialEq, Eq)]
pub enum MiningResult {
    /// Successfully mined a block
    Success(Block),
    /// Mining was interrupted
    Interrupted,
}

/// Block miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Address credited by the block reward
    reward_address: String,
    pow: ProofOfWork,
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
}

impl Miner {
    /// Create a new miner
    pub fn new(reward_address: impl Into<String>, pow: ProofOfWork) -> Self {
        Self {
            reward_address: reward_address.into(),
            pow,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Stop mining
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Reset stop signal
    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Assemble a candidate block on top of `previous`.
    ///
    /// The block reward comes first, followed by `transactions` in order.
    pub fn assemble_block(&self, previous: &Block, transactions: Vec<Transaction>) -> Block {
        let unique = hex::encode(rand::random::<[u8; 16]>());
        let reward = Transaction::block_reward(self.reward_address.as_str(), BLOCK_REWARD, unique);

        let mut all_txs = Vec::with_capacity(transactions.len() + 1);
        all_txs.push(reward);
        all_txs.extend(transactions);

        Block::new(previous.hash_hex(), 0, previous.height + 1, all_txs)
    }

    /// Mine a block (find valid nonce)
    ///
    /// Tries nonces upward from the block's current `work`. The stop signal
    /// is polled every [`CANCEL_POLL_INTERVAL`] nonces.
    pub fn mine_block(&self, mut block: Block) -> MiningResult {
        // The nonce is not part of the block hash
        let block_hash: Hash = block.hash();

        for work in block.work..=u64::MAX {
            if work % CANCEL_POLL_INTERVAL == 0 && self.is_stopped() {
                return MiningResult::Interrupted;
            }

            if self.pow.check(&block_hash, work) {
                block.work = work;
                return MiningResult::Success(block);
            }
        }

        MiningResult::Interrupted
    }

    /// Assemble a block on `previous` and mine it
    pub fn mine(&self, previous: &Block, transactions: Vec<Transaction>) -> MiningResult {
        self.mine_block(self.assemble_block(previous, transactions))
    }
}

//! Proof-of-work puzzle
//!
//! `D(w, H_b) = H(be64(w) || H_b)`; the work is valid when the leading
//! 64 bits of `D` exceed the difficulty. The difficulty is fixed for the
//! life of the chain and never retargeted.

use crate::consensus::Block;
use crate::constants::DIFFICULTY;
use crate::crypto::{Hash, Hasher};

/// Fixed-difficulty proof of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u64,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DIFFICULTY)
    }
}

impl ProofOfWork {
    pub fn new(difficulty: u64) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> u64 {
        self.difficulty
    }

    /// Puzzle value for a nonce against a block content hash
    ///
    /// This is a pure function with no side effects.
    pub fn work_value(work: u64, block_hash: &Hash) -> u64 {
        let mut hasher = Hasher::new();
        hasher.update(&work.to_be_bytes()).update(block_hash.as_bytes());
        hasher.finalize().leading_u64()
    }

    /// Check a nonce against a precomputed block hash
    pub fn check(&self, block_hash: &Hash, work: u64) -> bool {
        Self::work_value(work, block_hash) > self.difficulty
    }

    /// Check the nonce a block carries
    pub fn validate_work(&self, block: &Block) -> bool {
        self.check(&block.hash(), block.work)
    }
}

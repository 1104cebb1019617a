//! Genesis block for the Spindle chain
//!
//! The genesis block is a fixed constant, trusted unconditionally and the
//! root of every valid chain.

use std::sync::OnceLock;

use crate::consensus::Block;
use crate::crypto::Hash;

/// Parent reference of the genesis block; walks back to genesis stop here
pub const GENESIS_PREVIOUS: &str = "00000000000000000000000000000000";

/// Precomputed genesis nonce
pub const GENESIS_WORK: u64 = 0x01f1_7e51;

/// Create the genesis block
pub fn genesis_block() -> Block {
    Block::new(GENESIS_PREVIOUS, GENESIS_WORK, 0, Vec::new())
}

/// Get genesis block hash (computed once)
pub fn genesis_hash() -> Hash {
    static GENESIS_HASH: OnceLock<Hash> = OnceLock::new();
    *GENESIS_HASH.get_or_init(|| genesis_block().hash())
}

/// Genesis block statistics
#[derive(Debug)]
pub struct GenesisInfo {
    pub hash: Hash,
    pub work: u64,
}

impl GenesisInfo {
    pub fn new() -> Self {
        Self {
            hash: genesis_hash(),
            work: GENESIS_WORK,
        }
    }
}

impl Default for GenesisInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_bytes;

    #[test]
    fn test_genesis_is_deterministic() {
        assert_eq!(genesis_block(), genesis_block());
        assert_eq!(genesis_block().hash(), genesis_hash());
    }

    #[test]
    fn test_genesis_shape() {
        let genesis = genesis_block();
        assert_eq!(genesis.height, 0);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.is_genesis());
    }

    #[test]
    fn test_genesis_hash_is_digest_of_sentinel() {
        assert_eq!(genesis_hash(), hash_bytes(&[0u8; 16]));
    }

    #[test]
    fn test_genesis_info() {
        let info = GenesisInfo::new();
        assert_eq!(info.hash, genesis_hash());
        assert_eq!(info.work, GENESIS_WORK);
    }
}

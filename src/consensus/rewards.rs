//! Block reward rules
//!
//! Every block may mint exactly one fixed reward. Rewards are checked per
//! block; the chain replay trusts them and only credits.

use crate::consensus::Block;
use crate::constants::BLOCK_REWARD;

/// Check the reward transactions carried by a block.
///
/// At most one reward is allowed and it must be for exactly
/// [`BLOCK_REWARD`].
pub fn validate_block_reward(block: &Block) -> bool {
    let mut rewards = block.rewards();
    match (rewards.next(), rewards.next()) {
        (None, _) => true,
        (Some(reward), None) => reward.amount == BLOCK_REWARD,
        (Some(_), Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Transaction;

    fn block_with(transactions: Vec<Transaction>) -> Block {
        Block::new("00", 0, 1, transactions)
    }

    #[test]
    fn test_no_reward_is_allowed() {
        assert!(validate_block_reward(&block_with(vec![])));
    }

    #[test]
    fn test_single_reward() {
        let block = block_with(vec![Transaction::block_reward("aa", BLOCK_REWARD, "01")]);
        assert!(validate_block_reward(&block));
    }

    #[test]
    fn test_wrong_amount_rejected() {
        let block = block_with(vec![Transaction::block_reward("aa", BLOCK_REWARD + 1, "01")]);
        assert!(!validate_block_reward(&block));
    }

    #[test]
    fn test_two_rewards_rejected() {
        let block = block_with(vec![
            Transaction::block_reward("aa", BLOCK_REWARD, "01"),
            Transaction::new("aa", "bb", 1),
            Transaction::block_reward("bb", BLOCK_REWARD, "02"),
        ]);
        assert!(!validate_block_reward(&block));
    }
}

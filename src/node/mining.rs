//! Node-level mining
//!
//! One round mines on the current head with the pending transactions,
//! stores the result, and announces it.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::{report_error, Node, NodeError};
use crate::consensus::{validate_block, Block, ValidationError, Verdict};
use crate::mining::MiningResult;

/// Pause after an interrupted round before mining again
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Result of one mining round
#[derive(Debug, PartialEq, Eq)]
pub enum MineOutcome {
    /// Mined and stored as the new head
    Mined(Block),
    /// Mined and stored, but another block holds the head
    Orphaned(Block),
    /// A better block arrived while searching
    Interrupted,
    /// The mined block failed validation; uncovered transfers were dropped
    Rejected(ValidationError),
}

impl Node {
    /// Mine one block on top of the canonical head.
    ///
    /// Pending transfers stay queued while the round runs and leave the
    /// pool only once their block becomes the head.
    pub async fn mine_next(self: &Arc<Self>) -> Result<MineOutcome, NodeError> {
        self.miner.reset();
        let head = self.store.lock().await.fetch_highest_block()?;
        let transactions = self.prune_pending().await?;

        let miner = self.miner.clone();
        let candidate = miner.assemble_block(&head, transactions);
        let block = match tokio::task::spawn_blocking(move || miner.mine_block(candidate)).await? {
            MiningResult::Success(block) => block,
            MiningResult::Interrupted => return Ok(MineOutcome::Interrupted),
        };

        let hash = block.hash_hex();
        let (verdict, is_head) = {
            let mut store = self.store.lock().await;
            match validate_block(&block, &**store, &self.pow)? {
                Verdict::Accepted => {
                    store.store_block(&block)?;
                    let head = store.fetch_highest_block()?;
                    (Verdict::Accepted, head.hash_hex() == hash)
                }
                other => (other, false),
            }
        };

        match verdict {
            Verdict::Accepted if is_head => {
                self.forget_pending(&block.transactions).await;
                self.broadcast_latest_block().await?;
                Ok(MineOutcome::Mined(block))
            }
            Verdict::Accepted => Ok(MineOutcome::Orphaned(block)),
            Verdict::Rejected(e) => {
                self.prune_pending().await?;
                Ok(MineOutcome::Rejected(e))
            }
            Verdict::Incomplete(missing) => {
                // The head's ancestry is always stored
                warn!("Mined on a head missing ancestor {}", missing);
                Ok(MineOutcome::Interrupted)
            }
        }
    }

    /// Mine forever, logging each round
    pub async fn run_miner(self: Arc<Self>) {
        loop {
            match self.mine_next().await {
                Ok(MineOutcome::Mined(block)) => match self.balance(self.address()).await {
                    Ok(balance) => info!(
                        "Mined block {} at height {} | balance {}",
                        block.hash_hex(),
                        block.height,
                        balance
                    ),
                    Err(e) => report_error("Balance lookup failed", &e),
                },
                Ok(MineOutcome::Orphaned(block)) => {
                    info!("Mined block {} at height {} was orphaned", block.hash_hex(), block.height);
                }
                Ok(MineOutcome::Interrupted) => {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Ok(MineOutcome::Rejected(e)) => {
                    warn!("Mined block rejected: {}", e);
                }
                Err(e) => {
                    report_error("Mining round failed", &e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}

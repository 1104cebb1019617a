//! Chain synchronization
//!
//! Reacts to `block` and `chain` messages: validates and stores incoming
//! blocks, floods new heads, and backfills missing ancestry by asking the
//! sender for the whole chain.

use std::net::IpAddr;

use log::{debug, info, warn};

use super::{report_store_error, Node};
use crate::consensus::{hash_chain, validate_block, Block, ChainWalk, ValidationError, Verdict};
use crate::p2p::Message;
use crate::storage::StoreError;

/// What happened to a received block
#[derive(Debug, PartialEq, Eq)]
pub enum BlockStatus {
    /// Already stored
    Known,
    /// Stored and became the new head
    Extended,
    /// Stored without moving the head
    Stored,
    /// An ancestor is missing; the chain was requested
    Incomplete(String),
    Rejected(ValidationError),
}

impl Node {
    /// Dispatch one message received from `peer`
    pub async fn handle_message(&self, peer: IpAddr, message: Message) {
        debug!("Received {} from {}", message.command(), peer);
        let result = match message {
            Message::Block { block } => self.receive_block(peer, block).await.map(|_| ()),
            Message::Chain { latest } => self.handle_chain_request(peer, &latest).await.map(|_| ()),
        };
        if let Err(e) = result {
            report_store_error("Failed to handle message", &e);
        }
    }

    /// Validate and store a block received from `peer`
    pub async fn receive_block(&self, peer: IpAddr, block: Block) -> Result<BlockStatus, StoreError> {
        let hash = block.hash_hex();

        let status = {
            let mut store = self.store.lock().await;
            if store.contains_block(&hash)? {
                return Ok(BlockStatus::Known);
            }
            match validate_block(&block, &**store, &self.pow)? {
                Verdict::Accepted => {
                    let head = store.fetch_highest_block()?;
                    store.store_block(&block)?;
                    if block.height > head.height {
                        BlockStatus::Extended
                    } else {
                        BlockStatus::Stored
                    }
                }
                Verdict::Incomplete(missing) => BlockStatus::Incomplete(missing),
                Verdict::Rejected(e) => BlockStatus::Rejected(e),
            }
        };

        match &status {
            BlockStatus::Extended => {
                info!("Saved block {} at height {}", hash, block.height);
                self.miner.stop();
                let delivered = self.peers.lock().await.broadcast(&Message::Block { block });
                debug!("Relayed block {} to {} peers", hash, delivered);
            }
            BlockStatus::Stored => {
                info!("Saved side block {} at height {}", hash, block.height);
            }
            BlockStatus::Incomplete(missing) => {
                info!("Block {} is missing ancestor {}, requesting chain from {}", hash, missing, peer);
                self.peers
                    .lock()
                    .await
                    .send_to(&peer, Message::Chain { latest: hash.clone() });
            }
            BlockStatus::Rejected(e) => {
                warn!("Rejected block {} from {}: {}", hash, peer, e);
            }
            BlockStatus::Known => {}
        }

        Ok(status)
    }

    /// Stream the chain ending at `latest` to `peer`, oldest block first.
    ///
    /// Unknown hashes are ignored. Returns the number of blocks queued.
    pub async fn handle_chain_request(&self, peer: IpAddr, latest: &str) -> Result<usize, StoreError> {
        let chain = {
            let store = self.store.lock().await;
            let Some(block) = store.fetch_block(latest)? else {
                debug!("Chain request from {} for unknown block {}", peer, latest);
                return Ok(0);
            };
            match hash_chain(&block, &**store)? {
                ChainWalk::Complete(chain) => chain,
                ChainWalk::Missing(hash) => {
                    warn!("Stored block {} has no ancestor {}", latest, hash);
                    return Ok(0);
                }
            }
        };

        info!("Sending {} blocks to {}", chain.len(), peer);
        let peers = self.peers.lock().await;
        let count = chain.len();
        for block in chain {
            peers.send_to(&peer, Message::Block { block });
        }
        Ok(count)
    }

    /// Flood the canonical head to every peer; genesis is never sent.
    ///
    /// Returns the number of peers that accepted the message.
    pub async fn broadcast_latest_block(&self) -> Result<usize, StoreError> {
        let head = self.store.lock().await.fetch_highest_block()?;
        if head.is_genesis() {
            return Ok(0);
        }
        Ok(self.peers.lock().await.broadcast(&Message::Block { block: head }))
    }
}

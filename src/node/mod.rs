//! Node module - Shared node state, chain sync, networking, and mining

mod genesis;
mod mining;
mod server;
mod sync;

pub use genesis::*;
pub use mining::*;
pub use sync::*;

use std::collections::HashSet;
use std::io;
use std::net::IpAddr;
use thiserror::Error;
use tokio::sync::Mutex;

use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::consensus::ProofOfWork;
use crate::mining::Miner;
use crate::p2p::{PeerInfo, PeerRegistry};
use crate::storage::{BlockStore, StoreError};
use crate::validation::{BalanceLedger, LedgerError, Transaction};
use crate::wallet::{self, is_valid_address, KeyPair, WalletError};

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Network error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Amount must be positive")]
    ZeroAmount,
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl NodeError {
    /// The storage failure behind this error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            NodeError::Store(e) | NodeError::Wallet(WalletError::Store(e)) => Some(e),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.store_error().map_or(false, StoreError::is_fatal)
    }
}

/// A running node: chain store, peers, identity, and miner
pub struct Node {
    config: NodeConfig,
    pow: ProofOfWork,
    store: Mutex<Box<dyn BlockStore>>,
    peers: Mutex<PeerRegistry>,
    /// Our own IP, learned from a self-connection
    local_ip: Mutex<Option<IpAddr>>,
    /// Addresses with a dial in progress
    dialing: Mutex<HashSet<IpAddr>>,
    wallet: KeyPair,
    miner: Miner,
    /// Signed transfers not yet in the canonical chain, oldest first.
    /// Transfers stay here while a round mines them.
    pending: Mutex<Vec<Transaction>>,
}

impl Node {
    pub fn new(config: NodeConfig, store: Box<dyn BlockStore>, wallet: KeyPair) -> Self {
        let pow = ProofOfWork::new(config.difficulty);
        let miner = Miner::new(wallet.address(), pow);
        Self {
            config,
            pow,
            store: Mutex::new(store),
            peers: Mutex::new(PeerRegistry::new()),
            local_ip: Mutex::new(None),
            dialing: Mutex::new(HashSet::new()),
            wallet,
            miner,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Address credited by this node's block rewards
    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    /// Exclusive access to the block store
    pub async fn store(&self) -> tokio::sync::MutexGuard<'_, Box<dyn BlockStore>> {
        self.store.lock().await
    }

    /// Exclusive access to the peer registry
    pub async fn peers(&self) -> tokio::sync::MutexGuard<'_, PeerRegistry> {
        self.peers.lock().await
    }

    pub async fn peer_info(&self) -> Vec<PeerInfo> {
        self.peers.lock().await.peer_info()
    }

    pub async fn local_ip(&self) -> Option<IpAddr> {
        *self.local_ip.lock().await
    }

    pub(crate) async fn set_local_ip(&self, ip: IpAddr) {
        let mut local_ip = self.local_ip.lock().await;
        if local_ip.replace(ip) != Some(ip) {
            info!("Learned local address {}", ip);
        }
    }

    /// Dial a discovered address only if it is not us, not a known peer,
    /// and not already being dialed
    pub async fn should_dial(&self, ip: IpAddr) -> bool {
        if *self.local_ip.lock().await == Some(ip) {
            return false;
        }
        if self.dialing.lock().await.contains(&ip) {
            return false;
        }
        !self.peers.lock().await.contains(&ip)
    }

    /// Claim `ip` for a dial; `false` if it should not be dialed now
    pub(crate) async fn begin_dial(&self, ip: IpAddr) -> bool {
        self.should_dial(ip).await && self.dialing.lock().await.insert(ip)
    }

    pub(crate) async fn end_dial(&self, ip: IpAddr) {
        self.dialing.lock().await.remove(&ip);
    }

    /// Confirmed balance of `address` on the canonical chain
    pub async fn balance(&self, address: &str) -> Result<u64, NodeError> {
        let store = self.store.lock().await;
        Ok(wallet::get_balance(&**store, address)?)
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.pending.lock().await.clone()
    }

    /// Sign a transfer from the node wallet and queue it for mining.
    ///
    /// The confirmed balance minus every queued transfer, including those
    /// being mined right now, must cover `amount`.
    pub async fn submit_transaction(&self, to: &str, amount: u64) -> Result<Transaction, NodeError> {
        if !is_valid_address(to) {
            return Err(NodeError::InvalidAddress(to.to_string()));
        }
        if amount == 0 {
            return Err(NodeError::ZeroAmount);
        }

        let from = self.address();
        let store = self.store.lock().await;
        let mut pending = self.pending.lock().await;
        let mut ledger = self.replay_pending(&**store, &mut pending)?;

        let mut tx = Transaction::new(from, to, amount);
        tx.unique = hex::encode(rand::random::<[u8; 16]>());
        ledger.apply(&tx)?;

        let tx = self.wallet.sign_transaction(tx);
        pending.push(tx.clone());
        info!("Queued transfer of {} to {}", amount, to);
        Ok(tx)
    }

    /// Replay the pending pool on top of the confirmed balances of its
    /// senders and of the node wallet. Transfers that no longer fit are
    /// removed from the pool.
    fn replay_pending(
        &self,
        store: &dyn BlockStore,
        pending: &mut Vec<Transaction>,
    ) -> Result<BalanceLedger, NodeError> {
        let mut senders: HashSet<&str> = pending.iter().map(|tx| tx.input.as_str()).collect();
        senders.insert(self.address());

        let mut ledger = BalanceLedger::new();
        for sender in senders {
            ledger.credit(sender, wallet::get_balance(store, sender)?)?;
        }

        pending.retain(|tx| match ledger.apply(tx) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping queued transfer {}: {}", tx.hash_hex(), e);
                false
            }
        });
        Ok(ledger)
    }

    /// Drop uncovered transfers and return what is left, oldest first
    pub(crate) async fn prune_pending(&self) -> Result<Vec<Transaction>, NodeError> {
        let store = self.store.lock().await;
        let mut pending = self.pending.lock().await;
        self.replay_pending(&**store, &mut pending)?;
        Ok(pending.clone())
    }

    /// Remove transfers that made it into a block
    pub(crate) async fn forget_pending(&self, confirmed: &[Transaction]) {
        let hashes: HashSet<String> = confirmed.iter().map(Transaction::hash_hex).collect();
        self.pending.lock().await.retain(|tx| !hashes.contains(&tx.hash_hex()));
    }
}

/// Log a storage failure; corruption terminates the process
pub(crate) fn report_store_error(context: &str, err: &StoreError) {
    if err.is_fatal() {
        error!("{}: {}; exiting", context, err);
        std::process::exit(1);
    }
    error!("{}: {}", context, err);
}

/// [`report_store_error`] for node-level failures
pub(crate) fn report_error(context: &str, err: &NodeError) {
    match err.store_error() {
        Some(e) => report_store_error(context, e),
        None => error!("{}: {}", context, err),
    }
}

//! Peer management
//!
//! Registry of live connections keyed by remote IP. Each connection is
//! represented by the sending half of its writer task's queue.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use super::Message;

/// Queue feeding a connection's writer task
pub type PeerSender = mpsc::UnboundedSender<Message>;

/// Identifies one registration of a peer address
pub type ConnectionId = u64;

#[derive(Debug)]
struct PeerHandle {
    id: ConnectionId,
    sender: PeerSender,
    connected_at: Instant,
}

/// Information about a peer
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    /// Peer's network address
    pub addr: IpAddr,
    pub connection_id: ConnectionId,
    /// Seconds since the connection was registered
    pub connected_secs: u64,
}

/// Live peer connections
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<IpAddr, PeerHandle>,
    next_id: ConnectionId,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any older one from the same address
    pub fn register(&mut self, addr: IpAddr, sender: PeerSender) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;
        let handle = PeerHandle {
            id,
            sender,
            connected_at: Instant::now(),
        };
        if let Some(old) = self.peers.insert(addr, handle) {
            debug!("Replaced connection {} from {}", old.id, addr);
        }
        id
    }

    /// Remove a connection if it is still the registered one for `addr`
    pub fn remove(&mut self, addr: &IpAddr, id: ConnectionId) -> bool {
        match self.peers.get(addr) {
            Some(handle) if handle.id == id => {
                self.peers.remove(addr);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.peers.contains_key(addr)
    }

    /// Queue a message for one peer
    pub fn send_to(&self, addr: &IpAddr, message: Message) -> bool {
        match self.peers.get(addr) {
            Some(handle) => handle.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Queue a message for every peer; returns how many accepted it
    pub fn broadcast(&self, message: &Message) -> usize {
        self.peers
            .values()
            .filter(|handle| handle.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Get number of connected peers
    pub fn connected_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_info(&self) -> Vec<PeerInfo> {
        let mut info: Vec<PeerInfo> = self
            .peers
            .iter()
            .map(|(addr, handle)| PeerInfo {
                addr: *addr,
                connection_id: handle.id,
                connected_secs: handle.connected_at.elapsed().as_secs(),
            })
            .collect();
        info.sort_by_key(|peer| peer.addr);
        info
    }
}

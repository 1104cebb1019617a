//! Spindle Core Library
//!
//! A minimal proof-of-work cryptocurrency node: a hash-linked chain of
//! account-based transfers, brute-force mining, and a gossip network that
//! keeps peers on the same chain.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod validation;
pub mod storage;
pub mod p2p;
pub mod mining;
pub mod wallet;
pub mod node;
pub mod rpc;

/// Protocol constants - fixed for the life of the chain
pub mod constants {
    use std::net::Ipv4Addr;

    /// Chain name
    pub const CHAIN_NAME: &str = "Spindle";

    /// Amount minted by every block reward
    pub const BLOCK_REWARD: u64 = 5000;

    /// Input of a block reward transaction
    pub const REWARD_INPUT: &str = "blockReward";

    /// Proof-of-work threshold: the leading 64 bits of the puzzle digest
    /// must exceed this value
    pub const DIFFICULTY: u64 = 0xFFFF_FF00_0000_0000;

    /// TCP port peers listen on
    pub const PEER_PORT: u16 = 31042;

    /// Multicast group for discovery announcements
    pub const DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

    /// UDP port for discovery announcements
    pub const DISCOVERY_PORT: u16 = 31042;

    /// Seconds between discovery announcements
    pub const BROADCAST_INTERVAL_SECS: u64 = 3;

    /// Payload of a discovery datagram
    pub const DISCOVERY_TOKEN: &[u8] = b"Spindlecoin";

    /// Maximum size of one wire message (4 MiB)
    pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

    /// Nonces tried between checks of the miner stop signal
    pub const CANCEL_POLL_INTERVAL: u64 = 4096;

    /// Seconds before an outbound dial is abandoned
    pub const DIAL_TIMEOUT_SECS: u64 = 5;

    /// Default port of the status RPC server
    pub const RPC_PORT: u16 = 31043;

    /// Default data directory
    pub const DATA_DIR: &str = "spindle-data";
}

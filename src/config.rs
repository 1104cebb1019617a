//! Node configuration
//!
//! Defaults come from [`crate::constants`]; every field can be overridden
//! from `SPINDLE_*` environment variables.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    BROADCAST_INTERVAL_SECS, DATA_DIR, DIAL_TIMEOUT_SECS, DIFFICULTY, DISCOVERY_GROUP,
    DISCOVERY_PORT, PEER_PORT, RPC_PORT,
};

const LISTEN_IP_KEY: &str = "SPINDLE_LISTEN_IP";
const PEER_PORT_KEY: &str = "SPINDLE_PEER_PORT";
const DISCOVERY_GROUP_KEY: &str = "SPINDLE_DISCOVERY_GROUP";
const DISCOVERY_PORT_KEY: &str = "SPINDLE_DISCOVERY_PORT";
const BROADCAST_INTERVAL_KEY: &str = "SPINDLE_BROADCAST_INTERVAL_SECS";
const DIAL_TIMEOUT_KEY: &str = "SPINDLE_DIAL_TIMEOUT_SECS";
const DIFFICULTY_KEY: &str = "SPINDLE_DIFFICULTY";
const DATA_DIR_KEY: &str = "SPINDLE_DATA_DIR";
const RPC_PORT_KEY: &str = "SPINDLE_RPC_PORT";
const MINE_KEY: &str = "SPINDLE_MINE";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Runtime settings of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub listen_ip: IpAddr,
    pub peer_port: u16,
    pub discovery_group: Ipv4Addr,
    pub discovery_port: u16,
    pub broadcast_interval: Duration,
    pub dial_timeout: Duration,
    pub difficulty: u64,
    pub data_dir: PathBuf,
    /// `None` disables the RPC server
    pub rpc_port: Option<u16>,
    pub mine: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            peer_port: PEER_PORT,
            discovery_group: DISCOVERY_GROUP,
            discovery_port: DISCOVERY_PORT,
            broadcast_interval: Duration::from_secs(BROADCAST_INTERVAL_SECS),
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
            difficulty: DIFFICULTY,
            data_dir: PathBuf::from(DATA_DIR),
            rpc_port: Some(RPC_PORT),
            mine: true,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ip) = parse(&lookup, LISTEN_IP_KEY)? {
            config.listen_ip = ip;
        }
        if let Some(port) = parse(&lookup, PEER_PORT_KEY)? {
            config.peer_port = port;
        }
        if let Some(group) = parse(&lookup, DISCOVERY_GROUP_KEY)? {
            config.discovery_group = group;
        }
        if let Some(port) = parse(&lookup, DISCOVERY_PORT_KEY)? {
            config.discovery_port = port;
        }
        if let Some(secs) = parse(&lookup, BROADCAST_INTERVAL_KEY)? {
            config.broadcast_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, DIAL_TIMEOUT_KEY)? {
            config.dial_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup(DIFFICULTY_KEY) {
            config.difficulty = parse_difficulty(&value).ok_or_else(|| invalid(DIFFICULTY_KEY, &value))?;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(RPC_PORT_KEY) {
            config.rpc_port = match value.as_str() {
                "" | "off" | "none" => None,
                port => Some(port.parse().map_err(|_| invalid(RPC_PORT_KEY, &value))?),
            };
        }
        if let Some(value) = lookup(MINE_KEY) {
            config.mine = parse_bool(&value).ok_or_else(|| invalid(MINE_KEY, &value))?;
        }

        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| invalid(key, &value)),
        None => Ok(None),
    }
}

/// Decimal or `0x`-prefixed hex
fn parse_difficulty(value: &str) -> Option<u64> {
    let value = value.trim().replace('_', "");
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

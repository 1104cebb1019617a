//! Peer discovery over UDP multicast
//!
//! Every node periodically announces itself to a multicast group and
//! listens on the same group. The source IP of each valid announcement is
//! a dial candidate; there are no seed nodes.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::NodeConfig;
use crate::constants::DISCOVERY_TOKEN;

/// Multicast announcer and listener
#[derive(Debug, Clone)]
pub struct Discovery {
    group: Ipv4Addr,
    port: u16,
    interval: Duration,
}

impl Discovery {
    pub fn new(group: Ipv4Addr, port: u16, interval: Duration) -> Self {
        Self {
            group,
            port,
            interval,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.discovery_group, config.discovery_port, config.broadcast_interval)
    }

    /// Check whether a datagram is a discovery announcement
    pub fn is_announcement(payload: &[u8]) -> bool {
        payload == DISCOVERY_TOKEN
    }

    /// Announce this node forever; send failures are logged and retried on
    /// the next tick
    pub async fn announce(&self) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_multicast_loop_v4(true)?;
        let target = SocketAddrV4::new(self.group, self.port);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = socket.send_to(DISCOVERY_TOKEN, target).await {
                warn!("Discovery announcement failed: {}", e);
            }
        }
    }

    /// Listen for announcements and forward each sender's IP.
    ///
    /// Returns once the receiving side of `candidates` is closed.
    pub async fn listen(&self, candidates: mpsc::UnboundedSender<IpAddr>) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port)).await?;
        socket.join_multicast_v4(self.group, Ipv4Addr::UNSPECIFIED)?;
        info!("Listening for peers on {}:{}", self.group, self.port);

        let mut buf = [0u8; 64];
        loop {
            let (len, source) = socket.recv_from(&mut buf).await?;
            if !Self::is_announcement(&buf[..len]) {
                debug!("Ignoring {} byte datagram from {}", len, source);
                continue;
            }
            if candidates.send(source.ip()).is_err() {
                return Ok(());
            }
        }
    }
}

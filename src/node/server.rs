//! TCP peer server
//!
//! Accepts inbound connections, dials discovered peers, and runs one
//! reader loop per connection. Connections whose two ends share an IP are
//! self-connections and are dropped on both sides. When two nodes end up
//! with two connections between them, both keep the one dialed by the
//! lower address.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::BufReader;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use super::{report_error, Node, NodeError};
use crate::p2p::{read_frame, spawn_writer, ConnectionId, Discovery, Message};

impl Node {
    /// Bind the configured peer port and serve forever
    pub async fn serve(self: Arc<Self>) -> io::Result<()> {
        let addr = SocketAddr::new(self.config.listen_ip, self.config.peer_port);
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for peers on {}", addr);
        self.serve_on(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Connection error: {}", e);
                    continue;
                }
            };

            let local = match stream.local_addr() {
                Ok(local) => local,
                Err(e) => {
                    warn!("Dropping connection from {}: {}", remote, e);
                    continue;
                }
            };
            if local.ip() == remote.ip() {
                debug!("Dropping inbound self-connection on {}", local.ip());
                continue;
            }

            if self.attach(stream, local.ip(), remote.ip(), false).await.is_some() {
                info!("Peer connected: {}", remote.ip());
            }
        }
    }

    /// Dial `ip` on the peer port.
    ///
    /// Returns `Ok(false)` when the dial reached ourselves; the local IP is
    /// learned and the connection dropped.
    pub async fn connect(self: &Arc<Self>, ip: IpAddr) -> Result<bool, NodeError> {
        let target = SocketAddr::new(ip, self.config.peer_port);
        let stream = tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("dial {} timed out", target)))??;

        let local = stream.local_addr()?;
        if local.ip() == ip {
            self.set_local_ip(ip).await;
            return Ok(false);
        }

        if self.attach(stream, local.ip(), ip, true).await.is_some() {
            info!("Connected to peer {}", ip);
            self.broadcast_latest_block().await?;
        }
        Ok(true)
    }

    /// Dial every candidate that passes [`Node::should_dial`], at most one
    /// dial per address at a time
    pub async fn dial_candidates(self: Arc<Self>, mut candidates: mpsc::UnboundedReceiver<IpAddr>) {
        while let Some(ip) = candidates.recv().await {
            if !self.begin_dial(ip).await {
                continue;
            }
            let node = Arc::clone(&self);
            tokio::spawn(async move {
                let result = node.connect(ip).await;
                node.end_dial(ip).await;
                match result {
                    Ok(_) => {}
                    Err(e) if e.store_error().is_some() => report_error("Failed to announce head", &e),
                    Err(e) => debug!("Could not dial {}: {}", ip, e),
                }
            });
        }
    }

    /// Announce ourselves, listen for others, and dial what we hear
    pub async fn run_discovery(self: Arc<Self>) -> io::Result<()> {
        let discovery = Discovery::from_config(&self.config);
        let (tx, rx) = mpsc::unbounded_channel();

        let announcer = discovery.clone();
        tokio::spawn(async move {
            if let Err(e) = announcer.announce().await {
                error!("Discovery announcer stopped: {}", e);
            }
        });
        tokio::spawn(Arc::clone(&self).dial_candidates(rx));

        discovery.listen(tx).await
    }

    /// Register a connection and start its reader and writer tasks.
    ///
    /// Returns `None` when the peer already has a connection that wins the
    /// tie-break; the new stream is dropped.
    async fn attach(
        self: &Arc<Self>,
        stream: TcpStream,
        local: IpAddr,
        remote: IpAddr,
        outbound: bool,
    ) -> Option<ConnectionId> {
        let mut peers = self.peers.lock().await;
        if peers.contains(&remote) && !keeps_new_connection(local, remote, outbound) {
            debug!("Dropping duplicate connection with {}", remote);
            return None;
        }

        let (read_half, write_half) = stream.into_split();
        let sender = spawn_writer(write_half, remote);
        let id = peers.register(remote, sender);
        drop(peers);

        let node = Arc::clone(self);
        tokio::spawn(async move { node.read_loop(read_half, remote, id).await });
        Some(id)
    }

    async fn read_loop(self: Arc<Self>, read_half: OwnedReadHalf, remote: IpAddr, id: ConnectionId) {
        let mut reader = BufReader::new(read_half);
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) if frame.is_empty() => {}
                Ok(Some(frame)) => match Message::from_line(&frame) {
                    Ok(message) => self.handle_message(remote, message).await,
                    Err(e) => warn!("Dropping message from {}: {}", remote, e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Read from {} failed: {}", remote, e);
                    break;
                }
            }
        }

        if self.peers.lock().await.remove(&remote, id) {
            info!("Peer disconnected: {}", remote);
        }
    }
}

/// Whether a second connection to `remote` replaces the registered one:
/// both ends keep the connection dialed by the lower address
fn keeps_new_connection(local: IpAddr, remote: IpAddr, outbound: bool) -> bool {
    let dialer = if outbound { local } else { remote };
    dialer == local.min(remote)
}

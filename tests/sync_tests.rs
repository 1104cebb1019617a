//! Chain synchronization between nodes
//!
//! Nodes are linked in-process: each side registers the other as a peer
//! whose queue is drained straight into the other node's message handler.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use spindle_core::config::NodeConfig;
use spindle_core::node::{MineOutcome, Node};
use spindle_core::storage::MemoryStore;
use spindle_core::wallet::KeyPair;
use tokio::sync::mpsc;

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

fn test_node() -> Arc<Node> {
    let config = NodeConfig {
        difficulty: 0,
        ..NodeConfig::default()
    };
    Arc::new(Node::new(config, Box::new(MemoryStore::new()), KeyPair::generate()))
}

/// Register `to` as a peer of `from`, delivering as if sent by `from_ip`
async fn pipe(from: &Arc<Node>, to: &Arc<Node>, from_ip: IpAddr, to_ip: IpAddr) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    from.peers().await.register(to_ip, tx);

    let to = Arc::clone(to);
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            to.handle_message(from_ip, message).await;
        }
    });
}

async fn link(a: &Arc<Node>, a_ip: IpAddr, b: &Arc<Node>, b_ip: IpAddr) {
    pipe(a, b, a_ip, b_ip).await;
    pipe(b, a, b_ip, a_ip).await;
}

async fn head(node: &Node) -> (u64, String) {
    let block = node.store().await.fetch_highest_block().unwrap();
    (block.height, block.hash_hex())
}

async fn wait_for_height(node: &Node, height: u64) {
    for _ in 0..200 {
        if head(node).await.0 >= height {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("node never reached height {}", height);
}

async fn mine(node: &Arc<Node>) {
    assert!(matches!(node.mine_next().await.unwrap(), MineOutcome::Mined(_)));
}

#[tokio::test]
async fn test_incomplete_chain_is_backfilled() {
    let a = test_node();
    let b = test_node();
    mine(&a).await;
    mine(&a).await;
    assert_eq!(head(&a).await.0, 2);

    link(&a, ip(1), &b, ip(2)).await;
    assert_eq!(a.broadcast_latest_block().await.unwrap(), 1);

    wait_for_height(&b, 2).await;
    assert_eq!(head(&a).await, head(&b).await);
    assert_eq!(b.store().await.block_count().unwrap(), 3);
}

#[tokio::test]
async fn test_mined_blocks_propagate() {
    let a = test_node();
    let b = test_node();
    link(&a, ip(1), &b, ip(2)).await;

    mine(&a).await;
    wait_for_height(&b, 1).await;
    assert_eq!(head(&a).await, head(&b).await);

    mine(&b).await;
    wait_for_height(&a, 2).await;
    assert_eq!(head(&a).await, head(&b).await);

    let a_address = a.address().to_string();
    assert_eq!(b.balance(&a_address).await.unwrap(), 5000);
}

#[tokio::test]
async fn test_relay_reaches_indirect_peers() {
    let a = test_node();
    let b = test_node();
    let c = test_node();
    link(&a, ip(1), &b, ip(2)).await;
    link(&b, ip(2), &c, ip(3)).await;

    mine(&a).await;
    mine(&a).await;

    wait_for_height(&c, 2).await;
    assert_eq!(head(&a).await, head(&c).await);
}

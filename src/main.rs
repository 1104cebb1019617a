//! Spindle Node
//!
//! Main entry point for running a Spindle node.

use std::sync::Arc;

use log::{error, info};
use spindle_core::config::NodeConfig;
use spindle_core::node::{GenesisInfo, Node};
use spindle_core::rpc::start_rpc_server;
use spindle_core::storage::SledStore;
use spindle_core::wallet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = NodeConfig::from_env()?;

    let genesis = GenesisInfo::new();
    info!("Genesis block {} (work 0x{:08x})", genesis.hash, genesis.work);

    let mut store = SledStore::open(&config.data_dir)?;
    let keypair = wallet::load_or_create(&mut store)?;
    info!("Node address {}", keypair.address());
    info!("Data directory {}", config.data_dir.display());

    let node = Arc::new(Node::new(config.clone(), Box::new(store), keypair));

    tokio::spawn({
        let node = Arc::clone(&node);
        async move {
            if let Err(e) = node.serve().await {
                error!("Peer server stopped: {}", e);
                std::process::exit(1);
            }
        }
    });

    tokio::spawn({
        let node = Arc::clone(&node);
        async move {
            if let Err(e) = node.run_discovery().await {
                error!("Discovery stopped: {}", e);
            }
        }
    });

    if let Some(port) = config.rpc_port {
        tokio::spawn({
            let node = Arc::clone(&node);
            async move {
                if let Err(e) = start_rpc_server(node, port).await {
                    error!("RPC server stopped: {}", e);
                }
            }
        });
    }

    if config.mine {
        info!("Mining to {}", node.address());
        tokio::spawn(Arc::clone(&node).run_miner());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping node...");
    node.miner().stop();

    Ok(())
}

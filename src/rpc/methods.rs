//! RPC Method Implementations
//!
//! Each method corresponds to a JSON-RPC call that external apps can make.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::CHAIN_NAME;
use crate::node::{report_error, report_store_error, Node, NodeError};
use crate::storage::StoreError;
use crate::validation::LedgerError;

const INVALID_PARAMS: i32 = -32602;
const METHOD_NOT_FOUND: i32 = -32601;
const INTERNAL_ERROR: i32 = -32603;
const NOT_FOUND: i32 = -5;
const INSUFFICIENT_FUNDS: i32 = -6;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    pub id: Value,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC Error
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

type MethodResult = Result<Value, (i32, String)>;

/// Process a JSON-RPC request and return a response
pub async fn handle_request(node: &Node, request: JsonRpcRequest) -> JsonRpcResponse {
    debug!("RPC {}", request.method);
    let params = request.params.unwrap_or(Value::Null);

    let result = match request.method.as_str() {
        "getblockcount" => get_block_count(node).await,
        "getbestblockhash" => get_best_block_hash(node).await,
        "getblock" => get_block(node, &params).await,
        "getbalance" => get_balance(node, &params).await,
        "getpeerinfo" => get_peer_info(node).await,
        "getinfo" => get_info(node).await,
        "getmineraddress" => Ok(json!(node.address())),
        "sendtoaddress" => send_to_address(node, &params).await,
        _ => Err((METHOD_NOT_FOUND, format!("Method not found: {}", request.method))),
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err((code, message)) => JsonRpcResponse::error(request.id, code, message),
    }
}

/// Positional parameter, also accepting a bare value for index 0
fn param(params: &Value, index: usize) -> Option<&Value> {
    match params {
        Value::Array(items) => items.get(index),
        Value::Null => None,
        other if index == 0 => Some(other),
        _ => None,
    }
}

fn string_param(params: &Value, index: usize, name: &str) -> Result<String, (i32, String)> {
    param(params, index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| (INVALID_PARAMS, format!("Invalid params: expected {}", name)))
}

fn internal(err: impl std::fmt::Display) -> (i32, String) {
    (INTERNAL_ERROR, err.to_string())
}

/// Internal error; a corrupt store ends the process instead
fn store_failure(err: StoreError) -> (i32, String) {
    report_store_error("RPC request failed", &err);
    internal(err)
}

fn node_failure(err: NodeError) -> (i32, String) {
    report_error("RPC request failed", &err);
    internal(err)
}

/// Returns the height of the canonical head
async fn get_block_count(node: &Node) -> MethodResult {
    let head = node.store().await.fetch_highest_block().map_err(store_failure)?;
    Ok(json!(head.height))
}

async fn get_best_block_hash(node: &Node) -> MethodResult {
    let head = node.store().await.fetch_highest_block().map_err(store_failure)?;
    Ok(json!(head.hash_hex()))
}

/// Returns full block data by hash
async fn get_block(node: &Node, params: &Value) -> MethodResult {
    let hash = string_param(params, 0, "block hash")?;
    let block = node
        .store()
        .await
        .fetch_block(&hash)
        .map_err(store_failure)?
        .ok_or_else(|| (NOT_FOUND, "Block not found".to_string()))?;

    Ok(json!({
        "hash": hash,
        "height": block.height,
        "previous": block.previous,
        "work": block.work,
        "tx_count": block.transactions.len(),
        "transactions": block.transactions,
    }))
}

/// Returns the confirmed balance of an address (the node's own by default)
async fn get_balance(node: &Node, params: &Value) -> MethodResult {
    let address = match param(params, 0) {
        Some(_) => string_param(params, 0, "address")?,
        None => node.address().to_string(),
    };
    let balance = node.balance(&address).await.map_err(node_failure)?;
    Ok(json!(balance))
}

async fn get_peer_info(node: &Node) -> MethodResult {
    serde_json::to_value(node.peer_info().await).map_err(internal)
}

/// Returns general node information
async fn get_info(node: &Node) -> MethodResult {
    let (head, blocks) = {
        let store = node.store().await;
        let head = store.fetch_highest_block().map_err(store_failure)?;
        (head, store.block_count().map_err(store_failure)?)
    };
    let peers = node.peers().await.connected_count();

    Ok(json!({
        "chain": CHAIN_NAME,
        "height": head.height,
        "best_block_hash": head.hash_hex(),
        "blocks": blocks,
        "peers": peers,
        "difficulty": format!("0x{:016x}", node.pow().difficulty()),
        "miner_address": node.address(),
        "pending_transactions": node.pending_transactions().await.len(),
    }))
}

/// Queues a signed transfer from the node wallet
async fn send_to_address(node: &Node, params: &Value) -> MethodResult {
    let to = string_param(params, 0, "address")?;
    let amount = param(params, 1)
        .and_then(Value::as_u64)
        .ok_or_else(|| (INVALID_PARAMS, "Invalid params: expected amount".to_string()))?;

    match node.submit_transaction(&to, amount).await {
        Ok(tx) => Ok(json!(tx.hash_hex())),
        Err(NodeError::Ledger(e @ LedgerError::InsufficientBalance { .. })) => {
            Err((INSUFFICIENT_FUNDS, e.to_string()))
        }
        Err(e @ (NodeError::InvalidAddress(_) | NodeError::ZeroAmount)) => Err((INVALID_PARAMS, e.to_string())),
        Err(e) => Err(node_failure(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::node::genesis_block;
    use crate::storage::MemoryStore;
    use crate::wallet::KeyPair;
    use std::sync::Arc;

    fn test_node() -> Arc<Node> {
        let config = NodeConfig {
            difficulty: 0,
            ..NodeConfig::default()
        };
        Arc::new(Node::new(config, Box::new(MemoryStore::new()), KeyPair::generate()))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: Some(params),
            id: json!(1),
        }
    }

    async fn call(node: &Node, method: &str, params: Value) -> JsonRpcResponse {
        handle_request(node, request(method, params)).await
    }

    #[tokio::test]
    async fn test_chain_queries() {
        let node = test_node();
        let genesis = genesis_block().hash_hex();

        assert_eq!(call(&node, "getblockcount", Value::Null).await.result, Some(json!(0)));
        assert_eq!(call(&node, "getbestblockhash", Value::Null).await.result, Some(json!(genesis)));

        let block = call(&node, "getblock", json!([genesis])).await.result.unwrap();
        assert_eq!(block["height"], 0);
        assert_eq!(block["tx_count"], 0);

        let missing = call(&node, "getblock", json!(["ff"])).await;
        assert_eq!(missing.error.unwrap().code, NOT_FOUND);
    }

    #[tokio::test]
    async fn test_balance_and_send() {
        let node = test_node();
        node.mine_next().await.unwrap();

        assert_eq!(call(&node, "getbalance", Value::Null).await.result, Some(json!(5000)));

        let to = "ef".repeat(32);
        let sent = call(&node, "sendtoaddress", json!([to, 10])).await;
        assert!(sent.error.is_none());

        let too_much = call(&node, "sendtoaddress", json!([to, 1_000_000])).await;
        assert_eq!(too_much.error.unwrap().code, INSUFFICIENT_FUNDS);

        let info = call(&node, "getinfo", Value::Null).await.result.unwrap();
        assert_eq!(info["pending_transactions"], 1);
        assert_eq!(info["height"], 1);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let node = test_node();
        let response = call(&node, "getnewaddress", Value::Null).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_miner_address_and_peers() {
        let node = test_node();
        let address = call(&node, "getmineraddress", Value::Null).await.result.unwrap();
        assert_eq!(address, json!(node.address()));
        assert_eq!(call(&node, "getpeerinfo", Value::Null).await.result, Some(json!([])));
    }
}

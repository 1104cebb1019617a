//! JSON-RPC API Module
//!
//! Read-mostly HTTP interface for querying a running node.

mod methods;
mod server;

pub use methods::*;
pub use server::*;

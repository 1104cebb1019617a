//! P2P networking module - Peer registry, wire protocol, and discovery

mod discovery;
mod peer;
mod protocol;
mod transport;

pub use discovery::*;
pub use peer::*;
pub use protocol::*;
pub use transport::*;

//! Peer nodes for the file ledger: chain gossip, the file-transfer wire
//! protocol, bootstrap and the HTTP surface.

pub mod api;
pub mod config;
mod constants;
pub mod directory;
pub mod error;
pub mod network;
pub mod node;
pub mod protocol;
mod server;
pub mod shared_chain;
mod transfer;

pub use config::NodeConfig;
pub use directory::{PeerDirectory, StaticDirectory};
pub use error::{NodeError, Result};
pub use network::{Network, Notification};
pub use node::{ChainView, NodeSummary, PeerLink, PeerNode};
pub use shared_chain::SharedChain;

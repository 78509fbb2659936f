//! ferry-core — wire format, node configuration, and the peer directory.
//! The transport and daemon crates both build on this one.

pub mod config;
pub mod peer;
pub mod wire;

pub use config::NodeConfig;
pub use peer::{PeerDirectory, PeerInfo};

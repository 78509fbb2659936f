//! Peer directory — which peer advertises which file.
//!
//! The directory is built once from the config document and never mutated
//! afterwards; lookups are a linear scan over a small static table. The
//! contract is first match wins, with case-sensitive exact filename
//! comparison.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::config::NodeConfig;

/// One directory entry: a peer's address and its advertised catalog.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub hostname: String,
    /// The peer's UDP port — its transport-level identity, since all peers
    /// in a deployment share one host address.
    pub port: u16,
    pub content_info: Vec<String>,
}

impl PeerInfo {
    /// Exact, case-sensitive catalog membership.
    pub fn has_file(&self, filename: &str) -> bool {
        self.content_info.iter().any(|f| f == filename)
    }

    /// The peer's socket address.
    pub fn socket_addr(&self) -> io::Result<SocketAddr> {
        resolve_addr(&self.hostname, self.port)
    }
}

/// Resolve a hostname/port pair. "localhost" pins to the IPv4 loopback so a
/// node bound on 127.0.0.1 and its peers always agree on an address family.
pub fn resolve_addr(hostname: &str, port: u16) -> io::Result<SocketAddr> {
    if hostname == "localhost" {
        return Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)));
    }
    (hostname, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {hostname}"),
            )
        })
}

/// Read-only-after-load table of every known peer.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    peers: Vec<PeerInfo>,
}

impl PeerDirectory {
    pub fn from_config(config: &NodeConfig) -> Self {
        let peers = config
            .peer_info
            .iter()
            .map(|p| PeerInfo {
                hostname: p.hostname.clone(),
                port: p.port,
                content_info: p.content_info.clone(),
            })
            .collect();
        Self { peers }
    }

    /// Find the first peer advertising `filename`. Not-found is an ordinary
    /// outcome reported to the operator, never an error.
    pub fn find_holder(&self, filename: &str) -> Option<&PeerInfo> {
        self.peers.iter().find(|p| p.has_file(filename))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> PeerDirectory {
        PeerDirectory {
            peers: vec![
                PeerInfo {
                    hostname: "localhost".into(),
                    port: 9001,
                    content_info: vec!["shared.txt".into(), "first.bin".into()],
                },
                PeerInfo {
                    hostname: "localhost".into(),
                    port: 9002,
                    content_info: vec!["shared.txt".into(), "second.bin".into()],
                },
            ],
        }
    }

    #[test]
    fn first_match_wins() {
        let dir = directory();
        assert_eq!(dir.find_holder("shared.txt").unwrap().port, 9001);
        assert_eq!(dir.find_holder("second.bin").unwrap().port, 9002);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let dir = directory();
        assert!(dir.find_holder("Shared.txt").is_none());
        assert!(dir.find_holder("SHARED.TXT").is_none());
    }

    #[test]
    fn unknown_file_is_not_found() {
        assert!(directory().find_holder("missing.dat").is_none());
    }

    #[test]
    fn localhost_pins_to_ipv4_loopback() {
        let addr = resolve_addr("localhost", 9001).unwrap();
        assert_eq!(addr, "127.0.0.1:9001".parse().unwrap());
    }
}

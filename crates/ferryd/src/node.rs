//! Shared node state — socket link, peer directory, role flag, shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use ferry_core::{NodeConfig, PeerDirectory};
use ferry_transport::Link;

/// Which transport role may drive the socket. The server activity only
/// receives while the flag reads `Server`; the client activity switches to
/// `Client` for the duration of one outgoing transfer and restores `Server`
/// when it finishes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    Server = 0,
    Client = 1,
}

/// Process-wide node state, shared by the three activities.
pub struct Node {
    config: NodeConfig,
    /// Directory the config file lives in. Served files are read from here
    /// and received files are written beside it.
    base_dir: PathBuf,
    directory: PeerDirectory,
    link: Link,
    role: AtomicU8,
    shutdown_tx: broadcast::Sender<()>,
}

impl Node {
    pub fn new(config: NodeConfig, config_path: &Path, socket: UdpSocket) -> Arc<Self> {
        let base_dir = match config_path.parent() {
            Some(dir) if dir != Path::new("") => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let directory = PeerDirectory::from_config(&config);
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            base_dir,
            directory,
            link: Link::new(socket),
            role: AtomicU8::new(Role::Server as u8),
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn role(&self) -> Role {
        match self.role.load(Ordering::SeqCst) {
            0 => Role::Server,
            _ => Role::Client,
        }
    }

    pub fn set_role(&self, role: Role) {
        self.role.store(role as u8, Ordering::SeqCst);
    }

    /// Ask every activity to stop. Loops observe the flag between
    /// iterations; blocking waits are woken through the broadcast.
    pub fn request_shutdown(&self) {
        self.link.request_shutdown();
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown(&self) -> bool {
        self.link.is_shutdown()
    }

    /// Resolves when shutdown has been requested. Safe against the request
    /// landing before the wait starts: the flag is checked after
    /// subscribing.
    pub async fn shutdown_notified(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }
}

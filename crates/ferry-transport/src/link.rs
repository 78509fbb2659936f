//! Shared-socket discipline.
//!
//! A node drives one UDP socket from both transport roles. Every send and
//! receive goes through [`Link`], which takes an exclusive section for the
//! duration of the call so server-role and client-role activity never
//! interleave individual socket operations. Multi-step exchanges that must
//! not be interleaved at all (the client handshake) take the section once
//! via [`Link::exclusive`] and hold it across the exchange.
//!
//! The cooperative shutdown flag lives here too: transfer loops check it
//! between frames, and every receive is bounded so the check is prompt.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

pub struct Link {
    socket: UdpSocket,
    io_lock: Mutex<()>,
    shutdown: AtomicBool,
}

impl Link {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            io_lock: Mutex::new(()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one datagram under a short-lived exclusive section.
    pub async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> std::io::Result<usize> {
        self.exclusive().await.send_to(buf, dest).await
    }

    /// Bounded receive under a short-lived exclusive section.
    /// `Ok(None)` means nothing arrived within `wait`.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        wait: Duration,
    ) -> std::io::Result<Option<(usize, SocketAddr)>> {
        self.exclusive().await.recv_from(buf, wait).await
    }

    /// Take the socket's exclusive section for a multi-step exchange.
    pub async fn exclusive(&self) -> LinkGuard<'_> {
        LinkGuard {
            socket: &self.socket,
            _io: self.io_lock.lock().await,
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Holder of the socket's exclusive section.
pub struct LinkGuard<'a> {
    socket: &'a UdpSocket,
    _io: MutexGuard<'a, ()>,
}

impl LinkGuard<'_> {
    pub async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(buf, dest).await
    }

    /// Bounded receive. `Ok(None)` means the wait elapsed with no datagram.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        wait: Duration,
    ) -> std::io::Result<Option<(usize, SocketAddr)>> {
        match timeout(wait, self.socket.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}

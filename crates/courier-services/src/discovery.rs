//! Port-range discovery for services on a LAN host.
//!
//! Self-hosted services such as the download client or the search proxy move
//! between ports when their containers restart. A [`PortRange`] describes
//! where to look; [`open_ports`] lists the ports that accept TCP, and the
//! client then probes each candidate with a protocol-level check.

use std::sync::Mutex;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Connect timeout per candidate port.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Inclusive port range on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRange {
    pub host: String,
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn new(host: impl Into<String>, from: u16, to: u16) -> Self {
        Self {
            host: host.into(),
            from,
            to,
        }
    }

    /// A range holding a single port.
    pub fn single(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, port)
    }
}

/// Ports in `range` that accept a TCP connection, in ascending order.
pub async fn open_ports(range: &PortRange) -> Vec<u16> {
    let mut open = Vec::new();
    for port in range.from..=range.to {
        let addr = format!("{}:{}", range.host, port);
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => open.push(port),
            Ok(Err(e)) => debug!(addr = %addr, error = %e, "port closed"),
            Err(_) => debug!(addr = %addr, "port probe timed out"),
        }
    }
    open
}

/// Last endpoint that answered, shared by concurrent callers.
#[derive(Debug, Default)]
pub struct EndpointCache {
    current: Mutex<Option<String>>,
}

impl EndpointCache {
    pub fn get(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, endpoint: impl Into<String>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(endpoint.into());
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

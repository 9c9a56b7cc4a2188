//! Transmission RPC client.
//!
//! The daemon is found by scanning a port range on its host. Every call goes
//! through the `X-Transmission-Session-Id` handshake: a 409 answer carries the
//! session id to repeat the request with.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::discovery::{open_ports, EndpointCache, PortRange};
use crate::error::{Result, ServiceError};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// A torrent download daemon.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Queues a magnet link.
    async fn add_magnet(&self, uri: &str) -> Result<AddedTorrent>;

    /// Removes a torrent, keeping its data.
    async fn remove(&self, id: i64) -> Result<()>;

    /// All torrents known to the daemon.
    async fn list(&self) -> Result<Vec<TorrentStatus>>;
}

/// Lifecycle state reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum TorrentState {
    Stopped,
    QueuedToVerify,
    Verifying,
    QueuedToDownload,
    Downloading,
    QueuedToSeed,
    Seeding,
    Unknown(i64),
}

impl From<i64> for TorrentState {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::QueuedToVerify,
            2 => Self::Verifying,
            3 => Self::QueuedToDownload,
            4 => Self::Downloading,
            5 => Self::QueuedToSeed,
            6 => Self::Seeding,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::QueuedToVerify => write!(f, "waiting to check files"),
            Self::Verifying => write!(f, "checking files"),
            Self::QueuedToDownload => write!(f, "waiting to download"),
            Self::Downloading => write!(f, "downloading"),
            Self::QueuedToSeed => write!(f, "waiting to seed"),
            Self::Seeding => write!(f, "seeding"),
            Self::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// One torrent as listed by the daemon.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TorrentStatus {
    pub id: i64,
    pub name: String,
    /// Progress between 0.0 and 1.0.
    #[serde(rename = "percentDone")]
    pub percent_done: f64,
    pub status: TorrentState,
}

/// Identity of a torrent accepted by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddedTorrent {
    pub id: i64,
    pub name: String,
}

/// Renders the torrent list, downloading torrents last.
pub fn format_torrent_list(mut torrents: Vec<TorrentStatus>) -> String {
    if torrents.is_empty() {
        return "No torrents found".to_string();
    }
    torrents.sort_by_key(|t| t.status == TorrentState::Downloading);
    torrents
        .iter()
        .map(|t| {
            format!(
                "{}, {:.1}%, {}, /delete_{}\n",
                t.name,
                t.percent_done * 100.0,
                t.status,
                t.id
            )
        })
        .collect()
}

#[derive(Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

/// Transmission daemon reached through port-range discovery.
pub struct Transmission {
    range: PortRange,
    client: reqwest::Client,
    endpoint: EndpointCache,
    session_id: Mutex<Option<String>>,
}

impl Transmission {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            client: reqwest::Client::new(),
            endpoint: EndpointCache::default(),
            session_id: Mutex::new(None),
        }
    }

    fn rpc_url(&self, port: u16) -> String {
        format!("http://{}:{}/transmission/rpc", self.range.host, port)
    }

    fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sends one RPC call, repeating it once after a session-id refresh.
    async fn call(&self, endpoint: &str, method: &str, arguments: Value) -> Result<Value> {
        let body = json!({ "method": method, "arguments": arguments });

        for _ in 0..2 {
            let mut request = self.client.post(endpoint).json(&body);
            if let Some(session_id) = self.session_id() {
                request = request.header(SESSION_HEADER, session_id);
            }
            let response = request.send().await?;

            if response.status() == reqwest::StatusCode::CONFLICT {
                let fresh = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                debug!(endpoint = %endpoint, "refreshing transmission session id");
                *self.session_id.lock().unwrap_or_else(|e| e.into_inner()) = fresh;
                continue;
            }
            if !response.status().is_success() {
                return Err(ServiceError::status("transmission", response.status()));
            }

            let reply: RpcResponse = response.json().await?;
            if reply.result != "success" {
                return Err(ServiceError::Rpc(reply.result));
            }
            return Ok(reply.arguments);
        }

        Err(ServiceError::Rpc("session id handshake failed".to_string()))
    }

    async fn probe(&self, endpoint: &str) -> Result<()> {
        let session = self
            .call(
                endpoint,
                "session-get",
                json!({ "fields": ["rpc-version", "version"] }),
            )
            .await?;
        debug!(
            endpoint = %endpoint,
            rpc_version = %session["rpc-version"],
            version = %session["version"],
            "transmission answered"
        );
        Ok(())
    }

    /// Returns a working RPC endpoint, rediscovering it if the cached one died.
    pub async fn connect(&self) -> Result<String> {
        if let Some(endpoint) = self.endpoint.get() {
            match self.probe(&endpoint).await {
                Ok(()) => return Ok(endpoint),
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "transmission endpoint lost");
                    self.endpoint.clear();
                }
            }
        }

        for port in open_ports(&self.range).await {
            let endpoint = self.rpc_url(port);
            match self.probe(&endpoint).await {
                Ok(()) => {
                    info!(endpoint = %endpoint, "transmission discovered");
                    self.endpoint.set(endpoint.clone());
                    return Ok(endpoint);
                }
                Err(e) => debug!(endpoint = %endpoint, error = %e, "not transmission"),
            }
        }

        Err(ServiceError::Unreachable {
            service: "transmission",
            host: self.range.host.clone(),
            from: self.range.from,
            to: self.range.to,
        })
    }
}

#[async_trait]
impl DownloadClient for Transmission {
    async fn add_magnet(&self, uri: &str) -> Result<AddedTorrent> {
        let endpoint = self.connect().await?;
        let mut arguments = self
            .call(&endpoint, "torrent-add", json!({ "filename": uri }))
            .await?;

        let added = ["torrent-added", "torrent-duplicate"]
            .iter()
            .find_map(|key| arguments.get_mut(*key).map(Value::take))
            .ok_or_else(|| ServiceError::Rpc("torrent-add returned no torrent".to_string()))?;
        let added: AddedTorrent = serde_json::from_value(added)?;
        info!(id = added.id, name = %added.name, "torrent added");
        Ok(added)
    }

    async fn remove(&self, id: i64) -> Result<()> {
        let endpoint = self.connect().await?;
        self.call(&endpoint, "torrent-remove", json!({ "ids": [id] }))
            .await?;
        info!(id, "torrent removed");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TorrentStatus>> {
        let endpoint = self.connect().await?;
        let mut arguments = self
            .call(
                &endpoint,
                "torrent-get",
                json!({ "fields": ["id", "name", "percentDone", "status"] }),
            )
            .await?;
        let torrents = arguments
            .get_mut("torrents")
            .map(Value::take)
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let torrents = serde_json::from_value(torrents)?;
        Ok(torrents)
    }
}

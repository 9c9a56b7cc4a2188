//! Jackett search proxy client.
//!
//! Jackett aggregates many trackers behind one API. It is the fallback when
//! the primary tracker search finds nothing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::discovery::{open_ports, EndpointCache, PortRange};
use crate::error::{Result, ServiceError};
use crate::fetch;

const RESULTS_PATH: &str = "/api/v2.0/indexers/all/results";
const CONFIG_PATH: &str = "/api/v2.0/server/config";

/// A secondary search backend.
#[async_trait]
pub trait ProxySearch: Send + Sync {
    /// Searches every configured indexer.
    async fn search(&self, query: &str) -> Result<Vec<ProxyResult>>;

    /// Downloads the `.torrent` behind a result link.
    async fn fetch(&self, link: &str) -> Result<Vec<u8>>;
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyResult {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    /// Size in bytes.
    #[serde(default, deserialize_with = "nullable")]
    pub size: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub seeders: u64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub magnet_uri: Option<String>,
    #[serde(default, deserialize_with = "publish_date")]
    pub publish_date: Option<DateTime<Utc>>,
}

impl ProxyResult {
    pub fn magnet(&self) -> Option<&str> {
        self.magnet_uri.as_deref().filter(|s| !s.is_empty())
    }

    pub fn torrent_link(&self) -> Option<&str> {
        self.link.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(rename = "Results", default)]
    results: Vec<ProxyResult>,
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Jackett dates come with or without an offset; the zero date means unknown.
fn publish_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_publish_date))
}

fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.starts_with("0001-01-01") {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Jackett instance reached through port-range discovery.
pub struct Jackett {
    range: PortRange,
    api_key: String,
    client: reqwest::Client,
    endpoint: EndpointCache,
}

impl Jackett {
    pub fn new(range: PortRange, api_key: impl Into<String>) -> Self {
        Self {
            range,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            endpoint: EndpointCache::default(),
        }
    }

    /// Jackett identifies itself with the Kestrel server header.
    async fn ping(&self, base: &str) -> Result<()> {
        let mut url = url::Url::parse(base)?.join(CONFIG_PATH)?;
        url.query_pairs_mut().append_pair("apikey", &self.api_key);

        let response = self.client.get(url).send().await?;
        let server = response
            .headers()
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if server != "Kestrel" {
            return Err(ServiceError::Unrecognized {
                service: "jackett",
                detail: format!("server header {:?}", server),
            });
        }
        Ok(())
    }

    /// Returns a working base URL, rediscovering it if the cached one died.
    pub async fn connect(&self) -> Result<String> {
        if let Some(base) = self.endpoint.get() {
            if self.ping(&base).await.is_ok() {
                return Ok(base);
            }
            self.endpoint.clear();
        }

        for port in open_ports(&self.range).await {
            let base = format!("http://{}:{}", self.range.host, port);
            match self.ping(&base).await {
                Ok(()) => {
                    info!(endpoint = %base, "jackett discovered");
                    self.endpoint.set(base.clone());
                    return Ok(base);
                }
                Err(e) => debug!(endpoint = %base, error = %e, "not jackett"),
            }
        }

        Err(ServiceError::Unreachable {
            service: "jackett",
            host: self.range.host.clone(),
            from: self.range.from,
            to: self.range.to,
        })
    }
}

#[async_trait]
impl ProxySearch for Jackett {
    async fn search(&self, query: &str) -> Result<Vec<ProxyResult>> {
        let base = self.connect().await?;
        let mut url = url::Url::parse(&base)?.join(RESULTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("Query", query);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::status("jackett", response.status()));
        }
        let body: FetchResponse = response.json().await?;
        info!(query = %query, results = body.results.len(), "jackett search");
        Ok(body.results)
    }

    async fn fetch(&self, link: &str) -> Result<Vec<u8>> {
        fetch::download(&self.client, link).await
    }
}

//! Saved-search bookmarks backed by kvdb.io.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, ServiceError};

/// Public kvdb.io endpoint.
pub const KVDB_URL: &str = "https://kvdb.io";

/// A remote key-value store holding saved searches.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All stored keys.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Removes `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// kvdb.io bucket client.
#[derive(Debug, Clone)]
pub struct Kvdb {
    base_url: String,
    bucket: String,
    client: reqwest::Client,
}

impl Kvdb {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_base_url(KVDB_URL, bucket)
    }

    pub fn with_base_url(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Bucket name, or an error when no token was configured.
    fn bucket(&self) -> Result<&str> {
        if self.bucket.is_empty() {
            return Err(ServiceError::NotConfigured("kvdb token"));
        }
        Ok(&self.bucket)
    }

    fn key_url(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}/{}", self.base_url, self.bucket()?, key))
    }
}

#[async_trait]
impl BookmarkStore for Kvdb {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let response = self
            .client
            .post(self.key_url(key)?)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::status("kvdb", response.status()));
        }
        info!(key = %key, "bookmark saved");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let url = format!("{}/{}/?values=true&format=json", self.base_url, self.bucket()?);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::status("kvdb", response.status()));
        }

        let pairs: Vec<Vec<Value>> = response.json().await?;
        let keys: Vec<String> = pairs
            .into_iter()
            .filter_map(|pair| match pair.into_iter().next()? {
                Value::String(key) => Some(key),
                other => Some(other.to_string()),
            })
            .collect();
        debug!(count = keys.len(), "listed bookmarks");
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self.client.delete(self.key_url(key)?).send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::status("kvdb", response.status()));
        }
        info!(key = %key, "bookmark deleted");
        Ok(())
    }
}

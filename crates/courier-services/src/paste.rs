//! paste.rs client used as the fault-report sink.

use async_trait::async_trait;
use courier_core::{CoreError, PasteSink};
use tracing::debug;

use crate::error::{Result, ServiceError};

/// Public paste.rs endpoint.
pub const PASTE_RS_URL: &str = "https://paste.rs/";

/// Publishes text to paste.rs and returns the paste URL.
#[derive(Debug, Clone)]
pub struct PasteRs {
    endpoint: String,
    client: reqwest::Client,
}

impl PasteRs {
    pub fn new() -> Self {
        Self::with_endpoint(PASTE_RS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Uploads `text`. A complete (201) or partial (206) paste both count.
    pub async fn upload(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(text.to_string())
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 201 && status != 206 {
            return Err(ServiceError::status("paste.rs", response.status()));
        }

        let url = response.text().await?.trim_matches('\n').to_string();
        debug!(url = %url, partial = status == 206, "published paste");
        Ok(url)
    }
}

impl Default for PasteRs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PasteSink for PasteRs {
    async fn publish(&self, text: &str) -> courier_core::Result<String> {
        self.upload(text)
            .await
            .map_err(|e| CoreError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_returns_trimmed_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body("boom at main.rs:1")
            .with_status(201)
            .with_body("https://paste.rs/Xyz\n")
            .create_async()
            .await;

        let sink = PasteRs::with_endpoint(format!("{}/", server.url()));
        let url = sink.publish("boom at main.rs:1").await.unwrap();

        assert_eq!(url, "https://paste.rs/Xyz");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_partial_paste_accepted() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(206)
            .with_body("https://paste.rs/part")
            .create_async()
            .await;

        let sink = PasteRs::with_endpoint(format!("{}/", server.url()));
        assert_eq!(sink.upload("x").await.unwrap(), "https://paste.rs/part");
    }

    #[tokio::test]
    async fn test_other_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("https://paste.rs/nope")
            .create_async()
            .await;

        let sink = PasteRs::with_endpoint(format!("{}/", server.url()));
        let err = sink.upload("x").await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 200, .. }));
        assert!(matches!(sink.publish("x").await, Err(CoreError::Sink(_))));
    }
}

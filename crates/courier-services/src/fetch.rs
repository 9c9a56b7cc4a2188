//! Plain file downloads.

use std::path::Path;

use tracing::info;

use crate::error::{Result, ServiceError};

/// Downloads `url` into memory. Anything but 200 is an error.
pub async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(ServiceError::status("download", response.status()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Downloads `url` and writes it to `destination`.
pub async fn download_to(client: &reqwest::Client, url: &str, destination: &Path) -> Result<()> {
    let bytes = download(client, url).await?;
    tokio::fs::write(destination, &bytes).await?;
    info!(
        destination = %destination.display(),
        bytes = bytes.len(),
        "saved download"
    );
    Ok(())
}

/// Replaces every character that is not a letter or digit with `_`.
pub fn safe_file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("Dune: Part Two (2024)"), "Dune__Part_Two__2024_");
        assert_eq!(safe_file_stem("Фильм 1"), "Фильм_1");
    }

    #[tokio::test]
    async fn test_download_to_writes_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/file.torrent")
            .with_status(200)
            .with_body("d4:infod4:name1:xee")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("x.torrent");
        download_to(
            &reqwest::Client::new(),
            &format!("{}/file.torrent", server.url()),
            &destination,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"d4:infod4:name1:xee");
    }

    #[tokio::test]
    async fn test_download_rejects_non_ok() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let err = download(&reqwest::Client::new(), &format!("{}/missing", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 404, .. }));
    }
}

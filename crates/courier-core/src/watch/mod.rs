//! Watched folders.
//!
//! A [`WatchedFolder`] remembers every entry it has ever seen in a monitored
//! location and blocks its caller until something new shows up. It is how a
//! handler learns that the download client picked up a `.torrent` file or
//! finished a download.
//!
//! Entries are identified by file name, except `.torrent` files whose
//! metainfo carries a title: those are identified by the title, so the same
//! torrent matches between the active and finished folders.
//!
//! The seen set only grows. An entry that disappears and comes back under the
//! same identity is not reported again.

pub mod metainfo;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::WatchError;

pub use metainfo::torrent_title;

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A monitored collection of named entries.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Human-readable location, for logs and errors.
    fn location(&self) -> String;

    /// Current entry identities.
    async fn list(&self) -> std::io::Result<Vec<String>>;
}

/// Entries of one directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
}

impl DirectorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn identity(path: &Path, file_name: String) -> String {
        let is_torrent = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("torrent"));
        if !is_torrent {
            return file_name;
        }
        match tokio::fs::read(path).await {
            Ok(data) => torrent_title(&data).unwrap_or(file_name),
            Err(_) => file_name,
        }
    }
}

#[async_trait]
impl EntrySource for DirectorySource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn list(&self) -> std::io::Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::identity(&entry.path(), file_name).await);
        }
        entries.sort();
        Ok(entries)
    }
}

/// A monitored location plus the identities already observed in it.
///
/// Waiting takes `&mut self`, so one folder instance serves one waiter at a time.
pub struct WatchedFolder<S = DirectorySource> {
    source: S,
    seen: HashSet<String>,
    poll_interval: Duration,
}

impl WatchedFolder<DirectorySource> {
    /// Opens a directory and records everything already in it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        Self::with_source(DirectorySource::new(path)).await
    }
}

impl<S: EntrySource> WatchedFolder<S> {
    /// Wraps a source and records its current entries as seen.
    pub async fn with_source(source: S) -> Result<Self, WatchError> {
        let seen: HashSet<String> = scan(&source).await?.into_iter().collect();
        info!(location = %source.location(), entries = seen.len(), "watching folder");
        Ok(Self {
            source,
            seen,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the pause between polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Identities observed so far.
    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Polls up to `max_polls` times for an entry not seen before.
    ///
    /// The first new identity is recorded and returned. Other new entries found
    /// in the same poll are left for the next call.
    pub async fn wait_for_new_entry(&mut self, max_polls: u32) -> Result<String, WatchError> {
        for poll in 0..max_polls {
            for entry in scan(&self.source).await? {
                if !self.seen.contains(&entry) {
                    info!(location = %self.source.location(), entry = %entry, "new entry");
                    self.seen.insert(entry.clone());
                    return Ok(entry);
                }
            }
            debug!(location = %self.source.location(), poll, "no new entry yet");
            sleep(self.poll_interval).await;
        }
        Err(WatchError::Timeout { polls: max_polls })
    }
}

async fn scan<S: EntrySource>(source: &S) -> Result<Vec<String>, WatchError> {
    source.list().await.map_err(|e| WatchError::Scan {
        path: source.location(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// In-memory source counting how often it was listed.
    #[derive(Clone, Default)]
    struct MemorySource {
        entries: Arc<Mutex<Vec<String>>>,
        polls: Arc<AtomicU32>,
    }

    impl MemorySource {
        fn with(entries: &[&str]) -> Self {
            let source = Self::default();
            source.set(entries);
            source
        }

        fn set(&self, entries: &[&str]) {
            *self.entries.lock().unwrap() = entries.iter().map(|s| s.to_string()).collect();
        }
    }

    #[async_trait]
    impl EntrySource for MemorySource {
        fn location(&self) -> String {
            "memory".to_string()
        }

        async fn list(&self) -> std::io::Result<Vec<String>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_unchanged_folder() {
        let source = MemorySource::with(&["a", "b"]);
        let mut folder = WatchedFolder::with_source(source.clone()).await.unwrap();
        source.polls.store(0, Ordering::SeqCst);

        let started = Instant::now();
        let err = folder.wait_for_new_entry(3).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, WatchError::Timeout { polls: 3 }));
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed <= Duration::from_secs(3) + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detects_new_entry() {
        let source = MemorySource::with(&["old"]);
        let mut folder = WatchedFolder::with_source(source.clone()).await.unwrap();

        let writer = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            writer.set(&["old", "new"]);
        });

        assert_eq!(folder.wait_for_new_entry(10).await.unwrap(), "new");
        assert!(folder.seen().contains("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reappearing_entry_is_not_new() {
        let source = MemorySource::with(&["movie"]);
        let mut folder = WatchedFolder::with_source(source.clone()).await.unwrap();

        source.set(&[]);
        assert!(folder.wait_for_new_entry(2).await.is_err());
        assert!(folder.seen().contains("movie"));

        source.set(&["movie"]);
        assert!(folder.wait_for_new_entry(2).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_one_entry_per_call() {
        let source = MemorySource::with(&[]);
        let mut folder = WatchedFolder::with_source(source.clone()).await.unwrap();
        source.set(&["x", "y"]);

        assert_eq!(folder.wait_for_new_entry(1).await.unwrap(), "x");
        assert_eq!(folder.wait_for_new_entry(1).await.unwrap(), "y");
        assert!(folder.wait_for_new_entry(1).await.is_err());
    }

    #[tokio::test]
    async fn test_directory_seed_has_no_blank_names() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("two.mkv"), b"y").unwrap();

        let folder = WatchedFolder::open(dir.path()).await.unwrap();
        assert_eq!(folder.seen().len(), 2);
        assert!(!folder.seen().contains(""));
    }

    #[tokio::test]
    async fn test_directory_uses_torrent_title() {
        let dir = TempDir::new().unwrap();
        let mut folder = WatchedFolder::open(dir.path())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        std::fs::write(
            dir.path().join("12345.torrent"),
            b"d4:infod6:lengthi1e4:name10:Alien.1979ee",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.torrent"), b"garbage").unwrap();

        let mut found = vec![
            folder.wait_for_new_entry(5).await.unwrap(),
            folder.wait_for_new_entry(5).await.unwrap(),
        ];
        found.sort();
        assert_eq!(found, vec!["Alien.1979", "broken.torrent"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_scan_error() {
        let dir = TempDir::new().unwrap();
        let err = WatchedFolder::open(dir.path().join("absent")).await.err().unwrap();
        assert!(matches!(err, WatchError::Scan { .. }));
    }
}

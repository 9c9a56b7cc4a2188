//! Progress reports for torrents handed to the download client.
//!
//! The download client moves a picked-up `.torrent` file into the active
//! folder and drops the payload into the finished folder when done. Watching
//! both folders is enough to tell the user when loading starts and ends.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use courier_core::{DirectorySource, EntrySource, MessageRef, Outbox, WatchedFolder};

/// Polls to wait for the download client to pick up a file.
pub const START_POLLS: u32 = 25;

/// Polls to wait for a download to finish (a day at one poll per second).
pub const FINISH_POLLS: u32 = 60 * 60 * 24;

/// Folders the bot reads and writes.
#[derive(Debug, Clone)]
pub struct Folders {
    /// Where `.torrent` files are dropped for the download client.
    pub torrents: PathBuf,
    pub active: Option<PathBuf>,
    pub finished: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Folders {
    pub fn new(torrents: PathBuf, active: Option<PathBuf>, finished: Option<PathBuf>) -> Self {
        Self {
            torrents,
            active,
            finished,
            poll_interval: courier_core::watch::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Snapshots the active and finished folders so later arrivals can be reported.
    ///
    /// Returns `None` when monitoring is not configured or a folder cannot be read.
    pub async fn monitor(&self) -> Option<DownloadMonitor> {
        let (Some(active), Some(finished)) = (&self.active, &self.finished) else {
            return None;
        };
        let opened = async {
            let active = WatchedFolder::open(active).await?;
            let finished = WatchedFolder::open(finished).await?;
            Ok::<_, courier_core::WatchError>((active, finished))
        };
        match opened.await {
            Ok((active, finished)) => Some(DownloadMonitor::new(
                active.with_poll_interval(self.poll_interval),
                finished.with_poll_interval(self.poll_interval),
            )),
            Err(e) => {
                warn!(error = %e, "cannot watch download folders");
                None
            }
        }
    }
}

/// Watches one download from pickup to completion.
pub struct DownloadMonitor<S = DirectorySource> {
    active: WatchedFolder<S>,
    finished: WatchedFolder<S>,
    start_polls: u32,
    finish_polls: u32,
}

impl<S: EntrySource> DownloadMonitor<S> {
    pub fn new(active: WatchedFolder<S>, finished: WatchedFolder<S>) -> Self {
        Self {
            active,
            finished,
            start_polls: START_POLLS,
            finish_polls: FINISH_POLLS,
        }
    }

    /// Overrides how many polls each wait gets.
    pub fn with_polls(mut self, start: u32, finish: u32) -> Self {
        self.start_polls = start;
        self.finish_polls = finish;
        self
    }

    /// Reports pickup, then completion, as replies to `origin`.
    pub async fn run(mut self, outbox: Outbox, origin: MessageRef) {
        let started = match self.active.wait_for_new_entry(self.start_polls).await {
            Ok(name) => {
                info!(torrent = %name, "download started");
                format!("Start loading: {}", name)
            }
            Err(e) => format!("Waited for torrent to start loading, but error: {}", e),
        };
        if let Err(e) = outbox.reply(origin, started).await {
            warn!(error = %e, "start report dropped");
            return;
        }

        let finished = match self.finished.wait_for_new_entry(self.finish_polls).await {
            Ok(name) => {
                info!(torrent = %name, "download finished");
                format!("{} finished", name)
            }
            Err(e) => format!("Waited for torrent to finish, but error: {}", e),
        };
        if let Err(e) = outbox.reply(origin, finished).await {
            warn!(error = %e, "finish report dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::outbound_queue;
    use tempfile::TempDir;

    fn folders(root: &TempDir) -> Folders {
        let active = root.path().join("active");
        let finished = root.path().join("finished");
        std::fs::create_dir(&active).unwrap();
        std::fs::create_dir(&finished).unwrap();
        Folders {
            poll_interval: Duration::from_millis(10),
            ..Folders::new(root.path().to_path_buf(), Some(active), Some(finished))
        }
    }

    #[tokio::test]
    async fn test_reports_start_and_finish() {
        let root = TempDir::new().unwrap();
        let folders = folders(&root);
        std::fs::write(root.path().join("active/old.torrent"), b"x").unwrap();

        let monitor = folders.monitor().await.unwrap();
        let (outbox, mut queue) = outbound_queue(4);
        let origin = MessageRef::new(5, 50);
        let task = tokio::spawn(monitor.run(outbox, origin));

        // Rename into place so the poller never sees a half-written file.
        let staged = root.path().join("123.torrent");
        std::fs::write(&staged, b"d4:infod6:lengthi1e4:name4:Dunee").unwrap();
        std::fs::rename(&staged, root.path().join("active/123.torrent")).unwrap();
        let first = queue.recv().await.unwrap();
        assert_eq!(first.text, "Start loading: Dune");
        assert_eq!(first.reply_to, origin);

        std::fs::create_dir(root.path().join("finished/Dune")).unwrap();
        let second = queue.recv().await.unwrap();
        assert_eq!(second.text, "Dune finished");

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reports_timeouts() {
        let root = TempDir::new().unwrap();
        let monitor = folders(&root).monitor().await.unwrap().with_polls(2, 2);
        let (outbox, mut queue) = outbound_queue(4);

        monitor.run(outbox, MessageRef::new(1, 1)).await;

        assert_eq!(
            queue.recv().await.unwrap().text,
            "Waited for torrent to start loading, but error: no new file found after 2 polls"
        );
        assert_eq!(
            queue.recv().await.unwrap().text,
            "Waited for torrent to finish, but error: no new file found after 2 polls"
        );
    }

    #[tokio::test]
    async fn test_closed_queue_after_start_report() {
        let root = TempDir::new().unwrap();
        let monitor = folders(&root).monitor().await.unwrap().with_polls(1, 2);
        let (outbox, mut queue) = outbound_queue(4);
        let task = tokio::spawn(monitor.run(outbox, MessageRef::new(1, 1)));

        assert!(queue.recv().await.unwrap().text.starts_with("Waited for torrent to start"));
        drop(queue);

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_monitoring() {
        let root = TempDir::new().unwrap();
        let folders = Folders::new(root.path().to_path_buf(), None, None);
        assert!(folders.monitor().await.is_none());

        let missing = Folders::new(
            root.path().to_path_buf(),
            Some(root.path().join("nope")),
            Some(root.path().join("nope")),
        );
        assert!(missing.monitor().await.is_none());
    }
}

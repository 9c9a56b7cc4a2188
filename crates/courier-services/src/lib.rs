//! External collaborators for Courier.
//!
//! Each service sits behind a small trait so handlers can be exercised with
//! fakes:
//!
//! - [`TorrentSearch`] / [`TopicFetcher`] - the tracker ([`Tracker`])
//! - [`ProxySearch`] - the Jackett search proxy ([`Jackett`])
//! - [`DownloadClient`] - the Transmission daemon ([`Transmission`])
//! - [`BookmarkStore`] - saved searches on kvdb.io ([`Kvdb`])
//! - [`PasteRs`] - fault reports, implementing [`courier_core::PasteSink`]

pub mod bookmarks;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod jackett;
pub mod paste;
pub mod tracker;
pub mod transmission;

pub use bookmarks::{BookmarkStore, Kvdb};
pub use discovery::PortRange;
pub use error::{Result, ServiceError};
pub use jackett::{Jackett, ProxyResult, ProxySearch};
pub use paste::PasteRs;
pub use tracker::{SearchScope, TopicFetcher, TorrentSearch, Tracker, TrackerItem};
pub use transmission::{
    format_torrent_list, AddedTorrent, DownloadClient, TorrentState, TorrentStatus, Transmission,
};

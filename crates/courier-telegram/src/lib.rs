//! Telegram front end for Courier.
//!
//! This crate wires the dispatch engine from `courier-core` and the service
//! clients from `courier-services` to a Telegram bot: send a title to search
//! the tracker, tap a button to pick where, and hand the result to the
//! download client.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_TOKEN`: Bot token from @BotFather
//! - `TORRENT_FOLDER`: Folder watched by the download client
//!
//! Optional:
//! - `ACTIVE_TORRENT_FILES_PATH`, `FINISHED_FOLDER`: enable download progress reports
//! - `RUTRACKER_LOGIN`, `RUTRACKER_PASSWORD`: tracker account
//! - `KVDB_TOKEN`: kvdb.io bucket for saved searches
//! - `TRANSMISSION_URI`, `TRANSMISSION_PORT_FROM`, `TRANSMISSION_PORT_TO`
//! - `JACKETT_API_URL`, `JACKETT_API_KEY`, `JACKETT_PORT_FROM`, `JACKETT_PORT_TO`
//! - `PENDING_TTL_SECS`: forget unanswered keyboards after this long
//!
//! # Commands
//!
//! - any text - search, after choosing a category
//! - `/<topic id>` - get a tracker topic's `.torrent` file or send it to the server
//! - `/download_<n>` - start a search proxy result
//! - `/save_<query>`, `/saved`, `/delete_<query>` - saved searches
//! - `/downloading`, `/finished` - torrents in the download client
//! - `/delete_<id>` - remove a torrent
//! - `/version` - bot version
//! - a `.torrent` document - drop it into the watch folder

pub mod bot;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod handlers;
pub mod keyboards;
pub mod monitor;
pub mod state;

pub use bot::CourierBot;
pub use config::Config;
pub use error::{BotError, Result};
pub use gateway::TelegramGateway;
pub use monitor::{DownloadMonitor, Folders};
pub use state::{BotState, Services};

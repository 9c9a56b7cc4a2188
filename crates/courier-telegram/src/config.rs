//! Runtime configuration.
//!
//! Every setting can be given on the command line or through the environment
//! (`.env.local` / `.env` are loaded by the binary before parsing). Paths
//! accept a leading `~`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use courier_services::PortRange;

use crate::error::{BotError, Result};

/// Default Transmission RPC port.
pub const DEFAULT_TRANSMISSION_PORT: u16 = 9091;

/// Default Jackett port.
pub const DEFAULT_JACKETT_PORT: u16 = 9117;

/// Bot settings.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Bot token from @BotFather
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Folder the download client watches for new .torrent files
    #[arg(long, env = "TORRENT_FOLDER")]
    pub torrent_folder: Option<String>,

    /// Folder the download client moves .torrent files to once loading starts
    #[arg(long, env = "ACTIVE_TORRENT_FILES_PATH")]
    pub active_folder: Option<String>,

    /// Folder completed downloads land in
    #[arg(long, env = "FINISHED_FOLDER")]
    pub finished_folder: Option<String>,

    /// Tracker account name
    #[arg(long, env = "RUTRACKER_LOGIN")]
    pub tracker_login: Option<String>,

    /// Tracker account password
    #[arg(long, env = "RUTRACKER_PASSWORD", hide_env_values = true)]
    pub tracker_password: Option<String>,

    /// kvdb.io bucket holding saved searches
    #[arg(long, env = "KVDB_TOKEN", hide_env_values = true)]
    pub kvdb_token: Option<String>,

    /// Transmission host
    #[arg(long, env = "TRANSMISSION_URI", default_value = "127.0.0.1")]
    pub transmission_host: String,

    /// First Transmission RPC port to probe
    #[arg(long, env = "TRANSMISSION_PORT_FROM", default_value_t = DEFAULT_TRANSMISSION_PORT)]
    pub transmission_port_from: u16,

    /// Last Transmission RPC port to probe
    #[arg(long, env = "TRANSMISSION_PORT_TO", default_value_t = DEFAULT_TRANSMISSION_PORT)]
    pub transmission_port_to: u16,

    /// Jackett host
    #[arg(long, env = "JACKETT_API_URL", default_value = "127.0.0.1")]
    pub jackett_host: String,

    /// Jackett API key
    #[arg(long, env = "JACKETT_API_KEY", hide_env_values = true)]
    pub jackett_api_key: Option<String>,

    /// First Jackett port to probe
    #[arg(long, env = "JACKETT_PORT_FROM", default_value_t = DEFAULT_JACKETT_PORT)]
    pub jackett_port_from: u16,

    /// Last Jackett port to probe
    #[arg(long, env = "JACKETT_PORT_TO", default_value_t = DEFAULT_JACKETT_PORT)]
    pub jackett_port_to: u16,

    /// Forget unanswered keyboards after this many seconds (never by default)
    #[arg(long, env = "PENDING_TTL_SECS")]
    pub pending_ttl_secs: Option<u64>,
}

impl Config {
    /// Checks the settings the bot cannot start without.
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.telegram_token) {
            return Err(BotError::NoToken);
        }
        if is_blank(&self.torrent_folder) {
            return Err(BotError::NoTorrentFolder);
        }
        check_range("Transmission", self.transmission_port_from, self.transmission_port_to)?;
        check_range("Jackett", self.jackett_port_from, self.jackett_port_to)?;
        if self.pending_ttl_secs == Some(0) {
            return Err(BotError::Config("PENDING_TTL_SECS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(BotError::NoToken)
    }

    pub fn torrent_folder(&self) -> Result<PathBuf> {
        self.torrent_folder
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(expand)
            .ok_or(BotError::NoTorrentFolder)
    }

    pub fn active_folder(&self) -> Option<PathBuf> {
        self.active_folder.as_deref().filter(|p| !p.is_empty()).map(expand)
    }

    pub fn finished_folder(&self) -> Option<PathBuf> {
        self.finished_folder.as_deref().filter(|p| !p.is_empty()).map(expand)
    }

    pub fn transmission_range(&self) -> PortRange {
        PortRange::new(
            &self.transmission_host,
            self.transmission_port_from,
            self.transmission_port_to,
        )
    }

    pub fn jackett_range(&self) -> PortRange {
        PortRange::new(&self.jackett_host, self.jackett_port_from, self.jackett_port_to)
    }

    pub fn pending_ttl(&self) -> Option<Duration> {
        self.pending_ttl_secs.map(Duration::from_secs)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn check_range(service: &str, from: u16, to: u16) -> Result<()> {
    if from > to {
        return Err(BotError::Config(format!(
            "{} port range {}-{} is empty",
            service, from, to
        )));
    }
    Ok(())
}

/// Expands a leading `~` in a configured path.
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

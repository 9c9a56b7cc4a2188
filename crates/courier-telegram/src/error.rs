//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur while starting or running the bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_TOKEN environment variable.")]
    NoToken,

    /// Folder for incoming `.torrent` files not provided.
    #[error("Torrent folder not set. Set TORRENT_FOLDER environment variable.")]
    NoTorrentFolder,

    /// A configuration value is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    Startup(String),

    /// Dispatch engine error.
    #[error(transparent)]
    Core(#[from] courier_core::CoreError),

    /// External service error.
    #[error(transparent)]
    Service(#[from] courier_services::ServiceError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

impl From<teloxide::RequestError> for BotError {
    fn from(e: teloxide::RequestError) -> Self {
        BotError::Startup(e.to_string())
    }
}

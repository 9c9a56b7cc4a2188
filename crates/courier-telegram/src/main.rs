//! Courier Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_TOKEN=xxx TORRENT_FOLDER=~/torrents cargo run -p courier-telegram
//! ```

use clap::Parser;
use courier_telegram::{Config, CourierBot};
use tracing_subscriber::EnvFilter;

/// Courier - search torrents and start downloads from Telegram
#[derive(Parser, Debug)]
#[command(name = "courier-telegram")]
#[command(about = "Telegram bot for searching a tracker and feeding a download client")]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment first, so clap sees it as fallback values
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let args = Args::parse();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "courier_telegram=info,courier_core=info,courier_services=info,teloxide=warn",
        1 => "courier_telegram=debug,courier_core=debug,courier_services=debug,teloxide=info",
        2 => "courier_telegram=trace,courier_core=trace,courier_services=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bot = CourierBot::new(args.config)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, version = env!("CARGO_PKG_VERSION"), "Bot initialized successfully");
            println!("\n[robot] Courier Telegram Bot");
            println!("   Bot: @{}", username);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Send a title to the bot to search");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}

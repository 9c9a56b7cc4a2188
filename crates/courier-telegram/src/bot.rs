//! Main Telegram bot implementation.

use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use courier_core::outbound::DEFAULT_QUEUE_CAPACITY;
use courier_core::{outbound_queue, ChatGateway, GatewayUpdate, OutboundSender, ReplyTable};
use courier_services::{Jackett, Kvdb, PasteRs, Tracker, Transmission};

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::gateway::{file_event, interaction, text_event, TelegramGateway};
use crate::handlers::routes;
use crate::monitor::Folders;
use crate::state::{BotState, Services};

/// Inbound updates buffered between the listener and the dispatch loop.
const UPDATE_QUEUE_CAPACITY: usize = 64;

/// The Telegram bot for Courier.
pub struct CourierBot {
    /// The teloxide bot instance.
    bot: Bot,
    config: Config,
}

impl CourierBot {
    /// Create a new CourierBot from validated settings.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let bot = Bot::new(config.token()?);
        Ok(Self { bot, config })
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| BotError::Startup(e.to_string()))?;
        Ok(me.username().to_string())
    }

    fn services(&self) -> Result<Services> {
        let tracker = Arc::new(Tracker::new(
            self.config.tracker_login.clone(),
            self.config.tracker_password.clone(),
        )?);
        let bucket = self.config.kvdb_token.clone().unwrap_or_else(|| {
            warn!("KVDB_TOKEN not set, saved searches are disabled");
            String::new()
        });
        let api_key = self.config.jackett_api_key.clone().unwrap_or_default();

        Ok(Services {
            tracker: tracker.clone(),
            topics: tracker,
            proxy: Arc::new(Jackett::new(self.config.jackett_range(), api_key)),
            downloads: Arc::new(Transmission::new(self.config.transmission_range())),
            bookmarks: Arc::new(Kvdb::new(bucket)),
            paste: Arc::new(PasteRs::new()),
        })
    }

    /// Start the bot in polling mode. Returns when Ctrl+C stops the listener.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        let folders = Folders::new(
            self.config.torrent_folder()?,
            self.config.active_folder(),
            self.config.finished_folder(),
        );
        if !folders.torrents.is_dir() {
            return Err(BotError::Config(format!(
                "torrent folder {} does not exist",
                folders.torrents.display()
            )));
        }

        let gateway: Arc<dyn ChatGateway> = Arc::new(TelegramGateway::new(self.bot.clone()));
        let replies = Arc::new(ReplyTable::new());
        let (outbox, queue) = outbound_queue(DEFAULT_QUEUE_CAPACITY);

        let state = Arc::new(BotState::new(
            self.services()?,
            folders,
            outbox,
            Arc::clone(&gateway),
        ));
        let registry = Arc::new(routes(&state)?);

        // Start the outbound sender
        let sender = OutboundSender::new(Arc::clone(&gateway), Arc::clone(&replies));
        tokio::spawn(sender.run(queue));

        // Start the dispatch loop
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);
        let dispatcher = courier_core::Dispatcher::new(registry, Arc::clone(&replies), gateway);
        tokio::spawn(async move { dispatcher.run(updates_rx).await });

        // Forget unanswered keyboards, if configured
        if let Some(ttl) = self.config.pending_ttl() {
            let sweep_replies = Arc::clone(&replies);
            tokio::spawn(async move {
                sweep_pending_loop(sweep_replies, ttl).await;
            });
        }

        info!("Bot is running! Send a title to search.");
        listen(self.bot.clone(), updates_tx).await;
        Ok(())
    }
}

/// Periodically drops unresolved keyboards older than `ttl`.
async fn sweep_pending_loop(replies: Arc<ReplyTable>, ttl: Duration) {
    let mut ticker = interval(ttl.min(Duration::from_secs(60)));
    loop {
        ticker.tick().await;
        let swept = replies.sweep_older_than(ttl);
        if swept > 0 {
            info!(swept, pending = replies.len(), "expired pending keyboards");
        }
    }
}

async fn forward(updates: &mpsc::Sender<GatewayUpdate>, update: GatewayUpdate) {
    if updates.send(update).await.is_err() {
        warn!("dispatch loop is gone, update dropped");
    }
}

/// Feeds Telegram updates into `updates` until Ctrl+C.
pub async fn listen(bot: Bot, updates: mpsc::Sender<GatewayUpdate>) {
    let updates_for_callbacks = updates.clone();
    let updates_for_files = updates.clone();
    let updates_for_messages = updates;

    let handler = dptree::entry()
        .branch(
            Update::filter_callback_query()
                .endpoint(move |bot: Bot, q: CallbackQuery| {
                    let updates = updates_for_callbacks.clone();
                    async move {
                        match interaction(&q) {
                            Some(update) => forward(&updates, update).await,
                            None => {
                                debug!(id = %q.id, "button tap without data or message");
                                bot.answer_callback_query(&q.id).await?;
                            }
                        }
                        respond(())
                    }
                }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.document().is_some())
                .endpoint(move |bot: Bot, msg: Message| {
                    let updates = updates_for_files.clone();
                    async move {
                        let Some(document) = msg.document() else {
                            return respond(());
                        };
                        let file = bot.get_file(&document.file.id).await?;
                        let url = format!(
                            "https://api.telegram.org/file/bot{}/{}",
                            bot.token(),
                            file.path
                        );
                        info!(chat_id = %msg.chat.id, name = ?document.file_name, "file received");
                        if let Some(event) = file_event(&msg, url) {
                            forward(&updates, GatewayUpdate::Message(event)).await;
                        }
                        respond(())
                    }
                }),
        )
        .branch(
            Update::filter_message()
                .endpoint(move |msg: Message| {
                    let updates = updates_for_messages.clone();
                    async move {
                        debug!(chat_id = %msg.chat.id, text = ?msg.text(), "message received");
                        if let Some(event) = text_event(&msg) {
                            forward(&updates, GatewayUpdate::Message(event)).await;
                        }
                        respond(())
                    }
                }),
        );

    Dispatcher::builder(bot, handler)
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram listener stopped");
}

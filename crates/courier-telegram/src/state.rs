//! Shared state for the Telegram bot.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use courier_core::{safe_call, ChatGateway, MessageRef, OutboundRequest, Outbox, PasteSink};
use courier_services::{
    BookmarkStore, DownloadClient, ProxyResult, ProxySearch, TopicFetcher, TorrentSearch,
};

use crate::monitor::Folders;

/// External collaborators used by the handlers.
#[derive(Clone)]
pub struct Services {
    pub tracker: Arc<dyn TorrentSearch>,
    pub topics: Arc<dyn TopicFetcher>,
    pub proxy: Arc<dyn ProxySearch>,
    pub downloads: Arc<dyn DownloadClient>,
    pub bookmarks: Arc<dyn BookmarkStore>,
    pub paste: Arc<dyn PasteSink>,
}

/// State shared by every handler.
pub struct BotState {
    pub services: Services,
    pub folders: Folders,
    outbox: Outbox,
    gateway: Arc<dyn ChatGateway>,
    http: reqwest::Client,
    /// Results of the last search proxy query, indexed by `/download_<n>`.
    proxy_results: Mutex<Vec<ProxyResult>>,
}

impl BotState {
    pub fn new(
        services: Services,
        folders: Folders,
        outbox: Outbox,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            services,
            folders,
            outbox,
            gateway,
            http: reqwest::Client::new(),
            proxy_results: Mutex::new(Vec::new()),
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Client for plain file downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Queues a request. A closed queue means the bot is shutting down.
    pub async fn send(&self, request: OutboundRequest) {
        if let Err(e) = self.outbox.send(request).await {
            warn!(error = %e, "reply dropped");
        }
    }

    /// Queues a plain text reply.
    pub async fn reply(&self, origin: MessageRef, text: impl Into<String>) {
        self.send(OutboundRequest::text(origin, text)).await;
    }

    /// Shows the typing indicator. Failures are only logged.
    pub async fn typing(&self, chat_id: i64) {
        if let Err(e) = self.gateway.send_typing(chat_id).await {
            debug!(chat_id, error = %e, "typing indicator failed");
        }
    }

    /// Replaces the cached search proxy results.
    pub fn replace_proxy_results(&self, results: Vec<ProxyResult>) {
        match self.proxy_results.lock() {
            Ok(mut cached) => *cached = results,
            Err(poisoned) => *poisoned.into_inner() = results,
        }
    }

    /// Cached search proxy result number `index`.
    pub fn proxy_result(&self, index: usize) -> Option<ProxyResult> {
        match self.proxy_results.lock() {
            Ok(cached) => cached.get(index).cloned(),
            Err(poisoned) => poisoned.into_inner().get(index).cloned(),
        }
    }

    /// Runs `work` in its own task. A panic is reported to the chat through the paste sink.
    pub fn spawn<F>(self: &Arc<Self>, label: &'static str, origin: MessageRef, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let outbox = state.outbox.clone();
            safe_call(label, work, state.services.paste.as_ref(), |text| async move {
                if let Err(e) = outbox.reply(origin, text).await {
                    warn!(task = label, error = %e, "fault report dropped");
                }
            })
            .await;
        });
    }
}

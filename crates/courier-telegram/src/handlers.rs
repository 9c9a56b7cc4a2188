//! Command handlers for the Telegram bot.
//!
//! [`routes`] builds the ordered handler list. Every handler runs its work in
//! a supervised task through [`BotState::spawn`], so the dispatch loop is
//! never blocked and a panic turns into an error reply.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use courier_core::{
    codec, AttachedFile, Document, Handler, HandlerRegistry, InboundEvent, Matcher, MessageRef,
    OutboundRequest,
};
use courier_services::fetch::{download_to, safe_file_stem};
use courier_services::{format_torrent_list, SearchScope};

use crate::format;
use crate::keyboards::{self, ACTION_FILE, ACTION_SERVER, WHAT_TO_DO, WHERE_TO_SEARCH};
use crate::state::BotState;

/// Reply to `/version`.
pub const VERSION_TEXT: &str = concat!("Courier version ", env!("CARGO_PKG_VERSION"));

/// Builds the handler list. Earlier entries win.
pub fn routes(state: &Arc<BotState>) -> courier_core::Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.register(
        Matcher::command("/search_(.+)")?,
        route(state, "search", |state, event, captures| {
            handle_search(state, event.origin, codec::decode(&first(captures)))
        }),
    );
    registry.register(
        Matcher::command("/download_([0-9]+)")?,
        route(state, "download", |state, event, captures| {
            handle_download(state, event.origin, first(captures))
        }),
    );
    registry.register(
        Matcher::command("/delete_(.+)")?,
        route(state, "delete", |state, event, captures| {
            handle_delete(state, event.origin, first(captures))
        }),
    );
    registry.register(
        Matcher::command("/save_(.+)")?,
        route(state, "save", |state, event, captures| {
            handle_save(state, event.origin, first(captures))
        }),
    );
    registry.register(
        Matcher::command("/saved")?,
        route(state, "saved", |state, event, _| handle_saved(state, event.origin)),
    );
    registry.register(
        Matcher::command("/downloading")?,
        route(state, "downloading", |state, event, _| {
            handle_torrent_list(state, event.origin)
        }),
    );
    registry.register(
        Matcher::command("/finished")?,
        route(state, "finished", |state, event, _| {
            handle_torrent_list(state, event.origin)
        }),
    );
    registry.register(
        Matcher::command("/version")?,
        route(state, "version", |state, event, _| async move {
            state.reply(event.origin, VERSION_TEXT).await
        }),
    );
    registry.register(
        Matcher::command("/([0-9]+)")?,
        route(state, "topic", |state, event, captures| {
            handle_topic(state, event.origin, first(captures))
        }),
    );
    registry.register(
        Matcher::free_text(".*")?,
        route(state, "search", |state, event, _| {
            let query = event.text_or_empty().to_string();
            handle_search(state, event.origin, query)
        }),
    );
    registry.register(
        Matcher::attached_file(),
        route(state, "file", |state, event, _| async move {
            if let Some(file) = event.file {
                handle_file(state, event.origin, file).await;
            }
        }),
    );

    info!(handlers = registry.len(), "routes registered");
    Ok(registry)
}

/// Wraps a handler future factory into a registry handler running under supervision.
fn route<F, Fut>(state: &Arc<BotState>, label: &'static str, handler: F) -> Handler
where
    F: Fn(Arc<BotState>, InboundEvent, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let state = Arc::clone(state);
    Arc::new(move |event, captures| {
        let origin = event.origin;
        let work = handler(Arc::clone(&state), event, captures);
        state.spawn(label, origin, work);
    })
}

fn first(captures: Vec<String>) -> String {
    captures.into_iter().next().unwrap_or_default()
}

/// Asks for a scope, then searches the tracker, falling back to the search proxy.
pub async fn handle_search(state: Arc<BotState>, origin: MessageRef, query: String) {
    info!(chat_id = origin.chat_id, query = %query, "search requested");
    state.typing(origin.chat_id).await;

    let follow_up = Arc::clone(&state);
    let request = OutboundRequest::ask(
        origin,
        WHERE_TO_SEARCH,
        keyboards::categories(),
        move |choice| {
            let scope = SearchScope::from_choice(&choice).unwrap_or_else(|| {
                warn!(choice = %choice, "unknown search scope, searching everywhere");
                SearchScope::All
            });
            let work = run_search(Arc::clone(&follow_up), origin, query, scope);
            follow_up.spawn("search", origin, work);
        },
    );
    state.send(request).await;
}

async fn run_search(state: Arc<BotState>, origin: MessageRef, query: String, scope: SearchScope) {
    match state.services.tracker.search(&query, scope).await {
        Err(e) => {
            warn!(query = %query, scope = scope.as_str(), error = %e, "tracker search failed");
            state.reply(origin, "cannot search").await;
        }
        Ok(items) if items.is_empty() => {
            info!(query = %query, "tracker found nothing, asking search proxy");
            search_proxy(&state, origin, &query).await;
        }
        Ok(items) => {
            info!(query = %query, results = items.len(), "tracker search done");
            for block in format::search_blocks(&items) {
                state.send(OutboundRequest::html(origin, block)).await;
            }
        }
    }
}

async fn search_proxy(state: &BotState, origin: MessageRef, query: &str) {
    state.replace_proxy_results(Vec::new());
    let results = match state.services.proxy.search(query).await {
        Ok(results) => results,
        Err(e) => {
            state.reply(origin, format!("Error searching: {}", e)).await;
            return;
        }
    };
    if results.is_empty() {
        state.reply(origin, "No results found").await;
        return;
    }
    let listing = format::proxy_listing(&results);
    state.replace_proxy_results(results);
    state.reply(origin, listing).await;
}

/// `/download_<n>`: starts a cached search proxy result.
pub async fn handle_download(state: Arc<BotState>, origin: MessageRef, index: String) {
    let id: usize = match index.parse() {
        Ok(id) => id,
        Err(e) => {
            state.reply(origin, format!("Invalid torrent ID: {}", e)).await;
            return;
        }
    };

    let result = state.proxy_result(id).unwrap_or_default();
    let magnet = result.magnet().map(str::to_string);
    let link = result.torrent_link().map(str::to_string);

    if let Some(magnet) = magnet {
        let text = match state.services.downloads.add_magnet(&magnet).await {
            Ok(added) => {
                info!(id = added.id, name = %added.name, "magnet added");
                "Downloading from magnet".to_string()
            }
            Err(e) => format!("Error adding torrent: {}", e),
        };
        state.reply(origin, text).await;
        return;
    }

    let Some(link) = link else {
        state
            .reply(origin, format!("Try search again, no magnet URI found for ID: {}", index))
            .await;
        return;
    };

    let file_name = format!("{}.torrent", safe_file_stem(&result.title));
    let follow_up = Arc::clone(&state);
    let request = OutboundRequest::ask(
        origin,
        WHAT_TO_DO,
        keyboards::download_action(),
        move |action| {
            let state = Arc::clone(&follow_up);
            follow_up.spawn("download", origin, async move {
                if !is_known_action(&action) {
                    warn!(action = %action, "unknown download action");
                    return;
                }
                match state.services.proxy.fetch(&link).await {
                    Ok(bytes) => deliver(&state, origin, &action, file_name, bytes).await,
                    Err(e) => state.reply(origin, e.to_string()).await,
                }
            });
        },
    );
    state.send(request).await;
}

/// `/<topic_id>`: offers the topic's `.torrent` file.
pub async fn handle_topic(state: Arc<BotState>, origin: MessageRef, topic_id: String) {
    info!(chat_id = origin.chat_id, topic = %topic_id, "topic requested");
    state.typing(origin.chat_id).await;

    let follow_up = Arc::clone(&state);
    let request = OutboundRequest::ask(
        origin,
        WHAT_TO_DO,
        keyboards::download_action(),
        move |action| {
            let state = Arc::clone(&follow_up);
            follow_up.spawn("topic", origin, async move {
                if !is_known_action(&action) {
                    warn!(action = %action, "unknown download action");
                    return;
                }
                match state.services.topics.fetch_topic(&topic_id).await {
                    Ok(bytes) => {
                        let file_name = format!("{}.torrent", topic_id);
                        deliver(&state, origin, &action, file_name, bytes).await;
                    }
                    Err(e) => state.reply(origin, e.to_string()).await,
                }
            });
        },
    );
    state.send(request).await;
}

fn is_known_action(action: &str) -> bool {
    action == ACTION_FILE || action == ACTION_SERVER
}

/// Sends a fetched `.torrent` file back, or hands it to the download client.
async fn deliver(state: &BotState, origin: MessageRef, action: &str, file_name: String, bytes: Vec<u8>) {
    if action == ACTION_FILE {
        let caption = file_name.clone();
        let document = Document { file_name, bytes };
        state.send(OutboundRequest::document(origin, caption, document)).await;
    } else {
        save_to_server(state, origin, file_name, bytes).await;
    }
}

/// Drops a `.torrent` file into the watch folder and reports its progress.
async fn save_to_server(state: &BotState, origin: MessageRef, file_name: String, bytes: Vec<u8>) {
    // Snapshot before writing so the pickup counts as new.
    let monitor = state.folders.monitor().await;

    let destination = state.folders.torrents.join(&file_name);
    if let Err(e) = tokio::fs::write(&destination, &bytes).await {
        warn!(destination = %destination.display(), error = %e, "cannot save torrent file");
        state.reply(origin, format!("Cannot save {}: {}", file_name, e)).await;
        return;
    }
    info!(destination = %destination.display(), "saved torrent file");

    match monitor {
        Some(monitor) => monitor.run(state.outbox().clone(), origin).await,
        None => state.reply(origin, format!("Saved {}", file_name)).await,
    }
}

/// `/delete_<id>`: numeric ids are torrents, anything else is a saved search.
pub async fn handle_delete(state: Arc<BotState>, origin: MessageRef, token: String) {
    let name = codec::decode(&token);
    let text = match token.parse::<i64>() {
        Ok(id) => match state.services.downloads.remove(id).await {
            Ok(()) => format!("Deleted:{}", name),
            Err(e) => format!("Error deleting torrent: {}", e),
        },
        Err(_) => match state.services.bookmarks.delete(&token).await {
            Ok(()) => format!("Deleted:{}", name),
            Err(e) => format!("Error deleting bookmark: {}", e),
        },
    };
    state.reply(origin, text).await;
}

/// `/save_<token>`: bookmarks a search.
pub async fn handle_save(state: Arc<BotState>, origin: MessageRef, token: String) {
    let name = codec::decode(&token);
    let text = match state.services.bookmarks.set(&codec::encode(&name), &name).await {
        Ok(()) => format!("Saved:{}", name),
        Err(e) => format!("Error saving: {}", e),
    };
    state.reply(origin, text).await;
}

/// `/saved`: lists bookmarked searches.
pub async fn handle_saved(state: Arc<BotState>, origin: MessageRef) {
    let text = match state.services.bookmarks.keys().await {
        Ok(keys) => format::saved_listing(&keys),
        Err(e) => format!("Error reading saved searches: {}", e),
    };
    state.reply(origin, text).await;
}

/// `/downloading` and `/finished`: the download client's torrent list.
pub async fn handle_torrent_list(state: Arc<BotState>, origin: MessageRef) {
    let text = match state.services.downloads.list().await {
        Ok(torrents) => format_torrent_list(torrents),
        Err(e) => format!("Error connecting to transmission: {}", e),
    };
    state.reply(origin, text).await;
}

/// An uploaded file goes straight into the watch folder.
pub async fn handle_file(state: Arc<BotState>, origin: MessageRef, file: AttachedFile) {
    state.typing(origin.chat_id).await;

    let Some(name) = Path::new(&file.name).file_name() else {
        warn!(name = %file.name, "attached file has no usable name");
        state.reply(origin, "error").await;
        return;
    };
    let destination = state.folders.torrents.join(name);

    let text = match download_to(state.http(), &file.url, &destination).await {
        Ok(()) => "scheduled",
        Err(e) => {
            warn!(name = %file.name, error = %e, "attached file download failed");
            "error"
        }
    };
    state.reply(origin, text).await;
}

//! Inline keyboards offered by the bot.

use courier_core::{Choice, ChoiceSet};
use courier_services::SearchScope;

/// Button value: send the `.torrent` file back to the chat.
pub const ACTION_FILE: &str = "file";

/// Button value: hand the `.torrent` file to the download client.
pub const ACTION_SERVER: &str = "server";

/// Question asked before a search.
pub const WHERE_TO_SEARCH: &str = "Где искать?";

/// Question asked before fetching a `.torrent` file.
pub const WHAT_TO_DO: &str = "Что делаем?";

fn scope_label(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::All => "Везде",
        SearchScope::Movies => "Фильмы",
        SearchScope::Series => "Сериалы",
        SearchScope::Audiobooks => "Аудиокниги",
    }
}

/// Search scopes, two per row.
pub fn categories() -> ChoiceSet {
    let rows = SearchScope::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|scope| Choice::new(scope_label(*scope), scope.as_str()))
                .collect()
        })
        .collect();
    ChoiceSet::new(rows)
}

/// Where the `.torrent` file should go.
pub fn download_action() -> ChoiceSet {
    ChoiceSet::new(vec![vec![
        Choice::new("Файл", ACTION_FILE),
        Choice::new("На сервер", ACTION_SERVER),
    ]])
}

//! Reply texts built from service results.

use courier_core::{codec, MAX_MESSAGE_LEN};
use courier_services::tracker::topic_url;
use courier_services::{ProxyResult, TrackerItem};

/// Tracker results shown per search.
pub const MAX_SEARCH_RESULTS: usize = 15;

/// Instant-view template hash used for topic links.
const INSTANT_VIEW_HASH: &str = "4625e276e6dfbf";

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn search_entry(item: &TrackerItem) -> String {
    format!(
        "{}\n<b>Size:{}</b>,Seeds:{},{}\n/{}\t\t\t<a href=\"https://t.me/iv?url={}&rhash={}\">details</a>\n\n",
        escape_html(&item.title),
        escape_html(&item.size),
        escape_html(&item.seeds),
        escape_html(&item.category),
        item.topic_id,
        topic_url(&item.topic_id),
        INSTANT_VIEW_HASH,
    )
}

/// Renders the best tracker results as HTML blocks that each fit one message.
///
/// Each entry carries a `/<topic_id>` command and an instant-view link to the
/// topic page.
pub fn search_blocks(items: &[TrackerItem]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for item in items.iter().take(MAX_SEARCH_RESULTS) {
        let entry = search_entry(item);
        let fits = current.chars().count() + entry.chars().count() <= MAX_MESSAGE_LEN;
        if !fits && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push_str(&entry);
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Lists search proxy results, numbered for `/download_<n>`.
pub fn proxy_listing(results: &[ProxyResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(id, result)| {
            format!(
                "Title: {}\nSize: {}\nSeeders: {}\nDownload: /download_{}",
                result.title, result.size, result.seeders, id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Lists saved searches with commands to rerun or forget each one.
pub fn saved_listing(keys: &[String]) -> String {
    if keys.is_empty() {
        return "Nothing saved".to_string();
    }
    keys.iter()
        .map(|key| {
            format!(
                "{}\n/search_{}\n/delete_{}\n\n",
                codec::decode(key),
                key,
                key
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize, title: &str) -> TrackerItem {
        TrackerItem {
            title: title.to_string(),
            size: "1.4 GB".to_string(),
            seeds: (100 - n).to_string(),
            topic_id: (6000000 + n).to_string(),
            category: "Зарубежное кино".to_string(),
        }
    }

    #[test]
    fn test_search_entry_layout() {
        let blocks = search_blocks(&[item(1, "Alien (1979)")]);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("Alien (1979)\n<b>Size:1.4 GB</b>,Seeds:99,Зарубежное кино\n/6000001"));
        assert!(blocks[0].contains(
            "https://t.me/iv?url=https://rutracker.org/forum/viewtopic.php?t=6000001&rhash=4625e276e6dfbf"
        ));
        assert!(blocks[0].ends_with("\n\n"));
    }

    #[test]
    fn test_search_caps_result_count() {
        let items: Vec<_> = (0..40).map(|n| item(n, "Short")).collect();
        let blocks = search_blocks(&items);
        let entries: usize = blocks.iter().map(|b| b.matches("details</a>").count()).sum();
        assert_eq!(entries, MAX_SEARCH_RESULTS);
        assert!(!blocks.concat().contains("/6000015"));
    }

    #[test]
    fn test_search_splits_long_output() {
        let long_title = "x".repeat(1500);
        let items: Vec<_> = (0..6).map(|n| item(n, &long_title)).collect();
        let blocks = search_blocks(&items);
        assert!(blocks.len() > 1);
        for block in &blocks {
            assert!(block.chars().count() <= MAX_MESSAGE_LEN);
        }
        let entries: usize = blocks.iter().map(|b| b.matches("details</a>").count()).sum();
        assert_eq!(entries, 6);
    }

    #[test]
    fn test_titles_are_escaped() {
        let blocks = search_blocks(&[item(0, "Tom & Jerry <HD>")]);
        assert!(blocks[0].starts_with("Tom &amp; Jerry &lt;HD&gt;\n"));
    }

    #[test]
    fn test_empty_search() {
        assert!(search_blocks(&[]).is_empty());
    }

    #[test]
    fn test_proxy_listing() {
        let results = vec![
            ProxyResult {
                title: "Alien".to_string(),
                size: 1024,
                seeders: 12,
                ..Default::default()
            },
            ProxyResult {
                title: "Aliens".to_string(),
                size: 2048,
                seeders: 3,
                ..Default::default()
            },
        ];
        assert_eq!(
            proxy_listing(&results),
            "Title: Alien\nSize: 1024\nSeeders: 12\nDownload: /download_0\n\n\
             Title: Aliens\nSize: 2048\nSeeders: 3\nDownload: /download_1"
        );
    }

    #[test]
    fn test_saved_listing() {
        assert_eq!(saved_listing(&[]), "Nothing saved");

        let key = codec::encode("blade runner");
        let listing = saved_listing(&[key.clone()]);
        assert_eq!(
            listing,
            format!("blade runner\n/search_{}\n/delete_{}\n\n", key, key)
        );
    }
}

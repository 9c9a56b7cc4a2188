//! Tracker client: login, scoped search and topic downloads.
//!
//! The tracker serves windows-1251 HTML to logged-in members only. Search
//! result rows are picked out of the listing page with a handful of patterns
//! keyed on the tracker's CSS classes.

use std::cmp::Reverse;
use std::sync::OnceLock;

use async_trait::async_trait;
use encoding_rs::WINDOWS_1251;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::form_urlencoded::byte_serialize;

use crate::error::{Result, ServiceError};

/// Public forum root.
pub const TRACKER_URL: &str = "https://rutracker.org/forum";

/// `Вход` in windows-1251, percent-encoded; the login form's submit value.
const LOGIN_SUBMIT: &str = "%C2%F5%EE%E4";

/// Seed penalty for DVD releases, which are rarely what anyone wants.
const DVD_PENALTY: i64 = 100;

/// Where to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Movies,
    Series,
    Audiobooks,
}

impl SearchScope {
    pub const ALL: [SearchScope; 4] = [Self::All, Self::Movies, Self::Series, Self::Audiobooks];

    /// Value carried by the scope's inline button.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Movies => "Movies",
            Self::Series => "Series",
            Self::Audiobooks => "Audiobooks",
        }
    }

    pub fn from_choice(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.as_str() == value)
    }

    /// Forum sections searched for this scope; `None` searches everywhere.
    fn forums(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Movies => Some(
                "106,1666,22,376,941,1235,166,187,1950,2090,2091,2092,2093,212,2200,2221,2459,\
                 252,2540,505,7,934,124,1543,1577,709,1247,140,1457,194,2198,2199,2201,2339,\
                 312,313,1908,1936",
            ),
            Self::Series => Some("81,920,842,235,242,1531,1102,387,195,119,1803,266,193,1459,1288,1498,864,315"),
            Self::Audiobooks => Some(
                "2348,2387,2388,2389,661,2127,2137,2327,399,402,467,490,499,695,1279,1350,2165,\
                 2328,401,403,716,1909",
            ),
        }
    }
}

/// One row of a tracker search listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerItem {
    pub title: String,
    /// Human-readable size as shown by the tracker.
    pub size: String,
    /// Seed count, or `new` for fresh uploads.
    pub seeds: String,
    pub topic_id: String,
    pub category: String,
}

impl TrackerItem {
    /// Seeds after the DVD penalty; `None` when the count is not a number.
    fn rank(&self) -> Option<i64> {
        let seeds: i64 = self.seeds.parse().ok()?;
        let penalty = if self.category.to_lowercase().contains("dvd") {
            DVD_PENALTY
        } else {
            0
        };
        Some(seeds - penalty)
    }
}

/// Searches a tracker.
#[async_trait]
pub trait TorrentSearch: Send + Sync {
    async fn search(&self, query: &str, scope: SearchScope) -> Result<Vec<TrackerItem>>;
}

/// Downloads a topic's `.torrent` file.
#[async_trait]
pub trait TopicFetcher: Send + Sync {
    async fn fetch_topic(&self, topic_id: &str) -> Result<Vec<u8>>;
}

/// Public link to a topic page.
pub fn topic_url(topic_id: &str) -> String {
    format!("{}/viewtopic.php?t={}", TRACKER_URL, topic_id)
}

/// Orders items by seeds, best first. Unnumbered seeds go last.
pub fn sort_by_seeds(items: &mut [TrackerItem]) {
    items.sort_by_key(|item| match item.rank() {
        Some(rank) => (false, Reverse(rank)),
        None => (true, Reverse(0)),
    });
}

struct RowPatterns {
    row: Regex,
    title: Regex,
    topic_id: Regex,
    category: Regex,
    size: Regex,
    seeds: Regex,
    tag: Regex,
    char_ref: Regex,
}

fn patterns() -> &'static RowPatterns {
    static PATTERNS: OnceLock<RowPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("Invalid regex pattern");
        RowPatterns {
            row: compile(r#"<tr[^>]*class="[^"]*\bhl-tr\b[^"]*"[^>]*>"#),
            title: compile(r#"(?s)<a([^>]*class="[^"]*\bhl-tags\b[^"]*"[^>]*)>(.*?)</a>"#),
            topic_id: compile(r#"data-topic_id="(\d+)""#),
            category: compile(r#"(?s)<a[^>]*class="[^"]*\bts-text\b[^"]*"[^>]*>(.*?)</a>"#),
            size: compile(r#"(?s)<a[^>]*class="[^"]*\btr-dl\b[^"]*"[^>]*>(.*?)</a>"#),
            seeds: compile(r#"(?s)<b[^>]*class="[^"]*\bseedmed\b[^"]*"[^>]*>(.*?)</b>"#),
            tag: compile(r"<[^>]+>"),
            char_ref: compile(r"&#(\d+);"),
        }
    })
}

fn inner_text(html: &str) -> String {
    let p = patterns();
    let text = p.tag.replace_all(html, "");
    // Characters outside windows-1251 arrive as numeric references.
    let text = p.char_ref.replace_all(&text, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

fn parse_row(row: &str) -> Option<TrackerItem> {
    let p = patterns();
    let title = p.title.captures(row)?;
    let Some(topic_id) = p.topic_id.captures(&title[1]) else {
        debug!("search row without topic id");
        return None;
    };
    let first_text = |re: &Regex| re.captures(row).map(|c| inner_text(&c[1]));

    Some(TrackerItem {
        title: inner_text(&title[2]),
        size: first_text(&p.size).unwrap_or_default(),
        seeds: first_text(&p.seeds).unwrap_or_else(|| "new".to_string()),
        topic_id: topic_id[1].to_string(),
        category: first_text(&p.category).unwrap_or_default(),
    })
}

/// Extracts items from a decoded search listing, in page order.
pub fn parse_listing(html: &str) -> Result<Vec<TrackerItem>> {
    if !html.contains("logged-in-username") {
        return Err(ServiceError::NotLoggedIn);
    }

    let starts: Vec<usize> = patterns().row.find_iter(html).map(|m| m.start()).collect();
    let items = starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            let row = &html[start..end];
            let row = row.find("</tr>").map_or(row, |close| &row[..close]);
            parse_row(row)
        })
        .collect();
    Ok(items)
}

/// Tracker account session.
pub struct Tracker {
    base_url: String,
    credentials: Option<(String, String)>,
    client: reqwest::Client,
    logged_in: Mutex<bool>,
}

impl Tracker {
    pub fn new(login: Option<String>, password: Option<String>) -> Result<Self> {
        Self::with_base_url(TRACKER_URL, login, password)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        login: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let credentials = match (login, password) {
            (Some(login), Some(password)) if !login.is_empty() && !password.is_empty() => {
                Some((login, password))
            }
            _ => None,
        };
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client: reqwest::Client::builder().cookie_store(true).build()?,
            logged_in: Mutex::new(false),
        })
    }

    /// Logs in once; the session cookie lives in the client's cookie store.
    async fn login(&self) -> Result<()> {
        let mut logged_in = self.logged_in.lock().await;
        if *logged_in {
            return Ok(());
        }
        let (login, password) = self
            .credentials
            .as_ref()
            .ok_or(ServiceError::NotConfigured("tracker credentials"))?;

        let body = format!(
            "login_username={}&login_password={}&login={}",
            byte_serialize(login.as_bytes()).collect::<String>(),
            byte_serialize(password.as_bytes()).collect::<String>(),
            LOGIN_SUBMIT
        );
        let response = self
            .client
            .post(format!("{}/login.php", self.base_url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(ServiceError::status("tracker", response.status()));
        }

        info!(user = %login, "logged in to tracker");
        *logged_in = true;
        Ok(())
    }

    async fn get(&self, url: url::Url) -> Result<Vec<u8>> {
        self.login().await?;
        let response = self.client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(ServiceError::status("tracker", response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn search_url(&self, query: &str, scope: SearchScope) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!("{}/tracker.php", self.base_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(forums) = scope.forums() {
                pairs.append_pair("f", forums);
            }
            // o=10&s=2 sorts by seeds, descending.
            pairs
                .append_pair("nm", query)
                .append_pair("o", "10")
                .append_pair("s", "2");
        }
        Ok(url)
    }
}

#[async_trait]
impl TorrentSearch for Tracker {
    async fn search(&self, query: &str, scope: SearchScope) -> Result<Vec<TrackerItem>> {
        let page = self.get(self.search_url(query, scope)?).await?;
        let (html, _, _) = WINDOWS_1251.decode(&page);
        let mut items = parse_listing(&html)?;
        sort_by_seeds(&mut items);
        info!(query = %query, scope = scope.as_str(), results = items.len(), "tracker search");
        Ok(items)
    }
}

#[async_trait]
impl TopicFetcher for Tracker {
    async fn fetch_topic(&self, topic_id: &str) -> Result<Vec<u8>> {
        let mut url = url::Url::parse(&format!("{}/dl.php", self.base_url))?;
        url.query_pairs_mut().append_pair("t", topic_id);
        let bytes = self.get(url).await?;
        debug!(topic_id = %topic_id, bytes = bytes.len(), "fetched topic torrent");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const LISTING: &str = r#"<html><body>
<a id="logged-in-username" href="profile.php">member</a>
<table id="tor-tbl">
<tr id="trs-tr-100" class="tCenter hl-tr" data-topic_id="100">
  <td class="row1 f-name-col"><a class="gen f ts-text" href="tracker.php?f=100">Фильмы DVD</a></td>
  <td class="row4 t-title-col"><a data-topic_id="100" class="med tLink tt-text ts-text hl-tags bold" href="viewtopic.php?t=100">Дюна <b>Dune</b> (2021)</a></td>
  <td class="row4 tor-size"><a class="small tr-dl dl-stub" href="dl.php?t=100">4.2&nbsp;GB ↓</a></td>
  <td class="row4 nowrap"><b class="seedmed">150</b></td>
</tr>
<tr id="trs-tr-200" class="tCenter hl-tr" data-topic_id="200">
  <td class="row1 f-name-col"><a class="gen f ts-text" href="tracker.php?f=7">Зарубежное кино</a></td>
  <td class="row4 t-title-col"><a data-topic_id="200" class="med tLink tt-text ts-text hl-tags bold" href="viewtopic.php?t=200">Heat &amp; Dust</a></td>
  <td class="row4 tor-size"><a class="small tr-dl dl-stub" href="dl.php?t=200">1.1&nbsp;GB ↓</a></td>
  <td class="row4 nowrap"><b class="seedmed">60</b></td>
</tr>
<tr id="trs-tr-300" class="tCenter hl-tr">
  <td class="row1 f-name-col"><a class="gen f ts-text" href="tracker.php?f=7">Зарубежное кино</a></td>
  <td class="row4 t-title-col"><a data-topic_id="300" class="med tLink tt-text ts-text hl-tags bold" href="viewtopic.php?t=300">Fresh upload</a></td>
  <td class="row4 tor-size"><a class="small tr-dl dl-stub" href="dl.php?t=300">700&nbsp;MB ↓</a></td>
</tr>
<tr id="trs-tr-400" class="tCenter hl-tr">
  <td class="row1">advert</td>
</tr>
</table></body></html>"#;

    #[test]
    fn test_parse_listing_rows() {
        let items = parse_listing(LISTING).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            TrackerItem {
                title: "Дюна Dune (2021)".to_string(),
                size: "4.2 GB ↓".to_string(),
                seeds: "150".to_string(),
                topic_id: "100".to_string(),
                category: "Фильмы DVD".to_string(),
            }
        );
        assert_eq!(items[1].title, "Heat & Dust");
        assert_eq!(items[2].seeds, "new");
    }

    #[test]
    fn test_anonymous_page_is_error() {
        let err = parse_listing("<html><tr class=\"hl-tr\"></tr></html>").unwrap_err();
        assert!(matches!(err, ServiceError::NotLoggedIn));
    }

    #[test]
    fn test_sort_penalizes_dvd_and_puts_new_last() {
        let mut items = parse_listing(LISTING).unwrap();
        sort_by_seeds(&mut items);
        let order: Vec<&str> = items.iter().map(|i| i.topic_id.as_str()).collect();
        assert_eq!(order, vec!["200", "100", "300"]);
    }

    #[test]
    fn test_scope_round_trip() {
        for scope in SearchScope::ALL {
            assert_eq!(SearchScope::from_choice(scope.as_str()), Some(scope));
        }
        assert_eq!(SearchScope::from_choice("Books"), None);
    }

    #[test]
    fn test_search_url_scoped() {
        let tracker = Tracker::with_base_url("https://t.example/forum", None, None).unwrap();
        let url = tracker.search_url("dune part two", SearchScope::Series).unwrap();
        let query = url.query().unwrap();
        assert!(query.starts_with("f=81%2C920"));
        assert!(query.ends_with("nm=dune+part+two&o=10&s=2"));

        let everywhere = tracker.search_url("dune", SearchScope::All).unwrap();
        assert_eq!(everywhere.query(), Some("nm=dune&o=10&s=2"));
    }

    #[tokio::test]
    async fn test_search_logs_in_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/forum/login.php")
            .match_body(Matcher::Regex("login_username=user&login_password=p%40ss".into()))
            .with_status(200)
            .with_header("set-cookie", "bb_session=abc; Path=/")
            .create_async()
            .await;
        let (page, _, _) = WINDOWS_1251.encode(LISTING);
        let search = server
            .mock("GET", "/forum/tracker.php")
            .match_query(Matcher::UrlEncoded("nm".into(), "dune".into()))
            .match_header("cookie", Matcher::Regex("bb_session=abc".into()))
            .with_status(200)
            .with_body(page.into_owned())
            .create_async()
            .await;

        let tracker = Tracker::with_base_url(
            format!("{}/forum", server.url()),
            Some("user".to_string()),
            Some("p@ss".to_string()),
        )
        .unwrap();
        let items = tracker.search("dune", SearchScope::All).await.unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[1].category, "Фильмы DVD");
        assert_eq!(items[1].size, "4.2 GB ↓");
        login.assert_async().await;
        search.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_topic_reuses_session() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/forum/login.php")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let _dl = server
            .mock("GET", "/forum/dl.php")
            .match_query(Matcher::UrlEncoded("t".into(), "42".into()))
            .with_status(200)
            .with_body("d4:infod4:name2:okee")
            .create_async()
            .await;

        let tracker = Tracker::with_base_url(
            format!("{}/forum", server.url()),
            Some("user".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        assert_eq!(tracker.fetch_topic("42").await.unwrap(), b"d4:infod4:name2:okee");
        assert_eq!(tracker.fetch_topic("42").await.unwrap(), b"d4:infod4:name2:okee");
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let tracker = Tracker::with_base_url("http://127.0.0.1:9", Some(String::new()), None).unwrap();
        let err = tracker.fetch_topic("1").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}

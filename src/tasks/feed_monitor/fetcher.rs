use super::types::{FeedEntry, FetchOptions, Message, Scan};
use crate::db::Store;
use crate::errors::FetchError;
use crate::models::{subscription::Subscription, watermark::Watermark};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::sync::Arc;

// See: https://stackoverflow.com/a/7001617/5155484
const ACCEPT: &str = "application/rss+xml, application/rdf+xml, application/atom+xml, application/feed+json, application/xml;q=0.9, text/xml;q=0.8";

/// Bytes inspected when checking that a URL serves a feed.
const SNIFF_LIMIT: usize = 8192;

/// Fetch one subscription's feed and return the items newer than its watermark,
/// in feed order. The watermark is advanced to the newest item seen.
pub async fn fetch_new_messages(
    client: &Client,
    store: &Arc<Store>,
    sub: &Subscription,
    options: FetchOptions,
) -> Result<Vec<Message>, FetchError> {
    let body = download(client, &sub.url).await?;
    let entries = parse_entries(&body)?;
    if entries.is_empty() {
        tracing::debug!(feed = %sub.name, "feed has no items");
        return Ok(Vec::new());
    }

    let name = sub.name.clone();
    let (before, first_observation) = match store
        .run(move |conn| Ok(Watermark::get_or_create(conn, &name)?))
        .await
    {
        Ok((watermark, found)) => (watermark.last_seen(), !found),
        Err(e) => {
            tracing::warn!(feed = %sub.name, error = %e, "could not read watermark, treating every item as new");
            (DateTime::<Utc>::UNIX_EPOCH, false)
        }
    };

    let scan = select_new(entries, before, Utc::now());

    if let Some(observed) = scan.observed_max.filter(|t| *t > before) {
        let name = sub.name.clone();
        let title = scan.first_title.clone();
        if let Err(e) = store
            .run(move |conn| Ok(Watermark::advance(conn, &name, observed, &title)?))
            .await
        {
            tracing::error!(feed = %sub.name, error = %e, "could not store watermark");
        }
    }

    if first_observation && options.suppress_first_burst {
        tracing::info!(
            feed = %sub.name,
            skipped = scan.messages.len(),
            "first observation of feed, existing items not pushed"
        );
        return Ok(Vec::new());
    }

    Ok(scan.messages)
}

/// Pick the entries whose effective time is after `watermark`.
///
/// The effective time is the published time, else the updated time, else
/// `now`. Undated entries therefore count as new on every fetch.
pub fn select_new(entries: Vec<FeedEntry>, watermark: DateTime<Utc>, now: DateTime<Utc>) -> Scan {
    let first_title = entries.first().map(|e| e.title.clone()).unwrap_or_default();
    let mut observed_max: Option<DateTime<Utc>> = None;
    let mut messages = Vec::new();

    for entry in entries {
        let effective = entry.published.or(entry.updated).unwrap_or(now);
        if observed_max.map_or(true, |max| effective > max) {
            observed_max = Some(effective);
        }
        if effective > watermark {
            messages.push(Message {
                title: entry.title,
                description: entry.description,
                link: entry.link,
                published_at: effective,
            });
        }
    }

    Scan {
        messages,
        observed_max: observed_max.filter(|t| *t > DateTime::<Utc>::UNIX_EPOCH),
        first_title,
    }
}

pub fn parse_entries(body: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
    let parsed = feed_rs::parser::parse(body)?;
    Ok(parsed.entries.into_iter().map(FeedEntry::from_feed_rs).collect())
}

async fn download(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).header("Accept", ACCEPT).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Checks that `url` is http(s), answers 200 and starts like an RSS, Atom or
/// XML document.
pub async fn validate_feed_url(client: &Client, url: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let mut response = client.get(parsed).header("Accept", ACCEPT).send().await?;
    if response.status() != StatusCode::OK {
        return Err(FetchError::Status(response.status()));
    }

    let mut head = Vec::with_capacity(SNIFF_LIMIT);
    while head.len() < SNIFF_LIMIT {
        match response.chunk().await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }
    head.truncate(SNIFF_LIMIT);

    let text = String::from_utf8_lossy(&head);
    if ["<rss", "<feed", "<?xml"].iter().any(|marker| text.contains(marker)) {
        Ok(())
    } else {
        Err(FetchError::NotAFeed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(title: &str, published: Option<DateTime<Utc>>) -> FeedEntry {
        FeedEntry {
            title: title.to_string(),
            description: String::new(),
            link: format!("https://example.com/{title}"),
            published,
            updated: None,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_select_new_uses_watermark() {
        let entries = vec![
            entry("c", Some(at(3))),
            entry("b", Some(at(2))),
            entry("a", Some(at(1))),
        ];
        let scan = select_new(entries, at(1), at(10));

        let titles: Vec<_> = scan.messages.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
        assert_eq!(scan.observed_max, Some(at(3)));
        assert_eq!(scan.first_title, "c");
        assert!(scan.messages.iter().all(|m| m.published_at > at(1)));
    }

    #[test]
    fn test_select_new_prefers_published_then_updated_then_now() {
        let mut updated_only = entry("updated", None);
        updated_only.updated = Some(at(5));
        let entries = vec![updated_only, entry("undated", None)];

        let scan = select_new(entries, at(4), at(9));
        assert_eq!(scan.messages[0].published_at, at(5));
        assert_eq!(scan.messages[1].published_at, at(9));
        assert_eq!(scan.observed_max, Some(at(9)));
    }

    #[test]
    fn test_select_new_nothing_after_watermark() {
        let scan = select_new(vec![entry("old", Some(at(1)))], at(2), at(9));
        assert!(scan.messages.is_empty());
        assert_eq!(scan.observed_max, Some(at(1)));
    }

    #[test]
    fn test_parse_entries_reads_rss() {
        let body = br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
<item><title>Hello</title><link>https://example.com/hello</link>
<description>&lt;b&gt;body&lt;/b&gt;</description>
<pubDate>Wed, 01 Jan 2025 08:00:00 GMT</pubDate></item>
</channel></rss>"#;
        let entries = parse_entries(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Hello");
        assert_eq!(entries[0].link, "https://example.com/hello");
        assert!(entries[0].description.contains("body"));
        assert_eq!(entries[0].published, Some(at(1)));
    }

    #[test]
    fn test_atom_entry_uses_alternate_link() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<title>T</title><id>urn:feed</id><updated>2025-01-01T08:00:00Z</updated>
<entry><title>Post</title><id>urn:post</id><updated>2025-01-01T08:00:00Z</updated>
<link rel="self" href="https://example.com/api/post.xml"/>
<link rel="replies" href="https://example.com/post/comments"/>
<link rel="alternate" href="https://example.com/post"/>
</entry>
<entry><title>Only self</title><id>urn:other</id><updated>2025-01-01T08:00:00Z</updated>
<link rel="self" href="https://example.com/api/other.xml"/>
</entry>
</feed>"#;
        let entries = parse_entries(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://example.com/post");
        assert_eq!(entries[1].link, "https://example.com/api/other.xml");
    }

    #[test]
    fn test_parse_entries_rejects_garbage() {
        assert!(matches!(parse_entries(b"not a feed"), Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_validate_feed_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<?xml version=\"1.0\"?><rss></rss>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>hi</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        validate_feed_url(&client, &format!("{}/rss", server.uri())).await.unwrap();
        assert!(matches!(
            validate_feed_url(&client, &format!("{}/html", server.uri())).await,
            Err(FetchError::NotAFeed)
        ));
        assert!(matches!(
            validate_feed_url(&client, &format!("{}/gone", server.uri())).await,
            Err(FetchError::Status(StatusCode::NOT_FOUND))
        ));
        assert!(matches!(
            validate_feed_url(&client, "ftp://example.com/rss").await,
            Err(FetchError::InvalidUrl(_))
        ));
    }
}

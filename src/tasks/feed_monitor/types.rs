use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// A feed item that arrived after the feed's watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
}

/// One parsed feed entry before deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn from_feed_rs(entry: feed_rs::model::Entry) -> Self {
        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        Self {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            description,
            link: preferred_link(entry.links),
            published: entry.published,
            updated: entry.updated,
        }
    }
}

/// The `alternate` (or unlabelled) link, else the first one. Atom entries may
/// list `self` or `replies` links ahead of the article.
fn preferred_link(links: Vec<feed_rs::model::Link>) -> String {
    let index = links
        .iter()
        .position(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .unwrap_or(0);
    links.into_iter().nth(index).map(|l| l.href).unwrap_or_default()
}

/// Items selected from one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub messages: Vec<Message>,
    /// newest effective time seen, `None` if nothing was after the epoch
    pub observed_max: Option<DateTime<Utc>>,
    pub first_title: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub suppress_first_burst: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub new_messages: usize,
    pub pushes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub subscriptions: usize,
    pub failed: usize,
    pub new_messages: usize,
    pub pushes: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// another cycle was still running
    Skipped,
}

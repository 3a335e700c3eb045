use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Pushes counted for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushStats {
    pub date: NaiveDate,
    pub total: u64,
    pub by_feed: BTreeMap<String, u64>,
}

impl PushStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            by_feed: BTreeMap::new(),
        }
    }
}

/// Day-bucketed push counters. The day rolls over lazily on the next access.
#[derive(Debug)]
pub struct PushStatsTracker {
    inner: Mutex<PushStats>,
}

impl Default for PushStatsTracker {
    fn default() -> Self {
        Self::from_stats(PushStats::empty(today()))
    }
}

impl PushStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stats(stats: PushStats) -> Self {
        Self {
            inner: Mutex::new(stats),
        }
    }

    /// Start a new bucket if the local date changed. Returns the finished day.
    pub fn reset_if_needed(&self) -> Option<PushStats> {
        self.reset_if_needed_on(today())
    }

    pub fn reset_if_needed_on(&self, date: NaiveDate) -> Option<PushStats> {
        let mut stats = self.lock();
        roll(&mut stats, date)
    }

    pub fn record_push(&self, feed: &str) {
        self.record_push_on(today(), feed);
    }

    pub fn record_push_on(&self, date: NaiveDate, feed: &str) {
        let mut stats = self.lock();
        roll(&mut stats, date);
        stats.total += 1;
        *stats.by_feed.entry(feed.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> PushStats {
        self.snapshot_on(today())
    }

    pub fn snapshot_on(&self, date: NaiveDate) -> PushStats {
        let mut stats = self.lock();
        roll(&mut stats, date);
        stats.clone()
    }

    /// Human readable report, busiest feeds first.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        let mut lines = vec![
            format!("📊 Push statistics for {}", stats.date.format("%Y-%m-%d")),
            format!("Total pushes: {}", stats.total),
        ];
        let mut feeds: Vec<_> = stats.by_feed.iter().collect();
        feeds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        lines.extend(feeds.into_iter().map(|(feed, count)| format!("{feed}: {count}")));
        lines.join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PushStats> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn roll(stats: &mut PushStats, date: NaiveDate) -> Option<PushStats> {
    if stats.date == date {
        return None;
    }
    let finished = std::mem::replace(stats, PushStats::empty(date));
    tracing::info!(
        date = %finished.date,
        total = finished.total,
        "push statistics rolled over"
    );
    Some(finished)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

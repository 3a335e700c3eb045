use super::stats::PushStatsTracker;
use super::types::{CycleOutcome, CycleReport, FetchOptions, SubscriptionReport};
use super::{fetcher, matcher};
use crate::db::Store;
use crate::errors::FetchError;
use crate::models::{keywords::UserKeywords, subscription::Subscription};
use crate::tasks::telegram_sender::formatter;
use crate::tasks::telegram_sender::runner::DeliveryQueue;
use futures_util::FutureExt;
use reqwest::Client;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub cycle_interval: Duration,
    /// 0 disables mirroring
    pub admin_id: i64,
    /// whether a push endpoint is configured
    pub mirror_summaries: bool,
    /// 0 means one task per subscription with no limit
    pub max_concurrent_feeds: usize,
    pub suppress_first_burst: bool,
}

/// Drives poll cycles: fetch every subscription, match new items against the
/// subscribers' keyword rules and hand matches to the delivery queue.
pub struct FeedMonitor {
    store: Arc<Store>,
    client: Client,
    stats: Arc<PushStatsTracker>,
    deliveries: DeliveryQueue,
    settings: MonitorSettings,
    running: Mutex<()>,
}

/// Everything a subscription task needs, loaded once per cycle.
struct CycleContext {
    store: Arc<Store>,
    client: Client,
    stats: Arc<PushStatsTracker>,
    deliveries: DeliveryQueue,
    keywords: HashMap<i64, Vec<String>>,
    admin_id: i64,
    mirror_summaries: bool,
    fetch: FetchOptions,
}

impl FeedMonitor {
    pub fn new(
        store: Arc<Store>,
        client: Client,
        stats: Arc<PushStatsTracker>,
        deliveries: DeliveryQueue,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            client,
            stats,
            deliveries,
            settings,
            running: Mutex::new(()),
        }
    }

    /// Run a cycle on every tick. Each cycle runs in its own task so a tick that
    /// lands while one is still going is seen and skipped.
    pub async fn start(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.settings.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.settings.cycle_interval.as_secs(),
            "feed monitor started"
        );

        loop {
            ticker.tick().await;
            let monitor = Arc::clone(&self);
            tokio::spawn(async move {
                monitor.try_run_cycle().await;
            });
        }
    }

    /// Run one cycle unless another is in progress.
    pub async fn try_run_cycle(&self) -> CycleOutcome {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!("previous cycle still running, tick skipped");
            return CycleOutcome::Skipped;
        };
        CycleOutcome::Completed(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        self.stats.reset_if_needed();

        let loaded = self
            .store
            .run(|conn| Ok((Subscription::get_all(conn)?, UserKeywords::get_all(conn)?)))
            .await;
        let (subscriptions, keywords) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(error = %e, "could not load subscriptions, cycle abandoned");
                return CycleReport {
                    elapsed: started.elapsed(),
                    ..Default::default()
                };
            }
        };

        let mut report = CycleReport {
            subscriptions: subscriptions.len(),
            ..Default::default()
        };
        let ctx = Arc::new(CycleContext {
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            stats: Arc::clone(&self.stats),
            deliveries: self.deliveries.clone(),
            keywords,
            admin_id: self.settings.admin_id,
            mirror_summaries: self.settings.mirror_summaries,
            fetch: FetchOptions {
                suppress_first_burst: self.settings.suppress_first_burst,
            },
        });
        let limiter = (self.settings.max_concurrent_feeds > 0)
            .then(|| Arc::new(Semaphore::new(self.settings.max_concurrent_feeds)));

        let mut tasks = JoinSet::new();
        for sub in subscriptions {
            let ctx = Arc::clone(&ctx);
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let name = sub.name.clone();
                match AssertUnwindSafe(process_subscription(ctx, sub))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(done)) => Some(done),
                    Ok(Err(e)) => {
                        tracing::warn!(feed = %name, error = %e, "feed fetch failed");
                        None
                    }
                    Err(_) => {
                        tracing::error!(feed = %name, "subscription task panicked");
                        None
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(done)) => {
                    report.new_messages += done.new_messages;
                    report.pushes += done.pushes;
                }
                Ok(None) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "subscription task failed");
                    report.failed += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            subscriptions = report.subscriptions,
            failed = report.failed,
            new_messages = report.new_messages,
            pushes = report.pushes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "poll cycle finished"
        );
        report
    }
}

async fn process_subscription(
    ctx: Arc<CycleContext>,
    sub: Subscription,
) -> Result<SubscriptionReport, FetchError> {
    let messages = fetcher::fetch_new_messages(&ctx.client, &ctx.store, &sub, ctx.fetch).await?;
    let mut report = SubscriptionReport {
        new_messages: messages.len(),
        pushes: 0,
    };
    if messages.is_empty() {
        tracing::debug!(feed = %sub.name, "no new items");
        return Ok(report);
    }

    for message in &messages {
        for &user_id in &sub.users {
            let Some(rules) = ctx.keywords.get(&user_id).filter(|r| !r.is_empty()) else {
                continue;
            };
            let matched = matcher::matches(message, rules);
            if matched.is_empty() {
                continue;
            }

            let notification = formatter::compose(&sub, message, &matched);
            ctx.deliveries.push(user_id, notification.primary);
            ctx.stats.record_push(&sub.name);
            report.pushes += 1;
            tracing::debug!(feed = %sub.name, user_id, title = %message.title, "item matched");

            if ctx.admin_id != 0 && user_id == ctx.admin_id && ctx.mirror_summaries {
                ctx.deliveries.mirror(notification.summary);
            }
        }
    }

    tracing::info!(
        feed = %sub.name,
        new_messages = report.new_messages,
        pushes = report.pushes,
        "subscription processed"
    );
    Ok(report)
}

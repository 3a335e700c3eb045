use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use dotenvy::dotenv;
use feedpush::{
    api::{self, AppState},
    config::AppConfig,
    db::Store,
    http, observability,
    tasks::{
        feed_monitor::{
            runner::{FeedMonitor, MonitorSettings},
            stats::PushStatsTracker,
        },
        telegram_sender::runner::{self as delivery, MirrorEndpoint},
    },
    telegram::{TelegramClient, TelegramConfig},
};
use std::io;
use std::sync::Arc;

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single poll cycle, wait for its deliveries and exit
    #[clap(long)]
    once: bool,
}

fn main() -> io::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    observability::init_logging();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    config.log_summary();

    tracing::info!("Opening database and running migrations");
    let store = Store::open(&config.database_url).map_err(|e| {
        tracing::error!(error = %e, database = %config.database_url, "could not open database");
        io::Error::other(e)
    })?;

    run(args, config, Arc::new(store))
}

#[actix_web::main]
async fn run(args: Args, config: AppConfig, store: Arc<Store>) -> io::Result<()> {
    let client = http::build_client(config.proxy_url.as_deref(), config.http_timeout)
        .map_err(io::Error::other)?;

    let telegram = Arc::new(TelegramClient::new(
        client.clone(),
        TelegramConfig {
            bot_token: config.bot_token.clone(),
            api_base_url: config.telegram_api_url.clone(),
        },
    ));
    let mirror = config
        .push_endpoint
        .clone()
        .map(|template| MirrorEndpoint::new(client.clone(), template));
    let (deliveries, dispatcher) = delivery::spawn(telegram, mirror);

    let stats = Arc::new(PushStatsTracker::new());
    let monitor = Arc::new(FeedMonitor::new(
        store.clone(),
        client.clone(),
        stats.clone(),
        deliveries,
        MonitorSettings {
            cycle_interval: config.cycle_interval,
            admin_id: config.admin_id,
            mirror_summaries: config.push_endpoint.is_some(),
            max_concurrent_feeds: config.max_concurrent_feeds,
            suppress_first_burst: config.suppress_first_burst,
        },
    ));

    if args.once {
        let outcome = monitor.try_run_cycle().await;
        tracing::info!(?outcome, "single cycle finished, waiting for deliveries");
        drop(monitor);
        dispatcher.await.map_err(io::Error::other)?;
        return Ok(());
    }

    tokio::spawn(monitor.start());

    let Some(api_token) = config.api_token.clone() else {
        tracing::info!("FP_API_TOKEN not set, admin API disabled");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        return Ok(());
    };

    let state = web::Data::new(AppState {
        store,
        stats,
        client,
        suppress_first_burst: config.suppress_first_burst,
        api_token,
    });

    tracing::info!("Starting admin API at http://127.0.0.1:{}", config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(middleware::NormalizePath::new(
                middleware::TrailingSlash::Trim,
            ))
            .app_data(state.clone())
            .configure(api::routes::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", config.port))?
    .run()
    .await
}

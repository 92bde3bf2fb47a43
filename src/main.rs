//! Relaygate - fleet coordinator for relay-connected automation devices

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaygate::{
    accounts::AccountAllocator,
    cache::CacheContext,
    config::Args,
    db::{redact_uri, MongoAccountStore, MongoClient, MongoDeviceSettings, MongoStatsStore},
    registry::{ConnectionRegistry, RelayPoller},
    relay::RelayClient,
    stats::{GameStatsCollector, StatsCollector, StatsProxy},
    worker::{ProbeSettings, ProbeWorkerFactory, WorkerLauncher},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("relaygate={},info", args.log_level).into());
    if args.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Relaygate - device fleet coordinator");
    info!("======================================");
    info!("Instance ID: {}", args.instance_id);
    info!("Relay: {}", args.relay_base());
    info!("Poll interval: {:?}", args.poll_interval());
    info!(
        "Cache: {}",
        if args.cache.enable_cache {
            args.cache.endpoint_key()
        } else {
            "disabled".to_string()
        }
    );
    info!("MongoDB: {}", redact_uri(&args.mongodb_uri));
    match args.encounter_limit() {
        Some(limit) => info!("Account encounter limit: {}", limit),
        None => info!("Account encounter limit: disabled"),
    }
    info!(
        "Game stats: {} (via cache: {})",
        args.game_stats, args.game_stats_via_cache
    );
    if args.enable_configmode {
        warn!("Config mode enabled: every device starts paused");
    }
    info!("======================================");

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Bound once for this process and handed to every component
    let cache = Arc::new(CacheContext::bind(&args.cache));

    let account_store = Arc::new(MongoAccountStore::new(&mongo, args.encounter_limit()).await?);
    let devices = Arc::new(MongoDeviceSettings::new(&mongo).await?);
    let allocator = Arc::new(AccountAllocator::new(
        Arc::clone(&cache),
        account_store,
        args.encounter_limit(),
    ));

    let collector = Arc::new(GameStatsCollector::new(
        Arc::new(MongoStatsStore::new(&mongo).await?),
        args.instance_id.to_string(),
    ));
    let stats = Arc::new(StatsProxy::new(
        collector,
        args.game_stats,
        args.game_stats_via_cache.then(|| Arc::clone(&cache)),
    ));
    let stats_task = {
        let stats = Arc::clone(&stats);
        let every = args.stats_flush_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = stats.run_stats_collector().await {
                    warn!("Stats collector run failed: {}", e);
                }
            }
        })
    };

    let relay = RelayClient::new(args.relay_base(), args.relay_list_timeout())?;
    let factory = Arc::new(ProbeWorkerFactory::new(
        devices.clone(),
        Arc::clone(&allocator),
        ProbeSettings {
            command: args.probe_command.clone(),
            interval: args.probe_interval(),
        },
    ));
    let launcher = WorkerLauncher::new(relay.clone(), factory, args.command_timeout());
    let registry = Arc::new(ConnectionRegistry::new(
        launcher,
        devices,
        args.enable_configmode,
    ));

    let poller = RelayPoller::new(relay, Arc::clone(&registry), args.poll_interval()).spawn();
    info!("Relaygate running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    poller.shutdown().await;
    stats_task.abort();
    if let Err(e) = stats.run_stats_collector().await {
        warn!("Final stats flush failed: {}", e);
    }

    info!("Relaygate stopped");
    Ok(())
}

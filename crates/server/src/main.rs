mod api;
mod router;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use casewatch_core::Config;
use casewatch_notify::templating::TemplateRenderer;
use casewatch_notify::{Dispatcher, LogNotifier, Notifier, WebhookNotifier};
use casewatch_timer::{
    MemoryStore, PgStore, SchedulerConfig, StoreError, TargetStore, TimerScheduler, TimerStore,
};

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "casewatch-server", about = "SLA timer engine for support cases")]
struct Args {
    /// Directory of YAML target definitions to seed at startup.
    #[arg(long, env = "SLA_TARGETS_DIR")]
    targets_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    casewatch_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    config.log_summary();

    let (targets, timers) = build_stores(&config).await?;

    if let Some(dir) = &args.targets_dir {
        seed_targets(dir, targets.as_ref()).await;
    }

    let dispatcher = build_dispatcher(&config)?;
    let scheduler = Arc::new(TimerScheduler::new(
        timers.clone(),
        dispatcher,
        SchedulerConfig {
            tick_interval: Duration::from_secs(config.scheduler.tick_interval_secs),
            batch_size: config.scheduler.batch_size as usize,
        },
    ));
    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn(scheduler.run(shutdown.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router::build_router(Arc::new(AppState::new(config, targets, timers)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("casewatch listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// PostgreSQL when configured, in-memory otherwise.
async fn build_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn TargetStore>, Arc<dyn TimerStore>)> {
    if config.postgres.is_configured() {
        let store = PgStore::connect(
            &config.postgres.connection_string(),
            config.postgres.max_connections,
        )
        .await?;
        store.migrate().await?;
        info!("connected to PostgreSQL at {}", config.postgres.host);
        let store = Arc::new(store);
        Ok((store.clone(), store))
    } else {
        info!("PostgreSQL not configured, using in-memory store");
        let store = Arc::new(MemoryStore::new());
        Ok((store.clone(), store))
    }
}

/// Seed target definitions from a YAML directory. Already-present keys
/// are left untouched so seeding is idempotent across restarts.
async fn seed_targets(dir: &PathBuf, store: &dyn TargetStore) {
    let (loaded, results) = match casewatch_rules::loader::load_dir(dir) {
        Ok(r) => r,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read targets directory");
            return;
        }
    };
    info!(
        dir = %dir.display(),
        loaded = loaded.len(),
        files = results.len(),
        "seeding target definitions"
    );

    for target in loaded {
        let key = target.key.clone();
        match store.insert(target).await {
            Ok(_) => info!(key = %key, "seeded target"),
            Err(StoreError::DuplicateTargetKey(_)) => {
                info!(key = %key, "target already present, keeping stored definition");
            }
            Err(e) => warn!(key = %key, error = %e, "failed to seed target"),
        }
    }
}

/// Webhook channel when configured, log channel otherwise.
fn build_dispatcher(config: &Config) -> anyhow::Result<Arc<Dispatcher>> {
    let channels: Vec<Box<dyn Notifier>> = match &config.notify.webhook_url {
        Some(url) => {
            let renderer = Arc::new(TemplateRenderer::new());
            let webhook = WebhookNotifier::new(
                url.clone(),
                HashMap::new(),
                config.notify.webhook_template.clone(),
                renderer,
            )?;
            vec![Box::new(webhook)]
        }
        None => vec![Box::new(LogNotifier::new())],
    };
    Ok(Arc::new(Dispatcher::new(channels)))
}

use anyhow::Context;
use message_bus::{NatsClient, Publisher, PublisherConfig, Subscriber, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use utbetaling::{
    avstemming::{Grensesnittavstemmer, HttpOppdragsLedger, Konsistensavstemmer, OppdragsLedger},
    dispatcher::{KvitteringMottaker, OppdragSender, VedtakMottaker},
    leader, Config, JobScheduler,
};
use utbetaling_core::{RocksDbUtbetalingStore, UtbetalingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting utbetaling...");

    let config = match std::env::var("UTBETALING_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("Failed to load {}", path))?,
        Err(_) => Config::from_env().context("Failed to load configuration from environment")?,
    };

    let store: Arc<dyn UtbetalingStore> = Arc::new(
        RocksDbUtbetalingStore::open(&config.storage).context("Failed to open utbetaling store")?,
    );
    info!(data_dir = %config.storage.data_dir.display(), "Store opened");

    let transport: Arc<dyn Transport> = Arc::new(
        NatsClient::connect(&config.nats)
            .await
            .context("Failed to connect to NATS")?,
    );
    let publisher = Publisher::new(
        transport.clone(),
        PublisherConfig {
            publish_timeout_ms: config.dispatch.send_timeout_ms,
        },
    );

    // Listeners
    let sender = OppdragSender::new(publisher.clone(), &config.queues, config.dispatch.clone());
    let kvittering = Subscriber::new(transport.clone(), config.queues.reply.clone());
    let kvittering_mottaker = Arc::new(KvitteringMottaker::new(store.clone()));
    let kvittering_task = tokio::spawn(async move { kvittering.run(kvittering_mottaker).await });

    let vedtak = Subscriber::new(transport.clone(), config.queues.vedtak.clone());
    let vedtak_mottaker = Arc::new(VedtakMottaker::new(store.clone(), sender));
    let vedtak_task = tokio::spawn(async move { vedtak.run(vedtak_mottaker).await });

    // Scheduled reconciliation
    let ledger: Option<Arc<dyn OppdragsLedger>> = match &config.avstemming.ledger_url {
        Some(url) => Some(Arc::new(HttpOppdragsLedger::new(
            url.clone(),
            Duration::from_millis(config.avstemming.ledger_timeout_ms),
        )?)),
        None => None,
    };

    let mut scheduler = JobScheduler::new(leader::from_config(&config.leader)?);
    scheduler.schedule(
        Arc::new(Grensesnittavstemmer::new(
            store.clone(),
            publisher.clone(),
            config.queues.avstemming.clone(),
            config.avstemming.clone(),
        )),
        &config.avstemming.grensesnitt,
    );
    scheduler.schedule(
        Arc::new(Konsistensavstemmer::new(
            store.clone(),
            publisher.clone(),
            config.queues.konsistensavstemming.clone(),
            ledger,
            config.avstemming.clone(),
        )),
        &config.avstemming.konsistens,
    );

    info!(jobs = scheduler.len(), "Utbetaling started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = kvittering_task => {
            error!(?result, "Kvittering listener stopped");
        }
        result = vedtak_task => {
            error!(?result, "Vedtak listener stopped");
        }
    }

    scheduler.shutdown();
    info!("Utbetaling stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
}

//! Composition root: builds the durable store, the volatile counter, the
//! health probe, the circuit breaker, and wires them into the admission
//! path, settlement worker, consistency engine, and HTTP filter tree. Owns
//! the one `tokio` runtime and the one `CancellationToken` every background
//! task observes, in the idiom of `ilp-node::node::InterledgerNode::serve`.

mod config;

use clap::Parser;
use config::{Cli, NodeConfig};
use ledger_counter_redis::RedisCounterBuilder;
use ledger_errors::LedgerError;
use ledger_service::admission::AdmissionPath;
use ledger_service::breaker::CircuitBreaker;
use ledger_service::consistency::ConsistencyEngine;
use ledger_service::health::{HealthHandle, HealthProbe};
use ledger_service::query::QueryPath;
use ledger_service::settlement::SettlementWorker;
use ledger_store_postgres::PgStoreBuilder;
use redis::IntoConnectionInfo;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let node_config = match config::load(&cli) {
        Ok(node_config) => node_config,
        Err(err) => {
            eprintln!("invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = run(node_config).await {
        tracing::error!(error = %err, "ledger-node exited with an error");
        std::process::exit(1);
    }
}

async fn run(config: NodeConfig) -> Result<(), LedgerError> {
    let service_name: &'static str = Box::leak(config.service_name.clone().into_boxed_str());

    let store = Arc::new(
        PgStoreBuilder::new(config.database_url.clone())
            .connect()
            .await?,
    );

    let redis_connection_info = config
        .redis_url
        .as_str()
        .into_connection_info()
        .map_err(|err| LedgerError::CounterUnavailable(Box::new(err)))?;
    let counter = Arc::new(
        RedisCounterBuilder::new(redis_connection_info)
            .key_prefix(config.counter_key_prefix.clone())
            .connect()
            .await?,
    );

    let breaker = Arc::new(
        CircuitBreaker::new()
            .with_failure_threshold(config.breaker_failure_threshold)
            .with_cooldown(Duration::from_secs(config.breaker_cooldown_secs)),
    );

    let health_probe = Arc::new(
        HealthProbe::new().with_interval(Duration::from_secs(config.health_probe_interval_secs)),
    );
    let health_handle: HealthHandle = health_probe.as_ref().into();

    let admission = Arc::new(AdmissionPath::new(
        store.clone(),
        counter.clone(),
        breaker,
        health_handle.clone(),
    ));
    let query = Arc::new(QueryPath::new(store.clone()));
    let consistency = Arc::new(ConsistencyEngine::new(store.clone(), counter.clone()));
    let health_handle_for_api = health_handle.clone();
    let settlement = Arc::new(
        SettlementWorker::new(store.clone(), counter.clone(), consistency.clone(), health_handle)
            .with_period(Duration::from_secs(config.settlement_period_secs))
            .with_batch_size(config.settlement_batch_size),
    );

    let cancel = CancellationToken::new();

    let health_task = tokio::spawn({
        let health_probe = health_probe.clone();
        let counter = counter.clone();
        let cancel = cancel.clone();
        async move { health_probe.run(counter, cancel).await }
    });

    let settlement_task = tokio::spawn({
        let settlement = settlement.clone();
        let cancel = cancel.clone();
        async move { settlement.run(cancel).await }
    });

    let consistency_task = tokio::spawn({
        let consistency = consistency.clone();
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.consistency_interval_secs);
        async move { run_consistency_loop(consistency, cancel, interval).await }
    });

    let api = ledger_api::create_ledger_api_filter(
        admission,
        query,
        health_handle_for_api,
        cancel.clone(),
        service_name,
        VERSION,
    );

    let shutdown_cancel = cancel.clone();
    let (addr, server) = warp::serve(api).bind_with_graceful_shutdown(
        config.http_bind_address,
        async move {
            shutdown_signal().await;
            info!("shutdown signal received, cancelling background tasks");
            shutdown_cancel.cancel();
        },
    );
    info!(address = %addr, "ledger-node HTTP API listening");
    server.await;

    let _ = tokio::join!(health_task, settlement_task, consistency_task);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install ctrl-c handler, shutting down anyway");
    }
}

async fn run_consistency_loop<S, C>(
    engine: Arc<ConsistencyEngine<S, C>>,
    cancel: CancellationToken,
    interval: Duration,
) where
    S: ledger_types::traits::DurableStore,
    C: ledger_types::traits::AtomicCounter,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("consistency engine stopping");
                return;
            }
            _ = ticker.tick() => {
                match engine.validate_and_repair().await {
                    Ok(report) => {
                        if report.accounts_repaired > 0 {
                            info!(
                                repaired = report.accounts_repaired,
                                checked = report.accounts_checked,
                                "consistency sweep repaired divergent accounts"
                            );
                        }
                    }
                    Err(err) => warn!(error = %err, "consistency sweep failed"),
                }
            }
        }
    }
}


mod channel_accounts;
mod cli;
mod config;
mod crash_tracker;
mod manager;
mod metrics;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use manager::Manager;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tss_chain::{CurrentLedger, DynSigner, HttpBlockchainClient, KeySource, LedgerTracker, PassphraseKeySource, Signer};
use tss_events::LoggingEventProducer;
use tss_handlers::{FeeParameters, HandlerFactory};
use tss_store::{BundleLoader, ChannelAccountStore, TransactionStore};
use tss_sync::{LoggingPaymentRepository, PaymentStatusSynchronizer};
use tss_worker::{ProcessingLimiter, WorkerChannelAccountStore, WorkerDeps, WorkerTransactionStore};

/// How many channel accounts a polling tick will ever ask for at once, the
/// limiter's ceiling.
const MAX_PROCESSING_LIMIT: u32 = 256;

/// How long a cached "current ledger" reading is trusted before the tracker
/// re-fetches it from the chain.
const LEDGER_CACHE_TTL: Duration = Duration::from_secs(5);

/// Bounded attempts the reconciliation loop polls `transaction_detail`
/// before giving up on a submitted-but-unconfirmed transaction.
const MAX_RECONCILIATION_ATTEMPTS: u32 = 30;

/// How long the manager and synchronizer are given to finish their
/// in-flight work after a shutdown signal before being abandoned.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Bounded connection pool size; the manager and synchronizer share one
/// pool, each with its own bounded concurrency on top.
const DATABASE_POOL_SIZE: u32 = 20;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Start(config) => runtime.block_on(run_start(config)),
        Command::ChannelAccounts(args) => runtime.block_on(run_channel_accounts(args)),
    }
}

async fn run_channel_accounts(args: cli::ChannelAccountsArgs) -> ExitCode {
    init_tracing("info");
    match channel_accounts::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "channel-accounts command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run_start(config: Config) -> ExitCode {
    init_tracing(&config.log_level);

    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    match build_and_run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error during startup or execution");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_and_run(config: Config) -> anyhow::Result<()> {
    let pool = tss_store::connect(&config.database_url, DATABASE_POOL_SIZE)
        .await
        .context("connecting to the transaction store")?;

    let channel_account_store = Arc::new(ChannelAccountStore::new(pool.clone()));
    let transaction_store = Arc::new(TransactionStore::new(pool.clone()));
    let bundle_loader = Arc::new(BundleLoader::new(pool));

    let http_client = Arc::new(HttpBlockchainClient::new(config.horizon_url.clone(), Duration::from_secs(30)));
    let ledger: Arc<dyn CurrentLedger> = Arc::new(LedgerTracker::new(http_client.clone(), LEDGER_CACHE_TTL));
    let chain: Arc<dyn tss_chain::BlockchainClient> = http_client;

    let key_source: Box<dyn KeySource> = Box::new(PassphraseKeySource::new(
        &config.signing_passphrase,
        config.distribution_seed.clone(),
    ));
    let signer: Arc<DynSigner> = Arc::new(Signer::new(key_source, config.network_passphrase.clone()));

    let handlers = Arc::new(HandlerFactory::default());
    let events = Arc::new(LoggingEventProducer);
    let limiter = Arc::new(ProcessingLimiter::new(MAX_PROCESSING_LIMIT));
    let crash_tracker = Arc::from(crash_tracker::from_config_type(config.crash_tracker_type));
    let metrics = Arc::from(metrics::from_config_type(config.tss_metrics_type));

    let worker_transaction_store: Arc<dyn WorkerTransactionStore> = transaction_store.clone();
    let worker_channel_account_store: Arc<dyn WorkerChannelAccountStore> = channel_account_store;

    let worker_deps = Arc::new(WorkerDeps {
        chain,
        ledger: ledger.clone(),
        signer,
        transaction_store: worker_transaction_store,
        channel_account_store: worker_channel_account_store,
        handlers,
        events: events.clone(),
        limiter: limiter.clone(),
        fees: FeeParameters {
            max_base_fee: config.max_base_fee,
            protocol_min_base_fee: config::PROTOCOL_MINIMUM_BASE_FEE,
        },
        max_reconciliation_attempts: MAX_RECONCILIATION_ATTEMPTS,
    });

    let manager = Manager::new(
        bundle_loader,
        ledger,
        limiter,
        worker_deps,
        crash_tracker,
        metrics,
        config.queue_polling_interval(),
    );

    let payments = Arc::new(LoggingPaymentRepository);
    let sync_metrics = Arc::from(metrics::sync_metrics_from_config_type(config.tss_metrics_type));
    let synchronizer = PaymentStatusSynchronizer::new(
        transaction_store.clone(),
        payments,
        events,
        sync_metrics,
        config.sync_batch_size,
    );

    let configured_tenant_ids = config.sync_tenant_ids();
    let tenant_ids: Vec<tss_types::TenantId> = if configured_tenant_ids.is_empty() {
        transaction_store
            .list_distinct_tenant_ids()
            .await
            .context("discovering tenants for the payment-status synchronizer")?
    } else {
        configured_tenant_ids
            .into_iter()
            .filter_map(|raw| tss_types::TenantId::new(raw).ok())
            .collect()
    };

    let cancellation = CancellationToken::new();
    install_signal_handlers(cancellation.clone());

    let manager_cancellation = cancellation.clone();
    let manager_task = tokio::spawn(async move {
        manager.run(manager_cancellation, SHUTDOWN_GRACE_PERIOD).await;
    });

    let sync_cancellation = cancellation.clone();
    let sync_interval = config.sync_interval();
    let sync_task = tokio::spawn(async move {
        synchronizer.run_periodically(&tenant_ids, sync_interval, sync_cancellation).await;
    });

    info!("transaction submission service started");
    let _ = tokio::join!(manager_task, sync_task);
    info!("transaction submission service stopped");
    Ok(())
}

fn install_signal_handlers(cancellation: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        cancellation.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("installing SIGQUIT handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

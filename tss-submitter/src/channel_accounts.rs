//! Implements the `tss channel-accounts` subcommands: growing, shrinking,
//! inspecting, and verifying the channel-account pool out-of-band from the
//! manager's own polling loop.

use crate::cli::{ChannelAccountsAction, ChannelAccountsArgs, ConnectionArgs};
use anyhow::{bail, Context};
use ed25519_dalek::SigningKey;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tss_chain::{BlockchainClient, HttpBlockchainClient, PassphraseKeySource, Signer};
use tss_handlers::{Envelope, EnvelopeBody, Operation};
use tss_store::ChannelAccountStore;
use tss_types::{strkey, TenantId};

/// Connection pool size for the provisioning CLI — short-lived, low
/// concurrency, nothing like the manager's worker pool.
const CLI_POOL_SIZE: u32 = 3;

const FUNDING_ASSET_CODE: &str = "xlm";
const FUNDING_BASE_FEE_STROOPS: i64 = 100;
const FUNDING_TIME_BOUNDS_WIDTH_SECONDS: i64 = 300;
const CHANNEL_ACCOUNT_STARTING_BALANCE_STROOPS: i64 = 50_000_000;

/// Ledgers of slack given to a freshly funded account before it is
/// eligible for a lease, so its funding transaction has landed by the time
/// a worker tries to use it.
const FUNDING_SETTLE_LEDGERS: u32 = 3;

/// The signer treats the distribution account as tenant-independent; this
/// literal is never persisted or compared against a real tenant.
fn provisioning_tenant() -> TenantId {
    TenantId::new("channel-account-provisioning").expect("literal is non-empty")
}

pub async fn run(args: ChannelAccountsArgs) -> anyhow::Result<()> {
    let pool = tss_store::connect(&args.connection.database_url, CLI_POOL_SIZE)
        .await
        .context("connecting to the transaction store")?;
    let store = Arc::new(ChannelAccountStore::new(pool));
    let chain: Arc<dyn BlockchainClient> = Arc::new(HttpBlockchainClient::new(
        args.connection.horizon_url.clone(),
        Duration::from_secs(30),
    ));

    match args.action {
        ChannelAccountsAction::Create { count } => {
            create(&args.connection, &store, &chain, count, args.dry_run).await
        }
        ChannelAccountsAction::Ensure { target } => {
            ensure(&args.connection, &store, &chain, target, args.dry_run).await
        }
        ChannelAccountsAction::Delete { count } => delete(&store, &chain, count, args.dry_run).await,
        ChannelAccountsAction::View => view(&store, &chain).await,
        ChannelAccountsAction::Verify => verify(&store, &chain).await,
    }
}

fn build_signer(conn: &ConnectionArgs) -> Signer<PassphraseKeySource> {
    let key_source = PassphraseKeySource::new(&conn.signing_passphrase, conn.distribution_seed.clone());
    Signer::new(key_source, conn.network_passphrase.clone())
}

async fn distribution_public_key(signer: &Signer<PassphraseKeySource>) -> anyhow::Result<String> {
    signer
        .distribution_public_key(&provisioning_tenant())
        .await
        .context("resolving the distribution account's public key")
}

/// Funds one freshly generated channel account from the distribution
/// account and, on success, records it in the pool.
async fn create_one(
    conn: &ConnectionArgs,
    store: &ChannelAccountStore,
    chain: &Arc<dyn BlockchainClient>,
    signer: &Signer<PassphraseKeySource>,
    distribution_public_key: &str,
    current_ledger: u32,
) -> anyhow::Result<String> {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    let public_key = strkey::encode_ed25519_public_key(&signing_key.verifying_key().to_bytes());

    let key_source = PassphraseKeySource::new(&conn.signing_passphrase, conn.distribution_seed.clone());
    let encrypted_private_key = key_source
        .encrypt_seed(&seed)
        .context("encrypting the new channel account's key material")?;

    let detail = chain
        .account_detail(distribution_public_key)
        .await
        .context("reading the distribution account's sequence number")?;
    let now = chrono::Utc::now().timestamp();
    let body = EnvelopeBody {
        source_account: distribution_public_key.to_string(),
        sequence_number: detail.sequence_number + 1,
        increment_sequence_num: true,
        time_bounds: Some((now, now + FUNDING_TIME_BOUNDS_WIDTH_SECONDS)),
        max_ledger: current_ledger + FUNDING_SETTLE_LEDGERS,
        base_fee: FUNDING_BASE_FEE_STROOPS,
        operations: vec![Operation::Payment {
            source_account: distribution_public_key.to_string(),
            destination: public_key.clone(),
            asset_code: FUNDING_ASSET_CODE.to_string(),
            asset_issuer: None,
            amount_stroops: CHANNEL_ACCOUNT_STARTING_BALANCE_STROOPS,
            memo: None,
        }],
    };

    let mut envelope = Envelope::new(body);
    let signing_bytes = envelope.body.signing_bytes().context("serializing the funding envelope")?;
    let (signature, signer_public_key) = signer
        .sign_with_distribution_account(&provisioning_tenant(), &signing_bytes)
        .await
        .context("signing the funding envelope")?;
    envelope.push_signature(signer_public_key, &signature);
    let envelope_b64 = envelope.to_base64().context("encoding the funding envelope")?;

    chain
        .submit_transaction(&envelope_b64)
        .await
        .with_context(|| format!("funding {public_key}"))?;

    store
        .batch_insert_and_lock(&[(public_key.clone(), encrypted_private_key)], current_ledger + FUNDING_SETTLE_LEDGERS)
        .await
        .context("recording the new channel account")?;

    Ok(public_key)
}

async fn create(
    conn: &ConnectionArgs,
    store: &ChannelAccountStore,
    chain: &Arc<dyn BlockchainClient>,
    count: u32,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        info!(count, "dry run: would fund and add {count} channel accounts to the pool");
        return Ok(());
    }

    let signer = build_signer(conn);
    let distribution_public_key = distribution_public_key(&signer).await?;
    let current_ledger = chain.latest_ledger().await.context("reading the current ledger")?;

    let mut created = 0u32;
    for _ in 0..count {
        match create_one(conn, store, chain, &signer, &distribution_public_key, current_ledger).await {
            Ok(public_key) => {
                created += 1;
                info!(public_key, "channel account created and funded");
            }
            Err(err) => {
                warn!(error = %err, created, requested = count, "stopping early after a funding failure");
                return Err(err);
            }
        }
    }
    info!(created, "channel account creation complete");
    Ok(())
}

async fn ensure(
    conn: &ConnectionArgs,
    store: &ChannelAccountStore,
    chain: &Arc<dyn BlockchainClient>,
    target: u32,
    dry_run: bool,
) -> anyhow::Result<()> {
    tss_types::channel_account::validate_pool_size(target).map_err(anyhow::Error::msg)?;
    let current = store.count().await.context("reading the current pool size")?;
    let target = target as i64;

    if target > current {
        create(conn, store, chain, (target - current) as u32, dry_run).await
    } else if target < current {
        delete(store, chain, (current - target) as u32, dry_run).await
    } else {
        info!(target, "pool already at the requested size");
        Ok(())
    }
}

async fn delete(
    store: &ChannelAccountStore,
    chain: &Arc<dyn BlockchainClient>,
    count: u32,
    dry_run: bool,
) -> anyhow::Result<()> {
    let current_ledger = chain.latest_ledger().await.context("reading the current ledger")?;
    let candidates = store
        .list_free(current_ledger, count as i64)
        .await
        .context("listing free channel accounts")?;

    if (candidates.len() as u32) < count {
        warn!(
            available = candidates.len(),
            requested = count,
            "fewer free accounts than requested; {} what is available",
            if dry_run { "would delete" } else { "deleting" }
        );
    }

    if dry_run {
        for account in &candidates {
            info!(public_key = %account.public_key, "dry run: would delete this channel account");
        }
        info!(would_delete = candidates.len(), "dry run complete, nothing deleted");
        return Ok(());
    }

    let mut deleted = 0u32;
    for account in &candidates {
        if store
            .delete_if_free(&account.public_key, current_ledger)
            .await
            .context("deleting a channel account")?
        {
            deleted += 1;
        }
    }
    info!(deleted, "channel account deletion complete");
    Ok(())
}

async fn view(store: &ChannelAccountStore, chain: &Arc<dyn BlockchainClient>) -> anyhow::Result<()> {
    let current_ledger = chain.latest_ledger().await.context("reading the current ledger")?;
    let stats = store.stats(current_ledger).await.context("reading pool statistics")?;
    println!("total:   {}", stats.total);
    println!("free:    {}", stats.free);
    println!("leased:  {}", stats.leased);
    match stats.oldest_lock_expiry {
        Some(ledger) => println!("oldest lock expires at ledger {ledger}"),
        None => println!("no leases outstanding"),
    }
    Ok(())
}

async fn verify(store: &ChannelAccountStore, chain: &Arc<dyn BlockchainClient>) -> anyhow::Result<()> {
    let accounts = store.list_all().await.context("listing channel accounts")?;
    let mut ok = 0u32;
    let mut failed = 0u32;
    for account in &accounts {
        if !strkey::is_valid_ed25519_public_key(&account.public_key) {
            warn!(public_key = %account.public_key, "stored public key is not a well-formed address");
            failed += 1;
            continue;
        }
        match chain.account_detail(&account.public_key).await {
            Ok(_) => ok += 1,
            Err(err) => {
                warn!(public_key = %account.public_key, error = %err, "account does not resolve on-chain");
                failed += 1;
            }
        }
    }
    info!(ok, failed, total = accounts.len(), "verification complete");
    if failed > 0 {
        bail!("{failed} of {} channel accounts failed verification", accounts.len());
    }
    Ok(())
}

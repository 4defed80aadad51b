use crate::config::Config;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tss", about = "Transaction submission service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the manager polling loop and the payment-status synchronizer.
    Start(Config),
    /// Provision the channel-account pool.
    ChannelAccounts(ChannelAccountsArgs),
}

#[derive(Args)]
pub struct ChannelAccountsArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Print what `create`/`ensure`/`delete` would do without funding,
    /// submitting, or writing anything. No effect on `view`/`verify`, which
    /// are already read-only.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub action: ChannelAccountsAction,
}

#[derive(Subcommand)]
pub enum ChannelAccountsAction {
    /// Add `count` new channel accounts, funded from the distribution
    /// account, to the pool.
    Create { count: u32 },
    /// Grow or shrink the pool to exactly `target` accounts.
    Ensure { target: u32 },
    /// Remove up to `count` currently free accounts from the pool.
    Delete { count: u32 },
    /// Print pool size, free count, leased count, and the oldest lock
    /// expiry — read-only.
    View,
    /// Confirm every stored channel account's public key still resolves
    /// on-chain and matches its stored key material.
    Verify,
}

/// The connection options the channel-accounts subcommands need; a subset
/// of `Config` duplicated rather than shared, since provisioning never
/// needs the manager's polling/limiter options.
#[derive(Args, Clone)]
pub struct ConnectionArgs {
    #[arg(long, env = "TSS_DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "TSS_HORIZON_URL")]
    pub horizon_url: String,

    #[arg(long, env = "TSS_NETWORK_PASSPHRASE")]
    pub network_passphrase: String,

    #[arg(long, env = "TSS_DISTRIBUTION_SEED")]
    pub distribution_seed: String,

    #[arg(long, env = "TSS_SIGNING_PASSPHRASE")]
    pub signing_passphrase: String,
}

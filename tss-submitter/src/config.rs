use clap::ValueEnum;
use std::time::Duration;
use thiserror::Error;
use tss_chain::PassphraseKeySource;
use tss_sync::DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS;
use tss_types::channel_account::validate_pool_size;

/// The manager never polls the queue faster than this regardless of
/// configuration.
pub const MIN_POLLING_INTERVAL_SECONDS: u64 = 6;

/// Network floor for `max_base_fee` (stroops), mirroring the Stellar
/// protocol's own minimum base fee.
pub const PROTOCOL_MINIMUM_BASE_FEE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CrashTrackerType {
    Log,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsType {
    Log,
    None,
}

/// Startup options for the `tss` binary. Constructed once in `main` and
/// passed down explicitly — no process-global config singleton.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    #[arg(long, env = "TSS_DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "TSS_HORIZON_URL")]
    pub horizon_url: String,

    #[arg(long, env = "TSS_NETWORK_PASSPHRASE")]
    pub network_passphrase: String,

    /// The distribution account's seed, already encrypted at rest
    /// (`base64(nonce):base64(ciphertext)`); decrypted with
    /// `--signing-passphrase` at startup.
    #[arg(long, env = "TSS_DISTRIBUTION_SEED")]
    pub distribution_seed: String,

    #[arg(long, env = "TSS_SIGNING_PASSPHRASE")]
    pub signing_passphrase: String,

    #[arg(long, default_value_t = 10)]
    pub num_channel_accounts: u32,

    #[arg(long, default_value_t = 6)]
    pub queue_polling_interval_seconds: u64,

    #[arg(long, default_value_t = 100)]
    pub max_base_fee: i64,

    #[arg(long, value_enum, default_value_t = CrashTrackerType::Log)]
    pub crash_tracker_type: CrashTrackerType,

    #[arg(long, value_enum, default_value_t = MetricsType::None)]
    pub tss_metrics_type: MetricsType,

    #[arg(long, default_value_t = 9090)]
    pub tss_metrics_port: u16,

    #[arg(long, value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Comma-separated tenant ids the payment-status synchronizer polls.
    /// Empty means "discover every tenant with at least one stored
    /// transaction at startup".
    #[arg(long, value_delimiter = ',', default_value = "")]
    pub sync_tenant_ids: Vec<String>,

    #[arg(long, default_value_t = 6)]
    pub sync_interval_seconds: u64,

    #[arg(long, default_value_t = 100)]
    pub sync_batch_size: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--database-url must be a postgres:// or postgresql:// DSN")]
    InvalidDatabaseUrl,
    #[error("--network-passphrase must not be empty")]
    EmptyNetworkPassphrase,
    #[error("distribution seed does not decrypt under --signing-passphrase: {0}")]
    InvalidDistributionSeed(String),
    #[error("channel-account pool size is invalid: {0}")]
    InvalidPoolSize(String),
    #[error("--queue-polling-interval-seconds must be at least {MIN_POLLING_INTERVAL_SECONDS}, got {0}")]
    PollingIntervalTooShort(u64),
    #[error("--max-base-fee must be at least the protocol minimum ({PROTOCOL_MINIMUM_BASE_FEE}), got {0}")]
    BaseFeeBelowMinimum(i64),
    #[error("--sync-interval-seconds must be at least {0}, got {1}")]
    SyncIntervalTooShort(u64, u64),
}

impl Config {
    pub fn queue_polling_interval(&self) -> Duration {
        Duration::from_secs(self.queue_polling_interval_seconds)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }

    /// Tenant ids to pass to the synchronizer, with the delimiter's
    /// "no value" artifact (a single empty string) filtered out.
    pub fn sync_tenant_ids(&self) -> Vec<String> {
        self.sync_tenant_ids.iter().filter(|s| !s.is_empty()).cloned().collect()
    }

    /// Validates every option before anything starts: DSN shape,
    /// passphrase non-empty, seed validity, pool bounds, polling interval
    /// and sync interval floors, base fee floor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")) {
            return Err(ConfigError::InvalidDatabaseUrl);
        }
        if self.network_passphrase.trim().is_empty() {
            return Err(ConfigError::EmptyNetworkPassphrase);
        }

        let key_source = PassphraseKeySource::new(&self.signing_passphrase, self.distribution_seed.clone());
        key_source
            .validate_distribution_seed()
            .map_err(|e| ConfigError::InvalidDistributionSeed(e.to_string()))?;

        validate_pool_size(self.num_channel_accounts).map_err(ConfigError::InvalidPoolSize)?;

        if self.queue_polling_interval_seconds < MIN_POLLING_INTERVAL_SECONDS {
            return Err(ConfigError::PollingIntervalTooShort(self.queue_polling_interval_seconds));
        }
        if self.max_base_fee < PROTOCOL_MINIMUM_BASE_FEE {
            return Err(ConfigError::BaseFeeBelowMinimum(self.max_base_fee));
        }
        if self.sync_interval_seconds < DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS {
            return Err(ConfigError::SyncIntervalTooShort(
                DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS,
                self.sync_interval_seconds,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        let passphrase = "correct horse battery staple";
        let key_source = PassphraseKeySource::new(passphrase, "placeholder".to_string());
        let seed = [4u8; 32];
        let encrypted = key_source.encrypt_seed(&seed).unwrap();
        Config {
            database_url: "postgres://localhost/tss".into(),
            horizon_url: "https://horizon-testnet.stellar.org".into(),
            network_passphrase: "Test SDF Network ; September 2015".into(),
            distribution_seed: encrypted,
            signing_passphrase: passphrase.into(),
            num_channel_accounts: 10,
            queue_polling_interval_seconds: 6,
            max_base_fee: 100,
            crash_tracker_type: CrashTrackerType::Log,
            tss_metrics_type: MetricsType::None,
            tss_metrics_port: 9090,
            environment: Environment::Development,
            log_level: "info".into(),
            sync_tenant_ids: vec![String::new()],
            sync_interval_seconds: 6,
            sync_batch_size: 100,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_non_postgres_dsn() {
        let mut cfg = base_config();
        cfg.database_url = "mysql://localhost/tss".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDatabaseUrl)));
    }

    #[test]
    fn rejects_seed_encrypted_under_a_different_passphrase() {
        let mut cfg = base_config();
        let other = PassphraseKeySource::new("a different passphrase", "placeholder".to_string());
        cfg.distribution_seed = other.encrypt_seed(&[4u8; 32]).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDistributionSeed(_))));
    }

    #[test]
    fn rejects_short_polling_interval() {
        let mut cfg = base_config();
        cfg.queue_polling_interval_seconds = 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::PollingIntervalTooShort(1))));
    }

    #[test]
    fn rejects_base_fee_below_protocol_minimum() {
        let mut cfg = base_config();
        cfg.max_base_fee = 10;
        assert!(matches!(cfg.validate(), Err(ConfigError::BaseFeeBelowMinimum(10))));
    }

    #[test]
    fn rejects_pool_size_out_of_bounds() {
        let mut cfg = base_config();
        cfg.num_channel_accounts = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPoolSize(_))));
    }

    #[test]
    fn rejects_short_sync_interval() {
        let mut cfg = base_config();
        cfg.sync_interval_seconds = 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::SyncIntervalTooShort(6, 1))));
    }

    #[test]
    fn sync_tenant_ids_filters_out_the_empty_default() {
        assert!(base_config().sync_tenant_ids().is_empty());
    }
}

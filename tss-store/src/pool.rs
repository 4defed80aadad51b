use crate::error::StoreError;
use sqlx::postgres::{PgPoolOptions, PgSslMode};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::Duration;

/// Connects to Postgres with a bounded pool and applies the crate's
/// embedded migrations, constructed explicitly at startup and handed down
/// rather than stashed behind a process-global `lazy_static!`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<sqlx::PgPool, StoreError> {
    let options = sqlx::postgres::PgConnectOptions::from_str(database_url)
        .map_err(StoreError::Database)?
        .ssl_mode(PgSslMode::Prefer)
        .disable_statement_logging();

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        StoreError::Database(sqlx::Error::Migrate(Box::new(e)))
    })?;

    Ok(pool)
}

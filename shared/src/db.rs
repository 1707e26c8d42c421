//! Database connection management.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::secrets::get_database_credentials;
use crate::{Config, Error, Result};

/// Create a database connection pool.
///
/// Uses `DATABASE_URL` when set, otherwise resolves credentials from the
/// secret named by `DB_SECRET_ARN`.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let database_url = match &config.database_url {
        Some(url) => url.clone(),
        None => {
            let secret_arn = config
                .db_secret_arn
                .as_deref()
                .ok_or_else(|| Error::Config("DATABASE_URL or DB_SECRET_ARN must be set".to_string()))?;

            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.aws_region.clone()))
                .load()
                .await;
            let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

            get_database_credentials(&secrets_client, secret_arn)
                .await?
                .connection_url(config.db_host.as_deref(), &config.db_name)?
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .map_err(Error::Database)?;

    Ok(pool)
}

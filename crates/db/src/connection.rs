use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqlitePoolOptions;
use thiserror::Error;
use tracing::{info, warn};

use gradedesk_core::config::DatabaseConfig;

use crate::migrations;

pub type DbPool = sqlx::SqlitePool;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database connection failed after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: sqlx::Error },
    #[error("database migration failed after {attempts} attempt(s): {source}")]
    Migration { attempts: u32, source: MigrateError },
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Connects and applies pending migrations, retrying both with a linearly
/// growing delay (`retry_delay_ms * attempt`). Exhausting the attempts is
/// fatal to the caller.
pub async fn connect_and_migrate(config: &DatabaseConfig) -> Result<DbPool, ConnectError> {
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match connect_with_settings(
            &config.url,
            config.max_connections,
            config.timeout_secs,
        )
        .await
        {
            Ok(pool) => match migrations::run_pending(&pool).await {
                Ok(()) => Ok(pool),
                Err(source) => {
                    pool.close().await;
                    Err(ConnectError::Migration { attempts: attempt, source })
                }
            },
            Err(source) => Err(ConnectError::Exhausted { attempts: attempt, source }),
        };

        match outcome {
            Ok(pool) => {
                info!(
                    event_name = "system.bootstrap.database_connected",
                    attempt,
                    max_connections = config.max_connections,
                    "database connected and migrations applied"
                );
                return Ok(pool);
            }
            Err(error) if attempt >= attempts => return Err(error),
            Err(error) => {
                let delay =
                    Duration::from_millis(config.retry_delay_ms.saturating_mul(u64::from(attempt)));
                warn!(
                    event_name = "system.bootstrap.database_retry",
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "database startup attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use gradedesk_core::config::DatabaseConfig;

    use super::{connect_and_migrate, ConnectError};

    fn config(url: &str, connect_attempts: u32) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections: 1,
            timeout_secs: 1,
            connect_attempts,
            retry_delay_ms: 10,
        }
    }

    #[tokio::test]
    async fn connect_and_migrate_prepares_schema() {
        let pool = connect_and_migrate(&config("sqlite::memory:", 3)).await.expect("connect");

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('students', 'grades', 'admins')",
        )
        .fetch_one(&pool)
        .await
        .expect("count tables");
        assert_eq!(tables, 3);

        pool.close().await;
    }

    #[tokio::test]
    async fn unreachable_database_exhausts_retries_with_linear_backoff() {
        let started = Instant::now();
        let error = connect_and_migrate(&config(
            "sqlite:///nonexistent-gradedesk-dir/nested/gradedesk.db?mode=ro",
            3,
        ))
        .await
        .expect_err("missing directory cannot be opened");

        assert!(matches!(error, ConnectError::Exhausted { attempts: 3, .. }));
        // 10ms after the first attempt, 20ms after the second.
        assert!(started.elapsed().as_millis() >= 30);
    }
}

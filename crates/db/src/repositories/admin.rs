use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use gradedesk_core::domain::admin::AdminRecord;
use gradedesk_core::domain::identity::Identity;

use super::{AdminRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAdminRepository {
    pool: DbPool,
}

impl SqlAdminRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AdminRepository for SqlAdminRepository {
    async fn insert_if_absent(
        &self,
        identity: Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let rows = sqlx::query(
            "INSERT INTO admins (identity, granted_at)
             VALUES (?, ?)
             ON CONFLICT(identity) DO NOTHING",
        )
        .bind(identity.0)
        .bind(granted_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn remove(&self, identity: Identity) -> Result<bool, RepositoryError> {
        let rows = sqlx::query("DELETE FROM admins WHERE identity = ?")
            .bind(identity.0)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    async fn contains(&self, identity: Identity) -> Result<bool, RepositoryError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT identity FROM admins WHERE identity = ?")
                .bind(identity.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    async fn list(&self) -> Result<Vec<AdminRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT identity, granted_at
             FROM admins
             ORDER BY granted_at ASC, identity ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(admin_from_row).collect()
    }
}

fn admin_from_row(row: SqliteRow) -> Result<AdminRecord, RepositoryError> {
    Ok(AdminRecord {
        identity: Identity(row.try_get("identity")?),
        granted_at: parse_timestamp("granted_at", row.try_get("granted_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use gradedesk_core::domain::identity::Identity;

    use super::SqlAdminRepository;
    use crate::migrations;
    use crate::repositories::{AdminRepository, RepositoryError};
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn duplicate_grant_is_a_no_op() {
        let pool = setup_pool().await;
        let repo = SqlAdminRepository::new(pool.clone());
        let first_grant = parse_ts("2026-03-01T09:00:00Z");

        assert!(repo.insert_if_absent(Identity(7), first_grant).await.expect("grant"));
        assert!(!repo
            .insert_if_absent(Identity(7), parse_ts("2026-03-02T09:00:00Z"))
            .await
            .expect("regrant"));

        let admins = repo.list().await.expect("list admins");
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].granted_at, first_grant);

        pool.close().await;
    }

    #[tokio::test]
    async fn remove_reports_whether_a_row_existed() {
        let pool = setup_pool().await;
        let repo = SqlAdminRepository::new(pool.clone());

        repo.insert_if_absent(Identity(7), Utc::now()).await.expect("grant");
        assert!(repo.contains(Identity(7)).await.expect("contains"));

        assert!(repo.remove(Identity(7)).await.expect("revoke"));
        assert!(!repo.remove(Identity(7)).await.expect("revoke again"));
        assert!(!repo.contains(Identity(7)).await.expect("contains after revoke"));

        pool.close().await;
    }

    #[tokio::test]
    async fn malformed_timestamp_surfaces_decode_error() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO admins (identity, granted_at) VALUES (1, 'yesterday')")
            .execute(&pool)
            .await
            .expect("insert raw row");

        let error = SqlAdminRepository::new(pool.clone()).list().await.expect_err("decode");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("granted_at")
        ));

        pool.close().await;
    }
}

use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use gradedesk_core::domain::identity::{Identity, PublicId};
use gradedesk_core::domain::roster::{PageRequest, RosterPage};
use gradedesk_core::domain::student::StudentRecord;

use super::{RepositoryError, StudentDeletion, StudentRepository};
use crate::DbPool;

pub struct SqlStudentRepository {
    pool: DbPool,
}

impl SqlStudentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StudentRepository for SqlStudentRepository {
    async fn insert(&self, student: StudentRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO students (identity, given_name, family_name, public_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(student.identity.0)
        .bind(&student.given_name)
        .bind(&student.family_name)
        .bind(student.public_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            RepositoryError::from_write(error, || {
                format!(
                    "student with identity {} or public id `{}` already exists",
                    student.identity, student.public_id
                )
            })
        })?;

        Ok(())
    }

    async fn find_by_identity(
        &self,
        identity: Identity,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT identity, given_name, family_name, public_id
             FROM students
             WHERE identity = ?",
        )
        .bind(identity.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(student_from_row).transpose()
    }

    async fn list_page(&self, request: PageRequest) -> Result<RosterPage, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM students").fetch_one(&mut *conn).await?;

        // LIMIT -1 is SQLite's "no limit".
        let limit =
            request.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)).unwrap_or(-1);
        let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            "SELECT identity, given_name, family_name, public_id
             FROM students
             ORDER BY public_id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let students = rows.into_iter().map(student_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(RosterPage { students, request, total: parse_count("total", total)? })
    }

    async fn delete_with_grades(
        &self,
        public_id: &PublicId,
    ) -> Result<StudentDeletion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let grades = sqlx::query("DELETE FROM grades WHERE public_id = ?")
            .bind(public_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let students = sqlx::query("DELETE FROM students WHERE public_id = ?")
            .bind(public_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(
            event_name = "store.student.deleted",
            public_id = %public_id,
            grades,
            students,
            "student deletion committed"
        );
        Ok(StudentDeletion { grades, students })
    }
}

fn student_from_row(row: SqliteRow) -> Result<StudentRecord, RepositoryError> {
    Ok(StudentRecord {
        identity: Identity(row.try_get("identity")?),
        given_name: row.try_get("given_name")?,
        family_name: row.try_get("family_name")?,
        public_id: PublicId(row.try_get("public_id")?),
    })
}

fn parse_count(column: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("invalid value for `{column}` (expected u64): {value}"))
    })
}

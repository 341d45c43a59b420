use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use gradedesk_core::domain::grade::{GradeLine, GradeRecord};
use gradedesk_core::domain::identity::PublicId;

use super::{GradeRepository, RepositoryError};
use crate::DbPool;

const UPSERT_GRADE: &str = "INSERT INTO grades (public_id, course, value)
     VALUES (?, ?, ?)
     ON CONFLICT(public_id, course) DO UPDATE SET value = excluded.value";

pub struct SqlGradeRepository {
    pool: DbPool,
}

impl SqlGradeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GradeRepository for SqlGradeRepository {
    async fn upsert(&self, grade: GradeRecord) -> Result<(), RepositoryError> {
        sqlx::query(UPSERT_GRADE)
            .bind(grade.public_id.as_str())
            .bind(&grade.course)
            .bind(&grade.value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_many(&self, course: &str, lines: &[GradeLine]) -> Result<u64, RepositoryError> {
        if lines.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query(UPSERT_GRADE)
                .bind(line.public_id.as_str())
                .bind(course)
                .bind(&line.value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(lines.len() as u64)
    }

    async fn update_value(
        &self,
        public_id: &PublicId,
        course: &str,
        value: &str,
    ) -> Result<u64, RepositoryError> {
        let rows = sqlx::query("UPDATE grades SET value = ? WHERE public_id = ? AND course = ?")
            .bind(value)
            .bind(public_id.as_str())
            .bind(course)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(
            event_name = "store.grade.updated",
            public_id = %public_id,
            course,
            rows,
            "grade update applied"
        );
        Ok(rows)
    }

    async fn delete(&self, public_id: &PublicId, course: &str) -> Result<u64, RepositoryError> {
        let rows = sqlx::query("DELETE FROM grades WHERE public_id = ? AND course = ?")
            .bind(public_id.as_str())
            .bind(course)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(
            event_name = "store.grade.deleted",
            public_id = %public_id,
            course,
            rows,
            "grade delete applied"
        );
        Ok(rows)
    }

    async fn delete_course(&self, course: &str) -> Result<u64, RepositoryError> {
        let rows = sqlx::query("DELETE FROM grades WHERE course = ?")
            .bind(course)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(event_name = "store.course.deleted", course, rows, "course grades deleted");
        Ok(rows)
    }

    async fn list_for_student(
        &self,
        public_id: &PublicId,
    ) -> Result<Vec<GradeRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT public_id, course, value
             FROM grades
             WHERE public_id = ?
             ORDER BY course ASC",
        )
        .bind(public_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(grade_from_row).collect()
    }
}

fn grade_from_row(row: SqliteRow) -> Result<GradeRecord, RepositoryError> {
    Ok(GradeRecord {
        public_id: PublicId(row.try_get("public_id")?),
        course: row.try_get("course")?,
        value: row.try_get("value")?,
    })
}

#[cfg(test)]
mod tests {
    use gradedesk_core::domain::grade::{parse_grade_block, GradeRecord};
    use gradedesk_core::domain::identity::PublicId;

    use super::SqlGradeRepository;
    use crate::migrations;
    use crate::repositories::GradeRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn grade(public_id: &str, course: &str, value: &str) -> GradeRecord {
        GradeRecord {
            public_id: PublicId::new(public_id),
            course: course.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_pair_keeps_last_value() {
        let pool = setup_pool().await;
        let repo = SqlGradeRepository::new(pool.clone());

        repo.upsert(grade("40123456", "Math", "12")).await.expect("first write");
        repo.upsert(grade("40123456", "Math", "17.5")).await.expect("second write");

        let stored = repo.list_for_student(&PublicId::new("40123456")).await.expect("list");
        assert_eq!(stored, vec![grade("40123456", "Math", "17.5")]);

        pool.close().await;
    }

    #[tokio::test]
    async fn bulk_upsert_writes_parsed_lines_under_one_course() {
        let pool = setup_pool().await;
        let repo = SqlGradeRepository::new(pool.clone());
        let block = parse_grade_block("40123456 18\nbad-line\n40123457 16\n40123456 19");

        let saved = repo.upsert_many("Physics", &block.lines).await.expect("bulk upsert");
        assert_eq!(saved, 3);

        let first = repo.list_for_student(&PublicId::new("40123456")).await.expect("list");
        assert_eq!(first, vec![grade("40123456", "Physics", "19")]);

        assert_eq!(repo.upsert_many("Physics", &[]).await.expect("empty block"), 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn grades_may_reference_unregistered_students() {
        let pool = setup_pool().await;
        let repo = SqlGradeRepository::new(pool.clone());

        repo.upsert(grade("nobody", "Math", "A")).await.expect("orphan grade");
        assert_eq!(repo.list_for_student(&PublicId::new("nobody")).await.expect("list").len(), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn edit_and_delete_report_affected_rows() {
        let pool = setup_pool().await;
        let repo = SqlGradeRepository::new(pool.clone());
        let student = PublicId::new("40123456");

        repo.upsert(grade("40123456", "Math", "12")).await.expect("seed");

        assert_eq!(repo.update_value(&student, "Math", "20").await.expect("edit"), 1);
        assert_eq!(repo.update_value(&student, "History", "20").await.expect("edit missing"), 0);
        assert_eq!(
            repo.list_for_student(&student).await.expect("list"),
            vec![grade("40123456", "Math", "20")]
        );

        assert_eq!(repo.delete(&student, "History").await.expect("delete missing"), 0);
        assert_eq!(repo.delete(&student, "Math").await.expect("delete"), 1);
        assert!(repo.list_for_student(&student).await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn deleting_course_removes_it_for_every_student() {
        let pool = setup_pool().await;
        let repo = SqlGradeRepository::new(pool.clone());

        repo.upsert(grade("1", "Math", "10")).await.expect("seed");
        repo.upsert(grade("2", "Math", "11")).await.expect("seed");
        repo.upsert(grade("2", "Physics", "12")).await.expect("seed");

        assert_eq!(repo.delete_course("Math").await.expect("delete course"), 2);
        assert_eq!(
            repo.list_for_student(&PublicId::new("2")).await.expect("list"),
            vec![grade("2", "Physics", "12")]
        );

        pool.close().await;
    }
}

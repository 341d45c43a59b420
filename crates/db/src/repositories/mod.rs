use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use gradedesk_core::domain::admin::AdminRecord;
use gradedesk_core::domain::grade::{GradeLine, GradeRecord};
use gradedesk_core::domain::identity::{Identity, PublicId};
use gradedesk_core::domain::roster::{PageRequest, RosterPage};
use gradedesk_core::domain::student::StudentRecord;
use gradedesk_core::errors::ApplicationError;

pub mod admin;
pub mod grade;
pub mod memory;
pub mod student;

pub use admin::SqlAdminRepository;
pub use grade::SqlGradeRepository;
pub use memory::InMemoryStore;
pub use student::SqlStudentRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// Maps unique-constraint violations to `Conflict`; everything else stays a
    /// database error.
    pub(crate) fn from_write(error: sqlx::Error, conflict: impl FnOnce() -> String) -> Self {
        let unique_violation = error
            .as_database_error()
            .map(|database_error| {
                // SQLITE_CONSTRAINT_PRIMARYKEY (1555) and SQLITE_CONSTRAINT_UNIQUE (2067)
                database_error.is_unique_violation()
                    || matches!(database_error.code().as_deref(), Some("1555") | Some("2067"))
            })
            .unwrap_or(false);
        if unique_violation {
            Self::Conflict(conflict())
        } else {
            Self::Database(error)
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Rows removed by a student deletion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StudentDeletion {
    pub grades: u64,
    pub students: u64,
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Inserts a new record. Never overwrites: a duplicate identity or
    /// public id yields `RepositoryError::Conflict`.
    async fn insert(&self, student: StudentRecord) -> Result<(), RepositoryError>;

    async fn find_by_identity(
        &self,
        identity: Identity,
    ) -> Result<Option<StudentRecord>, RepositoryError>;

    /// Students ordered by public id.
    async fn list_page(&self, request: PageRequest) -> Result<RosterPage, RepositoryError>;

    /// Removes every grade filed under `public_id` and then the student, in
    /// one transaction.
    async fn delete_with_grades(
        &self,
        public_id: &PublicId,
    ) -> Result<StudentDeletion, RepositoryError>;
}

#[async_trait]
pub trait GradeRepository: Send + Sync {
    /// Last write for a `(public_id, course)` pair wins.
    async fn upsert(&self, grade: GradeRecord) -> Result<(), RepositoryError>;

    /// Upserts every line under `course` atomically and returns how many
    /// were written.
    async fn upsert_many(&self, course: &str, lines: &[GradeLine]) -> Result<u64, RepositoryError>;

    async fn update_value(
        &self,
        public_id: &PublicId,
        course: &str,
        value: &str,
    ) -> Result<u64, RepositoryError>;

    async fn delete(&self, public_id: &PublicId, course: &str) -> Result<u64, RepositoryError>;

    async fn delete_course(&self, course: &str) -> Result<u64, RepositoryError>;

    /// Grades for one student ordered by course.
    async fn list_for_student(
        &self,
        public_id: &PublicId,
    ) -> Result<Vec<GradeRecord>, RepositoryError>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Returns `false` when the identity was already an admin.
    async fn insert_if_absent(
        &self,
        identity: Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn remove(&self, identity: Identity) -> Result<bool, RepositoryError>;

    async fn contains(&self, identity: Identity) -> Result<bool, RepositoryError>;

    async fn list(&self) -> Result<Vec<AdminRecord>, RepositoryError>;
}

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gradedesk_core::domain::admin::AdminRecord;
use gradedesk_core::domain::grade::{GradeLine, GradeRecord};
use gradedesk_core::domain::identity::{Identity, PublicId};
use gradedesk_core::domain::roster::{PageRequest, RosterPage};
use gradedesk_core::domain::student::StudentRecord;

use super::{
    AdminRepository, GradeRepository, RepositoryError, StudentDeletion, StudentRepository,
};

#[derive(Debug, Default)]
struct MemoryState {
    students: HashMap<Identity, StudentRecord>,
    grades: BTreeMap<(PublicId, String), String>,
    admins: HashMap<Identity, DateTime<Utc>>,
}

/// Process-local store implementing every repository trait behind one lock,
/// so multi-table operations stay atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StudentRepository for InMemoryStore {
    async fn insert(&self, student: StudentRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let taken = state.students.contains_key(&student.identity)
            || state.students.values().any(|existing| existing.public_id == student.public_id);
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "student with identity {} or public id `{}` already exists",
                student.identity, student.public_id
            )));
        }
        state.students.insert(student.identity, student);
        Ok(())
    }

    async fn find_by_identity(
        &self,
        identity: Identity,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.students.get(&identity).cloned())
    }

    async fn list_page(&self, request: PageRequest) -> Result<RosterPage, RepositoryError> {
        let state = self.state.read().await;
        let mut students = state.students.values().cloned().collect::<Vec<_>>();
        students.sort_by(|left, right| left.public_id.cmp(&right.public_id));

        let total = students.len() as u64;
        let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
        let limit = request
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let students = students.into_iter().skip(offset).take(limit).collect();

        Ok(RosterPage { students, request, total })
    }

    async fn delete_with_grades(
        &self,
        public_id: &PublicId,
    ) -> Result<StudentDeletion, RepositoryError> {
        let mut state = self.state.write().await;

        let before = state.grades.len();
        state.grades.retain(|(grade_public_id, _), _| grade_public_id != public_id);
        let grades = (before - state.grades.len()) as u64;

        let before = state.students.len();
        state.students.retain(|_, student| &student.public_id != public_id);
        let students = (before - state.students.len()) as u64;

        Ok(StudentDeletion { grades, students })
    }
}

#[async_trait::async_trait]
impl GradeRepository for InMemoryStore {
    async fn upsert(&self, grade: GradeRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.grades.insert((grade.public_id, grade.course), grade.value);
        Ok(())
    }

    async fn upsert_many(&self, course: &str, lines: &[GradeLine]) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        for line in lines {
            state.grades.insert((line.public_id.clone(), course.to_owned()), line.value.clone());
        }
        Ok(lines.len() as u64)
    }

    async fn update_value(
        &self,
        public_id: &PublicId,
        course: &str,
        value: &str,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        match state.grades.get_mut(&(public_id.clone(), course.to_owned())) {
            Some(current) => {
                *current = value.to_owned();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, public_id: &PublicId, course: &str) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.grades.remove(&(public_id.clone(), course.to_owned()));
        Ok(u64::from(removed.is_some()))
    }

    async fn delete_course(&self, course: &str) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.grades.len();
        state.grades.retain(|(_, grade_course), _| grade_course != course);
        Ok((before - state.grades.len()) as u64)
    }

    async fn list_for_student(
        &self,
        public_id: &PublicId,
    ) -> Result<Vec<GradeRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .grades
            .iter()
            .filter(|((grade_public_id, _), _)| grade_public_id == public_id)
            .map(|((grade_public_id, course), value)| GradeRecord {
                public_id: grade_public_id.clone(),
                course: course.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl AdminRepository for InMemoryStore {
    async fn insert_if_absent(
        &self,
        identity: Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if state.admins.contains_key(&identity) {
            return Ok(false);
        }
        state.admins.insert(identity, granted_at);
        Ok(true)
    }

    async fn remove(&self, identity: Identity) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.admins.remove(&identity).is_some())
    }

    async fn contains(&self, identity: Identity) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.admins.contains_key(&identity))
    }

    async fn list(&self) -> Result<Vec<AdminRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut admins = state
            .admins
            .iter()
            .map(|(identity, granted_at)| AdminRecord {
                identity: *identity,
                granted_at: *granted_at,
            })
            .collect::<Vec<_>>();
        admins.sort_by_key(|admin| (admin.granted_at, admin.identity));
        Ok(admins)
    }
}

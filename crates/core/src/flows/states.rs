use serde::{Deserialize, Serialize};

use crate::domain::grade::GradeLine;
use crate::domain::identity::{Identity, PublicId};
use crate::domain::roster::{PageRequest, RosterPage};
use crate::domain::student::StudentRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowType {
    Registration,
    AdminMenu,
    BulkGrades,
    EditGrade,
    DeleteGrade,
    DeleteCourse,
    DeleteStudent,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::AdminMenu => "admin_menu",
            Self::BulkGrades => "bulk_grades",
            Self::EditGrade => "edit_grade",
            Self::DeleteGrade => "delete_grade",
            Self::DeleteCourse => "delete_course",
            Self::DeleteStudent => "delete_student",
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(self, Self::Registration)
    }
}

/// Commands that open a fresh session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPoint {
    Registration,
    AdminPanel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStep {
    AwaitingGivenName,
    AwaitingFamilyName { given_name: String },
    AwaitingPublicId { given_name: String, family_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuStep {
    Choosing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkGradeStep {
    AwaitingCourse,
    AwaitingGradeLines { course: String, saved: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditGradeStep {
    AwaitingPublicId,
    AwaitingCourse { public_id: PublicId },
    AwaitingValue { public_id: PublicId, course: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteGradeStep {
    AwaitingPublicId,
    AwaitingCourse { public_id: PublicId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteCourseStep {
    AwaitingCourse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteStudentStep {
    AwaitingPublicId,
}

/// Typed session state: the active workflow plus the fields it has collected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    Registration(RegistrationStep),
    AdminMenu(MenuStep),
    BulkGrades(BulkGradeStep),
    EditGrade(EditGradeStep),
    DeleteGrade(DeleteGradeStep),
    DeleteCourse(DeleteCourseStep),
    DeleteStudent(DeleteStudentStep),
}

impl DialogueState {
    pub fn admin_menu() -> Self {
        Self::AdminMenu(MenuStep::Choosing)
    }

    pub fn flow_type(&self) -> FlowType {
        match self {
            Self::Registration(_) => FlowType::Registration,
            Self::AdminMenu(_) => FlowType::AdminMenu,
            Self::BulkGrades(_) => FlowType::BulkGrades,
            Self::EditGrade(_) => FlowType::EditGrade,
            Self::DeleteGrade(_) => FlowType::DeleteGrade,
            Self::DeleteCourse(_) => FlowType::DeleteCourse,
            Self::DeleteStudent(_) => FlowType::DeleteStudent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuOption {
    BulkGradeEntry,
    EditGrade,
    DeleteGrade,
    DeleteCourse,
    DeleteStudent,
    StudentRoster,
    ClosePanel,
}

impl MenuOption {
    pub const ALL: [MenuOption; 7] = [
        Self::BulkGradeEntry,
        Self::EditGrade,
        Self::DeleteGrade,
        Self::DeleteCourse,
        Self::DeleteStudent,
        Self::StudentRoster,
        Self::ClosePanel,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BulkGradeEntry => "Bulk grade entry",
            Self::EditGrade => "Edit grade",
            Self::DeleteGrade => "Delete grade",
            Self::DeleteCourse => "Delete course",
            Self::DeleteStudent => "Delete student",
            Self::StudentRoster => "Student roster",
            Self::ClosePanel => "Close panel",
        }
    }

    /// Exact label match after trimming; anything else is not an option.
    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|option| option.label() == text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub identity: Identity,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    RegisterStudent(StudentRecord),
    IngestGrades { course: String, lines: Vec<GradeLine>, finish: bool },
    UpdateGrade { public_id: PublicId, course: String, value: String },
    DeleteGrade { public_id: PublicId, course: String },
    DeleteCourse { course: String },
    DeleteStudent { public_id: PublicId },
    ListRoster(PageRequest),
}

impl FlowAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterStudent(_) => "register_student",
            Self::IngestGrades { .. } => "ingest_grades",
            Self::UpdateGrade { .. } => "update_grade",
            Self::DeleteGrade { .. } => "delete_grade",
            Self::DeleteCourse { .. } => "delete_course",
            Self::DeleteStudent { .. } => "delete_student",
            Self::ListRoster(_) => "list_roster",
        }
    }
}

/// What a store operation reported back for a [`FlowAction`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Registered(StudentRecord),
    RegistrationConflict,
    GradesIngested { saved: u64 },
    GradeUpdated { rows: u64 },
    GradeDeleted { rows: u64 },
    CourseDeleted { rows: u64 },
    StudentDeleted { grades: u64, students: u64 },
    Roster(RosterPage),
}

impl ActionOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered(_) => "registered",
            Self::RegistrationConflict => "registration_conflict",
            Self::GradesIngested { .. } => "grades_ingested",
            Self::GradeUpdated { .. } => "grade_updated",
            Self::GradeDeleted { .. } => "grade_deleted",
            Self::CourseDeleted { .. } => "course_deleted",
            Self::StudentDeleted { .. } => "student_deleted",
            Self::Roster(_) => "roster",
        }
    }
}

/// Transport-neutral description of the reply; rendering happens at the edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    AskGivenName,
    AskFamilyName,
    AskOwnPublicId,
    Registered { public_id: PublicId },
    RegistrationConflict,
    AdminMenu,
    InvalidMenuOption,
    AskCourse,
    AskStudentPublicId,
    AskGradeValue,
    AskGradeLines { course: String },
    GradesProgress { saved: u64, total: u64 },
    GradesCompleted { course: String, total: u64 },
    GradeUpdated { public_id: PublicId, course: String, value: String },
    GradeDeleted { public_id: PublicId, course: String },
    CourseDeleted { course: String, rows: u64 },
    StudentDeleted { public_id: PublicId },
    Roster(RosterPage),
    PanelClosed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Record a field and move to the next step.
    Collect { to: DialogueState, prompt: Prompt },
    /// Run a store operation; the follow-up state is decided by `settle`.
    Invoke(FlowAction),
    /// Input rejected; the session stays where it is.
    Stay { prompt: Prompt },
    /// Session ends without a store operation.
    End { prompt: Prompt },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub next: Option<DialogueState>,
    pub prompt: Prompt,
}

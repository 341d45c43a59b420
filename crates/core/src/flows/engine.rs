use thiserror::Error;

use crate::domain::grade::parse_grade_block;
use crate::domain::identity::PublicId;
use crate::domain::roster::{parse_navigation_token, PageRequest};
use crate::domain::student::StudentRecord;
use crate::flows::states::{
    ActionOutcome, BulkGradeStep, DeleteCourseStep, DeleteGradeStep, DeleteStudentStep,
    DialogueState, EditGradeStep, EntryPoint, FlowAction, FlowContext, FlowType, MenuOption,
    MenuStep, Prompt, RegistrationStep, Settlement, Transition,
};

/// One workflow's state graph. `Step` is the workflow-specific state with its
/// collected fields.
pub trait WorkflowGraph {
    type Step;

    fn flow_type(&self) -> FlowType;
    fn initial(&self) -> Self::Step;
    fn advance(&self, step: &Self::Step, input: &str, context: &FlowContext) -> Transition;
    fn settle(
        &self,
        step: &Self::Step,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("outcome `{outcome}` does not settle a `{flow}` session in its current step")]
    UnexpectedOutcome { flow: &'static str, outcome: &'static str },
}

fn unexpected(flow: FlowType, outcome: &ActionOutcome) -> FlowTransitionError {
    FlowTransitionError::UnexpectedOutcome { flow: flow.as_str(), outcome: outcome.name() }
}

/// Every collected value has its surrounding whitespace trimmed, including
/// the bulk-entry course. A course sent as " Math " is stored as "Math" so it
/// matches later edit and delete lookups.
fn field(input: &str) -> String {
    input.trim().to_owned()
}

#[derive(Clone, Debug, Default)]
pub struct RegistrationFlow;

impl WorkflowGraph for RegistrationFlow {
    type Step = RegistrationStep;

    fn flow_type(&self) -> FlowType {
        FlowType::Registration
    }

    fn initial(&self) -> RegistrationStep {
        RegistrationStep::AwaitingGivenName
    }

    fn advance(&self, step: &RegistrationStep, input: &str, context: &FlowContext) -> Transition {
        use RegistrationStep::{AwaitingFamilyName, AwaitingGivenName, AwaitingPublicId};

        match step {
            AwaitingGivenName => Transition::Collect {
                to: DialogueState::Registration(AwaitingFamilyName { given_name: field(input) }),
                prompt: Prompt::AskFamilyName,
            },
            AwaitingFamilyName { given_name } => Transition::Collect {
                to: DialogueState::Registration(AwaitingPublicId {
                    given_name: given_name.clone(),
                    family_name: field(input),
                }),
                prompt: Prompt::AskOwnPublicId,
            },
            AwaitingPublicId { given_name, family_name } => {
                Transition::Invoke(FlowAction::RegisterStudent(StudentRecord {
                    identity: context.identity,
                    given_name: given_name.clone(),
                    family_name: family_name.clone(),
                    public_id: PublicId::new(field(input)),
                }))
            }
        }
    }

    fn settle(
        &self,
        step: &RegistrationStep,
        _action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (step, outcome) {
            (RegistrationStep::AwaitingPublicId { .. }, ActionOutcome::Registered(student)) => {
                Ok(Settlement {
                    next: None,
                    prompt: Prompt::Registered { public_id: student.public_id },
                })
            }
            (RegistrationStep::AwaitingPublicId { .. }, ActionOutcome::RegistrationConflict) => {
                Ok(Settlement { next: None, prompt: Prompt::RegistrationConflict })
            }
            (_, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdminMenuFlow {
    roster_page_size: u32,
}

impl AdminMenuFlow {
    pub fn new(roster_page_size: u32) -> Self {
        Self { roster_page_size }
    }

    fn roster(&self, offset: u64) -> Transition {
        Transition::Invoke(FlowAction::ListRoster(PageRequest::new(offset, self.roster_page_size)))
    }
}

impl WorkflowGraph for AdminMenuFlow {
    type Step = MenuStep;

    fn flow_type(&self) -> FlowType {
        FlowType::AdminMenu
    }

    fn initial(&self) -> MenuStep {
        MenuStep::Choosing
    }

    fn advance(&self, _step: &MenuStep, input: &str, _context: &FlowContext) -> Transition {
        if let Some(offset) = parse_navigation_token(input) {
            return self.roster(offset);
        }

        let Some(option) = MenuOption::from_label(input) else {
            return Transition::Stay { prompt: Prompt::InvalidMenuOption };
        };

        match option {
            MenuOption::BulkGradeEntry => Transition::Collect {
                to: DialogueState::BulkGrades(BulkGradeStep::AwaitingCourse),
                prompt: Prompt::AskCourse,
            },
            MenuOption::EditGrade => Transition::Collect {
                to: DialogueState::EditGrade(EditGradeStep::AwaitingPublicId),
                prompt: Prompt::AskStudentPublicId,
            },
            MenuOption::DeleteGrade => Transition::Collect {
                to: DialogueState::DeleteGrade(DeleteGradeStep::AwaitingPublicId),
                prompt: Prompt::AskStudentPublicId,
            },
            MenuOption::DeleteCourse => Transition::Collect {
                to: DialogueState::DeleteCourse(DeleteCourseStep::AwaitingCourse),
                prompt: Prompt::AskCourse,
            },
            MenuOption::DeleteStudent => Transition::Collect {
                to: DialogueState::DeleteStudent(DeleteStudentStep::AwaitingPublicId),
                prompt: Prompt::AskStudentPublicId,
            },
            MenuOption::StudentRoster => self.roster(0),
            MenuOption::ClosePanel => Transition::End { prompt: Prompt::PanelClosed },
        }
    }

    fn settle(
        &self,
        _step: &MenuStep,
        _action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match outcome {
            ActionOutcome::Roster(page) => {
                Ok(Settlement {
                    next: Some(DialogueState::admin_menu()),
                    prompt: Prompt::Roster(page),
                })
            }
            outcome => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BulkGradeFlow;

impl WorkflowGraph for BulkGradeFlow {
    type Step = BulkGradeStep;

    fn flow_type(&self) -> FlowType {
        FlowType::BulkGrades
    }

    fn initial(&self) -> BulkGradeStep {
        BulkGradeStep::AwaitingCourse
    }

    fn advance(&self, step: &BulkGradeStep, input: &str, _context: &FlowContext) -> Transition {
        match step {
            BulkGradeStep::AwaitingCourse => {
                let course = field(input);
                Transition::Collect {
                    to: DialogueState::BulkGrades(BulkGradeStep::AwaitingGradeLines {
                        course: course.clone(),
                        saved: 0,
                    }),
                    prompt: Prompt::AskGradeLines { course },
                }
            }
            BulkGradeStep::AwaitingGradeLines { course, .. } => {
                let block = parse_grade_block(input);
                Transition::Invoke(FlowAction::IngestGrades {
                    course: course.clone(),
                    lines: block.lines,
                    finish: block.finished,
                })
            }
        }
    }

    fn settle(
        &self,
        step: &BulkGradeStep,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (step, action, outcome) {
            (
                BulkGradeStep::AwaitingGradeLines { course, saved },
                FlowAction::IngestGrades { finish, .. },
                ActionOutcome::GradesIngested { saved: added },
            ) => {
                let total = saved + added;
                if *finish {
                    Ok(Settlement {
                        next: Some(DialogueState::admin_menu()),
                        prompt: Prompt::GradesCompleted { course: course.clone(), total },
                    })
                } else {
                    Ok(Settlement {
                        next: Some(DialogueState::BulkGrades(BulkGradeStep::AwaitingGradeLines {
                            course: course.clone(),
                            saved: total,
                        })),
                        prompt: Prompt::GradesProgress { saved: added, total },
                    })
                }
            }
            (_, _, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EditGradeFlow;

impl WorkflowGraph for EditGradeFlow {
    type Step = EditGradeStep;

    fn flow_type(&self) -> FlowType {
        FlowType::EditGrade
    }

    fn initial(&self) -> EditGradeStep {
        EditGradeStep::AwaitingPublicId
    }

    fn advance(&self, step: &EditGradeStep, input: &str, _context: &FlowContext) -> Transition {
        match step {
            EditGradeStep::AwaitingPublicId => Transition::Collect {
                to: DialogueState::EditGrade(EditGradeStep::AwaitingCourse {
                    public_id: PublicId::new(field(input)),
                }),
                prompt: Prompt::AskCourse,
            },
            EditGradeStep::AwaitingCourse { public_id } => Transition::Collect {
                to: DialogueState::EditGrade(EditGradeStep::AwaitingValue {
                    public_id: public_id.clone(),
                    course: field(input),
                }),
                prompt: Prompt::AskGradeValue,
            },
            EditGradeStep::AwaitingValue { public_id, course } => {
                Transition::Invoke(FlowAction::UpdateGrade {
                    public_id: public_id.clone(),
                    course: course.clone(),
                    value: field(input),
                })
            }
        }
    }

    fn settle(
        &self,
        step: &EditGradeStep,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (step, action, outcome) {
            (
                EditGradeStep::AwaitingValue { public_id, course },
                FlowAction::UpdateGrade { value, .. },
                ActionOutcome::GradeUpdated { .. },
            ) => Ok(Settlement {
                next: Some(DialogueState::admin_menu()),
                prompt: Prompt::GradeUpdated {
                    public_id: public_id.clone(),
                    course: course.clone(),
                    value: value.clone(),
                },
            }),
            (_, _, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeleteGradeFlow;

impl WorkflowGraph for DeleteGradeFlow {
    type Step = DeleteGradeStep;

    fn flow_type(&self) -> FlowType {
        FlowType::DeleteGrade
    }

    fn initial(&self) -> DeleteGradeStep {
        DeleteGradeStep::AwaitingPublicId
    }

    fn advance(&self, step: &DeleteGradeStep, input: &str, _context: &FlowContext) -> Transition {
        match step {
            DeleteGradeStep::AwaitingPublicId => Transition::Collect {
                to: DialogueState::DeleteGrade(DeleteGradeStep::AwaitingCourse {
                    public_id: PublicId::new(field(input)),
                }),
                prompt: Prompt::AskCourse,
            },
            DeleteGradeStep::AwaitingCourse { public_id } => {
                Transition::Invoke(FlowAction::DeleteGrade {
                    public_id: public_id.clone(),
                    course: field(input),
                })
            }
        }
    }

    fn settle(
        &self,
        step: &DeleteGradeStep,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (step, action, outcome) {
            (
                DeleteGradeStep::AwaitingCourse { public_id },
                FlowAction::DeleteGrade { course, .. },
                ActionOutcome::GradeDeleted { .. },
            ) => Ok(Settlement {
                next: None,
                prompt: Prompt::GradeDeleted {
                    public_id: public_id.clone(),
                    course: course.clone(),
                },
            }),
            (_, _, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeleteCourseFlow;

impl WorkflowGraph for DeleteCourseFlow {
    type Step = DeleteCourseStep;

    fn flow_type(&self) -> FlowType {
        FlowType::DeleteCourse
    }

    fn initial(&self) -> DeleteCourseStep {
        DeleteCourseStep::AwaitingCourse
    }

    fn advance(&self, _step: &DeleteCourseStep, input: &str, _context: &FlowContext) -> Transition {
        Transition::Invoke(FlowAction::DeleteCourse { course: field(input) })
    }

    fn settle(
        &self,
        _step: &DeleteCourseStep,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (action, outcome) {
            (FlowAction::DeleteCourse { course }, ActionOutcome::CourseDeleted { rows }) => {
                Ok(Settlement {
                    next: None,
                    prompt: Prompt::CourseDeleted { course: course.clone(), rows },
                })
            }
            (_, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeleteStudentFlow;

impl WorkflowGraph for DeleteStudentFlow {
    type Step = DeleteStudentStep;

    fn flow_type(&self) -> FlowType {
        FlowType::DeleteStudent
    }

    fn initial(&self) -> DeleteStudentStep {
        DeleteStudentStep::AwaitingPublicId
    }

    fn advance(
        &self,
        _step: &DeleteStudentStep,
        input: &str,
        _context: &FlowContext,
    ) -> Transition {
        Transition::Invoke(FlowAction::DeleteStudent { public_id: PublicId::new(field(input)) })
    }

    fn settle(
        &self,
        _step: &DeleteStudentStep,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match (action, outcome) {
            (FlowAction::DeleteStudent { public_id }, ActionOutcome::StudentDeleted { .. }) => {
                Ok(Settlement {
                    next: None,
                    prompt: Prompt::StudentDeleted { public_id: public_id.clone() },
                })
            }
            (_, outcome) => Err(unexpected(self.flow_type(), &outcome)),
        }
    }
}

/// Dispatches a session's state to the graph that owns it.
#[derive(Clone, Debug)]
pub struct DialogueEngine {
    registration: RegistrationFlow,
    admin_menu: AdminMenuFlow,
    bulk_grades: BulkGradeFlow,
    edit_grade: EditGradeFlow,
    delete_grade: DeleteGradeFlow,
    delete_course: DeleteCourseFlow,
    delete_student: DeleteStudentFlow,
}

impl DialogueEngine {
    pub fn new(roster_page_size: u32) -> Self {
        Self {
            registration: RegistrationFlow,
            admin_menu: AdminMenuFlow::new(roster_page_size),
            bulk_grades: BulkGradeFlow,
            edit_grade: EditGradeFlow,
            delete_grade: DeleteGradeFlow,
            delete_course: DeleteCourseFlow,
            delete_student: DeleteStudentFlow,
        }
    }

    pub fn begin(&self, entry: EntryPoint) -> (DialogueState, Prompt) {
        match entry {
            EntryPoint::Registration => {
                (DialogueState::Registration(self.registration.initial()), Prompt::AskGivenName)
            }
            EntryPoint::AdminPanel => {
                (DialogueState::AdminMenu(self.admin_menu.initial()), Prompt::AdminMenu)
            }
        }
    }

    pub fn advance(
        &self,
        state: &DialogueState,
        input: &str,
        context: &FlowContext,
    ) -> Transition {
        match state {
            DialogueState::Registration(step) => self.registration.advance(step, input, context),
            DialogueState::AdminMenu(step) => self.admin_menu.advance(step, input, context),
            DialogueState::BulkGrades(step) => self.bulk_grades.advance(step, input, context),
            DialogueState::EditGrade(step) => self.edit_grade.advance(step, input, context),
            DialogueState::DeleteGrade(step) => self.delete_grade.advance(step, input, context),
            DialogueState::DeleteCourse(step) => self.delete_course.advance(step, input, context),
            DialogueState::DeleteStudent(step) => {
                self.delete_student.advance(step, input, context)
            }
        }
    }

    pub fn settle(
        &self,
        state: &DialogueState,
        action: &FlowAction,
        outcome: ActionOutcome,
    ) -> Result<Settlement, FlowTransitionError> {
        match state {
            DialogueState::Registration(step) => self.registration.settle(step, action, outcome),
            DialogueState::AdminMenu(step) => self.admin_menu.settle(step, action, outcome),
            DialogueState::BulkGrades(step) => self.bulk_grades.settle(step, action, outcome),
            DialogueState::EditGrade(step) => self.edit_grade.settle(step, action, outcome),
            DialogueState::DeleteGrade(step) => self.delete_grade.settle(step, action, outcome),
            DialogueState::DeleteCourse(step) => self.delete_course.settle(step, action, outcome),
            DialogueState::DeleteStudent(step) => {
                self.delete_student.settle(step, action, outcome)
            }
        }
    }

    /// Explicit cancel: accepted from any step, discards collected fields.
    pub fn cancel(&self, _state: &DialogueState) -> Settlement {
        Settlement { next: None, prompt: Prompt::Cancelled }
    }
}

impl Default for DialogueEngine {
    fn default() -> Self {
        Self::new(10)
    }
}

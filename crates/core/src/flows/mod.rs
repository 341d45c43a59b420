pub mod engine;
pub mod states;

pub use engine::{
    AdminMenuFlow, BulkGradeFlow, DeleteCourseFlow, DeleteGradeFlow, DeleteStudentFlow,
    DialogueEngine, EditGradeFlow, FlowTransitionError, RegistrationFlow, WorkflowGraph,
};
pub use states::{
    ActionOutcome, DialogueState, EntryPoint, FlowAction, FlowContext, FlowType, MenuOption,
    Prompt, Settlement, Transition,
};

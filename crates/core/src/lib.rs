pub mod access;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod sessions;

pub use access::{AccessError, AccessPolicy};
pub use domain::admin::AdminRecord;
pub use domain::grade::{GradeLine, GradeRecord};
pub use domain::identity::{Identity, PublicId};
pub use domain::roster::{PageRequest, RosterPage};
pub use domain::student::StudentRecord;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DialogueEngine, DialogueState, EntryPoint, FlowAction, Prompt};
pub use sessions::{SessionGuard, SessionStore};

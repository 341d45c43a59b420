//! Routes one inbound text event for an identity through commands or the
//! identity's active dialogue, executing store actions as the dialogue asks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gradedesk_core::access::{AccessError, AccessPolicy};
use gradedesk_core::domain::identity::Identity;
use gradedesk_core::errors::{ApplicationError, DomainError};
use gradedesk_core::flows::{
    ActionOutcome, DialogueEngine, DialogueState, EntryPoint, FlowAction, FlowContext, Transition,
};
use gradedesk_core::sessions::{SessionGuard, SessionStore};
use gradedesk_db::repositories::{
    AdminRepository, GradeRepository, RepositoryError, StudentRepository,
};
use gradedesk_db::{AccessControl, AccessControlError};

use crate::commands::{parse_command, ChatCommand, CommandParseError};
use crate::replies::{self, render, Reply};
use crate::runner::{EventContext, InboundMessage, MessageHandler};

#[derive(Clone)]
pub struct ConversationRuntime {
    students: Arc<dyn StudentRepository>,
    grades: Arc<dyn GradeRepository>,
    access: AccessControl,
    engine: DialogueEngine,
    sessions: Arc<SessionStore>,
}

impl ConversationRuntime {
    pub fn new(
        students: Arc<dyn StudentRepository>,
        grades: Arc<dyn GradeRepository>,
        access: AccessControl,
        engine: DialogueEngine,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self { students, grades, access, engine, sessions }
    }

    /// Wires every repository role to one store.
    pub fn over_store<S>(
        store: Arc<S>,
        policy: AccessPolicy,
        engine: DialogueEngine,
        sessions: Arc<SessionStore>,
    ) -> Self
    where
        S: StudentRepository + GradeRepository + AdminRepository + 'static,
    {
        let admins: Arc<dyn AdminRepository> = store.clone();
        Self::new(store.clone(), store, AccessControl::new(admins, policy), engine, sessions)
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn handle_event(&self, identity: Identity, text: &str) -> Reply {
        self.respond(identity, text, &Uuid::new_v4().to_string()).await
    }

    async fn respond(&self, identity: Identity, text: &str, correlation_id: &str) -> Reply {
        let mut session = self.sessions.lock(identity).await;
        if session.expired() {
            info!(
                event_name = "session.expired",
                correlation_id,
                identity = %identity,
                "idle session discarded"
            );
        }

        match parse_command(text) {
            Some(Ok(command)) => self.run_command(&mut session, command, correlation_id).await,
            Some(Err(CommandParseError::Unsupported(verb))) => replies::unsupported_command(&verb),
            Some(Err(error)) => {
                debug!(correlation_id, identity = %identity, error = %error, "command rejected");
                Reply::text(error.usage().unwrap_or_else(|| error.to_string()))
            }
            None => match session.current().cloned() {
                Some(state) => {
                    self.continue_dialogue(&mut session, state, text, correlation_id).await
                }
                None => replies::no_active_dialogue(),
            },
        }
    }

    async fn run_command(
        &self,
        session: &mut SessionGuard,
        command: ChatCommand,
        correlation_id: &str,
    ) -> Reply {
        let identity = session.identity();
        info!(
            event_name = "flow.command_received",
            correlation_id,
            identity = %identity,
            command = command.name(),
            "command received"
        );

        match command {
            ChatCommand::Start | ChatCommand::Help => replies::help(),
            ChatCommand::Register => self.enter(session, EntryPoint::Registration, correlation_id),
            ChatCommand::MyGrades => match self.my_grades(identity).await {
                Ok(reply) => reply,
                Err(error) => failure(error, correlation_id),
            },
            ChatCommand::Admin => match self.authorize_admin(identity).await {
                Ok(()) => self.enter(session, EntryPoint::AdminPanel, correlation_id),
                Err(error) => failure(error, correlation_id),
            },
            ChatCommand::AddAdmin(target) => {
                match self.access.grant_admin(identity, target).await {
                    Ok(inserted) => replies::admin_granted(target, inserted),
                    Err(error) => failure(access_error(error), correlation_id),
                }
            }
            ChatCommand::RemoveAdmin(target) => {
                match self.access.revoke_admin(identity, target).await {
                    Ok(removed) => replies::admin_revoked(target, removed),
                    Err(AccessControlError::Denied(AccessError::ProtectedPrincipal(target))) => {
                        replies::protected_principal(target)
                    }
                    Err(error) => failure(access_error(error), correlation_id),
                }
            }
            ChatCommand::Admins => {
                let listing = match self.authorize_admin(identity).await {
                    Ok(()) => self.access.list_admins().await.map_err(ApplicationError::from),
                    Err(error) => Err(error),
                };
                match listing {
                    Ok(admins) => replies::admin_list(&admins, self.access.policy().super_admin()),
                    Err(error) => failure(error, correlation_id),
                }
            }
            ChatCommand::Cancel => match session.current() {
                Some(state) => {
                    let settlement = self.engine.cancel(state);
                    info!(
                        event_name = "flow.cancelled",
                        correlation_id,
                        identity = %identity,
                        flow = state.flow_type().as_str(),
                        "session cancelled"
                    );
                    session.settle(settlement.next);
                    render(&settlement.prompt)
                }
                None => replies::nothing_to_cancel(),
            },
        }
    }

    /// Starts a fresh session, replacing whatever was active.
    fn enter(&self, session: &mut SessionGuard, entry: EntryPoint, correlation_id: &str) -> Reply {
        let replaced = session.current().map(|state| state.flow_type().as_str());
        let (state, prompt) = self.engine.begin(entry);
        info!(
            event_name = "flow.session_started",
            correlation_id,
            identity = %session.identity(),
            flow = state.flow_type().as_str(),
            replaced = replaced.unwrap_or("none"),
            "session started"
        );
        session.replace(state);
        render(&prompt)
    }

    async fn continue_dialogue(
        &self,
        session: &mut SessionGuard,
        state: DialogueState,
        text: &str,
        correlation_id: &str,
    ) -> Reply {
        let identity = session.identity();
        let flow = state.flow_type();

        if flow.requires_admin() {
            if let Err(error) = self.authorize_admin(identity).await {
                if is_denied(&error) {
                    warn!(
                        event_name = "flow.admin_rights_lost",
                        correlation_id,
                        identity = %identity,
                        flow = flow.as_str(),
                        "admin session terminated"
                    );
                    session.clear();
                }
                return failure(error, correlation_id);
            }
        }

        let context = FlowContext { identity };
        match self.engine.advance(&state, text, &context) {
            Transition::Collect { to, prompt } => {
                debug!(
                    event_name = "flow.transition_applied",
                    correlation_id,
                    identity = %identity,
                    flow = flow.as_str(),
                    "field collected"
                );
                session.replace(to);
                render(&prompt)
            }
            Transition::Stay { prompt } => {
                session.touch();
                render(&prompt)
            }
            Transition::End { prompt } => {
                session.clear();
                render(&prompt)
            }
            Transition::Invoke(action) => {
                self.invoke(session, &state, action, correlation_id).await
            }
        }
    }

    async fn invoke(
        &self,
        session: &mut SessionGuard,
        state: &DialogueState,
        action: FlowAction,
        correlation_id: &str,
    ) -> Reply {
        let identity = session.identity();
        let outcome = match self.execute(&action).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "flow.action_failed",
                    correlation_id,
                    identity = %identity,
                    action = action.name(),
                    error = %error,
                    "action failed; session left unchanged"
                );
                session.touch();
                return failure(error, correlation_id);
            }
        };

        match self.engine.settle(state, &action, outcome) {
            Ok(settlement) => {
                info!(
                    event_name = "flow.transition_applied",
                    correlation_id,
                    identity = %identity,
                    flow = state.flow_type().as_str(),
                    action = action.name(),
                    terminated = settlement.next.is_none(),
                    "action settled"
                );
                session.settle(settlement.next);
                render(&settlement.prompt)
            }
            Err(error) => {
                warn!(
                    event_name = "flow.settle_failed",
                    correlation_id,
                    identity = %identity,
                    error = %error,
                    "session discarded"
                );
                session.clear();
                failure(ApplicationError::Domain(DomainError::from(error)), correlation_id)
            }
        }
    }

    async fn execute(&self, action: &FlowAction) -> Result<ActionOutcome, ApplicationError> {
        let outcome = match action {
            FlowAction::RegisterStudent(student) => {
                match self.students.insert(student.clone()).await {
                    Ok(()) => ActionOutcome::Registered(student.clone()),
                    Err(RepositoryError::Conflict(reason)) => {
                        info!(
                            event_name = "flow.registration_conflict",
                            identity = %student.identity,
                            reason = %reason,
                            "registration rejected"
                        );
                        ActionOutcome::RegistrationConflict
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            FlowAction::IngestGrades { course, lines, .. } => {
                if lines.is_empty() {
                    ActionOutcome::GradesIngested { saved: 0 }
                } else {
                    ActionOutcome::GradesIngested {
                        saved: self.grades.upsert_many(course, lines).await?,
                    }
                }
            }
            FlowAction::UpdateGrade { public_id, course, value } => ActionOutcome::GradeUpdated {
                rows: self.grades.update_value(public_id, course, value).await?,
            },
            FlowAction::DeleteGrade { public_id, course } => {
                ActionOutcome::GradeDeleted { rows: self.grades.delete(public_id, course).await? }
            }
            FlowAction::DeleteCourse { course } => {
                ActionOutcome::CourseDeleted { rows: self.grades.delete_course(course).await? }
            }
            FlowAction::DeleteStudent { public_id } => {
                let deletion = self.students.delete_with_grades(public_id).await?;
                ActionOutcome::StudentDeleted {
                    grades: deletion.grades,
                    students: deletion.students,
                }
            }
            FlowAction::ListRoster(request) => {
                ActionOutcome::Roster(self.students.list_page(*request).await?)
            }
        };
        Ok(outcome)
    }

    async fn my_grades(&self, identity: Identity) -> Result<Reply, ApplicationError> {
        let Some(student) = self.students.find_by_identity(identity).await? else {
            return Ok(replies::not_registered());
        };
        let grades = self.grades.list_for_student(&student.public_id).await?;
        Ok(replies::my_grades(&grades))
    }

    async fn authorize_admin(&self, identity: Identity) -> Result<(), ApplicationError> {
        let is_admin = self.access.is_admin(identity).await?;
        self.access
            .policy()
            .authorize_admin_panel(identity, is_admin)
            .map_err(|error| ApplicationError::Domain(DomainError::Access(error)))
    }
}

#[async_trait]
impl MessageHandler for ConversationRuntime {
    async fn handle(&self, message: &InboundMessage, ctx: &EventContext) -> Reply {
        self.respond(message.identity, &message.text, &ctx.correlation_id).await
    }
}

fn access_error(error: AccessControlError) -> ApplicationError {
    match error {
        AccessControlError::Denied(denied) => ApplicationError::Domain(DomainError::Access(denied)),
        AccessControlError::Store(store) => store.into(),
    }
}

fn is_denied(error: &ApplicationError) -> bool {
    matches!(error, ApplicationError::Domain(DomainError::Access(_)))
}

fn failure(error: ApplicationError, correlation_id: &str) -> Reply {
    let interface = error.into_interface(correlation_id);
    debug!(
        event_name = "ingress.chat.failure_reply",
        correlation_id = interface.correlation_id(),
        detail = %interface,
        "replying with failure"
    );
    replies::failure(interface.user_message(), interface.correlation_id())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use gradedesk_core::access::AccessPolicy;
    use gradedesk_core::domain::grade::{GradeLine, GradeRecord};
    use gradedesk_core::domain::identity::{Identity, PublicId};
    use gradedesk_core::domain::roster::{PageRequest, RosterPage};
    use gradedesk_core::domain::student::StudentRecord;
    use gradedesk_core::flows::{DialogueEngine, DialogueState, MenuOption};
    use gradedesk_core::sessions::SessionStore;
    use gradedesk_db::repositories::{
        GradeRepository, InMemoryStore, RepositoryError, StudentDeletion, StudentRepository,
    };
    use gradedesk_db::AccessControl;

    use super::ConversationRuntime;

    const SUPER: Identity = Identity(100_724_696);
    const STUDENT: Identity = Identity(11);
    const RETRY: &str =
        "The grade records are unavailable right now. Send the same message again shortly.";
    const FORBIDDEN: &str = "Only administrators can do that.";

    fn runtime(page_size: u32) -> (ConversationRuntime, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let runtime = ConversationRuntime::over_store(
            store.clone(),
            AccessPolicy::new(SUPER),
            DialogueEngine::new(page_size),
            Arc::new(SessionStore::new()),
        );
        (runtime, store)
    }

    async fn state_of(runtime: &ConversationRuntime, identity: Identity) -> Option<DialogueState> {
        runtime.sessions().lock(identity).await.current().cloned()
    }

    async fn say(runtime: &ConversationRuntime, identity: Identity, lines: &[&str]) -> String {
        let mut last = String::new();
        for line in lines {
            last = runtime.handle_event(identity, line).await.text;
        }
        last
    }

    async fn register(
        runtime: &ConversationRuntime,
        identity: Identity,
        public_id: &str,
    ) -> String {
        say(runtime, identity, &["/register", "Ali", "Karimi", public_id]).await
    }

    #[tokio::test]
    async fn registration_collects_fields_and_terminates() {
        let (runtime, store) = runtime(10);

        let reply = register(&runtime, STUDENT, " 40123456 ").await;
        assert!(reply.contains("40123456"), "unexpected reply: {reply}");
        assert_eq!(state_of(&runtime, STUDENT).await, None);

        let student = store.find_by_identity(STUDENT).await.expect("lookup").expect("registered");
        assert_eq!(student.public_id, PublicId::new("40123456"));
        assert_eq!(student.display_name(), "Ali Karimi");
    }

    #[tokio::test]
    async fn registering_twice_reports_a_conflict() {
        let (runtime, store) = runtime(10);

        register(&runtime, STUDENT, "40123456").await;
        let reply = register(&runtime, STUDENT, "40999999").await;

        assert!(reply.contains("already registered"), "unexpected reply: {reply}");
        assert_eq!(state_of(&runtime, STUDENT).await, None);
        assert_eq!(store.list_page(PageRequest::new(0, 0)).await.expect("roster").total, 1);
    }

    #[tokio::test]
    async fn bulk_ingestion_counts_valid_lines_and_returns_to_menu() {
        let (runtime, store) = runtime(10);

        say(&runtime, SUPER, &["/admin", MenuOption::BulkGradeEntry.label(), " Math "]).await;
        let progress = say(&runtime, SUPER, &["40123456 18", "bad-line", "40123457 16"]).await;
        assert!(progress.contains("2 so far"), "unexpected reply: {progress}");

        let done = runtime.handle_event(SUPER, "END").await;
        assert!(done.text.contains("2 grade(s) saved"), "unexpected reply: {}", done.text);
        assert!(!done.options.is_empty());
        assert_eq!(state_of(&runtime, SUPER).await, Some(DialogueState::admin_menu()));

        let grades = store.list_for_student(&PublicId::new("40123457")).await.expect("grades");
        assert_eq!(grades[0].course, "Math");
        assert_eq!(grades[0].value, "16");
    }

    #[tokio::test]
    async fn resubmitted_grade_keeps_last_value() {
        let (runtime, store) = runtime(10);

        say(&runtime, SUPER, &["/admin", MenuOption::BulkGradeEntry.label(), "Math"]).await;
        say(&runtime, SUPER, &["40123456 12\n40123456 19\nend"]).await;

        let grades = store.list_for_student(&PublicId::new("40123456")).await.expect("grades");
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].value, "19");
    }

    #[tokio::test]
    async fn delete_student_removes_record_and_grades() {
        let (runtime, store) = runtime(10);
        register(&runtime, STUDENT, "401").await;
        for course in ["A", "B"] {
            store
                .upsert(GradeRecord {
                    public_id: PublicId::new("401"),
                    course: course.to_owned(),
                    value: "15".to_owned(),
                })
                .await
                .expect("file grade");
        }

        let reply =
            say(&runtime, SUPER, &["/admin", MenuOption::DeleteStudent.label(), "401"]).await;

        assert!(reply.contains("401"), "unexpected reply: {reply}");
        assert_eq!(state_of(&runtime, SUPER).await, None);
        assert!(store.find_by_identity(STUDENT).await.expect("lookup").is_none());
        assert!(store.list_for_student(&PublicId::new("401")).await.expect("grades").is_empty());
    }

    #[tokio::test]
    async fn edit_grade_reports_success_and_returns_to_menu() {
        let (runtime, store) = runtime(10);
        store
            .upsert_many(
                "Math",
                &[GradeLine { public_id: PublicId::new("401"), value: "10".to_owned() }],
            )
            .await
            .expect("seed");

        let reply = say(
            &runtime,
            SUPER,
            &["/admin", MenuOption::EditGrade.label(), "401", "Math", "17"],
        )
        .await;

        assert!(reply.contains("set to 17"), "unexpected reply: {reply}");
        assert_eq!(state_of(&runtime, SUPER).await, Some(DialogueState::admin_menu()));
        let grades = store.list_for_student(&PublicId::new("401")).await.expect("grades");
        assert_eq!(grades[0].value, "17");
    }

    #[tokio::test]
    async fn roster_navigation_follows_tokens() {
        let (runtime, _store) = runtime(5);
        for n in 0..12 {
            register(&runtime, Identity(1_000 + n), &format!("40{n:02}")).await;
        }

        let first = say(&runtime, SUPER, &["/admin", MenuOption::StudentRoster.label()]).await;
        assert!(first.starts_with("Students:\n1. 4000"), "unexpected reply: {first}");

        let second = runtime.handle_event(SUPER, "roster@5").await;
        assert!(second.text.contains("6. 4005"), "unexpected reply: {}", second.text);
        assert_eq!(second.options[0], vec!["roster@0".to_owned(), "roster@10".to_owned()]);
        assert_eq!(state_of(&runtime, SUPER).await, Some(DialogueState::admin_menu()));
    }

    #[tokio::test]
    async fn invalid_menu_option_stays_in_menu() {
        let (runtime, _store) = runtime(10);

        let reply = say(&runtime, SUPER, &["/admin", "make coffee"]).await;

        assert!(reply.starts_with("Invalid option"), "unexpected reply: {reply}");
        assert_eq!(state_of(&runtime, SUPER).await, Some(DialogueState::admin_menu()));
    }

    #[tokio::test]
    async fn entry_command_replaces_active_session() {
        let (runtime, _store) = runtime(10);

        say(&runtime, SUPER, &["/register", "Ali"]).await;
        let reply = runtime.handle_event(SUPER, "/admin").await;

        assert!(reply.text.starts_with("Admin panel"));
        assert_eq!(state_of(&runtime, SUPER).await, Some(DialogueState::admin_menu()));
    }

    #[tokio::test]
    async fn non_admin_is_refused_and_keeps_prior_session() {
        let (runtime, _store) = runtime(10);

        say(&runtime, STUDENT, &["/register", "Ali"]).await;
        let before = state_of(&runtime, STUDENT).await;
        let reply = runtime.handle_event(STUDENT, "/admin").await;

        assert!(reply.text.starts_with(FORBIDDEN), "unexpected reply: {}", reply.text);
        assert_eq!(state_of(&runtime, STUDENT).await, before);
    }

    #[tokio::test]
    async fn revoked_admin_session_ends_on_next_action() {
        let (runtime, _store) = runtime(10);
        let helper = Identity(7);

        say(&runtime, SUPER, &["/addadmin 7"]).await;
        say(&runtime, helper, &["/admin"]).await;
        say(&runtime, SUPER, &["/removeadmin 7"]).await;

        let reply = runtime.handle_event(helper, MenuOption::StudentRoster.label()).await;
        assert!(reply.text.starts_with(FORBIDDEN), "unexpected reply: {}", reply.text);
        assert_eq!(state_of(&runtime, helper).await, None);
    }

    #[tokio::test]
    async fn admin_commands_enforce_revocation_rules() {
        let (runtime, _store) = runtime(10);

        assert!(say(&runtime, SUPER, &["/removeadmin 100724696"]).await.contains("super-admin"));
        assert!(say(&runtime, STUDENT, &["/addadmin 11"]).await.starts_with(FORBIDDEN));

        say(&runtime, SUPER, &["/addadmin 7"]).await;
        assert!(say(&runtime, Identity(7), &["/removeadmin 8"]).await.starts_with(FORBIDDEN));
        assert_eq!(say(&runtime, SUPER, &["/addadmin"]).await, "Usage: /addadmin <numeric id>");

        let listing = say(&runtime, Identity(7), &["/admins"]).await;
        assert!(listing.contains("7"), "unexpected reply: {listing}");
    }

    #[tokio::test]
    async fn cancel_discards_session_without_side_effects() {
        let (runtime, store) = runtime(10);

        say(&runtime, STUDENT, &["/register", "Ali", "Karimi"]).await;
        assert_eq!(runtime.handle_event(STUDENT, "/cancel").await.text, "Cancelled.");
        assert_eq!(state_of(&runtime, STUDENT).await, None);
        assert!(store.find_by_identity(STUDENT).await.expect("lookup").is_none());
        assert_eq!(runtime.handle_event(STUDENT, "/cancel").await.text, "Nothing to cancel.");
    }

    #[tokio::test]
    async fn my_grades_covers_unregistered_empty_and_filed() {
        let (runtime, store) = runtime(10);

        assert!(say(&runtime, STUDENT, &["/mygrades"]).await.contains("/register"));
        register(&runtime, STUDENT, "401").await;
        assert_eq!(say(&runtime, STUDENT, &["/mygrades"]).await, "No grades recorded yet.");

        store
            .upsert(GradeRecord {
                public_id: PublicId::new("401"),
                course: "Physics".to_owned(),
                value: "A".to_owned(),
            })
            .await
            .expect("file grade");
        assert_eq!(say(&runtime, STUDENT, &["/mygrades"]).await, "Your grades:\nPhysics: A");
    }

    #[tokio::test]
    async fn text_without_session_gets_help_hint() {
        let (runtime, _store) = runtime(10);
        assert!(runtime.handle_event(STUDENT, "hello").await.text.contains("/help"));
    }

    /// Student store whose writes fail until `healthy` is set.
    struct FlakyStudents {
        inner: InMemoryStore,
        healthy: AtomicBool,
    }

    impl FlakyStudents {
        fn check(&self) -> Result<(), RepositoryError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
            }
        }
    }

    #[async_trait]
    impl StudentRepository for FlakyStudents {
        async fn insert(&self, student: StudentRecord) -> Result<(), RepositoryError> {
            self.check()?;
            self.inner.insert(student).await
        }

        async fn find_by_identity(
            &self,
            identity: Identity,
        ) -> Result<Option<StudentRecord>, RepositoryError> {
            self.inner.find_by_identity(identity).await
        }

        async fn list_page(&self, request: PageRequest) -> Result<RosterPage, RepositoryError> {
            self.inner.list_page(request).await
        }

        async fn delete_with_grades(
            &self,
            public_id: &PublicId,
        ) -> Result<StudentDeletion, RepositoryError> {
            self.inner.delete_with_grades(public_id).await
        }
    }

    #[tokio::test]
    async fn store_failure_keeps_state_so_input_can_be_resent() {
        let store = Arc::new(InMemoryStore::new());
        let students = Arc::new(FlakyStudents {
            inner: InMemoryStore::new(),
            healthy: AtomicBool::new(false),
        });
        let runtime = ConversationRuntime::new(
            students.clone(),
            store.clone(),
            AccessControl::new(store, AccessPolicy::new(SUPER)),
            DialogueEngine::default(),
            Arc::new(SessionStore::new()),
        );

        let reply = register(&runtime, STUDENT, "401").await;
        assert!(reply.starts_with(RETRY), "unexpected reply: {reply}");
        let pending = state_of(&runtime, STUDENT).await;
        assert!(matches!(pending, Some(DialogueState::Registration(_))));

        students.healthy.store(true, Ordering::SeqCst);
        let reply = runtime.handle_event(STUDENT, "401").await;
        assert!(reply.text.contains("Registration complete"), "unexpected reply: {}", reply.text);
        assert!(students.inner.find_by_identity(STUDENT).await.expect("lookup").is_some());
    }
}

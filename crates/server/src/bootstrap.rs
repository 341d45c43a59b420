use std::sync::Arc;

use gradedesk_chat::runner::{ChatRunner, ChatTransport, NoopChatTransport, ReconnectPolicy};
use gradedesk_chat::ConversationRuntime;
use gradedesk_core::access::AccessPolicy;
use gradedesk_core::config::{AppConfig, ConfigError, LoadOptions, TransportMode};
use gradedesk_core::flows::DialogueEngine;
use gradedesk_core::sessions::SessionStore;
use gradedesk_db::repositories::{
    RepositoryError, SqlAdminRepository, SqlGradeRepository, SqlStudentRepository,
};
use gradedesk_db::{connect_and_migrate, AccessControl, ConnectError, DbPool};
use thiserror::Error;
use tracing::info;

use crate::console::ConsoleTransport;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub sessions: Arc<SessionStore>,
    pub conversation: Arc<ConversationRuntime>,
    pub runner: ChatRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] ConnectError),
    #[error("super-admin bootstrap failed: {0}")]
    SuperAdmin(#[source] RepositoryError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        transport_mode = ?config.transport.mode,
        "starting application bootstrap"
    );
    let super_admin = config.super_admin()?;

    let db_pool = connect_and_migrate(&config.database).await?;

    let access = AccessControl::new(
        Arc::new(SqlAdminRepository::new(db_pool.clone())),
        AccessPolicy::new(super_admin),
    );
    access.bootstrap().await.map_err(BootstrapError::SuperAdmin)?;

    let sessions = Arc::new(SessionStore::with_idle_ttl_secs(config.sessions.idle_ttl_secs));
    let conversation = Arc::new(ConversationRuntime::new(
        Arc::new(SqlStudentRepository::new(db_pool.clone())),
        Arc::new(SqlGradeRepository::new(db_pool.clone())),
        access,
        DialogueEngine::new(config.roster.page_size),
        Arc::clone(&sessions),
    ));

    let transport: Arc<dyn ChatTransport> = match config.transport.mode {
        TransportMode::Noop => Arc::new(NoopChatTransport),
        TransportMode::Console => Arc::new(ConsoleTransport::stdio()),
    };
    let runner = ChatRunner::new(
        transport,
        conversation.clone(),
        ReconnectPolicy::with_max_retries(config.transport.reconnect_attempts),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        super_admin = %super_admin,
        roster_page_size = config.roster.page_size,
        session_idle_ttl_secs = config.sessions.idle_ttl_secs,
        "application bootstrap complete"
    );

    Ok(Application { config, db_pool, sessions, conversation, runner })
}

#[cfg(test)]
mod tests {
    use gradedesk_core::config::{ConfigOverrides, LoadOptions};
    use gradedesk_core::domain::identity::Identity;
    use gradedesk_core::flows::MenuOption;

    use crate::bootstrap::{bootstrap, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_super_admin() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("missing super admin should fail");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("access.super_admin"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_and_admin_dialogue() {
        let app = bootstrap(valid_overrides("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('students', 'grades', 'admins')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected tables to be available after bootstrap");
        assert_eq!(table_count, 3);

        let admins = app.conversation.access().list_admins().await.expect("list admins");
        assert_eq!(admins.iter().map(|admin| admin.identity).collect::<Vec<_>>(), vec![SUPER]);

        let conversation = &app.conversation;
        conversation.handle_event(Identity(11), "/register").await;
        conversation.handle_event(Identity(11), "Ali").await;
        conversation.handle_event(Identity(11), "Karimi").await;
        conversation.handle_event(Identity(11), "40123456").await;

        conversation.handle_event(SUPER, "/admin").await;
        conversation.handle_event(SUPER, MenuOption::BulkGradeEntry.label()).await;
        conversation.handle_event(SUPER, "Math").await;
        let done = conversation.handle_event(SUPER, "40123456 18\nEND").await;
        assert!(done.text.contains("1 grade(s) saved"), "unexpected reply: {}", done.text);

        let grades = conversation.handle_event(Identity(11), "/mygrades").await;
        assert_eq!(grades.text, "Your grades:\nMath: 18");
        assert_eq!(app.sessions.active_count().await, 1);

        app.db_pool.close().await;
    }

    const SUPER: Identity = Identity(100_724_696);

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                super_admin: Some(SUPER),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}

use gradedesk_core::config::{AppConfig, LoadOptions};
use gradedesk_core::domain::identity::Identity;
use gradedesk_db::{
    connect_with_settings, migrations, AdminRepository, DbPool, SqlAdminRepository,
};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG: &str = "config_validation";
const DATABASE: &str = "database_connectivity";
const SCHEMA: &str = "schema_migrations";
const SUPER_ADMIN: &str = "super_admin_registered";

/// Exit code 0 when every check passes, 6 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 6 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks = vec![DoctorCheck::pass(CONFIG, "configuration loaded and validated")];
            checks.extend(store_checks(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck::fail(CONFIG, error.to_string()),
            DoctorCheck::skipped(DATABASE, "configuration did not load"),
            DoctorCheck::skipped(SCHEMA, "configuration did not load"),
            DoctorCheck::skipped(SUPER_ADMIN, "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn store_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(DATABASE, format!("failed to initialize async runtime: {error}")),
                DoctorCheck::skipped(SCHEMA, "the database was not reachable"),
                DoctorCheck::skipped(SUPER_ADMIN, "the database was not reachable"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(DATABASE, format!("failed to connect to database: {error}")),
                    DoctorCheck::skipped(SCHEMA, "the database was not reachable"),
                    DoctorCheck::skipped(SUPER_ADMIN, "the database was not reachable"),
                ];
            }
        };

        let mut checks =
            vec![DoctorCheck::pass(DATABASE, format!("connected using `{}`", config.database.url))];
        let schema = check_schema(&pool).await;
        let schema_ready = schema.status == CheckStatus::Pass;
        checks.push(schema);

        match config.access.super_admin {
            Some(super_admin) if schema_ready => {
                checks.push(check_super_admin(&pool, super_admin).await);
            }
            Some(_) => checks.push(DoctorCheck::skipped(SUPER_ADMIN, "the schema is not current")),
            None => checks.push(DoctorCheck::fail(SUPER_ADMIN, "access.super_admin is not set")),
        }

        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let known = migrations::known_count();

    match migrations::applied_count(pool).await {
        Ok(applied) if applied >= known => {
            DoctorCheck::pass(SCHEMA, format!("{applied} of {known} migration(s) applied"))
        }
        Ok(applied) => DoctorCheck::fail(
            SCHEMA,
            format!("{applied} of {known} migration(s) applied; run `gradedesk migrate`"),
        ),
        Err(_) => {
            DoctorCheck::fail(SCHEMA, "schema has not been migrated; run `gradedesk migrate`")
        }
    }
}

async fn check_super_admin(pool: &DbPool, super_admin: Identity) -> DoctorCheck {
    match SqlAdminRepository::new(pool.clone()).contains(super_admin).await {
        Ok(true) => DoctorCheck::pass(SUPER_ADMIN, format!("{super_admin} is registered as admin")),
        Ok(false) => DoctorCheck::fail(
            SUPER_ADMIN,
            format!("{super_admin} is not registered yet; start gradedesk-server once"),
        ),
        Err(error) => DoctorCheck::fail(SUPER_ADMIN, format!("admin lookup failed: {error}")),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;

/// Output of one CLI command: what to print and the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum OutcomeStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct Outcome<'a> {
    command: &'a str,
    status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let outcome = Outcome {
            command,
            status: OutcomeStatus::Ok,
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: encode(&outcome) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let outcome = Outcome {
            command,
            status: OutcomeStatus::Error,
            error_class: Some(error_class),
            message: message.into(),
        };
        Self { exit_code, output: encode(&outcome) }
    }
}

fn encode(outcome: &Outcome<'_>) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|error| {
        serde_json::json!({
            "command": outcome.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

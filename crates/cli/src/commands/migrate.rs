use gradedesk_core::config::{AppConfig, LoadOptions};
use gradedesk_db::{connect_and_migrate, ConnectError};

use crate::commands::CommandResult;

const COMMAND: &str = "migrate";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let outcome = runtime.block_on(async {
        let pool = connect_and_migrate(&config.database).await?;
        pool.close().await;
        Ok::<(), ConnectError>(())
    });

    match outcome {
        Ok(()) => CommandResult::success(
            COMMAND,
            format!("applied pending migrations to `{}`", config.database.url),
        ),
        Err(error @ ConnectError::Exhausted { .. }) => {
            CommandResult::failure(COMMAND, "db_connectivity", error.to_string(), 4)
        }
        Err(error @ ConnectError::Migration { .. }) => {
            CommandResult::failure(COMMAND, "migration", error.to_string(), 5)
        }
    }
}

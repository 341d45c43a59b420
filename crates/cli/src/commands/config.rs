use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use gradedesk_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

struct ConfigField {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> ConfigField {
    ConfigField { key, env_keys, value }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let super_admin = config
        .access
        .super_admin
        .map(|identity| identity.to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        field("database.url", &["GRADEDESK_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["GRADEDESK_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["GRADEDESK_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "database.connect_attempts",
            &["GRADEDESK_DATABASE_CONNECT_ATTEMPTS"],
            config.database.connect_attempts.to_string(),
        ),
        field(
            "database.retry_delay_ms",
            &["GRADEDESK_DATABASE_RETRY_DELAY_MS"],
            config.database.retry_delay_ms.to_string(),
        ),
        field("access.super_admin", &["GRADEDESK_ACCESS_SUPER_ADMIN"], super_admin),
        field(
            "sessions.idle_ttl_secs",
            &["GRADEDESK_SESSIONS_IDLE_TTL_SECS"],
            config.sessions.idle_ttl_secs.to_string(),
        ),
        field(
            "sessions.sweep_interval_secs",
            &["GRADEDESK_SESSIONS_SWEEP_INTERVAL_SECS"],
            config.sessions.sweep_interval_secs.to_string(),
        ),
        field(
            "roster.page_size",
            &["GRADEDESK_ROSTER_PAGE_SIZE"],
            config.roster.page_size.to_string(),
        ),
        field(
            "transport.mode",
            &["GRADEDESK_TRANSPORT_MODE"],
            format!("{:?}", config.transport.mode),
        ),
        field(
            "transport.reconnect_attempts",
            &["GRADEDESK_TRANSPORT_RECONNECT_ATTEMPTS"],
            config.transport.reconnect_attempts.to_string(),
        ),
        field(
            "server.bind_address",
            &["GRADEDESK_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field(
            "server.health_check_port",
            &["GRADEDESK_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        field(
            "logging.level",
            &["GRADEDESK_LOGGING_LEVEL", "GRADEDESK_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["GRADEDESK_LOGGING_FORMAT", "GRADEDESK_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &ConfigField, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

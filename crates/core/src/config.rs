use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::identity::Identity;

pub const DEFAULT_CONFIG_FILE: &str = "gradedesk.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub access: AccessConfig,
    pub sessions: SessionConfig,
    pub roster: RosterConfig,
    pub transport: TransportConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct AccessConfig {
    pub super_admin: Option<Identity>,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Zero disables idle eviction.
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RosterConfig {
    /// Zero lists the whole roster in one reply.
    pub page_size: u32,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub reconnect_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Noop,
    Console,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub super_admin: Option<Identity>,
    pub transport_mode: Option<TransportMode>,
    pub roster_page_size: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://gradedesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                connect_attempts: 5,
                retry_delay_ms: 500,
            },
            access: AccessConfig { super_admin: None },
            sessions: SessionConfig { idle_ttl_secs: 0, sweep_interval_secs: 60 },
            roster: RosterConfig { page_size: 20 },
            transport: TransportConfig { mode: TransportMode::Noop, reconnect_attempts: 5 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            "console" => Ok(Self::Console),
            other => Err(ConfigError::Validation(format!(
                "unsupported transport mode `{other}` (expected noop|console)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Validated super-admin identity. `validate` guarantees it is set.
    pub fn super_admin(&self) -> Result<Identity, ConfigError> {
        self.access
            .super_admin
            .ok_or_else(|| ConfigError::Validation("access.super_admin is required".to_string()))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            merge(&mut self.database.url, database.url);
            merge(&mut self.database.max_connections, database.max_connections);
            merge(&mut self.database.timeout_secs, database.timeout_secs);
            merge(&mut self.database.connect_attempts, database.connect_attempts);
            merge(&mut self.database.retry_delay_ms, database.retry_delay_ms);
        }
        if let Some(access) = patch.access {
            if access.super_admin.is_some() {
                self.access.super_admin = access.super_admin.map(Identity);
            }
        }
        if let Some(sessions) = patch.sessions {
            merge(&mut self.sessions.idle_ttl_secs, sessions.idle_ttl_secs);
            merge(&mut self.sessions.sweep_interval_secs, sessions.sweep_interval_secs);
        }
        if let Some(roster) = patch.roster {
            merge(&mut self.roster.page_size, roster.page_size);
        }
        if let Some(transport) = patch.transport {
            merge(&mut self.transport.mode, transport.mode);
            merge(&mut self.transport.reconnect_attempts, transport.reconnect_attempts);
        }
        if let Some(server) = patch.server {
            merge(&mut self.server.bind_address, server.bind_address);
            merge(&mut self.server.health_check_port, server.health_check_port);
        }
        if let Some(logging) = patch.logging {
            merge(&mut self.logging.level, logging.level);
            merge(&mut self.logging.format, logging.format);
        }
    }

    /// `GRADEDESK_<SECTION>_<FIELD>` for every field; logging also accepts
    /// the shorter `GRADEDESK_LOG_LEVEL` / `GRADEDESK_LOG_FORMAT`.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_override(&mut self.database.url, &["GRADEDESK_DATABASE_URL"])?;
        env_override(&mut self.database.max_connections, &["GRADEDESK_DATABASE_MAX_CONNECTIONS"])?;
        env_override(&mut self.database.timeout_secs, &["GRADEDESK_DATABASE_TIMEOUT_SECS"])?;
        env_override(
            &mut self.database.connect_attempts,
            &["GRADEDESK_DATABASE_CONNECT_ATTEMPTS"],
        )?;
        env_override(&mut self.database.retry_delay_ms, &["GRADEDESK_DATABASE_RETRY_DELAY_MS"])?;

        let mut super_admin = None::<i64>;
        env_override_opt(&mut super_admin, "GRADEDESK_ACCESS_SUPER_ADMIN")?;
        if super_admin.is_some() {
            self.access.super_admin = super_admin.map(Identity);
        }

        env_override(&mut self.sessions.idle_ttl_secs, &["GRADEDESK_SESSIONS_IDLE_TTL_SECS"])?;
        env_override(
            &mut self.sessions.sweep_interval_secs,
            &["GRADEDESK_SESSIONS_SWEEP_INTERVAL_SECS"],
        )?;
        env_override(&mut self.roster.page_size, &["GRADEDESK_ROSTER_PAGE_SIZE"])?;
        env_override(&mut self.transport.mode, &["GRADEDESK_TRANSPORT_MODE"])?;
        env_override(
            &mut self.transport.reconnect_attempts,
            &["GRADEDESK_TRANSPORT_RECONNECT_ATTEMPTS"],
        )?;
        env_override(&mut self.server.bind_address, &["GRADEDESK_SERVER_BIND_ADDRESS"])?;
        env_override(&mut self.server.health_check_port, &["GRADEDESK_SERVER_HEALTH_CHECK_PORT"])?;
        env_override(&mut self.logging.level, &["GRADEDESK_LOGGING_LEVEL", "GRADEDESK_LOG_LEVEL"])?;
        env_override(
            &mut self.logging.format,
            &["GRADEDESK_LOGGING_FORMAT", "GRADEDESK_LOG_FORMAT"],
        )?;

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(super_admin) = overrides.super_admin {
            self.access.super_admin = Some(super_admin);
        }
        if let Some(transport_mode) = overrides.transport_mode {
            self.transport.mode = transport_mode;
        }
        if let Some(page_size) = overrides.roster_page_size {
            self.roster.page_size = page_size;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        require(
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        )?;
        require(self.database.max_connections > 0, "database.max_connections must be positive")?;
        require(
            (1..=300).contains(&self.database.timeout_secs),
            "database.timeout_secs must be in range 1..=300",
        )?;
        require(self.database.connect_attempts > 0, "database.connect_attempts must be positive")?;

        require(
            self.access.super_admin.is_some(),
            "access.super_admin is required. Set it to the chat user id of the operator \
             (GRADEDESK_ACCESS_SUPER_ADMIN or [access] super_admin)",
        )?;

        require(
            self.sessions.idle_ttl_secs == 0 || self.sessions.sweep_interval_secs > 0,
            "sessions.sweep_interval_secs must be positive when idle_ttl_secs is set",
        )?;
        require(
            crate::sessions::ttl_from_secs(self.sessions.idle_ttl_secs).is_some(),
            "sessions.idle_ttl_secs is too large",
        )?;
        require(
            self.transport.reconnect_attempts > 0,
            "transport.reconnect_attempts must be positive",
        )?;
        require(self.server.health_check_port > 0, "server.health_check_port must be positive")?;
        require(
            matches!(
                self.logging.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
            .into_iter()
            .find(|candidate| candidate.exists()),
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let expanded = expand_env_refs(&raw)?;
    toml::from_str(&expanded)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of the environment variable NAME.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &after[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// First non-empty variable among `keys` wins.
fn env_override<T: FromStr>(target: &mut T, keys: &[&str]) -> Result<(), ConfigError> {
    let Some((key, raw)) = keys.iter().find_map(|key| read_env(key).map(|raw| (*key, raw))) else {
        return Ok(());
    };
    *target = raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: raw.clone(),
    })?;
    Ok(())
}

fn env_override_opt<T: FromStr>(target: &mut Option<T>, key: &str) -> Result<(), ConfigError> {
    let Some(raw) = read_env(key) else {
        return Ok(());
    };
    let parsed = raw
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: raw.clone() })?;
    *target = Some(parsed);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    access: Option<AccessPatch>,
    sessions: Option<SessionsPatch>,
    roster: Option<RosterPatch>,
    transport: Option<TransportPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    connect_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessPatch {
    super_admin: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    idle_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RosterPatch {
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TransportPatch {
    mode: Option<TransportMode>,
    reconnect_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

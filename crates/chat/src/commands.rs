use thiserror::Error;

use gradedesk_core::domain::identity::Identity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Help,
    Register,
    MyGrades,
    Admin,
    AddAdmin(Identity),
    RemoveAdmin(Identity),
    Admins,
    Cancel,
}

impl ChatCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Register => "register",
            Self::MyGrades => "mygrades",
            Self::Admin => "admin",
            Self::AddAdmin(_) => "addadmin",
            Self::RemoveAdmin(_) => "removeadmin",
            Self::Admins => "admins",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("`/{command}` needs a numeric identity argument")]
    MissingArgument { command: &'static str },
    #[error("`/{command}` argument `{value}` is not a numeric identity")]
    InvalidArgument { command: &'static str, value: String },
    #[error("unsupported command `/{0}`")]
    Unsupported(String),
}

impl CommandParseError {
    pub fn usage(&self) -> Option<String> {
        match self {
            Self::MissingArgument { command } | Self::InvalidArgument { command, .. } => {
                Some(format!("Usage: /{command} <numeric id>"))
            }
            Self::Unsupported(_) => None,
        }
    }
}

/// Returns `None` for plain text. Text starting with `/` is always treated as
/// a command, so dialogue input can never begin with a slash.
pub fn parse_command(text: &str) -> Option<Result<ChatCommand, CommandParseError>> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('/')?;

    let mut parts = body.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let verb = head.split_once('@').map_or(head, |(verb, _bot)| verb).to_ascii_lowercase();
    let argument = parts.next();

    let command = match verb.as_str() {
        "start" => ChatCommand::Start,
        "help" => ChatCommand::Help,
        "register" => ChatCommand::Register,
        "mygrades" => ChatCommand::MyGrades,
        "admin" => ChatCommand::Admin,
        "admins" => ChatCommand::Admins,
        "cancel" => ChatCommand::Cancel,
        "addadmin" => match identity_argument("addadmin", argument) {
            Ok(target) => ChatCommand::AddAdmin(target),
            Err(error) => return Some(Err(error)),
        },
        "removeadmin" => match identity_argument("removeadmin", argument) {
            Ok(target) => ChatCommand::RemoveAdmin(target),
            Err(error) => return Some(Err(error)),
        },
        _ => return Some(Err(CommandParseError::Unsupported(verb))),
    };

    Some(Ok(command))
}

fn identity_argument(
    command: &'static str,
    argument: Option<&str>,
) -> Result<Identity, CommandParseError> {
    let value = argument.ok_or(CommandParseError::MissingArgument { command })?;
    value
        .parse::<Identity>()
        .map_err(|_| CommandParseError::InvalidArgument { command, value: value.to_owned() })
}

#[cfg(test)]
mod tests {
    use gradedesk_core::domain::identity::Identity;

    use super::{parse_command, ChatCommand, CommandParseError};

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("Ali"), None);
        assert_eq!(parse_command("40123456 18"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn parses_commands_ignoring_bot_suffix_and_case() {
        assert_eq!(parse_command("/start"), Some(Ok(ChatCommand::Start)));
        assert_eq!(parse_command(" /Register@gradedesk_bot "), Some(Ok(ChatCommand::Register)));
        assert_eq!(parse_command("/mygrades@bot"), Some(Ok(ChatCommand::MyGrades)));
        assert_eq!(parse_command("/cancel"), Some(Ok(ChatCommand::Cancel)));
    }

    #[test]
    fn admin_commands_take_numeric_identity() {
        assert_eq!(
            parse_command("/addadmin 42"),
            Some(Ok(ChatCommand::AddAdmin(Identity(42))))
        );
        assert_eq!(
            parse_command("/removeadmin@bot -7"),
            Some(Ok(ChatCommand::RemoveAdmin(Identity(-7))))
        );
    }

    #[test]
    fn missing_or_malformed_argument_yields_usage_hint() {
        let missing = parse_command("/addadmin").expect("command").expect_err("missing");
        assert_eq!(missing, CommandParseError::MissingArgument { command: "addadmin" });
        assert_eq!(missing.usage().as_deref(), Some("Usage: /addadmin <numeric id>"));

        let malformed = parse_command("/removeadmin bob").expect("command").expect_err("bad");
        assert_eq!(
            malformed,
            CommandParseError::InvalidArgument { command: "removeadmin", value: "bob".to_owned() }
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            parse_command("/export csv"),
            Some(Err(CommandParseError::Unsupported("export".to_owned())))
        );
    }
}

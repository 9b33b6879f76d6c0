/// Slash commands accepted by the bot. Anything else that starts with `/`
/// lands in `Unknown` and gets a pointer back to `/start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Add,
    Find,
    Map,
    Cleanup,
    Unknown(String),
}

/// Parse a leading slash command out of a text message. Returns `None` when
/// the text is not a command at all. The `@botname` suffix some clients
/// append is stripped before matching.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;
    let token = rest.split_whitespace().next().unwrap_or_default();
    let name = token.split('@').next().unwrap_or_default().to_ascii_lowercase();

    Some(match name.as_str() {
        "start" => BotCommand::Start,
        "add" => BotCommand::Add,
        "find" => BotCommand::Find,
        "map" => BotCommand::Map,
        "cleanup" => BotCommand::Cleanup,
        _ => BotCommand::Unknown(name),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_command, BotCommand};

    #[test]
    fn recognizes_every_known_command() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command("/add"), Some(BotCommand::Add));
        assert_eq!(parse_command("/find"), Some(BotCommand::Find));
        assert_eq!(parse_command("/map"), Some(BotCommand::Map));
        assert_eq!(parse_command("/cleanup"), Some(BotCommand::Cleanup));
    }

    #[test]
    fn strips_bot_mention_suffix_and_case() {
        assert_eq!(parse_command("/ADD@homestash_bot"), Some(BotCommand::Add));
    }

    #[test]
    fn non_commands_pass_through() {
        assert_eq!(parse_command("паспорт"), None);
        assert_eq!(parse_command("  Спальня  "), None);
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(parse_command("/help"), Some(BotCommand::Unknown("help".to_owned())));
    }
}

use twilight_model::id::{
    Id,
    marker::{ChannelMarker, RoleMarker, UserMarker},
};

/// Whitespace-separated arguments that can hand back the unread tail at any
/// point, so commands can take a free-text remainder after fixed arguments.
#[derive(Debug, Clone)]
pub struct Arguments<'a> {
    rest: &'a str,
}

impl<'a> Arguments<'a> {
    pub fn new(args_str: &'a str) -> Self {
        Arguments { rest: args_str }
    }

    pub fn remainder(&self) -> &'a str {
        self.rest.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.remainder().is_empty()
    }
}

impl<'a> Iterator for Arguments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            self.rest = "";
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (arg, tail) = trimmed.split_at(end);
        self.rest = tail;
        Some(arg)
    }
}

#[derive(Debug, PartialEq)]
pub struct ParsedCommand<'a> {
    pub command: &'a str,
    args_part: &'a str,
}

impl<'a> ParsedCommand<'a> {
    pub fn arguments(&self) -> Arguments<'a> {
        Arguments::new(self.args_part)
    }
}

pub fn parse<'a>(message: &'a str, prefix: &str) -> Option<ParsedCommand<'a>> {
    let trimmed_content = message.strip_prefix(prefix)?.trim_start();

    let mut parts = trimmed_content.splitn(2, char::is_whitespace);
    let command = parts.next().filter(|c| !c.is_empty())?;
    let args_part = parts.next().unwrap_or("").trim_end();

    Some(ParsedCommand { command, args_part })
}

fn parse_mention(token: &str, sigils: &[&str]) -> Option<u64> {
    let token = token.trim();
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    let digits = sigils.iter().find_map(|sigil| inner.strip_prefix(sigil))?;
    digits.parse().ok()
}

/// Accepts `<@id>`, `<@!id>` or a bare id.
pub fn parse_user_mention(token: &str) -> Option<Id<UserMarker>> {
    parse_mention(token, &["@!", "@"])
        .or_else(|| token.trim().parse().ok())
        .and_then(Id::new_checked)
}

pub fn parse_channel_mention(token: &str) -> Option<Id<ChannelMarker>> {
    parse_mention(token, &["#"])
        .or_else(|| token.trim().parse().ok())
        .and_then(Id::new_checked)
}

pub fn parse_role_mention(token: &str) -> Option<Id<RoleMarker>> {
    parse_mention(token, &["@&"])
        .or_else(|| token.trim().parse().ok())
        .and_then(Id::new_checked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let result = parse(";remind me in 10m to stretch", ";").unwrap();
        assert_eq!(result.command, "remind");

        let mut args = result.arguments();
        assert_eq!(args.next(), Some("me"));
        assert_eq!(args.remainder(), "in 10m to stretch");
        assert_eq!(args.next(), Some("in"));
        assert_eq!(args.next(), Some("10m"));
        assert_eq!(args.remainder(), "to stretch");
    }

    #[test]
    fn test_parse_command_with_extra_spaces() {
        let result = parse(";play  song  title with spaces  ", ";").unwrap();
        assert_eq!(result.command, "play");

        let mut args = result.arguments();
        assert_eq!(args.next(), Some("song"));
        assert_eq!(args.remainder(), "title with spaces");
        assert_eq!(args.next(), Some("title"));
        assert_eq!(args.next(), Some("with"));
        assert_eq!(args.next(), Some("spaces"));
        assert_eq!(args.remainder(), "");
        assert_eq!(args.next(), None);
    }

    #[test]
    fn test_prefix_followed_by_spaces() {
        let result = parse(";  ticket panel", ";").unwrap();
        assert_eq!(result.command, "ticket");
        assert_eq!(result.arguments().remainder(), "panel");
    }

    #[test]
    fn test_no_args() {
        let result = parse(";skip  ", ";").unwrap();
        assert_eq!(result.command, "skip");
        let mut args = result.arguments();
        assert!(args.is_empty());
        assert_eq!(args.next(), None);
    }

    #[test]
    fn test_rejects_non_commands() {
        assert!(parse("skip", ";").is_none());
        assert!(parse("!skip", ";").is_none());
        assert!(parse(";", ";").is_none());
        assert!(parse(";   ", ";").is_none());
        assert!(parse("", ";").is_none());
    }

    #[test]
    fn test_arguments_are_restartable() {
        let parsed = parse(";cmd a b c", ";").unwrap();
        let mut first = parsed.arguments();
        first.next();
        first.next();
        let second = parsed.arguments();
        assert_eq!(second.remainder(), "a b c");
        assert_eq!(first.remainder(), "c");
    }

    #[test]
    fn test_mentions() {
        assert_eq!(parse_user_mention("<@42>"), Some(Id::new(42)));
        assert_eq!(parse_user_mention("<@!42>"), Some(Id::new(42)));
        assert_eq!(parse_user_mention("42"), Some(Id::new(42)));
        assert_eq!(parse_user_mention("<#42>"), None);
        assert_eq!(parse_user_mention("0"), None);
        assert_eq!(parse_channel_mention("<#7>"), Some(Id::new(7)));
        assert_eq!(parse_role_mention("<@&9>"), Some(Id::new(9)));
        assert_eq!(parse_role_mention("<@9>"), None);
    }
}

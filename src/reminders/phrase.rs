use twilight_model::id::{
    Id,
    marker::{ChannelMarker, UserMarker},
};

use crate::prefix_parser::{parse_channel_mention, parse_user_mention};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseTarget {
    Me,
    User(Id<UserMarker>),
    Channel(Id<ChannelMarker>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPhrase {
    pub target: PhraseTarget,
    pub when: String,
    pub task: String,
}

const TASK_SEPARATORS: &[&str] = &[" to ", " about ", " that "];

/// Splits `me in 10m to stretch` into target, time text and task.
pub fn parse_reminder_phrase(input: &str) -> Option<ReminderPhrase> {
    let input = input.trim();
    let (target_word, rest) = input.split_once(char::is_whitespace)?;

    let target = if target_word.eq_ignore_ascii_case("me") {
        PhraseTarget::Me
    } else if let Some(user) = parse_user_mention(target_word) {
        PhraseTarget::User(user)
    } else if let Some(channel) = parse_channel_mention(target_word) {
        PhraseTarget::Channel(channel)
    } else {
        return None;
    };

    let rest = rest.trim();
    let lowered = rest.to_ascii_lowercase();
    let (split_at, separator_len) = TASK_SEPARATORS
        .iter()
        .filter_map(|sep| lowered.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|(idx, _)| *idx)?;

    let when = rest[..split_at].trim();
    let when = ["at ", "on "]
        .iter()
        .find_map(|prefix| {
            when.get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| when[prefix.len()..].trim_start())
        })
        .unwrap_or(when);
    let task = rest[split_at + separator_len..].trim();

    if when.is_empty() || task.is_empty() {
        return None;
    }

    Some(ReminderPhrase {
        target,
        when: when.to_string(),
        task: task.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_me_relative() {
        let phrase = parse_reminder_phrase("me in 10m to do X").unwrap();
        assert_eq!(phrase.target, PhraseTarget::Me);
        assert_eq!(phrase.when, "in 10m");
        assert_eq!(phrase.task, "do X");
    }

    #[test]
    fn test_user_absolute_with_at() {
        let phrase =
            parse_reminder_phrase("<@!1234> at 2025-01-31 18:00 about the standup").unwrap();
        assert_eq!(phrase.target, PhraseTarget::User(Id::new(1234)));
        assert_eq!(phrase.when, "2025-01-31 18:00");
        assert_eq!(phrase.task, "the standup");
    }

    #[test]
    fn test_channel_target_keeps_later_separators_in_task() {
        let phrase = parse_reminder_phrase("<#99> in 2h 30m to remind people to vote").unwrap();
        assert_eq!(phrase.target, PhraseTarget::Channel(Id::new(99)));
        assert_eq!(phrase.when, "in 2h 30m");
        assert_eq!(phrase.task, "remind people to vote");
    }

    #[test]
    fn test_rejects_incomplete_phrases() {
        assert!(parse_reminder_phrase("me in 10m").is_none());
        assert!(parse_reminder_phrase("someone in 10m to x").is_none());
        assert!(parse_reminder_phrase("me to x").is_none());
        assert!(parse_reminder_phrase("").is_none());
    }
}

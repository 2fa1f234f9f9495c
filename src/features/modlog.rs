use chrono::{DateTime, Utc};
use twilight_model::{
    channel::{Message, message::Embed},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker},
    },
    user::User,
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use crate::gateway::snapshot::CachedContent;
use crate::state::State;
use crate::store::load_guild;
use crate::utils::discord::{timestamp, truncate};

pub const DELETE_COLOR: u32 = 0xed4245;
pub const EDIT_COLOR: u32 = 0xfee75c;
pub const JOIN_COLOR: u32 = 0x57f287;
pub const LEAVE_COLOR: u32 = 0x99aab5;
pub const BAN_COLOR: u32 = 0x992d22;

const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;
const FIELD_LIMIT: usize = 1024;

fn user_created_at(user_id: Id<UserMarker>) -> Option<DateTime<Utc>> {
    let millis = (user_id.get() >> 22) + DISCORD_EPOCH_MS;
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

fn display_name(user: &User) -> &str {
    user.global_name.as_deref().unwrap_or(&user.name)
}

fn finish(embed: EmbedBuilder, now: DateTime<Utc>) -> Embed {
    match timestamp(now) {
        Some(at) => embed.timestamp(at).build(),
        None => embed.build(),
    }
}

fn quoted(content: &str) -> String {
    if content.is_empty() {
        "*(no text)*".to_string()
    } else {
        truncate(content, FIELD_LIMIT)
    }
}

pub fn message_deleted(
    channel_id: Id<ChannelMarker>,
    message_id: Id<MessageMarker>,
    cached: Option<&CachedContent>,
    now: DateTime<Utc>,
) -> Embed {
    let mut embed = EmbedBuilder::new()
        .title("Message deleted")
        .color(DELETE_COLOR)
        .field(EmbedFieldBuilder::new("Channel", format!("<#{channel_id}>")).inline())
        .footer(EmbedFooterBuilder::new(format!("Message {message_id}")));
    embed = match cached {
        Some(cached) => embed
            .field(EmbedFieldBuilder::new("Author", format!("<@{}>", cached.author_id)).inline())
            .field(EmbedFieldBuilder::new("Content", quoted(&cached.content))),
        None => embed.description("The message wasn't cached, so its content is unknown."),
    };
    finish(embed, now)
}

/// `None` when the text didn't change (embed unfurls also arrive as edits).
pub fn message_edited(
    message: &Message,
    before: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Embed> {
    if before == Some(message.content.as_str()) {
        return None;
    }
    let jump = message.guild_id.map(|guild_id| {
        format!(
            "[Jump to message](https://discord.com/channels/{guild_id}/{}/{})",
            message.channel_id, message.id
        )
    });
    let mut embed = EmbedBuilder::new()
        .title("Message edited")
        .color(EDIT_COLOR)
        .field(EmbedFieldBuilder::new("Author", format!("<@{}>", message.author.id)).inline())
        .field(EmbedFieldBuilder::new("Channel", format!("<#{}>", message.channel_id)).inline())
        .field(EmbedFieldBuilder::new(
            "Before",
            before.map_or_else(|| "*(not cached)*".to_string(), quoted),
        ))
        .field(EmbedFieldBuilder::new("After", quoted(&message.content)));
    if let Some(jump) = jump {
        embed = embed.description(jump);
    }
    Some(finish(embed, now))
}

pub fn member_joined(user: &User, now: DateTime<Utc>) -> Embed {
    let mut embed = EmbedBuilder::new()
        .title("Member joined")
        .color(JOIN_COLOR)
        .description(format!("<@{}> ({})", user.id, display_name(user)));
    if let Some(created) = user_created_at(user.id) {
        let age_days = (now - created).num_days();
        let mut age = format!("<t:{}:R>", created.timestamp());
        if age_days < 7 {
            age.push_str(" ⚠️ new account");
        }
        embed = embed.field(EmbedFieldBuilder::new("Account created", age).inline());
    }
    finish(embed.footer(EmbedFooterBuilder::new(format!("User {}", user.id))), now)
}

pub fn member_left(user: &User, now: DateTime<Utc>) -> Embed {
    let embed = EmbedBuilder::new()
        .title("Member left")
        .color(LEAVE_COLOR)
        .description(format!("<@{}> ({})", user.id, display_name(user)))
        .footer(EmbedFooterBuilder::new(format!("User {}", user.id)));
    finish(embed, now)
}

pub fn member_banned(user: &User, now: DateTime<Utc>) -> Embed {
    let embed = EmbedBuilder::new()
        .title("Member banned")
        .color(BAN_COLOR)
        .description(format!("<@{}> ({})", user.id, display_name(user)))
        .footer(EmbedFooterBuilder::new(format!("User {}", user.id)));
    finish(embed, now)
}

/// Posts `embed` to the guild's mod-log channel, if one is set.
pub async fn post(state: &State, guild_id: Id<GuildMarker>, embed: Embed) -> anyhow::Result<()> {
    let Some(channel_id) = load_guild(&*state.store, guild_id).await?.modlog_channel_id else {
        return Ok(());
    };
    if let Err(e) = state.http.create_message(channel_id).embeds(&[embed]).await {
        tracing::warn!(error = ?e, %guild_id, %channel_id, "Failed to write mod log");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilight_model::user::User;

    fn user(id: u64) -> User {
        serde_json::from_value(serde_json::json!({
            "id": id.to_string(),
            "username": "alice",
            "discriminator": "0",
            "avatar": null,
            "global_name": "Alice",
        }))
        .unwrap()
    }

    #[test]
    fn test_created_at_from_snowflake() {
        let created = user_created_at(Id::new(175928847299117063)).unwrap();
        assert_eq!(created.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_deleted_with_and_without_cache() {
        let now = Utc::now();
        let cached = CachedContent {
            author_id: Id::new(7),
            content: "secret".to_string(),
        };
        let embed = message_deleted(Id::new(1), Id::new(2), Some(&cached), now);
        assert_eq!(embed.fields[2].value, "secret");

        let embed = message_deleted(Id::new(1), Id::new(2), None, now);
        assert_eq!(embed.fields.len(), 1);
        assert!(embed.description.is_some());
    }

    #[test]
    fn test_join_flags_new_accounts() {
        let alice = user(175928847299117063);
        let created = user_created_at(alice.id).unwrap();
        let embed = member_joined(&alice, created + chrono::Duration::days(1));
        assert!(embed.fields[0].value.contains("new account"));
        let embed = member_joined(&alice, created + chrono::Duration::days(30));
        assert!(!embed.fields[0].value.contains("new account"));
        assert!(embed.description.unwrap().contains("Alice"));
    }
}

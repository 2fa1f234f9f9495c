use once_cell::sync::Lazy;
use regex::Regex;
use twilight_model::{
    channel::{Message, message::Embed},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, MessageMarker},
    },
};
use twilight_util::builder::embed::{
    EmbedAuthorBuilder, EmbedBuilder, EmbedFooterBuilder, ImageSource,
};

use crate::state::State;
use crate::store::load_guild;
use crate::utils::discord::truncate;

pub const QUOTE_COLOR: u32 = 0x4f545c;
const MAX_LINKS_PER_MESSAGE: usize = 3;

static MESSAGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/channels/(\d+)/(\d+)/(\d+)")
        .expect("message link pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLink {
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
}

/// Message links in `content`, at most three, without repeats.
pub fn find_links(content: &str) -> Vec<MessageLink> {
    let mut links: Vec<MessageLink> = Vec::new();
    for captures in MESSAGE_LINK.captures_iter(content) {
        let id = |i: usize| captures.get(i)?.as_str().parse::<u64>().ok();
        let (Some(guild), Some(channel), Some(message)) = (id(1), id(2), id(3)) else {
            continue;
        };
        let (Some(guild_id), Some(channel_id), Some(message_id)) =
            (Id::new_checked(guild), Id::new_checked(channel), Id::new_checked(message))
        else {
            continue;
        };
        let link = MessageLink {
            guild_id,
            channel_id,
            message_id,
        };
        if !links.contains(&link) {
            links.push(link);
        }
        if links.len() == MAX_LINKS_PER_MESSAGE {
            break;
        }
    }
    links
}

pub fn quote_embed(linked: &Message, link: &MessageLink) -> Embed {
    let author = &linked.author;
    let mut author_builder = EmbedAuthorBuilder::new(
        author
            .global_name
            .clone()
            .unwrap_or_else(|| author.name.clone()),
    );
    if let Some(icon) = author
        .avatar
        .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{hash}.png", author.id))
        .and_then(|url| ImageSource::url(url).ok())
    {
        author_builder = author_builder.icon_url(icon);
    }

    let mut description = truncate(&linked.content, 3800);
    if description.is_empty() && !linked.embeds.is_empty() {
        description = "*(embed)*".to_string();
    }
    description.push_str(&format!(
        "\n\n[Jump to message](https://discord.com/channels/{}/{}/{})",
        link.guild_id, link.channel_id, link.message_id
    ));

    let mut embed = EmbedBuilder::new()
        .author(author_builder)
        .description(description)
        .color(QUOTE_COLOR)
        .footer(EmbedFooterBuilder::new(format!("in #{}", link.channel_id)))
        .timestamp(linked.timestamp);
    if let Some(image) = linked
        .attachments
        .iter()
        .find(|a| a.content_type.as_deref().is_some_and(|t| t.starts_with("image/")))
        .and_then(|a| ImageSource::url(a.url.clone()).ok())
    {
        embed = embed.image(image);
    }
    embed.build()
}

/// Replies to `message` with quotes of the same-guild messages it links.
pub async fn handle_message(state: &State, message: &Message) -> anyhow::Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    let links: Vec<MessageLink> = find_links(&message.content)
        .into_iter()
        .filter(|link| link.guild_id == guild_id)
        .collect();
    if links.is_empty() {
        return Ok(());
    }
    if !load_guild(&*state.store, guild_id).await?.message_link_embeds {
        return Ok(());
    }

    let mut embeds = Vec::with_capacity(links.len());
    for link in &links {
        match state.http.message(link.channel_id, link.message_id).await {
            Ok(response) => embeds.push(quote_embed(&response.model().await?, link)),
            Err(e) => tracing::debug!(
                error = ?e,
                message_id = %link.message_id,
                "Linked message unavailable"
            ),
        }
    }
    if embeds.is_empty() {
        return Ok(());
    }
    state
        .http
        .create_message(message.channel_id)
        .embeds(&embeds)
        .reply(message.id)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_links() {
        let content = "see https://discord.com/channels/1/2/3 and \
            https://ptb.discordapp.com/channels/1/2/4 plus \
            https://discord.com/channels/1/2/3 again";
        let links = find_links(content);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].message_id, Id::new(4));
    }

    #[test]
    fn test_ignores_non_links() {
        assert!(find_links("https://discord.com/channels/1/2").is_empty());
        assert!(find_links("https://example.com/channels/1/2/3").is_empty());
        assert!(find_links("https://discord.com/channels/0/2/3").is_empty());
    }

    #[test]
    fn test_caps_link_count() {
        let content = (1..=5)
            .map(|i| format!("https://discord.com/channels/1/2/{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(find_links(&content).len(), MAX_LINKS_PER_MESSAGE);
    }
}

use chrono::Utc;
use twilight_model::{
    channel::message::{Component, Embed, MessageFlags},
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    util::Timestamp,
};
use twilight_util::builder::embed::EmbedBuilder;

pub const ERROR_COLOR: u32 = 0xdd7878;
pub const SUCCESS_COLOR: u32 = 0x1db954;

#[derive(Default, Clone, Debug)]
pub struct CommandResponse {
    pub embeds: Vec<Embed>,
    pub content: String,
    pub components: Vec<Component>,
    pub ephemeral: bool,
}

impl CommandResponse {
    pub fn flags(&self) -> Option<MessageFlags> {
        self.ephemeral.then_some(MessageFlags::EPHEMERAL)
    }

    pub fn into_data(self) -> InteractionResponseData {
        let flags = self.flags();
        InteractionResponseData {
            content: (!self.content.is_empty()).then_some(self.content),
            embeds: (!self.embeds.is_empty()).then_some(self.embeds),
            components: (!self.components.is_empty()).then_some(self.components),
            flags,
            ..Default::default()
        }
    }

    /// Data for an `UpdateMessage` response; empty fields clear the message.
    pub fn into_update_data(self) -> InteractionResponseData {
        InteractionResponseData {
            content: Some(self.content),
            embeds: Some(self.embeds),
            components: Some(self.components),
            ..Default::default()
        }
    }
}

impl From<CommandResponse> for InteractionResponse {
    fn from(val: CommandResponse) -> Self {
        InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(val.into_data()),
        }
    }
}

#[derive(Default)]
pub struct CommandResponseBuilder {
    embeds: Vec<Embed>,
    content: String,
    components: Vec<Component>,
    ephemeral: bool,
}

impl CommandResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn components(mut self, components: impl IntoIterator<Item = Component>) -> Self {
        self.components.extend(components);
        self
    }

    /// Only the invoking user sees the reply. Ignored for prefix commands.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn build(self) -> CommandResponse {
        CommandResponse {
            embeds: self.embeds,
            content: self.content,
            components: self.components,
            ephemeral: self.ephemeral,
        }
    }
}

/// Short ephemeral text reply.
pub fn notice(content: impl Into<String>) -> CommandResponse {
    CommandResponseBuilder::new().content(content).ephemeral().build()
}

pub fn create_error_response(error: &anyhow::Error) -> CommandResponse {
    let mut embed = EmbedBuilder::new()
        .title("Something went wrong")
        .description(format!("{error}"))
        .color(ERROR_COLOR);

    match Timestamp::from_micros(Utc::now().timestamp_micros()) {
        Ok(timestamp) => embed = embed.timestamp(timestamp),
        Err(e) => tracing::warn!(error = ?e, "Failed to build timestamp for error embed"),
    }

    CommandResponseBuilder::new()
        .embed(embed.build())
        .ephemeral()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_data_skips_empty_fields() {
        let data = CommandResponseBuilder::new().content("hi").build().into_data();
        assert_eq!(data.content.as_deref(), Some("hi"));
        assert!(data.embeds.is_none());
        assert!(data.components.is_none());
        assert!(data.flags.is_none());
    }

    #[test]
    fn test_error_response_is_ephemeral() {
        let response = create_error_response(&anyhow::anyhow!("boom"));
        assert!(response.ephemeral);
        assert_eq!(response.flags(), Some(MessageFlags::EPHEMERAL));
        assert_eq!(response.embeds[0].description.as_deref(), Some("boom"));
    }
}

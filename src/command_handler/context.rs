use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail};
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::{Client as HttpClient, client::InteractionClient};
use twilight_model::{
    application::interaction::{
        Interaction,
        application_command::{CommandData, CommandDataOption, CommandOptionValue},
    },
    channel::{Message, message::MessageFlags},
    guild::Permissions,
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker},
    },
    user::User,
};

use crate::command_handler::response::CommandResponse;
use crate::prefix_parser::{
    Arguments, parse_channel_mention, parse_role_mention, parse_user_mention,
};
use crate::utils::discord::is_unknown_interaction;

/// A value that can come from either a slash option or a prefix token.
pub trait CommandArg: Sized {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self>;
    fn from_prefix_arg(arg: &str) -> Option<Self>;
}

impl CommandArg for String {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        if let CommandOptionValue::String(s) = value {
            Some(s.clone())
        } else {
            None
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        Some(arg.to_string())
    }
}

impl CommandArg for i64 {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        if let CommandOptionValue::Integer(i) = value {
            Some(*i)
        } else {
            None
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        arg.parse().ok()
    }
}

impl CommandArg for u64 {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        match value {
            CommandOptionValue::Integer(i) => (*i).try_into().ok(),
            CommandOptionValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        arg.parse().ok()
    }
}

impl CommandArg for bool {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        if let CommandOptionValue::Boolean(b) = value {
            Some(*b)
        } else {
            None
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        match arg.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Some(true),
            "false" | "no" | "off" | "disable" => Some(false),
            _ => None,
        }
    }
}

impl CommandArg for f64 {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        match value {
            CommandOptionValue::Number(n) => Some(*n),
            CommandOptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        arg.parse().ok()
    }
}

impl CommandArg for Id<UserMarker> {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        match value {
            CommandOptionValue::User(id) => Some(*id),
            CommandOptionValue::Mentionable(id) => Some(id.cast()),
            _ => None,
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        parse_user_mention(arg)
    }
}

impl CommandArg for Id<ChannelMarker> {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        if let CommandOptionValue::Channel(id) = value {
            Some(*id)
        } else {
            None
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        parse_channel_mention(arg)
    }
}

impl CommandArg for Id<RoleMarker> {
    fn from_option_value(value: &CommandOptionValue) -> Option<Self> {
        match value {
            CommandOptionValue::Role(id) => Some(*id),
            CommandOptionValue::Mentionable(id) => Some(id.cast()),
            _ => None,
        }
    }

    fn from_prefix_arg(arg: &str) -> Option<Self> {
        parse_role_mention(arg)
    }
}

fn option_as_string(value: &CommandOptionValue) -> Option<String> {
    match value {
        CommandOptionValue::String(s) => Some(s.clone()),
        CommandOptionValue::Integer(i) => Some(i.to_string()),
        CommandOptionValue::Boolean(b) => Some(b.to_string()),
        CommandOptionValue::Number(n) => Some(n.to_string()),
        CommandOptionValue::User(id) => Some(id.to_string()),
        CommandOptionValue::Channel(id) => Some(id.to_string()),
        CommandOptionValue::Role(id) => Some(id.to_string()),
        CommandOptionValue::Mentionable(id) => Some(id.to_string()),
        _ => None,
    }
}

fn nested_options(option: &CommandDataOption) -> Option<&[CommandDataOption]> {
    match &option.value {
        CommandOptionValue::SubCommand(options) | CommandOptionValue::SubCommandGroup(options) => {
            Some(options)
        }
        _ => None,
    }
}

/// Whether the interaction has been acknowledged yet. Shared between the
/// command's own context and the one used to report its error.
#[derive(Default, Debug)]
pub struct ResponseState {
    deferred: AtomicBool,
    replied: AtomicBool,
}

pub struct PrefixContext<'a> {
    pub message_id: Id<MessageMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub message: &'a Message,
    pub parsed: Arguments<'a>,
    pub prefix: String,
    pub http_client: Arc<HttpClient>,
}

impl<'a> PrefixContext<'a> {
    pub async fn reply(&self, response: CommandResponse) -> anyhow::Result<Message> {
        let mut create_message = self
            .http_client
            .create_message(self.channel_id)
            .reply(self.message_id);

        if !response.content.is_empty() {
            create_message = create_message.content(&response.content);
        }
        if !response.embeds.is_empty() {
            create_message = create_message.embeds(&response.embeds);
        }
        if !response.components.is_empty() {
            create_message = create_message.components(&response.components);
        }

        let response = create_message.await?;
        let message = response.model().await?;
        Ok(message)
    }
}

pub struct SlashContext {
    pub interaction: Interaction,
    pub data: CommandData,
    pub http_client: Arc<HttpClient>,
    pub response_state: Arc<ResponseState>,
    subcommand_depth: usize,
}

impl SlashContext {
    pub fn new(
        interaction: Interaction,
        data: CommandData,
        http_client: Arc<HttpClient>,
        response_state: Arc<ResponseState>,
    ) -> Self {
        Self {
            interaction,
            data,
            http_client,
            response_state,
            subcommand_depth: 0,
        }
    }

    fn client(&self) -> InteractionClient<'_> {
        self.http_client.interaction(self.interaction.application_id)
    }

    /// Options of the innermost invoked subcommand.
    fn leaf_options(&self) -> &[CommandDataOption] {
        let mut options: &[CommandDataOption] = &self.data.options;
        while let Some(nested) = options.first().and_then(nested_options) {
            options = nested;
        }
        options
    }

    fn subcommand(&mut self) -> Option<String> {
        let mut options: &[CommandDataOption] = &self.data.options;
        for _ in 0..self.subcommand_depth {
            options = options.first().and_then(nested_options)?;
        }
        let name = options
            .first()
            .filter(|o| nested_options(o).is_some())?
            .name
            .clone();
        self.subcommand_depth += 1;
        Some(name)
    }

    pub async fn defer(&self, ephemeral: bool) -> anyhow::Result<()> {
        if self.response_state.deferred.load(Ordering::Acquire)
            || self.response_state.replied.load(Ordering::Acquire)
        {
            return Ok(());
        }
        let data = InteractionResponseData {
            flags: ephemeral.then_some(MessageFlags::EPHEMERAL),
            ..Default::default()
        };
        self.client()
            .create_response(
                self.interaction.id,
                &self.interaction.token,
                &InteractionResponse {
                    kind: InteractionResponseType::DeferredChannelMessageWithSource,
                    data: Some(data),
                },
            )
            .await?;
        self.response_state.deferred.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn reply(&self, response: CommandResponse) -> anyhow::Result<Message> {
        let client = self.client();
        let token = &self.interaction.token;

        if self.response_state.replied.load(Ordering::Acquire) {
            let mut followup = client
                .create_followup(token)
                .content(&response.content)
                .embeds(&response.embeds)
                .components(&response.components);
            if let Some(flags) = response.flags() {
                followup = followup.flags(flags);
            }
            return Ok(followup.await?.model().await?);
        }

        if self.response_state.deferred.load(Ordering::Acquire) {
            let message = client
                .update_response(token)
                .content((!response.content.is_empty()).then_some(response.content.as_str()))
                .embeds(Some(response.embeds.as_slice()))
                .components(Some(response.components.as_slice()))
                .await?
                .model()
                .await?;
            self.response_state.replied.store(true, Ordering::Release);
            return Ok(message);
        }

        client
            .create_response(self.interaction.id, token, &response.into())
            .await?;
        self.response_state.replied.store(true, Ordering::Release);

        let message_response = client.response(token).await?;
        Ok(message_response.model().await?)
    }

    pub async fn show_modal(&self, modal: InteractionResponseData) -> anyhow::Result<()> {
        self.client()
            .create_response(
                self.interaction.id,
                &self.interaction.token,
                &InteractionResponse {
                    kind: InteractionResponseType::Modal,
                    data: Some(modal),
                },
            )
            .await?;
        self.response_state.replied.store(true, Ordering::Release);
        Ok(())
    }
}

pub enum CommandContext<'ctx> {
    Prefix(Box<PrefixContext<'ctx>>),
    Slash(Box<SlashContext>),
}

impl<'ctx> CommandContext<'ctx> {
    pub async fn reply(&self, response: CommandResponse) -> anyhow::Result<Message> {
        match self {
            CommandContext::Prefix(prefix_ctx) => prefix_ctx.reply(response).await,
            CommandContext::Slash(slash_ctx) => slash_ctx.reply(response).await,
        }
    }

    pub async fn reply_error(
        &self,
        error: &anyhow::Error,
        create_error_fn: impl Fn(&anyhow::Error) -> CommandResponse,
    ) -> anyhow::Result<()> {
        if is_unknown_interaction(error) {
            tracing::debug!("Interaction expired before the command finished");
            return Ok(());
        }
        tracing::warn!(error = ?error, "Command execution failed");
        let error_response = create_error_fn(error);
        if let Err(e) = self.reply(error_response).await {
            if is_unknown_interaction(&e) {
                tracing::debug!("Interaction expired before the error could be shown");
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }

    /// Acknowledges a slash command that needs more than three seconds.
    pub async fn defer(&self, ephemeral: bool) -> anyhow::Result<()> {
        match self {
            CommandContext::Prefix(_) => Ok(()),
            CommandContext::Slash(slash_ctx) => slash_ctx.defer(ephemeral).await,
        }
    }

    pub async fn show_modal(&self, modal: InteractionResponseData) -> anyhow::Result<()> {
        match self {
            CommandContext::Prefix(_) => {
                bail!("This command is only available as a slash command.")
            }
            CommandContext::Slash(slash_ctx) => slash_ctx.show_modal(modal).await,
        }
    }

    pub fn get_arg<T: CommandArg>(&mut self, name: &str) -> Option<T> {
        match self {
            CommandContext::Prefix(prefix_ctx) => prefix_ctx.parsed.next().and_then(|s| {
                let parsed = T::from_prefix_arg(s);
                if parsed.is_none() {
                    tracing::debug!(arg = s, name, "Failed to parse prefix argument");
                }
                parsed
            }),
            CommandContext::Slash(slash_ctx) => slash_ctx
                .leaf_options()
                .iter()
                .find(|opt| opt.name == name)
                .and_then(|opt| {
                    T::from_option_value(&opt.value).or_else(|| {
                        option_as_string(&opt.value).and_then(|s| T::from_prefix_arg(&s))
                    })
                }),
        }
    }

    pub fn require_arg<T: CommandArg>(&mut self, name: &str) -> anyhow::Result<T> {
        self.get_arg(name)
            .ok_or_else(|| anyhow!("Missing or invalid `{name}`."))
    }

    pub fn get_remainder_arg(&mut self, name: &str) -> Option<String> {
        match self {
            CommandContext::Prefix(prefix_ctx) => {
                let remainder = prefix_ctx.parsed.remainder().to_string();
                while prefix_ctx.parsed.next().is_some() {}
                if remainder.is_empty() {
                    None
                } else {
                    Some(remainder)
                }
            }
            CommandContext::Slash(_) => self.get_arg(name),
        }
    }

    /// Name of the next subcommand level. For prefix commands this is the
    /// next word.
    pub fn subcommand(&mut self) -> Option<String> {
        match self {
            CommandContext::Prefix(prefix_ctx) => {
                prefix_ctx.parsed.next().map(str::to_ascii_lowercase)
            }
            CommandContext::Slash(slash_ctx) => slash_ctx.subcommand(),
        }
    }

    pub fn author(&self) -> Option<&User> {
        match self {
            CommandContext::Prefix(prefix_ctx) => Some(&prefix_ctx.message.author),
            CommandContext::Slash(slash_ctx) => slash_ctx.interaction.author(),
        }
    }

    pub fn user_id(&self) -> anyhow::Result<Id<UserMarker>> {
        self.author()
            .map(|user| user.id)
            .ok_or_else(|| anyhow!("Couldn't tell who ran this command."))
    }

    pub fn guild_id(&self) -> Option<Id<GuildMarker>> {
        match self {
            CommandContext::Prefix(prefix_ctx) => prefix_ctx.message.guild_id,
            CommandContext::Slash(slash_ctx) => slash_ctx.interaction.guild_id,
        }
    }

    pub fn require_guild(&self) -> anyhow::Result<Id<GuildMarker>> {
        self.guild_id()
            .ok_or_else(|| anyhow!("This command must be used in a server."))
    }

    pub fn channel_id(&self) -> Option<Id<ChannelMarker>> {
        match self {
            CommandContext::Prefix(prefix_ctx) => Some(prefix_ctx.channel_id),
            CommandContext::Slash(slash_ctx) => {
                slash_ctx.interaction.channel.as_ref().map(|channel| channel.id)
            }
        }
    }

    pub fn require_channel(&self) -> anyhow::Result<Id<ChannelMarker>> {
        self.channel_id()
            .ok_or_else(|| anyhow!("Couldn't tell which channel this was used in."))
    }

    pub fn member_roles(&self) -> Vec<Id<RoleMarker>> {
        match self {
            CommandContext::Prefix(prefix_ctx) => prefix_ctx
                .message
                .member
                .as_ref()
                .map(|member| member.roles.clone())
                .unwrap_or_default(),
            CommandContext::Slash(slash_ctx) => slash_ctx
                .interaction
                .member
                .as_ref()
                .map(|member| member.roles.clone())
                .unwrap_or_default(),
        }
    }

    pub fn member_permissions(&self, cache: &InMemoryCache) -> Permissions {
        match self {
            CommandContext::Prefix(prefix_ctx) => {
                let Some(guild_id) = prefix_ctx.message.guild_id else {
                    return Permissions::empty();
                };
                cache
                    .permissions()
                    .root(prefix_ctx.message.author.id, guild_id)
                    .unwrap_or_else(|e| {
                        tracing::debug!(
                            error = ?e,
                            "Couldn't compute member permissions from cache"
                        );
                        Permissions::empty()
                    })
            }
            CommandContext::Slash(slash_ctx) => slash_ctx
                .interaction
                .member
                .as_ref()
                .and_then(|member| member.permissions)
                .unwrap_or_else(Permissions::empty),
        }
    }

    /// Fails unless the member has `required` (administrators always pass).
    pub fn ensure_permissions(
        &self,
        cache: &InMemoryCache,
        required: Permissions,
    ) -> anyhow::Result<()> {
        let granted = self.member_permissions(cache);
        if granted.contains(Permissions::ADMINISTRATOR) || granted.contains(required) {
            Ok(())
        } else {
            bail!("You need the {required:?} permission to do that.")
        }
    }
}

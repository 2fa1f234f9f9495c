use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use twilight_http::client::InteractionClient;
use twilight_model::{
    application::interaction::Interaction,
    channel::{Message, message::MessageFlags},
    guild::Permissions,
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker},
    },
};

use crate::command_handler::{CommandResponse, create_error_response};
use crate::state::State;
use crate::tickets::Actor;
use crate::utils::discord::is_unknown_interaction;

/// A button press or modal submit, with the helpers its handler needs.
pub struct InteractionCtx {
    pub state: Arc<State>,
    pub interaction: Interaction,
    acknowledged: AtomicBool,
}

impl InteractionCtx {
    pub fn new(state: Arc<State>, interaction: Interaction) -> Self {
        Self {
            state,
            interaction,
            acknowledged: AtomicBool::new(false),
        }
    }

    fn client(&self) -> InteractionClient<'_> {
        self.state.http.interaction(self.interaction.application_id)
    }

    async fn create(
        &self,
        kind: InteractionResponseType,
        data: Option<InteractionResponseData>,
    ) -> anyhow::Result<()> {
        self.client()
            .create_response(
                self.interaction.id,
                &self.interaction.token,
                &InteractionResponse { kind, data },
            )
            .await?;
        self.acknowledged.store(true, Ordering::Release);
        Ok(())
    }

    /// Answers with a new message.
    pub async fn respond(&self, response: CommandResponse) -> anyhow::Result<()> {
        self.create(
            InteractionResponseType::ChannelMessageWithSource,
            Some(response.into_data()),
        )
        .await
    }

    /// Replaces the message the component is attached to.
    pub async fn update_message(&self, response: CommandResponse) -> anyhow::Result<()> {
        self.create(
            InteractionResponseType::UpdateMessage,
            Some(response.into_update_data()),
        )
        .await
    }

    /// Acknowledges without changing anything yet.
    pub async fn defer_update(&self) -> anyhow::Result<()> {
        self.create(InteractionResponseType::DeferredUpdateMessage, None)
            .await
    }

    /// Acknowledges with a "thinking" message to be filled by [`Self::edit_reply`].
    pub async fn defer_reply(&self, ephemeral: bool) -> anyhow::Result<()> {
        let data = InteractionResponseData {
            flags: ephemeral.then_some(MessageFlags::EPHEMERAL),
            ..Default::default()
        };
        self.create(
            InteractionResponseType::DeferredChannelMessageWithSource,
            Some(data),
        )
        .await
    }

    pub async fn edit_reply(&self, response: CommandResponse) -> anyhow::Result<()> {
        self.client()
            .update_response(&self.interaction.token)
            .content((!response.content.is_empty()).then_some(response.content.as_str()))
            .embeds(Some(response.embeds.as_slice()))
            .components(Some(response.components.as_slice()))
            .await?;
        Ok(())
    }

    pub async fn show_modal(&self, modal: InteractionResponseData) -> anyhow::Result<()> {
        self.create(InteractionResponseType::Modal, Some(modal)).await
    }

    /// Sends another message after the interaction was acknowledged.
    pub async fn followup(&self, response: CommandResponse) -> anyhow::Result<()> {
        let client = self.client();
        let mut followup = client
            .create_followup(&self.interaction.token)
            .content(&response.content)
            .embeds(&response.embeds)
            .components(&response.components);
        if let Some(flags) = response.flags() {
            followup = followup.flags(flags);
        }
        followup.await?;
        Ok(())
    }

    /// Shows `error` to the user, through whichever path is still open.
    pub async fn reply_error(&self, error: &anyhow::Error) -> anyhow::Result<()> {
        if is_unknown_interaction(error) {
            tracing::debug!("Interaction expired before the handler finished");
            return Ok(());
        }
        tracing::warn!(error = ?error, "Interaction handler failed");
        let response = create_error_response(error);
        let result = if self.acknowledged.load(Ordering::Acquire) {
            self.followup(response).await
        } else {
            self.respond(response).await
        };
        match result {
            Err(e) if is_unknown_interaction(&e) => Ok(()),
            other => other,
        }
    }

    pub fn user_id(&self) -> anyhow::Result<Id<UserMarker>> {
        self.interaction
            .author_id()
            .ok_or_else(|| anyhow!("Couldn't tell who pressed this."))
    }

    pub fn guild_id(&self) -> anyhow::Result<Id<GuildMarker>> {
        self.interaction
            .guild_id
            .ok_or_else(|| anyhow!("This only works in a server."))
    }

    pub fn channel_id(&self) -> anyhow::Result<Id<ChannelMarker>> {
        self.interaction
            .channel
            .as_ref()
            .map(|channel| channel.id)
            .ok_or_else(|| anyhow!("Couldn't tell which channel this was used in."))
    }

    pub fn message(&self) -> Option<&Message> {
        self.interaction.message.as_ref()
    }

    pub fn member_roles(&self) -> Vec<Id<RoleMarker>> {
        self.interaction
            .member
            .as_ref()
            .map(|member| member.roles.clone())
            .unwrap_or_default()
    }

    pub fn permissions(&self) -> Permissions {
        self.interaction
            .member
            .as_ref()
            .and_then(|member| member.permissions)
            .unwrap_or_else(Permissions::empty)
    }

    pub fn actor(&self) -> anyhow::Result<Actor> {
        Ok(Actor {
            user_id: self.user_id()?,
            roles: self.member_roles(),
            is_admin: self.permissions().contains(Permissions::ADMINISTRATOR),
        })
    }
}

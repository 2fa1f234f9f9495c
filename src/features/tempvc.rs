use std::collections::HashMap;

use anyhow::{Context, anyhow};
use dashmap::DashMap;
use thiserror::Error;
use twilight_model::{
    channel::{
        ChannelType,
        message::{Component, component::{ButtonStyle, TextInputStyle}},
    },
    guild::Permissions,
    http::{
        interaction::InteractionResponseData,
        permission_overwrite::{PermissionOverwrite, PermissionOverwriteType},
    },
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, UserMarker},
    },
    voice::VoiceState,
};
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::notice;
use crate::components::{ComponentAction, InteractionCtx, ModalAction, TempVcAction};
use crate::models::TempVcConfig;
use crate::state::State;
use crate::store::load_guild;
use crate::utils::discord::{action_row, button, text_input};

pub const TEMPVC_COLOR: u32 = 0x5865f2;
pub const LIMIT_PRESETS: [u16; 4] = [0, 2, 5, 10];
const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TempVcError {
    #[error("This isn't a temporary channel I manage.")]
    Unknown,
    #[error("Only the channel owner can do that.")]
    NotOwner,
    #[error("You already own this channel.")]
    AlreadyOwner,
    #[error("The owner is still here.")]
    OwnerPresent,
    #[error("Join the channel first.")]
    NotInChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempChannel {
    pub guild_id: Id<GuildMarker>,
    pub owner: Id<UserMarker>,
}

/// Who may press `action`: the owner for everything except claim, which
/// goes to a member of the channel once the owner has left.
pub fn authorize(
    channel: &TempChannel,
    action: TempVcAction,
    user_id: Id<UserMarker>,
    owner_present: bool,
    user_present: bool,
) -> Result<(), TempVcError> {
    match action {
        TempVcAction::Claim if user_id == channel.owner => Err(TempVcError::AlreadyOwner),
        TempVcAction::Claim if owner_present => Err(TempVcError::OwnerPresent),
        TempVcAction::Claim if !user_present => Err(TempVcError::NotInChannel),
        TempVcAction::Claim => Ok(()),
        _ if user_id != channel.owner => Err(TempVcError::NotOwner),
        _ => Ok(()),
    }
}

/// Temporary voice channels created this session, keyed by channel.
#[derive(Default)]
pub struct TempVoiceRegistry {
    channels: DashMap<Id<ChannelMarker>, TempChannel>,
}

impl TempVoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel_id: Id<ChannelMarker>, channel: TempChannel) {
        self.channels.insert(channel_id, channel);
    }

    pub fn get(&self, channel_id: Id<ChannelMarker>) -> Option<TempChannel> {
        self.channels.get(&channel_id).map(|c| *c)
    }

    pub fn set_owner(&self, channel_id: Id<ChannelMarker>, owner: Id<UserMarker>) -> bool {
        match self.channels.get_mut(&channel_id) {
            Some(mut channel) => {
                channel.owner = owner;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, channel_id: Id<ChannelMarker>) -> Option<TempChannel> {
        self.channels.remove(&channel_id).map(|(_, c)| c)
    }
}

pub fn panel_components() -> Vec<Component> {
    let tempvc = |action| ComponentAction::TempVc(action).to_string();
    let limits = LIMIT_PRESETS
        .iter()
        .map(|&limit| {
            let label = if limit == 0 {
                "No limit".to_string()
            } else {
                format!("Limit {limit}")
            };
            button(tempvc(TempVcAction::Limit(limit)), label, ButtonStyle::Secondary)
        })
        .collect();
    vec![
        action_row(vec![
            button(tempvc(TempVcAction::Lock), "🔒 Lock", ButtonStyle::Secondary),
            button(tempvc(TempVcAction::Unlock), "🔓 Unlock", ButtonStyle::Secondary),
            button(tempvc(TempVcAction::Rename), "✏️ Rename", ButtonStyle::Primary),
            button(tempvc(TempVcAction::Claim), "👑 Claim", ButtonStyle::Success),
        ]),
        action_row(limits),
    ]
}

pub fn rename_modal() -> InteractionResponseData {
    let mut name = text_input("name", "Channel name", TextInputStyle::Short, true);
    name.max_length = Some(MAX_NAME_LENGTH as u16);
    InteractionResponseData {
        custom_id: Some(ModalAction::TempVcRename.to_string()),
        title: Some("Rename channel".to_string()),
        components: Some(vec![action_row(vec![Component::TextInput(name)])]),
        ..Default::default()
    }
}

/// `@everyone` is the role whose id equals the guild's.
fn everyone(guild_id: Id<GuildMarker>, deny: Option<Permissions>) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: None,
        deny,
        id: guild_id.cast(),
        kind: PermissionOverwriteType::Role,
    }
}

fn owner_overwrite(owner: Id<UserMarker>) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: Some(Permissions::CONNECT | Permissions::MOVE_MEMBERS),
        deny: None,
        id: owner.cast(),
        kind: PermissionOverwriteType::Member,
    }
}

fn member_count(state: &State, channel_id: Id<ChannelMarker>) -> usize {
    state
        .cache
        .voice_channel_states(channel_id)
        .map_or(0, |states| states.count())
}

fn in_channel(
    state: &State,
    guild_id: Id<GuildMarker>,
    user_id: Id<UserMarker>,
    channel_id: Id<ChannelMarker>,
) -> bool {
    state
        .cache
        .voice_state(user_id, guild_id)
        .is_some_and(|voice| voice.channel_id() == channel_id)
}

/// Reacts to a voice move: cleans up an emptied temp channel and creates a
/// new one when the member entered the guild's creator channel.
pub async fn handle_voice_state(
    state: &State,
    voice: &VoiceState,
    previous_channel: Option<Id<ChannelMarker>>,
) -> anyhow::Result<()> {
    let Some(guild_id) = voice.guild_id else {
        return Ok(());
    };

    if let Some(previous) = previous_channel.filter(|prev| Some(*prev) != voice.channel_id) {
        if state.temp_voice.get(previous).is_some() && member_count(state, previous) == 0 {
            state.temp_voice.remove(previous);
            match state.http.delete_channel(previous).await {
                Ok(_) => {
                    tracing::info!(%guild_id, channel_id = %previous, "Empty temp channel deleted")
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        channel_id = %previous,
                        "Failed to delete temp channel"
                    )
                }
            }
        }
    }

    let Some(channel_id) = voice.channel_id else {
        return Ok(());
    };
    let Some(config) = load_guild(&*state.store, guild_id).await?.tempvc else {
        return Ok(());
    };
    if config.creator_channel_id != channel_id {
        return Ok(());
    }
    let name = voice
        .member
        .as_ref()
        .map(|member| {
            member
                .nick
                .clone()
                .or_else(|| member.user.global_name.clone())
                .unwrap_or_else(|| member.user.name.clone())
        })
        .unwrap_or_else(|| "member".to_string());
    create_for(state, guild_id, voice.user_id, &config, &name).await
}

async fn create_for(
    state: &State,
    guild_id: Id<GuildMarker>,
    owner: Id<UserMarker>,
    config: &TempVcConfig,
    display_name: &str,
) -> anyhow::Result<()> {
    let name = config.channel_name(display_name);
    let overwrites = [owner_overwrite(owner)];
    let mut request = state
        .http
        .create_guild_channel(guild_id, &name)
        .kind(ChannelType::GuildVoice)
        .permission_overwrites(&overwrites);
    if let Some(category_id) = config.category_id {
        request = request.parent_id(category_id);
    }
    if let Some(limit) = config.user_limit {
        request = request.user_limit(limit);
    }
    let channel = request
        .await
        .context("Failed to create temp voice channel")?
        .model()
        .await?;

    if let Err(e) = state
        .http
        .update_guild_member(guild_id, owner)
        .channel_id(Some(channel.id))
        .await
    {
        tracing::warn!(
            error = ?e,
            %guild_id,
            user_id = %owner,
            "Member left before the move; dropping temp channel"
        );
        state.http.delete_channel(channel.id).await?;
        return Ok(());
    }

    state
        .temp_voice
        .register(channel.id, TempChannel { guild_id, owner });
    tracing::info!(%guild_id, channel_id = %channel.id, %owner, "Temp voice channel created");

    let embed = EmbedBuilder::new()
        .title("Your voice channel")
        .description(format!(
            "<@{owner}> owns this channel. Use the buttons below to manage it. \
             If the owner leaves, anyone still here can claim it."
        ))
        .color(TEMPVC_COLOR)
        .build();
    let components = panel_components();
    if let Err(e) = state
        .http
        .create_message(channel.id)
        .embeds(&[embed])
        .components(&components)
        .await
    {
        tracing::warn!(error = ?e, channel_id = %channel.id, "Failed to post temp channel panel");
    }
    Ok(())
}

/// Looks up the temp channel the interaction came from and checks the
/// presser may act on it.
fn authorized(
    ctx: &InteractionCtx,
    action: TempVcAction,
) -> anyhow::Result<(Id<ChannelMarker>, TempChannel)> {
    let channel_id = ctx.channel_id()?;
    let user_id = ctx.user_id()?;
    let channel = ctx.state.temp_voice.get(channel_id).ok_or(TempVcError::Unknown)?;
    let owner_present = in_channel(&ctx.state, channel.guild_id, channel.owner, channel_id);
    let user_present = in_channel(&ctx.state, channel.guild_id, user_id, channel_id);
    authorize(&channel, action, user_id, owner_present, user_present)?;
    Ok((channel_id, channel))
}

pub async fn handle_button(ctx: &InteractionCtx, action: TempVcAction) -> anyhow::Result<()> {
    let (channel_id, channel) = match authorized(ctx, action) {
        Ok(found) => found,
        Err(e) => return ctx.respond(notice(e.to_string())).await,
    };
    let http = &ctx.state.http;

    let message = match action {
        TempVcAction::Lock => {
            http.update_channel_permission(
                channel_id,
                &everyone(channel.guild_id, Some(Permissions::CONNECT)),
            )
            .await?;
            "🔒 Locked. Nobody new can join.".to_string()
        }
        TempVcAction::Unlock => {
            http.update_channel_permission(channel_id, &everyone(channel.guild_id, None))
                .await?;
            "🔓 Unlocked.".to_string()
        }
        TempVcAction::Rename => return ctx.show_modal(rename_modal()).await,
        TempVcAction::Limit(limit) => {
            http.update_channel(channel_id).user_limit(limit).await?;
            if limit == 0 {
                "Removed the user limit.".to_string()
            } else {
                format!("User limit set to {limit}.")
            }
        }
        TempVcAction::Claim => {
            let user_id = ctx.user_id()?;
            if !ctx.state.temp_voice.set_owner(channel_id, user_id) {
                return Err(anyhow!(TempVcError::Unknown));
            }
            http.update_channel_permission(channel_id, &owner_overwrite(user_id))
                .await?;
            tracing::info!(%channel_id, new_owner = %user_id, "Temp channel claimed");
            format!("👑 <@{user_id}> now owns this channel.")
        }
    };
    ctx.respond(notice(message)).await
}

pub async fn handle_rename(
    ctx: &InteractionCtx,
    values: &HashMap<String, String>,
) -> anyhow::Result<()> {
    let (channel_id, _) = match authorized(ctx, TempVcAction::Rename) {
        Ok(found) => found,
        Err(e) => return ctx.respond(notice(e.to_string())).await,
    };
    let name = values
        .get("name")
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("The channel needs a name."))?;
    ctx.state
        .http
        .update_channel(channel_id)
        .name(name)
        .await
        .context("Discord rejected that name")?;
    ctx.respond(notice(format!("Renamed to **{name}**."))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Id<UserMarker> = Id::new(1);
    const OTHER: Id<UserMarker> = Id::new(2);

    fn channel() -> TempChannel {
        TempChannel {
            guild_id: Id::new(9),
            owner: OWNER,
        }
    }

    #[test]
    fn test_only_owner_manages() {
        assert_eq!(authorize(&channel(), TempVcAction::Lock, OWNER, true, true), Ok(()));
        assert_eq!(
            authorize(&channel(), TempVcAction::Limit(5), OTHER, true, true),
            Err(TempVcError::NotOwner)
        );
    }

    #[test]
    fn test_claim_rules() {
        let claim = TempVcAction::Claim;
        assert_eq!(
            authorize(&channel(), claim, OWNER, false, true),
            Err(TempVcError::AlreadyOwner)
        );
        assert_eq!(
            authorize(&channel(), claim, OTHER, true, true),
            Err(TempVcError::OwnerPresent)
        );
        assert_eq!(
            authorize(&channel(), claim, OTHER, false, false),
            Err(TempVcError::NotInChannel)
        );
        assert_eq!(authorize(&channel(), claim, OTHER, false, true), Ok(()));
    }

    #[test]
    fn test_registry_ownership() {
        let registry = TempVoiceRegistry::new();
        let id = Id::new(50);
        registry.register(id, channel());
        assert!(registry.set_owner(id, OTHER));
        assert_eq!(registry.get(id).unwrap().owner, OTHER);
        assert!(registry.remove(id).is_some());
        assert!(!registry.set_owner(id, OWNER));
    }

    #[test]
    fn test_panel_ids_parse() {
        for row in panel_components() {
            let Component::ActionRow(row) = row else {
                panic!("expected action row");
            };
            for component in row.components {
                let Component::Button(button) = component else {
                    panic!("expected button");
                };
                let id = button.custom_id.unwrap();
                assert!(
                    matches!(ComponentAction::parse(&id), Some(ComponentAction::TempVc(_))),
                    "{id}"
                );
            }
        }
    }
}

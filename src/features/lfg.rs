use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use dashmap::DashMap;
use thiserror::Error;
use twilight_mention::Mention;
use twilight_model::{
    channel::message::{Component, Embed, component::ButtonStyle},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker},
    },
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use crate::command_handler::{CommandResponseBuilder, notice};
use crate::components::{ComponentAction, InteractionCtx, LfgAction};
use crate::utils::discord::{action_row, button, truncate};

pub const LFG_COLOR: u32 = 0x57f287;
pub const LFG_CLOSED_COLOR: u32 = 0x747f8d;
pub const MAX_SLOTS: u8 = 25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LfgError {
    #[error("This group is already closed.")]
    Closed,
    #[error("This group is full.")]
    Full,
    #[error("You're already in this group.")]
    AlreadyJoined,
    #[error("You're not in this group.")]
    NotMember,
    #[error("The host can't leave their own group. Close it instead.")]
    OwnerCannotLeave,
    #[error("Only the host can close this group.")]
    NotOwner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfgPost {
    pub id: u64,
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Option<Id<MessageMarker>>,
    pub owner: Id<UserMarker>,
    pub game: String,
    pub note: Option<String>,
    /// Group size including the host.
    pub slots: u8,
    pub members: Vec<Id<UserMarker>>,
    pub closed: bool,
}

impl LfgPost {
    pub fn is_full(&self) -> bool {
        self.members.len() >= usize::from(self.slots)
    }

    /// Adds `user`; the group closes itself when the last slot is taken.
    pub fn join(&mut self, user: Id<UserMarker>) -> Result<(), LfgError> {
        if self.closed {
            return Err(LfgError::Closed);
        }
        if self.members.contains(&user) {
            return Err(LfgError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(LfgError::Full);
        }
        self.members.push(user);
        if self.is_full() {
            self.closed = true;
        }
        Ok(())
    }

    pub fn leave(&mut self, user: Id<UserMarker>) -> Result<(), LfgError> {
        if self.closed {
            return Err(LfgError::Closed);
        }
        if user == self.owner {
            return Err(LfgError::OwnerCannotLeave);
        }
        let before = self.members.len();
        self.members.retain(|member| *member != user);
        if self.members.len() == before {
            return Err(LfgError::NotMember);
        }
        Ok(())
    }

    pub fn close(&mut self, user: Id<UserMarker>) -> Result<(), LfgError> {
        if user != self.owner {
            return Err(LfgError::NotOwner);
        }
        if self.closed {
            return Err(LfgError::Closed);
        }
        self.closed = true;
        Ok(())
    }

    pub fn embed(&self) -> Embed {
        let roster: Vec<String> = self
            .members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                if *member == self.owner {
                    format!("{}. {} 👑", i + 1, member.mention())
                } else {
                    format!("{}. {}", i + 1, member.mention())
                }
            })
            .collect();
        let status = if self.closed {
            if self.is_full() { "Full" } else { "Closed" }
        } else {
            "Open"
        };
        let mut embed = EmbedBuilder::new()
            .title(format!("🎮 LFG: {}", truncate(&self.game, 200)))
            .color(if self.closed { LFG_CLOSED_COLOR } else { LFG_COLOR })
            .field(EmbedFieldBuilder::new("Host", self.owner.mention().to_string()).inline())
            .field(
                EmbedFieldBuilder::new("Players", format!("{}/{}", self.members.len(), self.slots))
                    .inline(),
            )
            .field(EmbedFieldBuilder::new("Status", status).inline())
            .field(EmbedFieldBuilder::new("Roster", roster.join("\n")))
            .footer(EmbedFooterBuilder::new(format!("Group #{}", self.id)));
        if let Some(note) = &self.note {
            embed = embed.description(truncate(note, 1000));
        }
        embed.build()
    }

    /// Join/leave/close buttons; none once the group is closed.
    pub fn components(&self) -> Vec<Component> {
        if self.closed {
            return Vec::new();
        }
        let lfg = |action| ComponentAction::Lfg(action).to_string();
        vec![action_row(vec![
            button(lfg(LfgAction::Join(self.id)), "Join", ButtonStyle::Success),
            button(lfg(LfgAction::Leave(self.id)), "Leave", ButtonStyle::Secondary),
            button(lfg(LfgAction::Close(self.id)), "Close", ButtonStyle::Danger),
        ])]
    }
}

/// Live group posts. They are not persisted; buttons on posts from before a
/// restart answer that the group expired.
#[derive(Default)]
pub struct LfgBoard {
    next_id: AtomicU64,
    posts: DashMap<u64, LfgPost>,
}

pub struct NewPost {
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub owner: Id<UserMarker>,
    pub game: String,
    pub note: Option<String>,
    pub slots: u8,
}

impl LfgBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, post: NewPost) -> anyhow::Result<LfgPost> {
        if !(2..=MAX_SLOTS).contains(&post.slots) {
            return Err(anyhow!("A group needs between 2 and {MAX_SLOTS} slots."));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let post = LfgPost {
            id,
            guild_id: post.guild_id,
            channel_id: post.channel_id,
            message_id: None,
            owner: post.owner,
            game: post.game,
            note: post.note,
            slots: post.slots,
            members: vec![post.owner],
            closed: false,
        };
        self.posts.insert(id, post.clone());
        Ok(post)
    }

    pub fn attach_message(&self, id: u64, message_id: Id<MessageMarker>) {
        if let Some(mut post) = self.posts.get_mut(&id) {
            post.message_id = Some(message_id);
        }
    }

    /// Applies `action` and returns the post as it now stands. Closed posts
    /// are dropped from the board.
    pub fn apply(&self, action: LfgAction, user: Id<UserMarker>) -> anyhow::Result<LfgPost> {
        let id = match action {
            LfgAction::Join(id) | LfgAction::Leave(id) | LfgAction::Close(id) => id,
        };
        let mut post = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| anyhow!("This group has expired."))?;
        match action {
            LfgAction::Join(_) => post.join(user)?,
            LfgAction::Leave(_) => post.leave(user)?,
            LfgAction::Close(_) => post.close(user)?,
        }
        let snapshot = post.clone();
        drop(post);
        if snapshot.closed {
            self.posts.remove(&id);
        }
        Ok(snapshot)
    }

    pub fn get(&self, id: u64) -> Option<LfgPost> {
        self.posts.get(&id).map(|post| post.clone())
    }
}

pub fn post_message(post: &LfgPost) -> crate::command_handler::CommandResponse {
    CommandResponseBuilder::new()
        .embed(post.embed())
        .components(post.components())
        .build()
}

pub async fn handle_button(ctx: &InteractionCtx, action: LfgAction) -> anyhow::Result<()> {
    let user_id = ctx.user_id()?;
    let post = match ctx.state.lfg.apply(action, user_id) {
        Ok(post) => post,
        Err(e) => return ctx.respond(notice(e.to_string())).await,
    };
    if post.closed && post.is_full() {
        let mentions: Vec<String> = post.members.iter().map(|m| m.mention().to_string()).collect();
        tracing::info!(group = post.id, "LFG group filled");
        ctx.update_message(post_message(&post)).await?;
        return ctx
            .followup(
                CommandResponseBuilder::new()
                    .content(format!(
                        "🎮 **{}** group is full: {}",
                        post.game,
                        mentions.join(" ")
                    ))
                    .build(),
            )
            .await;
    }
    ctx.update_message(post_message(&post)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_post(slots: u8) -> (LfgBoard, u64) {
        let board = LfgBoard::new();
        let post = board
            .create(NewPost {
                guild_id: Id::new(1),
                channel_id: Id::new(2),
                owner: Id::new(10),
                game: "Valorant".to_string(),
                note: None,
                slots,
            })
            .unwrap();
        (board, post.id)
    }

    #[test]
    fn test_join_until_full() {
        let (board, id) = board_with_post(3);
        let post = board.apply(LfgAction::Join(id), Id::new(11)).unwrap();
        assert_eq!(post.members.len(), 2);
        assert!(!post.closed);
        assert!(board.apply(LfgAction::Join(id), Id::new(11)).is_err());

        let post = board.apply(LfgAction::Join(id), Id::new(12)).unwrap();
        assert!(post.closed && post.is_full());
        assert!(post.components().is_empty());
        assert!(board.get(id).is_none());
    }

    #[test]
    fn test_leave_and_close_rules() {
        let mut post = board_with_post(4).0.get(1).unwrap();
        assert_eq!(post.leave(Id::new(10)), Err(LfgError::OwnerCannotLeave));
        assert_eq!(post.leave(Id::new(99)), Err(LfgError::NotMember));
        post.join(Id::new(11)).unwrap();
        post.leave(Id::new(11)).unwrap();
        assert_eq!(post.close(Id::new(11)), Err(LfgError::NotOwner));
        post.close(Id::new(10)).unwrap();
        assert_eq!(post.join(Id::new(12)), Err(LfgError::Closed));
    }

    #[test]
    fn test_slot_bounds() {
        let board = LfgBoard::new();
        let new_post = |slots| NewPost {
            guild_id: Id::new(1),
            channel_id: Id::new(2),
            owner: Id::new(3),
            game: "x".to_string(),
            note: None,
            slots,
        };
        assert!(board.create(new_post(1)).is_err());
        assert!(board.create(new_post(MAX_SLOTS + 1)).is_err());
        assert!(board.create(new_post(2)).is_ok());
    }

    #[test]
    fn test_embed_shows_count() {
        let (board, id) = board_with_post(5);
        let embed = board.get(id).unwrap().embed();
        assert_eq!(embed.fields[1].value, "1/5");
    }
}

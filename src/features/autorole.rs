use twilight_model::{guild::Member, id::{Id, marker::GuildMarker}};

use crate::state::State;
use crate::store::load_guild;

/// Gives a joining member the guild's autorole. Bots are left alone.
pub async fn handle_member_add(
    state: &State,
    guild_id: Id<GuildMarker>,
    member: &Member,
) -> anyhow::Result<()> {
    if member.user.bot {
        return Ok(());
    }
    let Some(role_id) = load_guild(&*state.store, guild_id).await?.autorole_id else {
        return Ok(());
    };
    let user_id = member.user.id;
    match state.http.add_guild_member_role(guild_id, user_id, role_id).await {
        Ok(_) => tracing::debug!(%guild_id, %user_id, %role_id, "Autorole assigned"),
        Err(e) => tracing::warn!(error = ?e, %guild_id, %role_id, "Failed to assign autorole"),
    }
    Ok(())
}

use std::{future::Future, pin::Pin, sync::Arc};

use lavalink_rs::client::LavalinkClient;
use songbird::Songbird;
use twilight_http::Client as HttpClient;
use twilight_interactions::command::CreateCommand;
use twilight_model::{
    application::interaction::{Interaction, application_command::CommandData},
    channel::Message,
    id::{Id, marker::UserMarker},
};

use crate::command_handler::context::{CommandContext, PrefixContext, ResponseState, SlashContext};
use crate::command_handler::response::create_error_response;
use crate::store::{SharedStore, record_command_use};
use crate::{prefix_parser::Arguments, state::State};

pub type GlobalStateInner = State;
pub type GlobalState = Arc<GlobalStateInner>;

/// Counts the invocation on the user's profile without holding up the reply.
fn track_usage<S: StateExt>(state: &S, user_id: Option<Id<UserMarker>>) {
    let Some(user_id) = user_id else {
        return;
    };
    let store = state.store();
    tokio::spawn(async move {
        if let Err(e) = record_command_use(&*store, user_id).await {
            tracing::warn!(error = ?e, %user_id, "Failed to record command usage");
        }
    });
}

fn prefix_context<'msg, S: HasHttpClient>(
    state: &S,
    message: &'msg Message,
    parsed: Arguments<'msg>,
    prefix: String,
) -> CommandContext<'msg> {
    CommandContext::Prefix(Box::new(PrefixContext {
        message_id: message.id,
        channel_id: message.channel_id,
        parsed,
        prefix,
        http_client: state.http_client(),
        message,
    }))
}

async fn report_failure(ctx: CommandContext<'_>, error: &anyhow::Error, command: &str) {
    if let Err(e) = ctx.reply_error(error, create_error_response).await {
        tracing::error!(error = ?e, command, "Failed to send command error reply");
    }
}

#[async_trait::async_trait]
pub trait Command<S>: CreateCommand
where
    S: HasHttpClient + StateExt + Clone + Send + Sync + 'static + Sized,
{
    async fn execute<'ctx>(state: S, cmd_ctx: CommandContext<'ctx>) -> anyhow::Result<()>;

    async fn execute_prefix_command<'msg>(
        state: S,
        message: &'msg Message,
        arguments: Arguments<'msg>,
        prefix: String,
    ) -> anyhow::Result<()> {
        track_usage(&state, Some(message.author.id));

        let ctx = prefix_context(&state, message, arguments.clone(), prefix.clone());
        let Err(e) = Self::execute(state.clone(), ctx).await else {
            return Ok(());
        };
        tracing::debug!(command = Self::NAME, error = ?e, "Prefix command failed");
        // The first context was moved into the command; replies go through a fresh one.
        report_failure(prefix_context(&state, message, arguments, prefix), &e, Self::NAME).await;
        Ok(())
    }

    async fn execute_slash_command(
        state: S,
        interaction: Interaction,
        data: CommandData,
    ) -> anyhow::Result<()> {
        track_usage(&state, interaction.author_id());

        let response_state = Arc::new(ResponseState::default());
        let slash_ctx = SlashContext::new(
            interaction.clone(),
            data.clone(),
            state.http_client(),
            response_state.clone(),
        );
        let Err(e) =
            Self::execute(state.clone(), CommandContext::Slash(Box::new(slash_ctx))).await
        else {
            return Ok(());
        };
        tracing::debug!(command = Self::NAME, error = ?e, "Slash command failed");
        // Shares `response_state`, so a deferred command gets its error as an edit.
        let error_ctx = SlashContext::new(interaction, data, state.http_client(), response_state);
        report_failure(CommandContext::Slash(Box::new(error_ctx)), &e, Self::NAME).await;
        Ok(())
    }
}

/// One row of the command table: how to register a command and how to run it
/// from either entry point.
pub struct CommandDefinition<S>
where
    S: HasHttpClient + StateExt + Clone + Send + Sync + 'static + Sized,
{
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub create_slash_data_fn: fn() -> twilight_model::application::command::Command,
    pub slash_executor:
        fn(S, Interaction, CommandData) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>,
    pub prefix_executor: for<'msg> fn(
        S,
        &'msg Message,
        Arguments<'msg>,
        String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'msg>>,
}

impl<S> CommandDefinition<S>
where
    S: HasHttpClient + StateExt + Clone + Send + Sync + 'static + Sized,
{
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

#[macro_export]
macro_rules! command_def {
    ($state_type:ty, $command_type:ty) => {
        $crate::command_def!($state_type, $command_type, aliases = [])
    };
    ($state_type:ty, $command_type:ty, aliases = [$($alias:expr),* $(,)?]) => {
        $crate::command_handler::CommandDefinition::<$state_type> {
            name: <$command_type as twilight_interactions::command::CreateCommand>::NAME,
            aliases: &[$($alias),*],
            create_slash_data_fn: || {
                <$command_type as twilight_interactions::command::CreateCommand>::create_command()
                    .into()
            },
            slash_executor: |state, interaction, data| {
                Box::pin(
                    <$command_type as $crate::command_handler::Command<$state_type>>
                        ::execute_slash_command(state, interaction, data),
                )
            },
            prefix_executor: |state, message, args, prefix| {
                Box::pin(
                    <$command_type as $crate::command_handler::Command<$state_type>>
                        ::execute_prefix_command(state, message, args, prefix),
                )
            },
        }
    };
}

pub trait HasHttpClient {
    fn http_client(&self) -> Arc<HttpClient>;
}

/// Shared handles a command reaches through its state.
pub trait StateExt: HasHttpClient {
    fn lavalink(&self) -> Arc<LavalinkClient>;
    fn songbird(&self) -> Arc<Songbird>;
    fn store(&self) -> SharedStore;
}

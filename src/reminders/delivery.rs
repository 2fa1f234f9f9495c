use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::Embed;

use super::scheduler::{DeliveryTarget, ReminderSink};

/// Sends fired reminders through the Discord REST API.
pub struct DiscordReminderSink {
    http: Arc<HttpClient>,
}

impl DiscordReminderSink {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReminderSink for DiscordReminderSink {
    async fn send(
        &self,
        target: DeliveryTarget,
        content: Option<String>,
        embed: Embed,
    ) -> anyhow::Result<()> {
        let channel_id = match target {
            DeliveryTarget::Channel(channel_id) => channel_id,
            DeliveryTarget::Direct(user_id) => {
                self.http
                    .create_private_channel(user_id)
                    .await
                    .context("Failed to open DM channel")?
                    .model()
                    .await?
                    .id
            }
        };

        let embeds = [embed];
        let mut message = self.http.create_message(channel_id).embeds(&embeds);
        if let Some(content) = content.as_deref() {
            message = message.content(content);
        }
        message.await.context("Failed to send reminder message")?;
        Ok(())
    }
}
